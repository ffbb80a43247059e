//! Append-only log of per-worker "variable changed" notifications.
//!
//! Nodes are linked through `Arc`s. A node stays alive while a cursor sits on
//! it or while its predecessor is alive, so nodes are reclaimed strictly from
//! the head, once every cursor has moved past them.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use crate::registry::{OnWorkerUpdate, WorkerNotice};
use crate::store::stats::StoreStats;

const UNLIMITED: usize = usize::MAX;

/// Result of offering a node to a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    /// Node carries no callback.
    Empty,
    Fired,
    /// One-shot callback already consumed by another worker.
    Exhausted,
}

pub(crate) struct LogNode {
    seq: u64,
    group: Arc<str>,
    name: Arc<str>,
    callback: Option<OnWorkerUpdate>,
    remaining: AtomicUsize,
    next: OnceLock<Arc<LogNode>>,
    stats: Arc<StoreStats>,
}

impl LogNode {
    /// The permanent first node, created at bring-up.
    pub(crate) fn sentinel(stats: Arc<StoreStats>) -> Arc<Self> {
        stats.node_created();
        Arc::new(Self {
            seq: 0,
            group: Arc::from(""),
            name: Arc::from(""),
            callback: None,
            remaining: AtomicUsize::new(0),
            next: OnceLock::new(),
            stats,
        })
    }

    pub(crate) fn seq(&self) -> u64 {
        self.seq
    }

    pub(crate) fn next(&self) -> Option<&Arc<LogNode>> {
        self.next.get()
    }

    /// Claims one firing of the callback.
    fn claim(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| match n {
                0 => None,
                UNLIMITED => Some(UNLIMITED),
                n => Some(n - 1),
            })
            .is_ok()
    }

    /// Runs the callback in the calling worker if a firing can be claimed.
    pub(crate) fn deliver(&self, worker: usize) -> Delivery {
        let Some(callback) = &self.callback else {
            return Delivery::Empty;
        };
        if !self.claim() {
            return Delivery::Exhausted;
        }
        callback(&WorkerNotice {
            worker,
            group: &self.group,
            name: &self.name,
        });
        self.stats.callback_fired(&self.group);
        Delivery::Fired
    }
}

impl Drop for LogNode {
    fn drop(&mut self) {
        self.stats.node_freed();
        // Unlink iteratively so a long unreferenced chain cannot overflow the stack.
        let mut next = self.next.take();
        while let Some(node) = next {
            match Arc::into_inner(node) {
                Some(mut node) => next = node.next.take(),
                None => break,
            }
        }
    }
}

/// One notification to append on commit.
pub(crate) struct LogEntry {
    pub group: Arc<str>,
    pub name: Arc<str>,
    pub callback: OnWorkerUpdate,
    pub only_once: bool,
}

/// Writer-side view of the log. Lives under the writer lock.
pub(crate) struct CallbackLog {
    tail: Arc<LogNode>,
    next_seq: u64,
    stats: Arc<StoreStats>,
}

impl CallbackLog {
    pub(crate) fn new(stats: Arc<StoreStats>) -> Self {
        Self {
            tail: LogNode::sentinel(stats.clone()),
            next_seq: 1,
            stats,
        }
    }

    pub(crate) fn tail(&self) -> &Arc<LogNode> {
        &self.tail
    }

    /// Appends the entries in order and returns the sequence number of the new tail.
    pub(crate) fn append(&mut self, entries: Vec<LogEntry>) -> u64 {
        for entry in entries {
            self.stats.node_created();
            let node = Arc::new(LogNode {
                seq: self.next_seq,
                group: entry.group,
                name: entry.name,
                callback: Some(entry.callback),
                remaining: AtomicUsize::new(if entry.only_once { 1 } else { UNLIMITED }),
                next: OnceLock::new(),
                stats: self.stats.clone(),
            });
            self.next_seq += 1;
            if self.tail.next.set(node.clone()).is_err() {
                tracing::error!(seq = self.tail.seq, "Callback log tail already linked");
            }
            self.tail = node;
        }
        self.tail.seq
    }
}
