//! Worker cursors: position in the callback log plus the pinned generation.
//!
//! A worker reads only from its pinned generation. Between units of work it
//! calls [`Cursor::catch_up`], which runs every pending per-worker callback
//! in commit order and only then pins the newer generation.

use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::registry::{Value, VarHandle};
use crate::store::callback_log::{Delivery, LogNode};
use crate::store::error::Result;
use crate::store::generation::Generation;
use crate::store::ConfigStore;

/// What a call to [`Cursor::catch_up`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatchUp {
    /// Log entries walked past.
    pub advanced: usize,
    pub fired: usize,
    /// One-shot callbacks already consumed by another worker.
    pub skipped: usize,
    /// Generation pinned afterwards.
    pub generation: u64,
}

/// A worker's view of the configuration.
pub struct Cursor {
    id: usize,
    store: Arc<ConfigStore>,
    node: Option<Arc<LogNode>>,
    pinned: Arc<Generation>,
    attached: bool,
}

impl Cursor {
    pub fn id(&self) -> usize {
        self.id
    }

    /// The generation every read goes to until the next catch-up.
    pub fn generation(&self) -> &Arc<Generation> {
        &self.pinned
    }

    pub fn get(&self, handle: VarHandle) -> &Value {
        self.pinned.get(handle)
    }

    pub fn get_by_name(&self, group: &str, name: &str) -> Result<&Value> {
        let handle = self.store.resolve(group, name)?;
        Ok(self.pinned.get(handle))
    }

    /// Sequence number of the last log entry this worker has consumed.
    pub fn position(&self) -> u64 {
        self.node.as_ref().map_or(0, |n| n.seq())
    }

    /// Runs pending per-worker callbacks, then pins the published generation.
    pub fn catch_up(&mut self) -> CatchUp {
        let target = self.store.acquire_current();
        let mut report = CatchUp::default();

        if let Some(mut node) = self.node.take() {
            while node.seq() < target.log_seq() {
                let Some(next) = node.next().cloned() else {
                    break;
                };
                match next.deliver(self.id) {
                    Delivery::Fired => report.fired += 1,
                    Delivery::Exhausted => report.skipped += 1,
                    Delivery::Empty => {}
                }
                report.advanced += 1;
                node = next;
            }
            self.node = Some(node);
        }

        report.generation = target.id();
        let previous = std::mem::replace(&mut self.pinned, target);
        if previous.id() != report.generation || report.advanced > 0 {
            tracing::debug!(
                worker = self.id,
                from = previous.id(),
                to = report.generation,
                fired = report.fired,
                skipped = report.skipped,
                "Worker caught up"
            );
        }
        report
    }

    /// Detaches from the log without running callbacks.
    pub fn detach(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.attached {
            return;
        }
        self.attached = false;
        // Dropping the position releases every node only this worker still held.
        let position = self.position();
        self.node = None;
        self.store.stats().worker_detached();
        tracing::debug!(worker = self.id, position, "Worker detached");
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("id", &self.id)
            .field("position", &self.position())
            .field("generation", &self.pinned.id())
            .finish()
    }
}

impl ConfigStore {
    /// Reserves start positions at the current log tail for workers about
    /// to be spawned, so none of them can miss a later change.
    pub fn register_expected_children(&self, count: usize) {
        let tail = self.writer.lock().log.tail().clone();
        let mut reservations = self.reservations_lock();
        reservations.extend(std::iter::repeat(tail).take(count));
        tracing::info!(
            count,
            reserved = reservations.len(),
            "Reserved callback log positions for workers"
        );
    }

    /// Releases reservations of workers that will never attach.
    pub fn cancel_expected_children(&self, count: usize) -> usize {
        let mut reservations = self.reservations_lock();
        let cancelled = count.min(reservations.len());
        let keep = reservations.len() - cancelled;
        reservations.truncate(keep);
        cancelled
    }

    /// Attaches a worker and runs its initial catch-up in the calling thread.
    ///
    /// A worker with a reservation starts where the reservation was taken;
    /// a late attacher starts at the current tail and does not see earlier
    /// callbacks.
    pub fn attach_worker(self: &Arc<Self>) -> Cursor {
        let reserved = self.reservations_lock().pop();
        let late = reserved.is_none();
        let start = match reserved {
            Some(node) => node,
            None => self.writer.lock().log.tail().clone(),
        };

        let id = self.next_worker.fetch_add(1, Ordering::Relaxed);
        self.stats().worker_attached();
        tracing::info!(worker = id, start = start.seq(), late, "Worker attached");

        let mut cursor = Cursor {
            id,
            store: self.clone(),
            node: Some(start),
            pinned: self.acquire_current(),
            attached: true,
        };
        cursor.catch_up();
        cursor
    }

    pub fn detach_worker(&self, cursor: Cursor) {
        cursor.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Registry, VarFlags, VariableDescriptor};
    use std::sync::atomic::AtomicUsize;

    fn store(fired: Arc<AtomicUsize>, flags: VarFlags) -> Arc<ConfigStore> {
        let registry = Registry::new();
        registry
            .declare_group(
                "net",
                vec![VariableDescriptor::int("timeout", 30)
                    .flags(flags)
                    .per_worker(move |_| {
                        fired.fetch_add(1, Ordering::SeqCst);
                    })],
            )
            .unwrap();
        registry.bring_up().unwrap()
    }

    #[test]
    fn test_reads_are_stable_until_catch_up() {
        let store = store(Arc::new(AtomicUsize::new(0)), VarFlags::empty());
        let handle = store.resolve("net", "timeout").unwrap();
        let mut cursor = store.attach_worker();

        store.set_now("net", "timeout", Value::Int(45)).unwrap();
        assert_eq!(cursor.get(handle), &Value::Int(30));

        let report = cursor.catch_up();
        assert_eq!(report.generation, 1);
        assert_eq!(report.fired, 1);
        assert_eq!(cursor.get(handle), &Value::Int(45));
        assert_eq!(cursor.position(), 1);
    }

    #[test]
    fn test_reservation_starts_before_later_commits() {
        let fired = Arc::new(AtomicUsize::new(0));
        let store = store(fired.clone(), VarFlags::empty());
        store.register_expected_children(1);
        store.set_now("net", "timeout", Value::Int(45)).unwrap();

        let cursor = store.attach_worker();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(cursor.generation().id(), 1);
        assert_eq!(store.stats_snapshot().reserved_children, 0);
    }

    #[test]
    fn test_late_attach_skips_earlier_callbacks() {
        let fired = Arc::new(AtomicUsize::new(0));
        let store = store(fired.clone(), VarFlags::empty());
        store.set_now("net", "timeout", Value::Int(45)).unwrap();

        let cursor = store.attach_worker();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(cursor.get_by_name("net", "timeout").unwrap(), &Value::Int(45));
    }

    #[test]
    fn test_only_once_callback_runs_in_one_worker() {
        let fired = Arc::new(AtomicUsize::new(0));
        let store = store(fired.clone(), VarFlags::CB_ONLY_ONCE);
        let mut a = store.attach_worker();
        let mut b = store.attach_worker();
        store.set_now("net", "timeout", Value::Int(45)).unwrap();

        let ra = a.catch_up();
        let rb = b.catch_up();
        assert_eq!(ra.fired + rb.fired, 1);
        assert_eq!(ra.skipped + rb.skipped, 1);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_detach_reclaims_log() {
        let fired = Arc::new(AtomicUsize::new(0));
        let store = store(fired.clone(), VarFlags::empty());
        let cursor = store.attach_worker();
        for v in 1..=5 {
            store.set_now("net", "timeout", Value::Int(v)).unwrap();
        }
        assert_eq!(store.stats().log_nodes_live(), 6);
        assert_eq!(store.stats().workers_attached(), 1);

        store.detach_worker(cursor);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(store.stats().log_nodes_live(), 1);
        assert_eq!(store.stats().workers_attached(), 0);
    }

    #[test]
    fn test_cancel_expected_children() {
        let store = store(Arc::new(AtomicUsize::new(0)), VarFlags::empty());
        store.register_expected_children(3);
        store.set_now("net", "timeout", Value::Int(45)).unwrap();
        assert_eq!(store.stats().log_nodes_live(), 2);

        assert_eq!(store.cancel_expected_children(5), 3);
        assert_eq!(store.stats().log_nodes_live(), 1);
    }
}
