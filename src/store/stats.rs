//! Lifetime accounting for generations, log nodes and workers.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::Serialize;

use crate::observability::metrics;

/// Shared counters updated by generations, log nodes and cursors.
#[derive(Debug, Default)]
pub struct StoreStats {
    generations_live: AtomicUsize,
    generations_freed: AtomicU64,
    log_nodes_live: AtomicUsize,
    log_nodes_freed: AtomicU64,
    commits: AtomicU64,
    failed_commits: AtomicU64,
    callbacks_fired: AtomicU64,
    workers_attached: AtomicUsize,
}

impl StoreStats {
    pub(crate) fn generation_created(&self) {
        let live = self.generations_live.fetch_add(1, Ordering::Relaxed) + 1;
        metrics::record_generations_live(live);
    }

    pub(crate) fn generation_freed(&self) {
        let live = self.generations_live.fetch_sub(1, Ordering::Relaxed) - 1;
        self.generations_freed.fetch_add(1, Ordering::Relaxed);
        metrics::record_generations_live(live);
        metrics::record_generation_freed();
    }

    pub(crate) fn node_created(&self) {
        let live = self.log_nodes_live.fetch_add(1, Ordering::Relaxed) + 1;
        metrics::record_log_nodes_live(live);
    }

    pub(crate) fn node_freed(&self) {
        let live = self.log_nodes_live.fetch_sub(1, Ordering::Relaxed) - 1;
        self.log_nodes_freed.fetch_add(1, Ordering::Relaxed);
        metrics::record_log_nodes_live(live);
    }

    pub(crate) fn commit_succeeded(&self) {
        self.commits.fetch_add(1, Ordering::Relaxed);
        metrics::record_commit("ok");
    }

    pub(crate) fn commit_failed(&self, outcome: &'static str) {
        self.failed_commits.fetch_add(1, Ordering::Relaxed);
        metrics::record_commit(outcome);
    }

    pub(crate) fn callback_fired(&self, group: &str) {
        self.callbacks_fired.fetch_add(1, Ordering::Relaxed);
        metrics::record_callback_fired(group);
    }

    pub(crate) fn worker_attached(&self) {
        let attached = self.workers_attached.fetch_add(1, Ordering::Relaxed) + 1;
        metrics::record_workers_attached(attached);
    }

    pub(crate) fn worker_detached(&self) {
        let attached = self.workers_attached.fetch_sub(1, Ordering::Relaxed) - 1;
        metrics::record_workers_attached(attached);
    }

    pub fn generations_live(&self) -> usize {
        self.generations_live.load(Ordering::Relaxed)
    }

    pub fn generations_freed(&self) -> u64 {
        self.generations_freed.load(Ordering::Relaxed)
    }

    pub fn log_nodes_live(&self) -> usize {
        self.log_nodes_live.load(Ordering::Relaxed)
    }

    pub fn workers_attached(&self) -> usize {
        self.workers_attached.load(Ordering::Relaxed)
    }

    pub(crate) fn snapshot(
        &self,
        current_generation: u64,
        reserved_children: usize,
    ) -> StatsSnapshot {
        StatsSnapshot {
            current_generation,
            generations_live: self.generations_live(),
            generations_freed: self.generations_freed(),
            log_nodes_live: self.log_nodes_live(),
            log_nodes_freed: self.log_nodes_freed.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
            failed_commits: self.failed_commits.load(Ordering::Relaxed),
            callbacks_fired: self.callbacks_fired.load(Ordering::Relaxed),
            workers_attached: self.workers_attached(),
            reserved_children,
        }
    }
}

/// Point-in-time copy of the store counters.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub current_generation: u64,
    pub generations_live: usize,
    pub generations_freed: u64,
    pub log_nodes_live: usize,
    pub log_nodes_freed: u64,
    pub commits: u64,
    pub failed_commits: u64,
    pub callbacks_fired: u64,
    pub workers_attached: usize,
    pub reserved_children: usize,
}
