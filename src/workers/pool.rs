//! Worker tasks attached to the configuration store.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time;

use crate::config::WorkerConfig;
use crate::lifecycle::Shutdown;
use crate::registry::VarHandle;
use crate::store::{ConfigStore, Cursor};

/// What one worker did before it detached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    pub worker: usize,
    pub units: u64,
    pub callbacks_fired: usize,
    pub last_generation: u64,
}

/// Handles of the spawned worker tasks.
pub struct WorkerPool {
    handles: Vec<JoinHandle<WorkerSummary>>,
}

impl WorkerPool {
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Waits for every worker to detach.
    pub async fn join(self) -> Vec<WorkerSummary> {
        let mut summaries = Vec::with_capacity(self.handles.len());
        for handle in self.handles {
            match handle.await {
                Ok(summary) => summaries.push(summary),
                Err(e) => tracing::error!(error = %e, "Worker task failed"),
            }
        }
        summaries
    }
}

/// Reserves log positions, then spawns `config.count` workers.
pub fn spawn_workers(
    store: Arc<ConfigStore>,
    config: &WorkerConfig,
    shutdown: &Shutdown,
) -> WorkerPool {
    store.register_expected_children(config.count);
    let interval = Duration::from_millis(config.refresh_interval_ms);
    let debug = store.resolve("core", "debug").ok();

    let handles = (0..config.count)
        .map(|_| {
            let store = store.clone();
            let shutdown = shutdown.subscribe();
            tokio::spawn(run_worker(store, interval, debug, shutdown))
        })
        .collect();

    tracing::info!(
        count = config.count,
        interval_ms = config.refresh_interval_ms,
        "Workers spawned"
    );
    WorkerPool { handles }
}

async fn run_worker(
    store: Arc<ConfigStore>,
    interval: Duration,
    debug: Option<VarHandle>,
    mut shutdown: broadcast::Receiver<()>,
) -> WorkerSummary {
    let mut cursor = store.attach_worker();
    let mut summary = WorkerSummary {
        worker: cursor.id(),
        ..Default::default()
    };
    let mut ticker = time::interval(interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = cursor.catch_up();
                summary.callbacks_fired += report.fired;
                summary.last_generation = report.generation;
                process_unit(&cursor, debug);
                summary.units += 1;
            }
            _ = shutdown.recv() => {
                tracing::info!(
                    worker = summary.worker,
                    "Worker received shutdown signal, detaching"
                );
                break;
            }
        }
    }

    store.detach_worker(cursor);
    summary
}

/// One unit of work against the pinned generation.
fn process_unit(cursor: &Cursor, debug: Option<VarHandle>) {
    let level = debug.and_then(|h| cursor.generation().int(h)).unwrap_or(0);
    if level >= 3 {
        tracing::trace!(
            worker = cursor.id(),
            generation = cursor.generation().id(),
            "Processed unit of work"
        );
    }
}
