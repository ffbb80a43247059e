//! Generation-based shared configuration store.
//!
//! # Data Flow
//! ```text
//! Registry::bring_up
//!     → generation.rs (generation 0 from defaults)
//!     → global.rs (published pointer)
//!
//! Admin session:
//!     transaction.rs stage/diff (transaction lock only)
//!     → commit: writer lock → fork current → apply + on_change
//!     → callback_log.rs append → publish → previous generation released
//!
//! Worker:
//!     cursor.rs catch_up between messages
//!     → walk callback log, fire per-worker callbacks
//!     → pin the published generation
//! ```
//!
//! # Design Decisions
//! - Published generations are immutable; writes are clone, mutate, publish
//! - Readers never take the writer lock or a transaction lock
//! - Lock order: writer lock may be held while publishing, a transaction
//!   lock is never held while acquiring the writer lock

pub mod callback_log;
pub mod cursor;
pub mod error;
pub mod generation;
pub mod global;
pub mod stats;
pub mod transaction;

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::registry::{
    ChangeContext, GroupInfo, Schema, Value, VarFlags, VarHandle, VariableDescriptor,
};
use crate::store::callback_log::{CallbackLog, LogEntry, LogNode};
use crate::store::generation::Generation;
use crate::store::global::{GlobalPointer, WriterGuard, WriterLock, WriterState};
use crate::store::stats::{StatsSnapshot, StoreStats};
use crate::store::transaction::PendingChange;

pub use cursor::{CatchUp, Cursor};
pub use error::{ConfigError, Result};
pub use transaction::{DiffEntry, Transaction};

/// Outcome of a successful commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitReport {
    /// Generation that is published after the commit.
    pub generation: u64,
    pub applied: usize,
    pub callbacks_queued: usize,
    /// True if the superseded generation had no readers left and was freed.
    pub previous_freed: bool,
}

/// Shared configuration store: published generation, writer lock,
/// callback log and worker reservations.
pub struct ConfigStore {
    schema: Arc<Schema>,
    global: GlobalPointer,
    writer: WriterLock,
    reservations: Mutex<Vec<Arc<LogNode>>>,
    next_worker: AtomicUsize,
    next_transaction: AtomicU64,
    stats: Arc<StoreStats>,
}

impl ConfigStore {
    /// Publishes generation 0. Called once by [`crate::registry::Registry::bring_up`].
    pub(crate) fn bring_up(schema: Schema) -> Result<Arc<Self>> {
        let stats = Arc::new(StoreStats::default());
        let first = Arc::new(Generation::initial(&schema, stats.clone())?);
        let log = CallbackLog::new(stats.clone());

        tracing::info!(
            groups = schema.groups().len(),
            variables = schema.variable_count(),
            "Configuration brought up, generation 0 published"
        );

        Ok(Arc::new(Self {
            schema: Arc::new(schema),
            global: GlobalPointer::new(first),
            writer: WriterLock::new(WriterState {
                log,
                next_generation: 1,
            }),
            reservations: Mutex::new(Vec::new()),
            next_worker: AtomicUsize::new(1),
            next_transaction: AtomicU64::new(1),
            stats,
        }))
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Counted reference to the published generation. Never blocks.
    pub fn acquire_current(&self) -> Arc<Generation> {
        self.global.acquire_current()
    }

    pub fn resolve(&self, group: &str, name: &str) -> Result<VarHandle> {
        self.schema.resolve(group, name)
    }

    /// Reads one variable from the published generation.
    pub fn get(&self, group: &str, name: &str) -> Result<Value> {
        let handle = self.schema.resolve(group, name)?;
        Ok(self.acquire_current().get(handle).clone())
    }

    pub fn describe(&self, group: &str, name: &str) -> Result<&VariableDescriptor> {
        let handle = self.schema.resolve(group, name)?;
        Ok(self.schema.descriptor(handle))
    }

    pub fn list_groups(&self) -> Vec<(&str, &[VariableDescriptor])> {
        self.schema.list()
    }

    pub fn group_info(&self) -> Vec<GroupInfo> {
        self.schema.info()
    }

    /// Opens a writer transaction.
    pub fn transaction(self: &Arc<Self>) -> Transaction {
        let id = self.next_transaction.fetch_add(1, Ordering::Relaxed);
        Transaction::new(id, self.clone())
    }

    /// Stages and commits a single change in a throwaway transaction.
    pub fn set_now(
        self: &Arc<Self>,
        group: &str,
        name: &str,
        value: Value,
    ) -> Result<CommitReport> {
        let txn = self.transaction();
        txn.stage(group, name, value)?;
        txn.commit()
    }

    /// Like [`ConfigStore::set_now`] with textual input.
    pub fn set_now_input(
        self: &Arc<Self>,
        group: &str,
        name: &str,
        input: &str,
    ) -> Result<CommitReport> {
        let txn = self.transaction();
        txn.stage_input(group, name, input)?;
        txn.commit()
    }

    pub fn stats(&self) -> &StoreStats {
        &self.stats
    }

    pub fn stats_snapshot(&self) -> StatsSnapshot {
        let reserved = self.reservations_lock().len();
        self.stats.snapshot(self.acquire_current().id(), reserved)
    }

    fn reservations_lock(&self) -> std::sync::MutexGuard<'_, Vec<Arc<LogNode>>> {
        self.reservations
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Applies `changes` in order to a clone of the published generation and
    /// publishes it. Nothing is visible unless every change is accepted.
    pub(crate) fn commit_changes(&self, changes: &[PendingChange]) -> Result<CommitReport> {
        if let Some(err) = changes.iter().find_map(|c| c.rejection().cloned()) {
            self.stats.commit_failed("rejected");
            tracing::warn!(error = %err, "Commit refused, transaction holds a rejected change");
            return Err(err);
        }
        if changes.is_empty() {
            return Ok(CommitReport {
                generation: self.acquire_current().id(),
                applied: 0,
                callbacks_queued: 0,
                previous_freed: false,
            });
        }

        let mut writer = self.writer.lock();
        let (next, queued) = match self.build_next(&mut writer, changes) {
            Ok(built) => built,
            Err(err) => {
                let outcome = match err {
                    ConfigError::CallbackVeto { .. } => "vetoed",
                    ConfigError::AllocationFailure(_) => "allocation",
                    _ => "rejected",
                };
                self.stats.commit_failed(outcome);
                tracing::warn!(error = %err, "Commit aborted, published generation unchanged");
                return Err(err);
            }
        };
        let generation = next.id();
        writer.next_generation += 1;
        let previous = self.global.publish(&writer, next);
        drop(writer);

        let previous_id = previous.id();
        let previous_freed = Arc::into_inner(previous).is_some();
        self.stats.commit_succeeded();
        tracing::info!(
            generation,
            previous = previous_id,
            previous_freed,
            applied = changes.len(),
            callbacks_queued = queued,
            "Configuration committed"
        );

        Ok(CommitReport {
            generation,
            applied: changes.len(),
            callbacks_queued: queued,
            previous_freed,
        })
    }

    fn build_next(
        &self,
        writer: &mut WriterGuard<'_>,
        changes: &[PendingChange],
    ) -> Result<(Arc<Generation>, usize)> {
        let current = self.global.acquire_current();
        let mut draft = current.fork(writer.next_generation)?;
        drop(current);

        let mut entries = Vec::new();
        for change in changes {
            let handle = change.handle();
            let desc = self.schema.descriptor(handle);
            let group = self.schema.group_name(handle);
            let mut value = change.value().clone();

            if let Some(on_change) = desc.on_change_callback() {
                let ctx = ChangeContext {
                    group,
                    name: desc.name(),
                    old: draft.get(handle),
                    new: &value,
                };
                match on_change(&ctx) {
                    Ok(None) => {}
                    Ok(Some(replacement)) => {
                        desc.validate(group, &replacement)?;
                        value = replacement;
                    }
                    Err(reason) => {
                        return Err(ConfigError::CallbackVeto {
                            group: group.to_string(),
                            name: desc.name().to_string(),
                            reason,
                        });
                    }
                }
            }

            draft.set(handle, value);
            if let Some(callback) = desc.per_worker_callback() {
                entries.push(LogEntry {
                    group: Arc::from(group),
                    name: Arc::from(desc.name()),
                    callback: callback.clone(),
                    only_once: desc.get_flags().contains(VarFlags::CB_ONLY_ONCE),
                });
            }
        }

        let queued = entries.len();
        let log_seq = writer.log.append(entries);
        Ok((Arc::new(draft.seal(log_seq)), queued))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Registry, VariableDescriptor};

    fn store() -> Arc<ConfigStore> {
        let registry = Registry::new();
        registry
            .declare_group(
                "net",
                vec![
                    VariableDescriptor::int("timeout", 30).bounds(1, 3600),
                    VariableDescriptor::string("realm", "example.org"),
                ],
            )
            .unwrap();
        registry.bring_up().unwrap()
    }

    #[test]
    fn test_get_and_unknown_names() {
        let store = store();
        assert_eq!(store.get("net", "timeout").unwrap(), Value::Int(30));
        assert!(matches!(store.get("net", "nope"), Err(ConfigError::InvalidVariable { .. })));
        assert!(matches!(store.get("tls", "method"), Err(ConfigError::InvalidGroup(_))));
    }

    #[test]
    fn test_set_now_publishes_new_generation() {
        let store = store();
        let report = store.set_now("net", "timeout", Value::Int(45)).unwrap();
        assert_eq!(report.generation, 1);
        assert!(report.previous_freed);
        assert_eq!(store.get("net", "timeout").unwrap(), Value::Int(45));
        assert_eq!(store.stats().generations_live(), 1);
    }

    #[test]
    fn test_old_generation_outlives_swap_while_held() {
        let store = store();
        let pinned = store.acquire_current();
        let report = store.set_now_input("net", "realm", "sip.example.net").unwrap();
        assert!(!report.previous_freed);
        assert_eq!(store.stats().generations_live(), 2);
        assert_eq!(pinned.str(store.resolve("net", "realm").unwrap()), Some("example.org"));

        drop(pinned);
        assert_eq!(store.stats().generations_live(), 1);
        assert_eq!(store.stats().generations_freed(), 1);
    }

    #[test]
    fn test_empty_commit_publishes_nothing() {
        let store = store();
        let report = store.transaction().commit().unwrap();
        assert_eq!(report.generation, 0);
        assert_eq!(report.applied, 0);
        assert_eq!(store.acquire_current().id(), 0);
    }

    #[test]
    fn test_list_groups_in_declaration_order() {
        let registry = Registry::new();
        registry
            .declare_group("tm", vec![VariableDescriptor::int("fr_timer", 500)])
            .unwrap();
        registry
            .declare_group(
                "net",
                vec![
                    VariableDescriptor::int("timeout", 30).bounds(1, 3600),
                    VariableDescriptor::string("realm", "example.org"),
                ],
            )
            .unwrap();
        let store = registry.bring_up().unwrap();

        let groups = store.list_groups();
        let names: Vec<&str> = groups.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, ["tm", "net"]);

        let (_, net) = groups[1];
        let vars: Vec<&str> = net.iter().map(|v| v.name()).collect();
        assert_eq!(vars, ["timeout", "realm"]);
        assert_eq!(net[0].default_value(), &Value::Int(30));
        assert_eq!(groups[0].1.len(), 1);

        let info = store.describe("net", "timeout").unwrap().info();
        assert_eq!((info.min, info.max), (Some(1), Some(3600)));
        assert!(matches!(store.describe("net", "nope"), Err(ConfigError::InvalidVariable { .. })));
    }

    #[test]
    fn test_stats_snapshot() {
        let store = store();
        store.set_now("net", "timeout", Value::Int(60)).unwrap();
        let snapshot = store.stats_snapshot();
        assert_eq!(snapshot.current_generation, 1);
        assert_eq!(snapshot.commits, 1);
        assert_eq!(snapshot.log_nodes_live, 1);
    }
}
