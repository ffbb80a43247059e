//! Generations: immutable snapshots of every variable of every group.
//!
//! A generation is built either at bring-up or by forking the published one
//! into a [`GenerationDraft`], mutating the draft and sealing it. Groups are
//! shared between generations until a draft writes to them, so a commit only
//! copies the groups it touches.

use std::fmt;
use std::sync::Arc;

use crate::registry::{Schema, Value, VarHandle};
use crate::store::error::{ConfigError, Result};
use crate::store::stats::StoreStats;

#[derive(Debug, Clone)]
struct GroupValues {
    values: Vec<Value>,
}

/// One published snapshot. Never mutated once wrapped in an `Arc`.
pub struct Generation {
    id: u64,
    log_seq: u64,
    groups: Vec<Arc<GroupValues>>,
    stats: Arc<StoreStats>,
}

impl Generation {
    /// Builds generation 0 from the static defaults.
    ///
    /// String and blob defaults are copied so the generation never shares
    /// storage with the descriptors.
    pub(crate) fn initial(schema: &Schema, stats: Arc<StoreStats>) -> Result<Self> {
        let mut groups = Vec::new();
        groups
            .try_reserve_exact(schema.groups().len())
            .map_err(|e| ConfigError::AllocationFailure(e.to_string()))?;
        for group in schema.groups() {
            let values = group.vars().iter().map(|v| v.default_value().detached()).collect();
            groups.push(Arc::new(GroupValues { values }));
        }
        stats.generation_created();
        Ok(Self {
            id: 0,
            log_seq: 0,
            groups,
            stats,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Sequence number of the newest callback log entry this generation includes.
    pub fn log_seq(&self) -> u64 {
        self.log_seq
    }

    pub fn get(&self, handle: VarHandle) -> &Value {
        &self.groups[handle.group].values[handle.var]
    }

    pub fn int(&self, handle: VarHandle) -> Option<i64> {
        self.get(handle).as_int()
    }

    pub fn str(&self, handle: VarHandle) -> Option<&str> {
        self.get(handle).as_str()
    }

    pub fn blob(&self, handle: VarHandle) -> Option<&[u8]> {
        self.get(handle).as_blob()
    }

    /// Starts a writable copy that shares every group until written.
    pub(crate) fn fork(&self, id: u64) -> Result<GenerationDraft> {
        let mut groups = Vec::new();
        groups
            .try_reserve_exact(self.groups.len())
            .map_err(|e| ConfigError::AllocationFailure(e.to_string()))?;
        groups.extend(self.groups.iter().cloned());
        Ok(GenerationDraft {
            id,
            groups,
            stats: self.stats.clone(),
        })
    }
}

impl fmt::Debug for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generation")
            .field("id", &self.id)
            .field("log_seq", &self.log_seq)
            .field("groups", &self.groups.len())
            .finish()
    }
}

impl Drop for Generation {
    fn drop(&mut self) {
        self.stats.generation_freed();
        tracing::trace!(generation = self.id, "Generation freed");
    }
}

/// Private, mutable clone of a generation. Invisible to readers.
pub(crate) struct GenerationDraft {
    id: u64,
    groups: Vec<Arc<GroupValues>>,
    stats: Arc<StoreStats>,
}

impl GenerationDraft {
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn get(&self, handle: VarHandle) -> &Value {
        &self.groups[handle.group].values[handle.var]
    }

    pub(crate) fn set(&mut self, handle: VarHandle, value: Value) {
        Arc::make_mut(&mut self.groups[handle.group]).values[handle.var] = value;
    }

    pub(crate) fn seal(self, log_seq: u64) -> Generation {
        self.stats.generation_created();
        Generation {
            id: self.id,
            log_seq,
            groups: self.groups,
            stats: self.stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Group, VariableDescriptor};

    fn schema() -> Schema {
        Schema::new(vec![
            Group::new("core".into(), vec![VariableDescriptor::int("debug", 0)], false),
            Group::new(
                "net".into(),
                vec![
                    VariableDescriptor::int("timeout", 30),
                    VariableDescriptor::string("realm", "example.org"),
                ],
                false,
            ),
        ])
    }

    #[test]
    fn test_initial_generation_holds_defaults() {
        let schema = schema();
        let stats = Arc::new(StoreStats::default());
        let gen = Generation::initial(&schema, stats.clone()).unwrap();

        assert_eq!(gen.id(), 0);
        assert_eq!(gen.int(schema.resolve("net", "timeout").unwrap()), Some(30));
        assert_eq!(gen.str(schema.resolve("net", "realm").unwrap()), Some("example.org"));
        assert_eq!(stats.generations_live(), 1);

        drop(gen);
        assert_eq!(stats.generations_live(), 0);
        assert_eq!(stats.generations_freed(), 1);
    }

    #[test]
    fn test_fork_copies_only_written_groups() {
        let schema = schema();
        let stats = Arc::new(StoreStats::default());
        let base = Generation::initial(&schema, stats.clone()).unwrap();
        let timeout = schema.resolve("net", "timeout").unwrap();

        let mut draft = base.fork(1).unwrap();
        draft.set(timeout, Value::Int(45));
        assert_eq!(draft.get(timeout), &Value::Int(45));
        let next = draft.seal(7);

        assert_eq!(base.int(timeout), Some(30));
        assert_eq!(next.int(timeout), Some(45));
        assert_eq!(next.log_seq(), 7);
        assert!(Arc::ptr_eq(&base.groups[0], &next.groups[0]));
        assert!(!Arc::ptr_eq(&base.groups[1], &next.groups[1]));
        assert_eq!(stats.generations_live(), 2);
    }

    #[test]
    fn test_discarded_draft_is_not_counted() {
        let schema = schema();
        let stats = Arc::new(StoreStats::default());
        let base = Generation::initial(&schema, stats.clone()).unwrap();
        let draft = base.fork(1).unwrap();
        assert_eq!(draft.id(), 1);
        drop(draft);
        assert_eq!(stats.generations_live(), 1);
        assert_eq!(stats.generations_freed(), 0);
    }
}
