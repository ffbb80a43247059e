//! Writer transactions: staged changes committed or rolled back as a unit.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::registry::{Value, VarHandle};
use crate::store::error::{ConfigError, Result};
use crate::store::generation::Generation;
use crate::store::{CommitReport, ConfigStore};

/// One staged change.
///
/// A change whose last stage was rejected keeps the rejection, and the
/// transaction cannot commit until that variable is staged again.
#[derive(Debug, Clone)]
pub struct PendingChange {
    handle: VarHandle,
    value: Value,
    rejection: Option<ConfigError>,
}

impl PendingChange {
    pub fn handle(&self) -> VarHandle {
        self.handle
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn rejection(&self) -> Option<&ConfigError> {
        self.rejection.as_ref()
    }
}

#[derive(Default)]
struct TxnState {
    pending: Vec<PendingChange>,
}

/// Staging area of one administrative session.
///
/// Dropping a transaction discards its pending changes.
pub struct Transaction {
    id: u64,
    store: Arc<ConfigStore>,
    state: Mutex<TxnState>,
}

impl Transaction {
    pub(crate) fn new(id: u64, store: Arc<ConfigStore>) -> Self {
        Self {
            id,
            store,
            state: Mutex::new(TxnState::default()),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    fn lock(&self) -> MutexGuard<'_, TxnState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending_len() == 0
    }

    /// Validates and stages a typed value. No shared state is touched.
    pub fn stage(&self, group: &str, name: &str, value: Value) -> Result<()> {
        let handle = self.store.resolve(group, name)?;
        let desc = self.store.schema().descriptor(handle);
        let verdict = desc
            .check_writable(group)
            .and_then(|_| desc.validate(group, &value));
        self.record(handle, value, verdict.clone().err());
        verdict
    }

    /// Converts textual input to the variable's type, then stages it.
    pub fn stage_input(&self, group: &str, name: &str, input: &str) -> Result<()> {
        let handle = self.store.resolve(group, name)?;
        match self.store.schema().descriptor(handle).parse_input(group, input) {
            Ok(value) => self.stage(group, name, value),
            Err(err) => {
                self.record(handle, Value::from(input), Some(err.clone()));
                Err(err)
            }
        }
    }

    fn record(&self, handle: VarHandle, value: Value, rejection: Option<ConfigError>) {
        let mut state = self.lock();
        match state.pending.iter_mut().find(|c| c.handle == handle) {
            Some(existing) => {
                existing.value = value;
                existing.rejection = rejection;
            }
            None => state.pending.push(PendingChange {
                handle,
                value,
                rejection,
            }),
        }
    }

    /// Commits every pending change atomically.
    ///
    /// The pending entries are taken out before the writer lock is acquired,
    /// so a concurrent commit of the same transaction finds nothing to
    /// apply. On failure they are staged again, except for variables
    /// re-staged in the meantime, and the published generation is unchanged.
    pub fn commit(&self) -> Result<CommitReport> {
        let changes = std::mem::take(&mut self.lock().pending);
        match self.store.commit_changes(&changes) {
            Ok(report) => {
                tracing::debug!(
                    transaction = self.id,
                    generation = report.generation,
                    "Transaction committed"
                );
                Ok(report)
            }
            Err(err) => {
                self.restore(changes);
                Err(err)
            }
        }
    }

    fn restore(&self, changes: Vec<PendingChange>) {
        let mut state = self.lock();
        let newer = std::mem::take(&mut state.pending);
        let mut restored: Vec<PendingChange> = changes
            .into_iter()
            .filter(|c| !newer.iter().any(|n| n.handle == c.handle))
            .collect();
        restored.extend(newer);
        state.pending = restored;
    }

    /// Discards every pending change. Returns how many were dropped.
    pub fn rollback(&self) -> usize {
        let mut state = self.lock();
        let discarded = state.pending.len();
        state.pending.clear();
        tracing::debug!(transaction = self.id, discarded, "Transaction rolled back");
        discarded
    }

    /// Lazily compares every pending change with the published value.
    ///
    /// Holds the transaction lock while the iterator lives.
    pub fn diff(&self) -> Diff<'_> {
        Diff {
            state: self.lock(),
            current: self.store.acquire_current(),
            store: &self.store,
            pos: 0,
        }
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if !state.pending.is_empty() {
            tracing::debug!(
                transaction = self.id,
                discarded = state.pending.len(),
                "Transaction closed with uncommitted changes"
            );
        }
    }
}

/// One line of a transaction diff.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffEntry {
    pub group: String,
    pub name: String,
    pub current: Value,
    pub proposed: Value,
    pub rejection: Option<String>,
}

/// Iterator returned by [`Transaction::diff`].
pub struct Diff<'a> {
    state: MutexGuard<'a, TxnState>,
    current: Arc<Generation>,
    store: &'a ConfigStore,
    pos: usize,
}

impl Iterator for Diff<'_> {
    type Item = DiffEntry;

    fn next(&mut self) -> Option<DiffEntry> {
        let change = self.state.pending.get(self.pos)?;
        self.pos += 1;
        let schema = self.store.schema();
        Some(DiffEntry {
            group: schema.group_name(change.handle).to_string(),
            name: schema.descriptor(change.handle).name().to_string(),
            current: self.current.get(change.handle).clone(),
            proposed: change.value.clone(),
            rejection: change.rejection.as_ref().map(ToString::to_string),
        })
    }
}
