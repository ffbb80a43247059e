//! Administrative sessions, each owning one transaction.

use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use crate::store::{ConfigStore, Transaction};

/// Open sessions keyed by session ID.
#[derive(Default)]
pub struct SessionTable {
    inner: DashMap<Uuid, Arc<Transaction>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a session with a fresh transaction.
    pub fn open(&self, store: &Arc<ConfigStore>) -> Uuid {
        let id = Uuid::new_v4();
        let txn = Arc::new(store.transaction());
        tracing::info!(session = %id, transaction = txn.id(), "Admin session opened");
        self.inner.insert(id, txn);
        id
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<Transaction>> {
        self.inner.get(id).map(|r| r.value().clone())
    }

    /// Ends a session, discarding uncommitted changes. Returns how many were pending.
    pub fn close(&self, id: &Uuid) -> Option<usize> {
        let (_, txn) = self.inner.remove(id)?;
        let discarded = txn.pending_len();
        tracing::info!(session = %id, discarded, "Admin session closed");
        Some(discarded)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Registry, Value, VariableDescriptor};

    #[test]
    fn test_session_lifecycle() {
        let registry = Registry::new();
        registry
            .declare_group("net", vec![VariableDescriptor::int("timeout", 30)])
            .unwrap();
        let store = registry.bring_up().unwrap();
        let sessions = SessionTable::new();

        let id = sessions.open(&store);
        assert_eq!(sessions.len(), 1);
        let txn = sessions.get(&id).unwrap();
        txn.stage("net", "timeout", Value::Int(45)).unwrap();
        drop(txn);

        assert_eq!(sessions.close(&id), Some(1));
        assert!(sessions.is_empty());
        assert_eq!(sessions.close(&id), None);
        assert_eq!(store.get("net", "timeout").unwrap(), Value::Int(30));
    }
}
