//! The published generation pointer and the writer lock that serializes swaps.
//!
//! Readers load the pointer without locking. Writers must hold the writer
//! lock to publish; [`GlobalPointer::publish`] takes the guard as proof.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arc_swap::ArcSwap;

use crate::store::callback_log::CallbackLog;
use crate::store::generation::Generation;

/// State owned by whoever holds the writer lock.
pub(crate) struct WriterState {
    pub log: CallbackLog,
    pub next_generation: u64,
}

pub(crate) struct WriterLock {
    state: Mutex<WriterState>,
}

impl WriterLock {
    pub(crate) fn new(state: WriterState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    /// A writer that panicked before publishing left nothing visible, so a
    /// poisoned lock is still consistent.
    pub(crate) fn lock(&self) -> WriterGuard<'_> {
        WriterGuard(self.state.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

pub(crate) struct WriterGuard<'a>(MutexGuard<'a, WriterState>);

impl Deref for WriterGuard<'_> {
    type Target = WriterState;
    fn deref(&self) -> &WriterState {
        &self.0
    }
}

impl DerefMut for WriterGuard<'_> {
    fn deref_mut(&mut self) -> &mut WriterState {
        &mut self.0
    }
}

/// The single published reference to the current generation.
pub(crate) struct GlobalPointer {
    current: ArcSwap<Generation>,
}

impl GlobalPointer {
    pub(crate) fn new(first: Arc<Generation>) -> Self {
        Self {
            current: ArcSwap::new(first),
        }
    }

    /// Takes a counted reference to the published generation.
    pub(crate) fn acquire_current(&self) -> Arc<Generation> {
        self.current.load_full()
    }

    /// Replaces the published generation and hands back the previous one.
    ///
    /// The caller drops the returned reference after releasing the writer
    /// lock; if it is the last one the old generation is freed right there.
    pub(crate) fn publish(
        &self,
        _writer: &WriterGuard<'_>,
        next: Arc<Generation>,
    ) -> Arc<Generation> {
        let previous = self.current.swap(next);
        tracing::debug!(
            generation = self.current.load().id(),
            previous = previous.id(),
            "Generation published"
        );
        previous
    }
}
