//! Worker pool.
//!
//! # Responsibilities
//! - Reserve callback log positions before spawning workers
//! - Run one task per worker: catch up between units of work, read config
//!   only from the pinned generation while working
//! - Detach every worker on shutdown
//!
//! # Design Decisions
//! - A tick of the refresh interval stands in for a message boundary
//! - Workers never block on writers; catch-up is the only point where a
//!   newer generation becomes visible

pub mod pool;

pub use pool::{spawn_workers, WorkerPool, WorkerSummary};
