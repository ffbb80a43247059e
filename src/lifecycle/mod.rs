//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Declare groups → Bring up store → Spawn workers → Start admin API
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Workers detach → Admin API stops → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: store first, then workers, then admin API
//! - Workers detach from the callback log before the process exits

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
