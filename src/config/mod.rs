//! Daemon configuration subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → DaemonConfig (validated, immutable)
//!     → lifecycle::startup declares groups and brings the store up
//!
//! On overrides file change:
//!     watcher.rs detects change
//!     → overrides.rs parses it
//!     → one transaction committed against the store
//! ```
//!
//! # Design Decisions
//! - Daemon settings are read once; variable values change through the store
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod overrides;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::{AdminConfig, DaemonConfig, GroupDecl, ObservabilityConfig, VarDecl, WorkerConfig};
