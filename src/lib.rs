//! Generation-based shared configuration store for a SIP proxy.

pub mod admin;
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod registry;
pub mod store;
pub mod workers;

pub use config::DaemonConfig;
pub use lifecycle::Shutdown;
pub use registry::{Registry, Value, VariableDescriptor};
pub use store::{ConfigError, ConfigStore, Cursor, Transaction};
