//! Variable registry.
//!
//! # Data Flow
//! ```text
//! declare_group / declare_dynamic (before bring-up)
//!     → declare.rs (collect, merge dynamic groups, deferred lookups)
//!     → bring_up: validate defaults, freeze into schema.rs
//!     → first Generation published by the store
//! ```
//!
//! # Design Decisions
//! - Descriptors are immutable after bring-up; the schema is shared by all generations
//! - Variables are addressed by stable handles, names are resolved once

pub mod declare;
pub mod descriptor;
pub mod schema;
pub mod types;

pub use declare::{DeferredVar, Registry};
pub use descriptor::{
    ChangeContext, OnChange, OnWorkerUpdate, VariableDescriptor, VariableInfo, WorkerNotice,
};
pub use schema::{Group, GroupInfo, Schema};
pub use types::{GroupHandle, Opaque, Value, VarFlags, VarHandle, VarType};
