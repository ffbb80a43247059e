//! Error taxonomy for the configuration store.

use thiserror::Error;

use crate::registry::VarType;

/// Errors produced by declaration, bring-up, staging and committing.
///
/// Every writer-side error leaves the published generation untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// No group with that name exists.
    #[error("unknown configuration group '{0}'")]
    InvalidGroup(String),

    /// The group exists but has no such variable.
    #[error("unknown variable '{group}.{name}'")]
    InvalidVariable { group: String, name: String },

    /// The value type disagrees with the variable's declared type.
    #[error("type mismatch for '{group}.{name}': expected {expected}, got {found}")]
    TypeMismatch {
        group: String,
        name: String,
        expected: VarType,
        found: String,
    },

    /// An integer value falls outside the declared bounds.
    #[error("value {value} for '{group}.{name}' is outside [{min}, {max}]")]
    OutOfRange {
        group: String,
        name: String,
        value: i64,
        min: i64,
        max: i64,
    },

    /// The variable may not be changed at runtime.
    #[error("variable '{group}.{name}' is read-only")]
    ReadOnly { group: String, name: String },

    /// An on-change callback rejected the proposed value.
    #[error("change to '{group}.{name}' vetoed: {reason}")]
    CallbackVeto {
        group: String,
        name: String,
        reason: String,
    },

    /// Storage for a new generation could not be reserved.
    #[error("allocation failed: {0}")]
    AllocationFailure(String),

    /// A static group with this name is already declared.
    #[error("configuration group '{0}' is already declared")]
    DuplicateGroup(String),

    /// A group declares the same variable twice.
    #[error("variable '{group}.{name}' is declared twice")]
    DuplicateVariable { group: String, name: String },

    /// The operation is not valid in the current lifecycle phase.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A deferred lookup could not be resolved at bring-up.
    #[error("unresolved reference to '{group}.{name}'")]
    UnresolvedReference { group: String, name: String },
}

impl ConfigError {
    pub(crate) fn invalid_variable(group: &str, name: &str) -> Self {
        ConfigError::InvalidVariable {
            group: group.to_string(),
            name: name.to_string(),
        }
    }

    /// True for errors caused by a rejected value rather than an unknown name.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ConfigError::TypeMismatch { .. }
                | ConfigError::OutOfRange { .. }
                | ConfigError::ReadOnly { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
