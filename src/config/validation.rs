//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (worker count, refresh interval, addresses)
//! - Check group declarations (unique names, consistent defaults and bounds)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: DaemonConfig → Result<(), Vec<ValidationError>>
//! - Runs before any group is declared

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::DaemonConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("admin.api_key must not be empty when the admin API is enabled")]
    EmptyApiKey,

    #[error("observability.log_level: unknown level '{0}'")]
    InvalidLogLevel(String),

    #[error("workers.count must be at least 1")]
    NoWorkers,

    #[error("workers.refresh_interval_ms must be greater than 0")]
    ZeroRefreshInterval,

    #[error("group names must not be empty")]
    EmptyGroupName,

    #[error("group '{0}' is declared twice")]
    DuplicateGroup(String),

    #[error("variable '{group}.{name}' is declared twice")]
    DuplicateVariable { group: String, name: String },

    #[error("variable '{group}.{name}': {reason}")]
    InvalidDeclaration {
        group: String,
        name: String,
        reason: String,
    },
}

pub fn validate_config(config: &DaemonConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.admin.enabled {
        if config.admin.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidAddress {
                field: "admin.bind_address",
                value: config.admin.bind_address.clone(),
            });
        }
        if config.admin.api_key.is_empty() {
            errors.push(ValidationError::EmptyApiKey);
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }
    if !LOG_LEVELS.contains(&config.observability.log_level.as_str()) {
        errors.push(ValidationError::InvalidLogLevel(config.observability.log_level.clone()));
    }

    if config.workers.count == 0 {
        errors.push(ValidationError::NoWorkers);
    }
    if config.workers.refresh_interval_ms == 0 {
        errors.push(ValidationError::ZeroRefreshInterval);
    }

    let mut groups = HashSet::new();
    for group in &config.groups {
        if group.name.is_empty() {
            errors.push(ValidationError::EmptyGroupName);
            continue;
        }
        if !groups.insert(group.name.as_str()) {
            errors.push(ValidationError::DuplicateGroup(group.name.clone()));
        }
        let mut vars = HashSet::new();
        for var in &group.vars {
            if !vars.insert(var.name.as_str()) {
                errors.push(ValidationError::DuplicateVariable {
                    group: group.name.clone(),
                    name: var.name.clone(),
                });
            }
            let checked = var.to_descriptor().and_then(|desc| {
                desc.validate(&group.name, desc.default_value())
                    .map_err(|e| e.to_string())
            });
            if let Err(reason) = checked {
                errors.push(ValidationError::InvalidDeclaration {
                    group: group.name.clone(),
                    name: var.name.clone(),
                    reason,
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{DeclValue, GroupDecl, VarDecl};
    use crate::registry::VarType;

    fn int_var(name: &str, default: i64, min: i64, max: i64) -> VarDecl {
        VarDecl {
            name: name.into(),
            var_type: VarType::Int,
            default: Some(DeclValue::Int(default)),
            min: Some(min),
            max: Some(max),
            description: String::new(),
            read_only: false,
            atomic: false,
            cb_only_once: false,
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&DaemonConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = DaemonConfig::default();
        config.admin.bind_address = "not-an-address".into();
        config.workers.count = 0;
        config.observability.log_level = "loud".into();
        config.groups.push(GroupDecl {
            name: "net".into(),
            vars: vec![int_var("timeout", 0, 1, 3600), int_var("timeout", 30, 1, 3600)],
        });
        config.groups.push(GroupDecl {
            name: "net".into(),
            vars: vec![],
        });

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::NoWorkers));
        assert!(errors.contains(&ValidationError::InvalidLogLevel("loud".into())));
        assert!(errors.contains(&ValidationError::DuplicateGroup("net".into())));
        assert!(errors
            .iter()
            .any(|e| matches!(
                e,
                ValidationError::InvalidAddress { field: "admin.bind_address", .. }
            )));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::DuplicateVariable { .. })));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidDeclaration { .. })));
    }
}
