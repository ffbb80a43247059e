//! Startup orchestration.
//!
//! # Responsibilities
//! - Declare the builtin `core` group
//! - Declare the groups listed in the daemon configuration
//! - Bring the store up (first generation published)
//!
//! # Design Decisions
//! - Fail fast: any declaration or bring-up error is fatal
//! - Runs before any worker is spawned

use std::sync::Arc;

use thiserror::Error;

use crate::config::DaemonConfig;
use crate::registry::{Registry, VarFlags, VariableDescriptor};
use crate::store::{ConfigError, ConfigStore};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid declaration of '{group}.{name}': {reason}")]
    Declaration {
        group: String,
        name: String,
        reason: String,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Variables every deployment has.
pub fn core_group() -> Vec<VariableDescriptor> {
    vec![
        VariableDescriptor::int("debug", 0)
            .bounds(-3, 4)
            .flags(VarFlags::ATOMIC)
            .description("Debug level of the message processing path")
            .per_worker(|notice| {
                tracing::debug!(worker = notice.worker, "Debug level changed");
            }),
        VariableDescriptor::int("max_while_loops", 100)
            .bounds(1, 1_000_000)
            .description("Upper bound of iterations in a routing loop"),
        VariableDescriptor::string("server_header", "Server: sip-cfg")
            .flags(VarFlags::READ_ONLY)
            .description("Server header added to locally generated replies"),
    ]
}

/// Declares all groups and publishes generation 0.
pub fn bring_up(config: &DaemonConfig) -> Result<Arc<ConfigStore>, StartupError> {
    let registry = Registry::new();
    registry.declare_group("core", core_group())?;

    for group in &config.groups {
        for var in &group.vars {
            let desc = var.to_descriptor().map_err(|reason| StartupError::Declaration {
                group: group.name.clone(),
                name: var.name.clone(),
                reason,
            })?;
            registry.declare_dynamic(&group.name, desc)?;
        }
    }

    Ok(registry.bring_up()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::parse_config;
    use crate::registry::Value;

    #[test]
    fn test_bring_up_with_declared_groups() {
        let config = parse_config(
            r#"
            [[groups]]
            name = "net"

            [[groups.vars]]
            name = "timeout"
            type = "int"
            default = 30
            min = 1
            max = 3600
            "#,
        )
        .unwrap();

        let store = bring_up(&config).unwrap();
        assert_eq!(store.get("core", "debug").unwrap(), Value::Int(0));
        assert_eq!(store.get("net", "timeout").unwrap(), Value::Int(30));
        let net = store.schema().group_handle("net").unwrap();
        assert!(store.schema().group(net).declared_dynamic());
    }

    #[test]
    fn test_core_group_cannot_be_redeclared() {
        let mut config = DaemonConfig::default();
        config.groups.push(crate::config::GroupDecl {
            name: "core".into(),
            vars: vec![crate::config::VarDecl {
                name: "extra".into(),
                var_type: crate::registry::VarType::Int,
                default: None,
                min: None,
                max: None,
                description: String::new(),
                read_only: false,
                atomic: false,
                cb_only_once: false,
            }],
        });
        assert!(matches!(
            bring_up(&config),
            Err(StartupError::Config(ConfigError::DuplicateGroup(_)))
        ));
    }
}
