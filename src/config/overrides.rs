//! Value overrides applied at runtime from a TOML file.
//!
//! ```toml
//! [net]
//! timeout = 45
//! realm = "sip.example.net"
//! ```
//!
//! The whole file is committed as one transaction; if any value is
//! rejected nothing changes.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::config::loader::LoadError;
use crate::store::{CommitReport, ConfigStore, Result};

/// One `group.name = value` line, as textual input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Override {
    pub group: String,
    pub name: String,
    pub input: String,
}

pub fn parse_overrides(content: &str) -> std::result::Result<Vec<Override>, LoadError> {
    let table: toml::Table = toml::from_str(content)?;
    let mut overrides = Vec::new();
    for (group, vars) in table {
        let toml::Value::Table(vars) = vars else {
            return Err(LoadError::InvalidOverride(format!("'{}' is not a table", group)));
        };
        for (name, value) in vars {
            let input = match value {
                toml::Value::Integer(v) => v.to_string(),
                toml::Value::String(s) => s,
                toml::Value::Boolean(b) => if b { "1" } else { "0" }.to_string(),
                other => {
                    return Err(LoadError::InvalidOverride(format!(
                        "{}.{}: unsupported {} value",
                        group,
                        name,
                        other.type_str()
                    )));
                }
            };
            overrides.push(Override {
                group: group.clone(),
                name,
                input,
            });
        }
    }
    Ok(overrides)
}

pub fn load_overrides(path: &Path) -> std::result::Result<Vec<Override>, LoadError> {
    let content = fs::read_to_string(path)?;
    parse_overrides(&content)
}

/// Stages every override in one transaction and commits it.
pub fn apply_overrides(store: &Arc<ConfigStore>, overrides: &[Override]) -> Result<CommitReport> {
    let txn = store.transaction();
    for o in overrides {
        txn.stage_input(&o.group, &o.name, &o.input)?;
    }
    txn.commit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Registry, Value, VariableDescriptor};
    use crate::store::ConfigError;

    fn store() -> Arc<ConfigStore> {
        let registry = Registry::new();
        registry
            .declare_group(
                "net",
                vec![
                    VariableDescriptor::int("timeout", 30).bounds(1, 3600),
                    VariableDescriptor::string("realm", "example.org"),
                ],
            )
            .unwrap();
        registry.bring_up().unwrap()
    }

    #[test]
    fn test_parse_overrides() {
        let overrides = parse_overrides("[net]\ntimeout = 45\nrealm = \"x\"\n").unwrap();
        assert_eq!(overrides.len(), 2);
        assert!(overrides.contains(&Override {
            group: "net".into(),
            name: "timeout".into(),
            input: "45".into(),
        }));
        assert!(matches!(parse_overrides("timeout = 45\n"), Err(LoadError::InvalidOverride(_))));
        assert!(matches!(
            parse_overrides("[net]\nratio = 0.5\n"),
            Err(LoadError::InvalidOverride(_))
        ));
    }

    #[test]
    fn test_apply_is_all_or_nothing() {
        let store = store();
        let bad = parse_overrides("[net]\nrealm = \"y\"\ntimeout = 4000\n").unwrap();
        assert!(matches!(apply_overrides(&store, &bad), Err(ConfigError::OutOfRange { .. })));
        assert_eq!(store.get("net", "realm").unwrap(), Value::from("example.org"));

        let good = parse_overrides("[net]\nrealm = \"y\"\ntimeout = 45\n").unwrap();
        let report = apply_overrides(&store, &good).unwrap();
        assert_eq!(report.applied, 2);
        assert_eq!(store.get("net", "timeout").unwrap(), Value::Int(45));
    }
}
