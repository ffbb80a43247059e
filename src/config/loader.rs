//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::DaemonConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),

    #[error("Invalid override: {0}")]
    InvalidOverride(String),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<DaemonConfig, LoadError> {
    let config: DaemonConfig = toml::from_str(content)?;
    validate_config(&config).map_err(LoadError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<DaemonConfig, LoadError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::DeclValue;
    use crate::registry::VarType;

    #[test]
    fn test_parse_full_config() {
        let config = parse_config(
            r#"
            overrides_file = "/etc/sip-cfg/overrides.toml"

            [admin]
            api_key = "secret"
            bind_address = "127.0.0.1:9000"

            [workers]
            count = 8

            [[groups]]
            name = "net"

            [[groups.vars]]
            name = "timeout"
            type = "int"
            default = 30
            min = 1
            max = 3600
            description = "transaction timeout in seconds"

            [[groups.vars]]
            name = "realm"
            type = "str"
            default = "example.org"
            "#,
        )
        .unwrap();

        assert_eq!(config.admin.api_key, "secret");
        assert_eq!(config.workers.count, 8);
        assert_eq!(config.workers.refresh_interval_ms, 100);
        assert_eq!(config.groups.len(), 1);
        let timeout = &config.groups[0].vars[0];
        assert_eq!(timeout.var_type, VarType::Int);
        assert_eq!(timeout.default, Some(DeclValue::Int(30)));
        assert_eq!(config.groups[0].vars[1].default, Some(DeclValue::Text("example.org".into())));
    }

    #[test]
    fn test_parse_rejects_invalid_config() {
        let err = parse_config("[workers]\ncount = 0\n").unwrap_err();
        assert!(matches!(
            err,
            LoadError::Validation(ref e) if e.contains(&ValidationError::NoWorkers)
        ));
        assert!(err.to_string().contains("workers.count"));

        assert!(matches!(parse_config("[workers\n"), Err(LoadError::Parse(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_config(Path::new("/nonexistent/sip-cfg.toml")).unwrap_err();
        assert!(matches!(err, LoadError::Io(_)));
    }
}
