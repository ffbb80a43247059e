//! Daemon configuration schema.
//!
//! All types derive Serde traits for deserialization from the TOML file.

use serde::{Deserialize, Serialize};

use crate::registry::{VarFlags, VarType, VariableDescriptor};

/// Root configuration of the configuration daemon.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DaemonConfig {
    /// Admin API settings.
    pub admin: AdminConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Worker pool settings.
    pub workers: WorkerConfig,

    /// Optional TOML file with value overrides, watched for changes.
    pub overrides_file: Option<String>,

    /// Groups declared by configuration, registered as dynamic groups.
    pub groups: Vec<GroupDecl>,
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Worker pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Number of workers attached at startup.
    pub count: usize,

    /// Interval between units of work, in milliseconds.
    pub refresh_interval_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: 4,
            refresh_interval_ms: 100,
        }
    }
}

/// A group declared in the configuration file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GroupDecl {
    pub name: String,

    #[serde(default)]
    pub vars: Vec<VarDecl>,
}

/// Default value as written in TOML.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum DeclValue {
    Int(i64),
    Text(String),
}

/// A variable declared in the configuration file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VarDecl {
    pub name: String,

    #[serde(rename = "type")]
    pub var_type: VarType,

    #[serde(default)]
    pub default: Option<DeclValue>,

    #[serde(default)]
    pub min: Option<i64>,

    #[serde(default)]
    pub max: Option<i64>,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub read_only: bool,

    #[serde(default)]
    pub atomic: bool,

    #[serde(default)]
    pub cb_only_once: bool,
}

impl VarDecl {
    /// Builds the descriptor; the error describes what is wrong with the declaration.
    pub fn to_descriptor(&self) -> Result<VariableDescriptor, String> {
        let mut desc = match (self.var_type, &self.default) {
            (VarType::Int, None) => VariableDescriptor::int(&self.name, 0),
            (VarType::Int, Some(DeclValue::Int(v))) => VariableDescriptor::int(&self.name, *v),
            (VarType::Int, Some(DeclValue::Text(s))) => {
                let v = s
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| format!("default '{}' is not an integer", s))?;
                VariableDescriptor::int(&self.name, v)
            }
            (VarType::Str, None) => VariableDescriptor::string(&self.name, ""),
            (VarType::Str, Some(DeclValue::Text(s))) => VariableDescriptor::string(&self.name, s),
            (VarType::Blob, None) => VariableDescriptor::blob(&self.name, &[]),
            (VarType::Blob, Some(DeclValue::Text(s))) => {
                VariableDescriptor::blob(&self.name, s.as_bytes())
            }
            (VarType::Str | VarType::Blob, Some(DeclValue::Int(_))) => {
                return Err("expected a string default".to_string());
            }
            (VarType::Opaque, None) => VariableDescriptor::opaque(&self.name, None),
            (VarType::Opaque, Some(_)) => {
                return Err("opaque variables cannot have a default".to_string());
            }
        };

        match (self.min, self.max) {
            (Some(min), Some(max)) if self.var_type == VarType::Int => {
                if min > max {
                    return Err(format!("min {} is greater than max {}", min, max));
                }
                desc = desc.bounds(min, max);
            }
            (None, None) => {}
            (Some(_), Some(_)) => return Err("bounds are only valid for int variables".to_string()),
            _ => return Err("min and max must be given together".to_string()),
        }

        let mut flags = VarFlags::empty();
        if self.read_only {
            flags |= VarFlags::READ_ONLY;
        }
        if self.atomic {
            flags |= VarFlags::ATOMIC;
        }
        if self.cb_only_once {
            flags |= VarFlags::CB_ONLY_ONCE;
        }
        Ok(desc.flags(flags).description(&self.description))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Value;

    fn decl(var_type: VarType, default: Option<DeclValue>) -> VarDecl {
        VarDecl {
            name: "v".into(),
            var_type,
            default,
            min: None,
            max: None,
            description: String::new(),
            read_only: false,
            atomic: false,
            cb_only_once: false,
        }
    }

    #[test]
    fn test_to_descriptor_defaults() {
        let d = decl(VarType::Int, Some(DeclValue::Int(30))).to_descriptor().unwrap();
        assert_eq!(d.default_value(), &Value::Int(30));

        let d = decl(VarType::Int, Some(DeclValue::Text("45".into()))).to_descriptor().unwrap();
        assert_eq!(d.default_value(), &Value::Int(45));

        let d = decl(VarType::Str, None).to_descriptor().unwrap();
        assert_eq!(d.default_value(), &Value::from(""));

        assert!(decl(VarType::Str, Some(DeclValue::Int(1))).to_descriptor().is_err());
        assert!(decl(VarType::Opaque, Some(DeclValue::Int(1))).to_descriptor().is_err());
    }

    #[test]
    fn test_to_descriptor_bounds_and_flags() {
        let mut d = decl(VarType::Int, Some(DeclValue::Int(30)));
        d.min = Some(1);
        d.max = Some(3600);
        d.read_only = true;
        let desc = d.to_descriptor().unwrap();
        assert_eq!(desc.get_bounds(), Some((1, 3600)));
        assert!(desc.get_flags().contains(VarFlags::READ_ONLY));

        d.max = None;
        assert!(d.to_descriptor().is_err());
    }
}
