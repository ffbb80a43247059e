//! Variable descriptors: static metadata of a single configuration variable.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::registry::types::{Opaque, Value, VarFlags, VarType};
use crate::store::error::{ConfigError, Result};

/// Arguments passed to an on-change callback during commit.
#[derive(Debug)]
pub struct ChangeContext<'a> {
    pub group: &'a str,
    pub name: &'a str,
    pub old: &'a Value,
    pub new: &'a Value,
}

/// Runs once, in the committing thread, for every applied change.
///
/// `Ok(None)` accepts the proposed value, `Ok(Some(v))` replaces it with `v`,
/// `Err(reason)` vetoes the whole commit.
pub type OnChange =
    Arc<dyn Fn(&ChangeContext<'_>) -> std::result::Result<Option<Value>, String> + Send + Sync>;

/// Arguments passed to a per-worker callback during catch-up.
#[derive(Debug)]
pub struct WorkerNotice<'a> {
    pub worker: usize,
    pub group: &'a str,
    pub name: &'a str,
}

/// Runs once per worker that advances past the change.
pub type OnWorkerUpdate = Arc<dyn Fn(&WorkerNotice<'_>) + Send + Sync>;

/// Metadata of one variable. Immutable after bring-up.
#[derive(Clone)]
pub struct VariableDescriptor {
    name: String,
    var_type: VarType,
    default: Value,
    bounds: Option<(i64, i64)>,
    flags: VarFlags,
    description: String,
    on_change: Option<OnChange>,
    per_worker: Option<OnWorkerUpdate>,
}

impl VariableDescriptor {
    fn new(name: &str, default: Value) -> Self {
        Self {
            name: name.to_string(),
            var_type: default.var_type(),
            default,
            bounds: None,
            flags: VarFlags::empty(),
            description: String::new(),
            on_change: None,
            per_worker: None,
        }
    }

    pub fn int(name: &str, default: i64) -> Self {
        Self::new(name, Value::Int(default))
    }

    pub fn string(name: &str, default: &str) -> Self {
        Self::new(name, Value::from(default))
    }

    pub fn blob(name: &str, default: &[u8]) -> Self {
        Self::new(name, Value::Blob(Arc::from(default)))
    }

    pub fn opaque(name: &str, default: Option<Opaque>) -> Self {
        Self::new(name, Value::Opaque(default))
    }

    /// Inclusive bounds for an integer variable.
    pub fn bounds(mut self, min: i64, max: i64) -> Self {
        self.bounds = Some((min, max));
        self
    }

    pub fn flags(mut self, flags: VarFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn description(mut self, text: &str) -> Self {
        self.description = text.to_string();
        self
    }

    pub fn on_change<F>(mut self, f: F) -> Self
    where
        F: Fn(&ChangeContext<'_>) -> std::result::Result<Option<Value>, String>
            + Send
            + Sync
            + 'static,
    {
        self.on_change = Some(Arc::new(f));
        self
    }

    pub fn per_worker<F>(mut self, f: F) -> Self
    where
        F: Fn(&WorkerNotice<'_>) + Send + Sync + 'static,
    {
        self.per_worker = Some(Arc::new(f));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn var_type(&self) -> VarType {
        self.var_type
    }

    pub fn default_value(&self) -> &Value {
        &self.default
    }

    pub fn get_bounds(&self) -> Option<(i64, i64)> {
        self.bounds
    }

    pub fn get_flags(&self) -> VarFlags {
        self.flags
    }

    pub fn get_description(&self) -> &str {
        &self.description
    }

    pub(crate) fn on_change_callback(&self) -> Option<&OnChange> {
        self.on_change.as_ref()
    }

    pub(crate) fn per_worker_callback(&self) -> Option<&OnWorkerUpdate> {
        self.per_worker.as_ref()
    }

    pub(crate) fn set_default(&mut self, value: Value) {
        self.default = value;
    }

    /// Type and bounds check of a proposed value.
    pub fn validate(&self, group: &str, value: &Value) -> Result<()> {
        if value.var_type() != self.var_type {
            return Err(ConfigError::TypeMismatch {
                group: group.to_string(),
                name: self.name.clone(),
                expected: self.var_type,
                found: value.var_type().to_string(),
            });
        }
        if let (Some((min, max)), Value::Int(v)) = (self.bounds, value) {
            if *v < min || *v > max {
                return Err(ConfigError::OutOfRange {
                    group: group.to_string(),
                    name: self.name.clone(),
                    value: *v,
                    min,
                    max,
                });
            }
        }
        Ok(())
    }

    /// Rejects runtime changes to read-only variables.
    pub fn check_writable(&self, group: &str) -> Result<()> {
        if self.flags.contains(VarFlags::READ_ONLY) {
            return Err(ConfigError::ReadOnly {
                group: group.to_string(),
                name: self.name.clone(),
            });
        }
        Ok(())
    }

    /// Converts textual input to this variable's type.
    pub fn parse_input(&self, group: &str, input: &str) -> Result<Value> {
        Value::from_input(self.var_type, input).map_err(|found| ConfigError::TypeMismatch {
            group: group.to_string(),
            name: self.name.clone(),
            expected: self.var_type,
            found,
        })
    }

    pub fn info(&self) -> VariableInfo {
        VariableInfo {
            name: self.name.clone(),
            var_type: self.var_type,
            default: self.default.clone(),
            min: self.bounds.map(|(min, _)| min),
            max: self.bounds.map(|(_, max)| max),
            atomic: self.flags.contains(VarFlags::ATOMIC),
            read_only: self.flags.contains(VarFlags::READ_ONLY),
            cb_only_once: self.flags.contains(VarFlags::CB_ONLY_ONCE),
            description: self.description.clone(),
            has_on_change: self.on_change.is_some(),
            has_per_worker: self.per_worker.is_some(),
        }
    }
}

impl fmt::Debug for VariableDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariableDescriptor")
            .field("name", &self.name)
            .field("var_type", &self.var_type)
            .field("default", &self.default)
            .field("bounds", &self.bounds)
            .field("flags", &self.flags)
            .field("on_change", &self.on_change.is_some())
            .field("per_worker", &self.per_worker.is_some())
            .finish()
    }
}

/// Serializable view of a descriptor, as reported by the admin API.
#[derive(Debug, Clone, Serialize)]
pub struct VariableInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub var_type: VarType,
    pub default: Value,
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub atomic: bool,
    pub read_only: bool,
    pub cb_only_once: bool,
    pub description: String,
    pub has_on_change: bool,
    pub has_per_worker: bool,
}
