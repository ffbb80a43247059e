//! Declaration phase: static and dynamic groups, deferred lookups and bring-up.

use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use crate::registry::descriptor::VariableDescriptor;
use crate::registry::schema::{Group, Schema};
use crate::registry::types::{GroupHandle, VarHandle};
use crate::store::error::{ConfigError, Result};
use crate::store::ConfigStore;

struct PendingGroup {
    name: String,
    vars: Vec<VariableDescriptor>,
    dynamic: bool,
}

impl PendingGroup {
    fn has_var(&self, name: &str) -> bool {
        self.vars.iter().any(|v| v.name() == name)
    }
}

#[derive(Default)]
struct DeclState {
    groups: Vec<PendingGroup>,
    deferred: Vec<DeferredVar>,
    sealed: bool,
}

/// A variable reference taken before its group exists, resolved at bring-up.
#[derive(Debug, Clone)]
pub struct DeferredVar {
    group: String,
    name: String,
    slot: Arc<OnceLock<VarHandle>>,
}

impl DeferredVar {
    /// The resolved handle; `None` until bring-up succeeded.
    pub fn get(&self) -> Option<VarHandle> {
        self.slot.get().copied()
    }
}

/// Collects group declarations until bring-up freezes them into a [`Schema`].
#[derive(Default)]
pub struct Registry {
    state: Mutex<DeclState>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DeclState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_sealed(&self) -> bool {
        self.lock().sealed
    }

    /// Declares a static group.
    ///
    /// A dynamic group of the same name is absorbed: its values become the
    /// defaults of matching variables, other dynamic variables are appended.
    pub fn declare_group(&self, name: &str, vars: Vec<VariableDescriptor>) -> Result<GroupHandle> {
        let mut state = self.lock();
        if state.sealed {
            return Err(ConfigError::InvalidState(format!(
                "group '{}' declared after bring-up",
                name
            )));
        }
        for (i, var) in vars.iter().enumerate() {
            if vars[..i].iter().any(|v| v.name() == var.name()) {
                return Err(ConfigError::DuplicateVariable {
                    group: name.to_string(),
                    name: var.name().to_string(),
                });
            }
        }

        match state.groups.iter().position(|g| g.name == name) {
            Some(idx) if !state.groups[idx].dynamic => {
                Err(ConfigError::DuplicateGroup(name.to_string()))
            }
            Some(idx) => {
                for dyn_var in &state.groups[idx].vars {
                    if let Some(static_var) = vars.iter().find(|v| v.name() == dyn_var.name()) {
                        static_var.validate(name, dyn_var.default_value())?;
                    }
                }
                let dynamic_vars = std::mem::take(&mut state.groups[idx].vars);
                let mut merged = vars;
                for dyn_var in dynamic_vars {
                    match merged.iter_mut().find(|v| v.name() == dyn_var.name()) {
                        Some(static_var) => static_var.set_default(dyn_var.default_value().clone()),
                        None => merged.push(dyn_var),
                    }
                }
                let group = &mut state.groups[idx];
                group.vars = merged;
                group.dynamic = false;
                tracing::debug!(group = %name, "Static declaration absorbed dynamic group");
                Ok(GroupHandle(idx))
            }
            None => {
                state.groups.push(PendingGroup {
                    name: name.to_string(),
                    vars,
                    dynamic: false,
                });
                Ok(GroupHandle(state.groups.len() - 1))
            }
        }
    }

    /// Adds one variable to a dynamically assembled group, creating it if needed.
    pub fn declare_dynamic(&self, group: &str, var: VariableDescriptor) -> Result<GroupHandle> {
        let mut state = self.lock();
        if state.sealed {
            return Err(ConfigError::InvalidState(format!(
                "group '{}' declared after bring-up",
                group
            )));
        }
        match state.groups.iter().position(|g| g.name == group) {
            Some(idx) => {
                let existing = &mut state.groups[idx];
                if !existing.dynamic {
                    return Err(ConfigError::DuplicateGroup(group.to_string()));
                }
                if existing.has_var(var.name()) {
                    return Err(ConfigError::DuplicateVariable {
                        group: group.to_string(),
                        name: var.name().to_string(),
                    });
                }
                existing.vars.push(var);
                Ok(GroupHandle(idx))
            }
            None => {
                state.groups.push(PendingGroup {
                    name: group.to_string(),
                    vars: vec![var],
                    dynamic: true,
                });
                Ok(GroupHandle(state.groups.len() - 1))
            }
        }
    }

    /// Records a lookup of a variable whose group may not be declared yet.
    pub fn lookup_later(&self, group: &str, name: &str) -> Result<DeferredVar> {
        let mut state = self.lock();
        if state.sealed {
            return Err(ConfigError::InvalidState(
                "deferred lookups must be taken before bring-up".to_string(),
            ));
        }
        let deferred = DeferredVar {
            group: group.to_string(),
            name: name.to_string(),
            slot: Arc::new(OnceLock::new()),
        };
        state.deferred.push(deferred.clone());
        Ok(deferred)
    }

    /// Freezes the declarations and publishes the first generation.
    ///
    /// On failure the registry stays open and nothing is published.
    pub fn bring_up(&self) -> Result<Arc<ConfigStore>> {
        let mut state = self.lock();
        if state.sealed {
            return Err(ConfigError::InvalidState("bring-up already performed".to_string()));
        }

        let mut groups = Vec::with_capacity(state.groups.len());
        for pending in &state.groups {
            for var in &pending.vars {
                var.validate(&pending.name, var.default_value())?;
            }
            groups.push(Group::new(pending.name.clone(), pending.vars.clone(), pending.dynamic));
        }
        let schema = Schema::new(groups);

        let mut resolved = Vec::with_capacity(state.deferred.len());
        for deferred in &state.deferred {
            let handle = schema
                .resolve(&deferred.group, &deferred.name)
                .map_err(|_| ConfigError::UnresolvedReference {
                    group: deferred.group.clone(),
                    name: deferred.name.clone(),
                })?;
            resolved.push(handle);
        }

        let store = ConfigStore::bring_up(schema)?;

        for (deferred, handle) in state.deferred.iter().zip(resolved) {
            let _ = deferred.slot.set(handle);
        }
        state.sealed = true;
        Ok(store)
    }
}
