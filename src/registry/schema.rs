//! The frozen layout of all groups, fixed at bring-up.

use std::collections::HashMap;

use serde::Serialize;

use crate::registry::descriptor::{VariableDescriptor, VariableInfo};
use crate::registry::types::{GroupHandle, VarHandle};
use crate::store::error::{ConfigError, Result};

/// A named collection of variables.
#[derive(Debug)]
pub struct Group {
    name: String,
    vars: Vec<VariableDescriptor>,
    index: HashMap<String, usize>,
    declared_dynamic: bool,
}

impl Group {
    pub(crate) fn new(name: String, vars: Vec<VariableDescriptor>, declared_dynamic: bool) -> Self {
        let index = vars
            .iter()
            .enumerate()
            .map(|(i, v)| (v.name().to_string(), i))
            .collect();
        Self {
            name,
            vars,
            index,
            declared_dynamic,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vars(&self) -> &[VariableDescriptor] {
        &self.vars
    }

    /// True if the group was assembled from dynamic declarations.
    pub fn declared_dynamic(&self) -> bool {
        self.declared_dynamic
    }

    fn var_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }
}

/// Serializable view of a group.
#[derive(Debug, Clone, Serialize)]
pub struct GroupInfo {
    pub name: String,
    pub dynamic: bool,
    pub variables: Vec<VariableInfo>,
}

/// Immutable group layout shared by every generation.
#[derive(Debug, Default)]
pub struct Schema {
    groups: Vec<Group>,
    index: HashMap<String, usize>,
}

impl Schema {
    pub(crate) fn new(groups: Vec<Group>) -> Self {
        let index = groups
            .iter()
            .enumerate()
            .map(|(i, g)| (g.name.clone(), i))
            .collect();
        Self { groups, index }
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn group_handle(&self, group: &str) -> Result<GroupHandle> {
        self.index
            .get(group)
            .map(|&i| GroupHandle(i))
            .ok_or_else(|| ConfigError::InvalidGroup(group.to_string()))
    }

    pub fn group(&self, handle: GroupHandle) -> &Group {
        &self.groups[handle.0]
    }

    /// Resolves a (group, variable) name pair to a stable handle.
    pub fn resolve(&self, group: &str, name: &str) -> Result<VarHandle> {
        let GroupHandle(g) = self.group_handle(group)?;
        let var = self.groups[g]
            .var_index(name)
            .ok_or_else(|| ConfigError::invalid_variable(group, name))?;
        Ok(VarHandle { group: g, var })
    }

    pub fn descriptor(&self, handle: VarHandle) -> &VariableDescriptor {
        &self.groups[handle.group].vars[handle.var]
    }

    pub fn group_name(&self, handle: VarHandle) -> &str {
        &self.groups[handle.group].name
    }

    /// All groups with their descriptors, in declaration order.
    pub fn list(&self) -> Vec<(&str, &[VariableDescriptor])> {
        self.groups
            .iter()
            .map(|g| (g.name.as_str(), g.vars.as_slice()))
            .collect()
    }

    pub fn info(&self) -> Vec<GroupInfo> {
        self.groups
            .iter()
            .map(|g| GroupInfo {
                name: g.name.clone(),
                dynamic: g.declared_dynamic,
                variables: g.vars.iter().map(VariableDescriptor::info).collect(),
            })
            .collect()
    }

    pub fn variable_count(&self) -> usize {
        self.groups.iter().map(|g| g.vars.len()).sum()
    }
}
