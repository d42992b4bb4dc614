//! Host module registry.
//!
//! The resolver never owns loaded modules; it reads them through
//! `ModuleRegistry`. `InMemoryRegistry` is a plain implementation for
//! embedding and tests.

use crate::model::{Capability, ModuleId, Requirement, ResourceBuilder, ResourceRef, names};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleState {
    Installed,
    Resolved,
    Active,
    Uninstalled,
}

/// A requirement of `requirer` bound to a capability of `provider`.
#[derive(Clone, Debug, PartialEq)]
pub struct Wire {
    pub requirer: ResourceRef,
    pub requirement: Requirement,
    pub provider: ResourceRef,
    pub capability: Capability,
}

/// Existing wiring of a loaded module.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Wiring {
    pub required: Vec<Wire>,
    pub provided: Vec<Wire>,
}

pub trait ModuleRegistry {
    /// Loaded modules in registry order.
    fn modules(&self) -> Vec<ModuleId>;

    fn state(&self, module: ModuleId) -> Option<ModuleState>;

    /// Capabilities of `module`, owned by `ResourceRef::Module(module)`,
    /// restricted to `namespace` when given.
    fn capabilities(&self, module: ModuleId, namespace: Option<&str>) -> Vec<Capability>;

    fn requirements(&self, module: ModuleId) -> Vec<Requirement>;

    fn wiring(&self, module: ModuleId) -> Option<Wiring>;

    /// Install location of `module`.
    fn location(&self, module: ModuleId) -> Option<String>;

    fn identity(&self, module: ModuleId) -> Option<String> {
        self.capabilities(module, Some(names::IDENTITY_NAMESPACE))
            .first()
            .and_then(|cap| cap.attribute(names::IDENTITY_NAMESPACE))
            .and_then(|value| value.as_str())
            .map(str::to_string)
    }
}

struct ModuleEntry {
    location: String,
    state: ModuleState,
    capabilities: Vec<Capability>,
    requirements: Vec<Requirement>,
    wiring: Option<Wiring>,
}

/// Registry kept entirely in memory; module ids are assigned sequentially
/// starting at 0.
#[derive(Default)]
pub struct InMemoryRegistry {
    modules: BTreeMap<ModuleId, ModuleEntry>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a module in the `Installed` state.
    pub fn install(&mut self, location: impl Into<String>, resource: ResourceBuilder) -> ModuleId {
        let id = ModuleId(self.modules.len() as u64);
        let owner = ResourceRef::Module(id);
        let entry = ModuleEntry {
            location: location.into(),
            state: ModuleState::Installed,
            capabilities: resource
                .capability_list()
                .iter()
                .map(|cap| cap.copy_to(owner))
                .collect(),
            requirements: resource
                .requirement_list()
                .iter()
                .map(|req| req.copy_to(owner))
                .collect(),
            wiring: None,
        };
        self.modules.insert(id, entry);
        id
    }

    /// Returns false when `module` is unknown.
    pub fn set_state(&mut self, module: ModuleId, state: ModuleState) -> bool {
        match self.modules.get_mut(&module) {
            Some(entry) => {
                entry.state = state;
                true
            }
            None => false,
        }
    }

    pub fn set_wiring(&mut self, module: ModuleId, wiring: Wiring) -> bool {
        match self.modules.get_mut(&module) {
            Some(entry) => {
                entry.wiring = Some(wiring);
                true
            }
            None => false,
        }
    }
}

impl ModuleRegistry for InMemoryRegistry {
    fn modules(&self) -> Vec<ModuleId> {
        self.modules.keys().copied().collect()
    }

    fn state(&self, module: ModuleId) -> Option<ModuleState> {
        self.modules.get(&module).map(|entry| entry.state)
    }

    fn capabilities(&self, module: ModuleId, namespace: Option<&str>) -> Vec<Capability> {
        self.modules
            .get(&module)
            .map(|entry| {
                entry
                    .capabilities
                    .iter()
                    .filter(|cap| namespace.is_none_or(|ns| cap.namespace() == ns))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn requirements(&self, module: ModuleId) -> Vec<Requirement> {
        self.modules
            .get(&module)
            .map(|entry| entry.requirements.clone())
            .unwrap_or_default()
    }

    fn wiring(&self, module: ModuleId) -> Option<Wiring> {
        self.modules.get(&module).and_then(|entry| entry.wiring.clone())
    }

    fn location(&self, module: ModuleId) -> Option<String> {
        self.modules.get(&module).map(|entry| entry.location.clone())
    }
}
