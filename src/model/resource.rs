use crate::model::capability::{
    Capability, Requirement, ResourceId, ResourceRef, names,
};
use serde::Deserialize;

/// Frozen resource: capabilities and requirements in insertion order, each
/// owned by this resource's handle.
#[derive(Clone, Debug)]
pub struct Resource {
    handle: ResourceRef,
    capabilities: Vec<Capability>,
    requirements: Vec<Requirement>,
}

impl Resource {
    /// Handle this resource was stored under.
    pub fn handle(&self) -> ResourceRef {
        self.handle
    }

    /// Capabilities in `namespace`, or all of them when `None`.
    pub fn capabilities<'a>(
        &'a self,
        namespace: Option<&'a str>,
    ) -> impl Iterator<Item = &'a Capability> + 'a {
        self.capabilities
            .iter()
            .filter(move |cap| namespace.is_none_or(|ns| cap.namespace() == ns))
    }

    pub fn requirements<'a>(
        &'a self,
        namespace: Option<&'a str>,
    ) -> impl Iterator<Item = &'a Requirement> + 'a {
        self.requirements
            .iter()
            .filter(move |req| namespace.is_none_or(|ns| req.namespace() == ns))
    }

    /// Identity attribute of the first identity capability.
    pub fn identity(&self) -> Option<&str> {
        self.capabilities(Some(names::IDENTITY_NAMESPACE))
            .next()
            .and_then(|cap| cap.attribute(names::IDENTITY_NAMESPACE))
            .and_then(|value| value.as_str())
    }

    pub fn version(&self) -> Option<String> {
        identity_version(self.capabilities(Some(names::IDENTITY_NAMESPACE)))
    }
}

/// Version attribute of the first identity capability in `capabilities`.
pub(crate) fn identity_version<'a>(
    mut capabilities: impl Iterator<Item = &'a Capability>,
) -> Option<String> {
    capabilities
        .find(|cap| cap.namespace() == names::IDENTITY_NAMESPACE)
        .and_then(|cap| cap.attribute(names::VERSION_ATTRIBUTE))
        .map(|value| match value.as_version() {
            Some(version) => version.to_string(),
            None => value.as_str().map(str::to_string).unwrap_or_default(),
        })
}

/// Resource under construction. Capabilities and requirements added here have
/// no owner until the builder is frozen by `ResourceArena::insert`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ResourceBuilder {
    #[serde(default)]
    capabilities: Vec<Capability>,
    #[serde(default)]
    requirements: Vec<Requirement>,
}

impl ResourceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capability(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    pub fn requirement(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    pub fn add_capability(&mut self, capability: Capability) {
        self.capabilities.push(capability);
    }

    pub fn add_requirement(&mut self, requirement: Requirement) {
        self.requirements.push(requirement);
    }

    pub(crate) fn capability_list(&self) -> &[Capability] {
        &self.capabilities
    }

    pub(crate) fn requirement_list(&self) -> &[Requirement] {
        &self.requirements
    }
}

/// Session-scoped storage for resources addressed by `ResourceId`.
///
/// Handles are only meaningful for the arena that issued them.
#[derive(Debug, Default)]
pub struct ResourceArena {
    resources: Vec<Resource>,
}

impl ResourceArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Freeze `builder` into the arena and return its handle.
    pub fn insert(&mut self, builder: ResourceBuilder) -> ResourceRef {
        let handle = ResourceRef::Arena(ResourceId(self.resources.len()));
        let capabilities = builder
            .capabilities
            .iter()
            .map(|cap| cap.copy_to(handle))
            .collect();
        let requirements = builder
            .requirements
            .iter()
            .map(|req| req.copy_to(handle))
            .collect();
        self.resources.push(Resource {
            handle,
            capabilities,
            requirements,
        });
        handle
    }

    pub fn get(&self, handle: ResourceRef) -> Option<&Resource> {
        match handle {
            ResourceRef::Arena(ResourceId(idx)) => self.resources.get(idx),
            ResourceRef::Module(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Version;

    #[test]
    fn insert_assigns_owner_to_every_entry() {
        let mut arena = ResourceArena::new();
        let builder = ResourceBuilder::new()
            .capability(Capability::new("pkg").with_attribute("name", "a"))
            .capability(Capability::new("pkg").with_attribute("name", "b"))
            .requirement(Requirement::with_filter("svc", "(objectClass=x)"));
        let first = arena.insert(builder.clone());
        let second = arena.insert(builder);

        assert_ne!(first, second);
        let resource = arena.get(first).expect("resource stored");
        assert!(resource.capabilities(None).all(|c| c.owner() == Some(first)));
        assert!(resource.requirements(None).all(|r| r.owner() == Some(first)));
        let names: Vec<_> = resource
            .capabilities(Some("pkg"))
            .filter_map(|c| c.attribute("name").and_then(|v| v.as_str()))
            .collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(resource.capabilities(Some("other")).count(), 0);
    }

    #[test]
    fn identity_and_version_come_from_identity_capability() {
        let mut arena = ResourceArena::new();
        let handle = arena.insert(
            ResourceBuilder::new().capability(
                Capability::new(names::IDENTITY_NAMESPACE)
                    .with_attribute(names::IDENTITY_NAMESPACE, "org.example.core")
                    .with_attribute(names::VERSION_ATTRIBUTE, Version::new(1, 2, 0)),
            ),
        );
        let resource = arena.get(handle).unwrap();
        assert_eq!(resource.handle(), handle);
        assert_eq!(resource.identity(), Some("org.example.core"));
        assert_eq!(resource.version().as_deref(), Some("1.2.0"));
        assert!(arena.get(ResourceRef::Module(crate::model::ModuleId(1))).is_none());
    }
}
