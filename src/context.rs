//! Per-request resolve context.
//!
//! The context is the solver's only window onto the world: it owns the
//! session arena and the synthetic initial resource, queries the host registry
//! before the repositories, and records which repository owns each repository
//! resource along with its fetchable location. Those caches are filled during
//! `find_providers` and only read afterwards.

use crate::error::{FilterError, ResolveError};
use crate::filter::Filter;
use crate::model::resource::identity_version;
use crate::model::{
    Capability, Requirement, Resource, ResourceArena, ResourceBuilder, ResourceRef, names,
};
use crate::registry::{ModuleRegistry, ModuleState, Wiring};
use crate::repository::Repository;
use crate::uri::{self, Uri};
use anyhow::Result;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::slice;
use tracing::{error, warn};

const UNKNOWN_IDENTITY: &str = "<unknown>";

/// A capability declared by one resource but offered through `host`, e.g. a
/// fragment's export surfacing on the fragment host.
#[derive(Clone, Debug)]
pub struct HostedCapability {
    pub host: ResourceRef,
    pub declared: Capability,
}

/// State of one resolve request over the host registry and the request's
/// repositories.
pub struct ResolveContext<'a> {
    registry: &'a dyn ModuleRegistry,
    arena: ResourceArena,
    initial: ResourceRef,
    repositories: Vec<Box<dyn Repository + 'a>>,
    content_mime_type: String,
    locations: HashMap<ResourceRef, String>,
    located: HashSet<ResourceRef>,
    owners: HashMap<ResourceRef, usize>,
}

impl<'a> ResolveContext<'a> {
    /// Build a context for the request `name`. `requirements` are copied onto
    /// a fresh initial resource; `repositories` are consulted in order.
    pub fn new(
        registry: &'a dyn ModuleRegistry,
        name: &str,
        requirements: &[Requirement],
        repositories: Vec<Box<dyn Repository + 'a>>,
        content_mime_type: impl Into<String>,
    ) -> Self {
        let mut initial = ResourceBuilder::new()
            .capability(
                Capability::new(names::IDENTITY_NAMESPACE)
                    .with_attribute(names::IDENTITY_NAMESPACE, name),
            )
            .capability(Capability::new(names::INITIAL_MARKER_NAMESPACE));
        for requirement in requirements {
            initial.add_requirement(requirement.clone());
        }
        let mut arena = ResourceArena::new();
        let initial = arena.insert(initial);
        Self {
            registry,
            arena,
            initial,
            repositories,
            content_mime_type: content_mime_type.into(),
            locations: HashMap::new(),
            located: HashSet::new(),
            owners: HashMap::new(),
        }
    }

    /// Resources the solver must resolve: only the initial resource.
    pub fn mandatory_resources(&self) -> Vec<ResourceRef> {
        vec![self.initial]
    }

    /// Capabilities satisfying `requirement`: loaded modules first, in
    /// registry order and skipping uninstalled ones, then each repository in
    /// index order.
    pub fn find_providers(&mut self, requirement: &Requirement) -> Result<Vec<Capability>> {
        let mut providers = Vec::new();
        for module in self.registry.modules() {
            if self.registry.state(module) == Some(ModuleState::Uninstalled) {
                continue;
            }
            providers.extend(
                self.registry
                    .capabilities(module, Some(requirement.namespace()))
                    .into_iter()
                    .filter(|capability| self.matches(requirement, capability)),
            );
        }

        let Self {
            arena,
            repositories,
            content_mime_type,
            locations,
            located,
            owners,
            ..
        } = self;

        for (position, repository) in repositories.iter_mut().enumerate() {
            let found = repository
                .find_providers(slice::from_ref(requirement), arena)?
                .into_iter()
                .next()
                .unwrap_or_default();
            for capability in found {
                if capability.namespace() != requirement.namespace() {
                    continue;
                }
                if let Some(owner) = capability.owner() {
                    owners.entry(owner).or_insert(position);
                    // Resolved once per resource, failures included.
                    if located.insert(owner) {
                        let mime = content_mime_type.as_str();
                        let location = arena.get(owner).and_then(|resource| {
                            content_location(resource, mime, repository.index_uri())
                        });
                        if let Some(location) = location {
                            locations.insert(owner, location);
                        }
                    }
                }
                providers.push(capability);
            }
        }
        Ok(providers)
    }

    /// `matches` with the requiring resource's identity in the log line when
    /// the filter is malformed.
    pub fn matches(&self, requirement: &Requirement, capability: &Capability) -> bool {
        match evaluate(requirement, capability) {
            Ok(matched) => matched,
            Err(err) => {
                let identity = requirement
                    .owner()
                    .map(|owner| self.identity(owner))
                    .unwrap_or_else(|| UNKNOWN_IDENTITY.to_string());
                error!(resource = %identity, %err, "invalid requirement filter");
                false
            }
        }
    }

    /// Insert `hosted` into `capabilities`, which is ordered by provider rank
    /// (loaded modules, then repositories in index order). The copy lands
    /// before the first entry of strictly higher rank; returns its position.
    pub fn insert_hosted_capability(
        &self,
        capabilities: &mut Vec<Capability>,
        hosted: HostedCapability,
    ) -> Result<usize, ResolveError> {
        let rank = self
            .rank(hosted.host)
            .ok_or(ResolveError::UnknownHostResource(hosted.host))?;
        let position = capabilities
            .iter()
            .position(|existing| {
                existing
                    .owner()
                    .and_then(|owner| self.rank(owner))
                    .is_some_and(|other| other > rank)
            })
            .unwrap_or(capabilities.len());
        capabilities.insert(position, hosted.declared.copy_to(hosted.host));
        Ok(position)
    }

    /// Every requirement is evaluated in the resolve phase.
    pub fn is_effective(&self, _requirement: &Requirement) -> bool {
        true
    }

    /// Existing wiring of every loaded module that has one.
    pub fn wirings(&self) -> BTreeMap<ResourceRef, Wiring> {
        self.registry
            .modules()
            .into_iter()
            .filter_map(|module| {
                self.registry
                    .wiring(module)
                    .map(|wiring| (ResourceRef::Module(module), wiring))
            })
            .collect()
    }

    /// True for the synthetic resource carrying the request's requirements.
    pub fn is_initial_resource(&self, resource: ResourceRef) -> bool {
        !self
            .capabilities(resource, Some(names::INITIAL_MARKER_NAMESPACE))
            .is_empty()
    }

    /// Install location for modules, cached content location for repository
    /// resources.
    pub fn location(&self, resource: ResourceRef) -> Option<String> {
        match resource {
            ResourceRef::Module(module) => self.registry.location(module),
            ResourceRef::Arena(_) => self.locations.get(&resource).cloned(),
        }
    }

    /// Requirements declared by `resource`, owned by it.
    pub fn requirements(&self, resource: ResourceRef) -> Vec<Requirement> {
        match resource {
            ResourceRef::Module(module) => self.registry.requirements(module),
            ResourceRef::Arena(_) => self
                .arena
                .get(resource)
                .map(|r| r.requirements(None).cloned().collect())
                .unwrap_or_default(),
        }
    }

    /// Capabilities of `resource`, optionally restricted to `namespace`.
    pub fn capabilities(&self, resource: ResourceRef, namespace: Option<&str>) -> Vec<Capability> {
        match resource {
            ResourceRef::Module(module) => self.registry.capabilities(module, namespace),
            ResourceRef::Arena(_) => self
                .arena
                .get(resource)
                .map(|r| r.capabilities(namespace).cloned().collect())
                .unwrap_or_default(),
        }
    }

    /// Symbolic name of `resource`, or `<unknown>`.
    pub fn identity(&self, resource: ResourceRef) -> String {
        let identity = match resource {
            ResourceRef::Module(module) => self.registry.identity(module),
            ResourceRef::Arena(_) => self
                .arena
                .get(resource)
                .and_then(Resource::identity)
                .map(str::to_string),
        };
        identity.unwrap_or_else(|| UNKNOWN_IDENTITY.to_string())
    }

    /// Version published on the identity capability.
    pub fn version(&self, resource: ResourceRef) -> Option<String> {
        match resource {
            ResourceRef::Module(module) => identity_version(
                self.registry
                    .capabilities(module, Some(names::IDENTITY_NAMESPACE))
                    .iter(),
            ),
            ResourceRef::Arena(_) => self.arena.get(resource).and_then(Resource::version),
        }
    }

    /// Content hash published on the resource's content capability.
    pub fn content_hash(&self, resource: ResourceRef) -> Option<String> {
        self.arena
            .get(resource)?
            .capabilities(Some(names::CONTENT_NAMESPACE))
            .find(|cap| self.is_fetchable_content(cap))
            .and_then(|cap| cap.attribute(names::CONTENT_NAMESPACE))
            .and_then(|value| value.as_str())
            .map(str::to_string)
    }

    fn is_fetchable_content(&self, capability: &Capability) -> bool {
        capability
            .attribute(names::CONTENT_MIME_ATTRIBUTE)
            .and_then(|value| value.as_str())
            == Some(self.content_mime_type.as_str())
    }

    /// 0 for loaded modules, position + 1 for repository resources.
    fn rank(&self, resource: ResourceRef) -> Option<usize> {
        match resource {
            ResourceRef::Module(_) => Some(0),
            ResourceRef::Arena(_) => self.owners.get(&resource).map(|position| position + 1),
        }
    }
}

/// True when `capability` satisfies `requirement`. A malformed filter never
/// matches.
pub fn matches(requirement: &Requirement, capability: &Capability) -> bool {
    match evaluate(requirement, capability) {
        Ok(matched) => matched,
        Err(err) => {
            let owner = requirement
                .owner()
                .map(|owner| owner.to_string())
                .unwrap_or_else(|| UNKNOWN_IDENTITY.to_string());
            error!(resource = %owner, %err, "invalid requirement filter");
            false
        }
    }
}

fn evaluate(requirement: &Requirement, capability: &Capability) -> Result<bool, FilterError> {
    if requirement.namespace() != capability.namespace() {
        return Ok(false);
    }
    let offered = capability.effective().unwrap_or(names::EFFECTIVE_RESOLVE);
    if offered != names::EFFECTIVE_RESOLVE
        && requirement.effective().unwrap_or(names::EFFECTIVE_RESOLVE) != offered
    {
        return Ok(false);
    }
    match requirement.filter() {
        None => Ok(true),
        Some(filter) => Ok(Filter::parse(filter)?.matches(capability.attributes())),
    }
}

fn content_location(resource: &Resource, mime: &str, index_uri: &Uri) -> Option<String> {
    let content = resource
        .capabilities(Some(names::CONTENT_NAMESPACE))
        .find(|cap| {
            cap.attribute(names::CONTENT_MIME_ATTRIBUTE)
                .and_then(|value| value.as_str())
                == Some(mime)
        })?;
    let Some(url) = content
        .attribute(names::CONTENT_URL_ATTRIBUTE)
        .and_then(|value| value.as_str())
    else {
        warn!(index = %index_uri, "content capability without a url attribute");
        return None;
    };
    match uri::resolve_str(index_uri, url) {
        Ok(location) => Some(location.to_string()),
        Err(err) => {
            warn!(index = %index_uri, url, %err, "failed to resolve content location");
            None
        }
    }
}
