//! Resolver facade and result assembly.
//!
//! `Resolver::resolve` builds a fresh `ResolveContext` for each request, runs
//! the solver over it and maps every resource the solver selected, except the
//! synthetic initial resource, to the location it can be fetched from.

use crate::config::ResolverConfig;
use crate::context::ResolveContext;
use crate::error::ResolveError;
use crate::model::{Requirement, ResourceRef};
use crate::registry::ModuleRegistry;
use crate::repository::{ConnectorRegistry, IndexedRepository, Repository};
use crate::solver::{BacktrackingSolver, Solver, WiringMap};
use crate::uri::Uri;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// A named set of requirements plus the repository indexes to search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResolveRequest {
    pub name: String,
    #[serde(default)]
    pub requirements: Vec<Requirement>,
    #[serde(default)]
    pub indexes: Vec<Uri>,
}

impl ResolveRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            requirements: Vec::new(),
            indexes: Vec::new(),
        }
    }

    pub fn requirement(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    pub fn index(mut self, index: Uri) -> Self {
        self.indexes.push(index);
        self
    }
}

/// One resource the solver selected, with where to fetch it from.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResolvedResource {
    pub identity: String,
    pub version: Option<String>,
    pub location: String,
    pub content_hash: Option<String>,
}

/// Outcome of a successful resolve, keyed by resource handle.
#[derive(Clone, Debug)]
pub struct ResolveResult {
    pub request: String,
    pub resources: BTreeMap<ResourceRef, ResolvedResource>,
}

impl ResolveResult {
    /// Location of `resource`, if the solver selected it.
    pub fn location(&self, resource: ResourceRef) -> Option<&str> {
        self.resources
            .get(&resource)
            .map(|resolved| resolved.location.as_str())
    }

    /// Resource → location, the shape installers consume.
    pub fn locations(&self) -> BTreeMap<ResourceRef, String> {
        self.resources
            .iter()
            .map(|(resource, resolved)| (*resource, resolved.location.clone()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// Entry point: resolves requests against a host registry and the
/// repositories named by each request and the configuration.
pub struct Resolver<R, S = BacktrackingSolver> {
    registry: R,
    solver: S,
    connectors: ConnectorRegistry,
    config: ResolverConfig,
}

impl<R: ModuleRegistry> Resolver<R> {
    /// Resolver using the backtracking solver and the default connectors.
    pub fn new(registry: R, config: ResolverConfig) -> Self {
        Self::with_solver(registry, BacktrackingSolver, config)
    }
}

impl<R: ModuleRegistry, S: Solver> Resolver<R, S> {
    /// Resolver driving `solver` instead of the default one.
    pub fn with_solver(registry: R, solver: S, config: ResolverConfig) -> Self {
        Self {
            registry,
            solver,
            connectors: ConnectorRegistry::with_defaults(),
            config,
        }
    }

    /// Shared connector registry; connectors registered here are used by
    /// every later `resolve` call.
    pub fn connectors(&self) -> &ConnectorRegistry {
        &self.connectors
    }

    /// Configuration the resolver was built with.
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Host registry consulted before any repository.
    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Mutable registry access, for installing modules between resolves.
    pub fn registry_mut(&mut self) -> &mut R {
        &mut self.registry
    }

    /// Resolve `request` against the registry, the request's indexes and the
    /// configured default indexes, in that order. Repeated index URIs are
    /// only searched once.
    pub fn resolve(&self, request: &ResolveRequest) -> Result<ResolveResult> {
        let mut indexes: Vec<Uri> = Vec::new();
        for index in request.indexes.iter().chain(&self.config.default_indexes) {
            if !indexes.contains(index) {
                indexes.push(index.clone());
            }
        }
        let repositories: Vec<Box<dyn Repository>> = indexes
            .into_iter()
            .map(|index| -> Box<dyn Repository> {
                Box::new(
                    IndexedRepository::new(index, self.connectors.clone())
                        .validate_schema(self.config.validate_indexes),
                )
            })
            .collect();
        self.resolve_with(request, repositories)
    }

    /// Resolve `request` against caller-supplied repositories. The request's
    /// own index list is not consulted.
    pub fn resolve_with<'a>(
        &'a self,
        request: &ResolveRequest,
        repositories: Vec<Box<dyn Repository + 'a>>,
    ) -> Result<ResolveResult> {
        debug!(
            request = %request.name,
            requirements = request.requirements.len(),
            repositories = repositories.len(),
            "resolve started"
        );
        let mut ctx = ResolveContext::new(
            &self.registry,
            &request.name,
            &request.requirements,
            repositories,
            self.config.content_mime_type.clone(),
        );
        let wiring = self.solver.resolve(&mut ctx)?;
        let result = assemble(&request.name, &ctx, &wiring)?;
        debug!(
            request = %request.name,
            resolved = result.resources.len(),
            "resolve finished"
        );
        Ok(result)
    }
}

/// Map every resource in `wiring` except the initial one to its location.
pub fn assemble(
    request: &str,
    ctx: &ResolveContext<'_>,
    wiring: &WiringMap,
) -> Result<ResolveResult> {
    let mut resources = BTreeMap::new();
    for resource in wiring.keys().copied() {
        if ctx.is_initial_resource(resource) {
            continue;
        }
        let identity = ctx.identity(resource);
        let location = ctx
            .location(resource)
            .ok_or_else(|| ResolveError::MissingLocation {
                identity: identity.clone(),
            })?;
        resources.insert(
            resource,
            ResolvedResource {
                identity,
                version: ctx.version(resource),
                location,
                content_hash: ctx.content_hash(resource),
            },
        );
    }
    Ok(ResolveResult {
        request: request.to_string(),
        resources,
    })
}
