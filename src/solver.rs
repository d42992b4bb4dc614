//! Constraint solving.
//!
//! The resolver hands a `ResolveContext` to a `Solver` and gets back the wires
//! chosen for every resource that had to be resolved. `BacktrackingSolver` is
//! a plain depth-first engine: candidates are tried in `find_providers` order
//! and a failed branch rolls the session back to its state before the attempt.
//! Resources that failed once are not explored again within the session.

use crate::context::ResolveContext;
use crate::error::ResolveError;
use crate::model::{Capability, ResourceRef};
use crate::registry::Wire;
use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet};
use tracing::trace;

/// Wires chosen per resolved resource. Loaded modules never appear as keys.
pub type WiringMap = BTreeMap<ResourceRef, Vec<Wire>>;

/// Chooses providers for every requirement reachable from the context's
/// mandatory resources.
pub trait Solver {
    fn resolve(&self, ctx: &mut ResolveContext<'_>) -> Result<WiringMap>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct BacktrackingSolver;

#[derive(Clone, Default)]
struct Session {
    resolved: WiringMap,
    in_progress: BTreeSet<ResourceRef>,
    failed: BTreeMap<ResourceRef, ResolveError>,
}

impl Session {
    /// Restore `snapshot`, keeping failures recorded since it was taken.
    fn rollback(&mut self, snapshot: Session) {
        let failed = std::mem::take(&mut self.failed);
        *self = snapshot;
        self.failed = failed;
    }
}

impl Solver for BacktrackingSolver {
    fn resolve(&self, ctx: &mut ResolveContext<'_>) -> Result<WiringMap> {
        let mut session = Session::default();
        for resource in ctx.mandatory_resources() {
            resolve_resource(ctx, &mut session, resource)?;
        }
        Ok(session.resolved)
    }
}

fn resolve_resource(
    ctx: &mut ResolveContext<'_>,
    session: &mut Session,
    resource: ResourceRef,
) -> Result<()> {
    // Loaded modules are already resolved; a resource being resolved further
    // up the stack satisfies cycles back to it.
    if resource.is_module()
        || session.resolved.contains_key(&resource)
        || session.in_progress.contains(&resource)
    {
        return Ok(());
    }
    if let Some(failure) = session.failed.get(&resource) {
        trace!(resource = %resource, "skipping resource that already failed");
        return Err(failure.clone().into());
    }
    session.in_progress.insert(resource);

    let mut wires = Vec::new();
    for requirement in ctx.requirements(resource) {
        if !ctx.is_effective(&requirement) {
            continue;
        }
        let candidates = ctx.find_providers(&requirement)?;
        trace!(
            resource = %resource,
            requirement = %requirement,
            candidates = candidates.len(),
            "trying candidates"
        );

        let mut chosen: Option<(ResourceRef, Capability)> = None;
        let mut nested_failure = None;
        for capability in candidates {
            let Some(provider) = capability.owner() else {
                continue;
            };
            let snapshot = session.clone();
            match resolve_resource(ctx, session, provider) {
                Ok(()) => {
                    chosen = Some((provider, capability));
                    break;
                }
                Err(err) => match err.downcast::<ResolveError>() {
                    Ok(failure) => {
                        session.rollback(snapshot);
                        nested_failure = Some(failure);
                    }
                    Err(err) => return Err(err),
                },
            }
        }

        match chosen {
            Some((provider, capability)) => wires.push(Wire {
                requirer: resource,
                requirement,
                provider,
                capability,
            }),
            None if requirement.is_optional() => {}
            None => {
                session.in_progress.remove(&resource);
                let failure = nested_failure.unwrap_or_else(|| ResolveError::Unsatisfied {
                    resource: ctx.identity(resource),
                    requirement: requirement.to_string(),
                });
                session.failed.insert(resource, failure.clone());
                return Err(failure.into());
            }
        }
    }

    session.in_progress.remove(&resource);
    session.resolved.insert(resource, wires);
    Ok(())
}
