//! Typed failures surfaced by the resolver.
//!
//! Plumbing errors (I/O, index parsing, configuration) travel as
//! `anyhow::Error` with context attached. The types here mark the cases
//! callers branch on; they can be recovered with `anyhow::Error::downcast_ref`.

use crate::model::ResourceRef;
use thiserror::Error;

/// Failures of the resolution itself.
#[derive(Clone, Debug, Error)]
pub enum ResolveError {
    /// The solver asked to host a capability on a resource the context never
    /// handed out. The engine and context have desynchronized.
    #[error("hosted capability has host resource {0} not found in any known repository")]
    UnknownHostResource(ResourceRef),

    /// No candidate could satisfy a mandatory requirement.
    #[error("unable to resolve {resource}: missing requirement {requirement}")]
    Unsatisfied {
        resource: String,
        requirement: String,
    },

    /// A resolved repository resource publishes no fetchable content.
    #[error("resolved resource {identity} has no fetchable location")]
    MissingLocation { identity: String },
}

/// Failures while resolving URI references.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UriError {
    #[error("invalid URI '{input}': {reason}")]
    Syntax { input: String, reason: String },

    #[error("cannot resolve relative reference '{reference}' against opaque base '{base}'")]
    OpaqueBase { base: String, reference: String },

    #[error("cannot resolve '{reference}' against relative base '{base}'")]
    RelativeBase { base: String, reference: String },

    #[error("reference '{reference}' navigates outside archive '{base}' (navigate=false)")]
    NavigationOutsideArchive { base: String, reference: String },
}

/// LDAP filter syntax errors. `position` is a byte offset into the filter.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid filter '{filter}' at offset {position}: {reason}")]
pub struct FilterError {
    pub filter: String,
    pub position: usize,
    pub reason: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VersionError {
    #[error("version must not be empty")]
    Empty,

    #[error("invalid version '{input}': component '{component}' is not a number")]
    InvalidComponent { input: String, component: String },

    #[error("invalid version '{input}': bad qualifier '{qualifier}'")]
    InvalidQualifier { input: String, qualifier: String },
}
