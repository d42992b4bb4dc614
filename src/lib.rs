//! Module dependency resolver.
//!
//! Given a named request carrying requirements and a list of repository index
//! URIs, the resolver finds capabilities among the host's loaded modules and
//! the indexed repositories, lets a `Solver` choose among them, and reports
//! every newly needed resource with the location it can be fetched from.
//!
//! The host registry (`ModuleRegistry`), repositories (`Repository`), URL
//! fetching (`UrlConnector`) and the solving engine (`Solver`) are traits, so
//! embedders supply their own where the bundled implementations do not fit.

pub mod config;
pub mod context;
pub mod error;
pub mod filter;
pub mod model;
pub mod registry;
pub mod repository;
pub mod resolver;
mod schema;
pub mod solver;
pub mod uri;

pub use config::{ResolverConfig, from_properties, load_config_from_path};
pub use context::{HostedCapability, ResolveContext, matches};
pub use error::{FilterError, ResolveError, UriError, VersionError};
pub use filter::Filter;
pub use model::{
    AttributeValue, Capability, ModuleId, Requirement, Resource, ResourceArena, ResourceBuilder,
    ResourceRef, Version, names,
};
pub use registry::{InMemoryRegistry, ModuleRegistry, ModuleState, Wire, Wiring};
pub use repository::{
    ConnectorRegistry, FileConnector, IndexDocument, IndexedRepository, JarConnector, Repository,
    UrlConnector, load_index_from_path,
};
pub use resolver::{ResolveRequest, ResolveResult, ResolvedResource, Resolver};
pub use solver::{BacktrackingSolver, Solver, WiringMap};
pub use uri::Uri;
