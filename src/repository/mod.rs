//! Repository adapters.
//!
//! A repository publishes resources through an index document reachable at
//! its index URI. Adapters fetch the index through the shared
//! `ConnectorRegistry`, intern its resources into the session arena and answer
//! provider queries against them.

pub mod connector;
pub mod index;
pub mod indexed;

pub use connector::{ConnectorRegistry, FileConnector, JarConnector, UrlConnector};
pub use index::{IndexDocument, load_index_from_path};
pub use indexed::IndexedRepository;

use crate::model::{Capability, Requirement, ResourceArena};
use crate::uri::Uri;
use anyhow::Result;

/// Source of candidate capabilities outside the host registry.
pub trait Repository {
    /// URI the repository's index was (or will be) loaded from. Relative
    /// content URLs are resolved against it.
    fn index_uri(&self) -> &Uri;

    /// One list of matching capabilities per requirement, aligned with
    /// `requirements`. Resources are interned into `arena` on first use.
    fn find_providers(
        &mut self,
        requirements: &[Requirement],
        arena: &mut ResourceArena,
    ) -> Result<Vec<Vec<Capability>>>;
}
