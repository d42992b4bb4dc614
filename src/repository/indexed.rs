use crate::context::matches;
use crate::model::{Capability, Requirement, ResourceArena, ResourceRef};
use crate::repository::Repository;
use crate::repository::connector::ConnectorRegistry;
use crate::repository::index::IndexDocument;
use crate::uri::Uri;
use anyhow::Result;
use tracing::debug;

/// Repository backed by a JSON index fetched on first query.
pub struct IndexedRepository {
    index_uri: Uri,
    connectors: ConnectorRegistry,
    validate_schema: bool,
    loaded: Option<Vec<ResourceRef>>,
}

impl IndexedRepository {
    pub fn new(index_uri: Uri, connectors: ConnectorRegistry) -> Self {
        Self {
            index_uri,
            connectors,
            validate_schema: true,
            loaded: None,
        }
    }

    /// Toggle JSON schema validation of the fetched index.
    pub fn validate_schema(mut self, validate: bool) -> Self {
        self.validate_schema = validate;
        self
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    fn load(&mut self, arena: &mut ResourceArena) -> Result<&[ResourceRef]> {
        if self.loaded.is_none() {
            let bytes = self.connectors.fetch(&self.index_uri)?;
            let document =
                IndexDocument::parse(&bytes, &self.index_uri.to_string(), self.validate_schema)?;
            debug!(
                index = %self.index_uri,
                name = document.name.as_deref().unwrap_or(""),
                resources = document.resources.len(),
                "loaded repository index"
            );
            let handles = document
                .resources
                .into_iter()
                .map(|builder| arena.insert(builder))
                .collect();
            self.loaded = Some(handles);
        }
        Ok(self.loaded.as_deref().unwrap_or_default())
    }
}

impl Repository for IndexedRepository {
    fn index_uri(&self) -> &Uri {
        &self.index_uri
    }

    fn find_providers(
        &mut self,
        requirements: &[Requirement],
        arena: &mut ResourceArena,
    ) -> Result<Vec<Vec<Capability>>> {
        let handles = self.load(arena)?.to_vec();
        let providers = requirements
            .iter()
            .map(|requirement| {
                handles
                    .iter()
                    .filter_map(|handle| arena.get(*handle))
                    .flat_map(|resource| resource.capabilities(Some(requirement.namespace())))
                    .filter(|capability| matches(requirement, capability))
                    .cloned()
                    .collect()
            })
            .collect();
        Ok(providers)
    }
}
