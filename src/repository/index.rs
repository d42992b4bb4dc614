//! Repository index documents.
//!
//! An index lists the resources a repository publishes. Documents are
//! validated against the embedded schema, then checked for a known schema
//! version and non-empty namespaces before the resources are handed out.

use crate::model::ResourceBuilder;
use crate::schema::IndexSchema;
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::Path;

#[derive(Clone, Debug, Deserialize)]
/// Parsed index document.
pub struct IndexDocument {
    pub schema_version: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub resources: Vec<ResourceBuilder>,
}

impl IndexDocument {
    /// Parse index bytes fetched from `source`.
    ///
    /// With `validate_schema` set the raw JSON is checked against the index
    /// schema first; the structural checks below always run.
    pub fn parse(bytes: &[u8], source: &str, validate_schema: bool) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes)
            .with_context(|| format!("parsing index {source}"))?;

        let schema = IndexSchema::load()?;
        if validate_schema {
            schema.validate(&value, source)?;
        }

        let document: IndexDocument = serde_json::from_value(value)
            .with_context(|| format!("decoding index {source}"))?;

        let allowed = schema.allowed_versions();
        if !allowed.contains(&document.schema_version) {
            bail!(
                "index {source}: schema_version '{}' not in allowed set {:?}",
                document.schema_version,
                allowed
            );
        }
        validate_resources(&document, source)?;
        Ok(document)
    }
}

fn validate_resources(document: &IndexDocument, source: &str) -> Result<()> {
    for (idx, resource) in document.resources.iter().enumerate() {
        if resource
            .capability_list()
            .iter()
            .any(|cap| cap.namespace().trim().is_empty())
        {
            bail!("index {source}: resource {idx} has a capability with an empty namespace");
        }
        if resource
            .requirement_list()
            .iter()
            .any(|req| req.namespace().trim().is_empty())
        {
            bail!("index {source}: resource {idx} has a requirement with an empty namespace");
        }
    }
    Ok(())
}

/// Read and validate an index document from disk.
pub fn load_index_from_path(path: &Path) -> Result<IndexDocument> {
    let data = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    IndexDocument::parse(&data, &path.display().to_string(), true)
}
