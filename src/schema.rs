//! Index document schema loading and validation.
//!
//! The schema ships inside the crate so repositories can be validated without
//! a checkout. `schema_version` is pinned by the schema's `const`; documents
//! declaring any other version are rejected before deserialization.

use anyhow::{Result, anyhow, bail};
use jsonschema::JSONSchema;
use serde_json::Value;
use std::collections::BTreeSet;

pub(crate) const MODULE_INDEX_SCHEMA: &str =
    include_str!("../schema/module_index.schema.json");

const SCHEMA_VERSION_POINTER: &str = "/properties/schema_version/const";

/// Compiled index schema plus the version it pins.
pub(crate) struct IndexSchema {
    pub schema_version: String,
    compiled: JSONSchema,
}

impl IndexSchema {
    pub fn load() -> Result<Self> {
        let raw: Value = serde_json::from_str(MODULE_INDEX_SCHEMA)
            .map_err(|err| anyhow!("parsing embedded index schema: {err}"))?;
        let schema_version = extract_schema_version(&raw, SCHEMA_VERSION_POINTER)
            .ok_or_else(|| anyhow!("index schema missing schema_version const"))?;
        let compiled = JSONSchema::compile(&raw)
            .map_err(|err| anyhow!("compiling embedded index schema: {err}"))?;
        Ok(Self {
            schema_version,
            compiled,
        })
    }

    pub fn allowed_versions(&self) -> BTreeSet<String> {
        BTreeSet::from_iter([self.schema_version.clone()])
    }

    /// Validate `document`, collecting every violation into one error.
    pub fn validate(&self, document: &Value, source: &str) -> Result<()> {
        if let Err(errors) = self.compiled.validate(document) {
            let details = errors
                .map(|err| format!("{} at {}", err, err.instance_path))
                .collect::<Vec<_>>()
                .join("\n");
            bail!("index {source} failed schema validation:\n{details}");
        }
        Ok(())
    }
}

fn extract_schema_version(schema: &Value, pointer: &str) -> Option<String> {
    let version = schema.pointer(pointer).and_then(Value::as_str)?;
    if version
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        Some(version.to_string())
    } else {
        None
    }
}
