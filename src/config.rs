//! Resolver configuration.
//!
//! Hosts hand configuration over as a flat property map (`key → JSON value`).
//! Property keys map onto struct field names by dropping the optional
//! `prefix.`, then replacing `_` with `__` and `.` with `_`, so
//! `default.indexes` fills `default_indexes` and `my__key` fills `my_key`.
//! Keys that name no field are ignored.

use crate::model::names;
use crate::uri::Uri;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Indexes consulted by every request, after the request's own.
    pub default_indexes: Vec<Uri>,
    /// Content mime type whose `url` is reported as a resource location.
    pub content_mime_type: String,
    /// Check fetched indexes against the embedded JSON schema.
    pub validate_indexes: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            default_indexes: Vec::new(),
            content_mime_type: names::MIME_BUNDLE.to_string(),
            validate_indexes: true,
        }
    }
}

/// Property key for a struct field: `__` becomes `_`, `_` becomes `.`.
pub fn property_key(field: &str, prefix: Option<&str>) -> String {
    let mut key = String::with_capacity(field.len());
    let mut chars = field.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '_' {
            if chars.peek() == Some(&'_') {
                chars.next();
                key.push('_');
            } else {
                key.push('.');
            }
        } else {
            key.push(c);
        }
    }
    match prefix {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}.{key}"),
        _ => key,
    }
}

/// Field name for a property key, or `None` when the key lies outside
/// `prefix`.
pub fn field_name(key: &str, prefix: Option<&str>) -> Option<String> {
    let local = match prefix {
        Some(prefix) if !prefix.is_empty() => key.strip_prefix(prefix)?.strip_prefix('.')?,
        _ => key,
    };
    Some(local.replace('_', "__").replace('.', "_"))
}

/// Deserialize `T` from a flat property map.
pub fn from_properties<T: DeserializeOwned>(
    properties: &BTreeMap<String, Value>,
    prefix: Option<&str>,
) -> Result<T> {
    let mut fields = Map::new();
    for (key, value) in properties {
        if let Some(field) = field_name(key, prefix) {
            fields.insert(field, value.clone());
        }
    }
    serde_json::from_value(Value::Object(fields)).context("decoding configuration properties")
}

/// Read a flat JSON property map from `path` and decode it.
pub fn load_config_from_path<T: DeserializeOwned>(path: &Path, prefix: Option<&str>) -> Result<T> {
    let data = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let properties: BTreeMap<String, Value> = serde_json::from_str(&data)
        .with_context(|| format!("parsing {} as a property map", path.display()))?;
    from_properties(&properties, prefix)
        .with_context(|| format!("loading configuration from {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn key_mangling_round_trips() {
        assert_eq!(field_name("default.indexes", None).as_deref(), Some("default_indexes"));
        assert_eq!(field_name("my_key", None).as_deref(), Some("my__key"));
        assert_eq!(
            field_name("resolver.validate.indexes", Some("resolver")).as_deref(),
            Some("validate_indexes")
        );
        assert_eq!(field_name("other.validate.indexes", Some("resolver")), None);
        assert_eq!(field_name("resolverx", Some("resolver")), None);

        assert_eq!(property_key("default_indexes", None), "default.indexes");
        assert_eq!(property_key("my__key", None), "my_key");
        assert_eq!(
            property_key("content_mime_type", Some("resolver")),
            "resolver.content.mime.type"
        );
    }

    #[test]
    fn properties_fill_config_and_ignore_unknown_keys() -> Result<()> {
        let properties = BTreeMap::from([
            ("resolver.default.indexes".to_string(), json!(["file:/repo/index.json"])),
            ("resolver.validate.indexes".to_string(), json!(false)),
            ("resolver.unused".to_string(), json!(42)),
            ("elsewhere.content.mime.type".to_string(), json!("text/plain")),
        ]);
        let config: ResolverConfig = from_properties(&properties, Some("resolver"))?;
        assert_eq!(config.default_indexes, vec![Uri::parse("file:/repo/index.json")?]);
        assert!(!config.validate_indexes);
        assert_eq!(config.content_mime_type, names::MIME_BUNDLE);
        Ok(())
    }

    #[test]
    fn empty_properties_give_defaults() -> Result<()> {
        let config: ResolverConfig = from_properties(&BTreeMap::new(), None)?;
        assert_eq!(config, ResolverConfig::default());
        Ok(())
    }

    #[test]
    fn loads_from_disk_and_reports_bad_values() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        write!(file, r#"{{"content.mime.type": "application/zip"}}"#)?;
        file.flush()?;
        let config: ResolverConfig = load_config_from_path(file.path(), None)?;
        assert_eq!(config.content_mime_type, "application/zip");

        let mut bad = NamedTempFile::new()?;
        write!(bad, r#"{{"validate.indexes": "sometimes"}}"#)?;
        bad.flush()?;
        let err = load_config_from_path::<ResolverConfig>(bad.path(), None)
            .expect_err("string is not a bool");
        assert!(format!("{err:#}").contains("loading configuration"));
        Ok(())
    }
}
