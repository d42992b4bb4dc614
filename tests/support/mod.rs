use anyhow::{Context, Result};
use modresolve::{Uri, UrlConnector};
use serde_json::{Value, json};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// `file:` URI for an absolute local path.
pub fn file_uri(path: &Path) -> Uri {
    Uri::from_file_path(path).expect("temp paths are absolute")
}

/// Write an index document listing `resources` to `dir/relative` and return
/// its URI.
pub fn write_index(dir: &Path, relative: &str, resources: Vec<Value>) -> Result<Uri> {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let document = index_document(resources);
    fs::write(&path, serde_json::to_vec_pretty(&document)?)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(file_uri(&path))
}

/// Write a zip archive at `path` holding a single stored entry.
pub fn write_archive(path: &Path, entry: &str, body: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    writer.start_file(entry, options)?;
    writer.write_all(body)?;
    writer.finish()?;
    Ok(())
}

pub fn index_document(resources: Vec<Value>) -> Value {
    json!({
        "schema_version": "module_index_v1",
        "resources": resources,
    })
}

/// Index entry for a bundle exporting package `name`, with `requires` as
/// package filters.
pub fn bundle(name: &str, version: &str, url: &str, requires: &[&str]) -> Value {
    let requirements: Vec<Value> = requires
        .iter()
        .map(|filter| json!({"namespace": "pkg", "directives": {"filter": filter}}))
        .collect();
    json!({
        "capabilities": [
            {
                "namespace": "osgi.identity",
                "attributes": {
                    "osgi.identity": name,
                    "version": {"type": "Version", "value": version}
                }
            },
            {
                "namespace": "osgi.content",
                "attributes": {
                    "osgi.content": format!("sha256-{name}"),
                    "mime": "application/vnd.osgi.bundle",
                    "url": url,
                    "size": 1024
                }
            },
            {
                "namespace": "pkg",
                "attributes": {"name": name, "version": {"type": "Version", "value": version}}
            }
        ],
        "requirements": requirements,
    })
}

/// Connector serving one fixed document and counting fetches.
pub struct CountingConnector {
    body: Vec<u8>,
    fetches: AtomicUsize,
}

impl CountingConnector {
    pub fn new(document: &Value) -> Self {
        Self {
            body: serde_json::to_vec(document).expect("index serializes"),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl UrlConnector for CountingConnector {
    fn fetch(&self, _uri: &Uri) -> Result<Vec<u8>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.body.clone())
    }
}
