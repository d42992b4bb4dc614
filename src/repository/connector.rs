//! URL connectors used by repositories to fetch index documents.
//!
//! Connectors are looked up by URI scheme in a `ConnectorRegistry`. The
//! registry is shared between the resolver and every repository it creates,
//! so registration and lookup both go through one mutex.

use crate::uri::{Uri, jar_parts};
use anyhow::{Context, Result, anyhow, bail};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::debug;
use zip::ZipArchive;

/// Blocking fetch of the bytes behind a URI.
pub trait UrlConnector: Send + Sync {
    fn fetch(&self, uri: &Uri) -> Result<Vec<u8>>;
}

/// Serves `file:` URIs from the local filesystem.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileConnector;

impl FileConnector {
    /// Local path named by a `file:` URI.
    pub fn path_of(uri: &Uri) -> Result<PathBuf> {
        let url = uri
            .as_url()
            .filter(|url| url.scheme() == "file" && !url.cannot_be_a_base())
            .ok_or_else(|| anyhow!("not a hierarchical file URI: {uri}"))?;
        url.to_file_path()
            .map_err(|()| anyhow!("file URI does not name a local path: {uri}"))
    }
}

impl UrlConnector for FileConnector {
    fn fetch(&self, uri: &Uri) -> Result<Vec<u8>> {
        let path = FileConnector::path_of(uri)?;
        fs::read(&path).with_context(|| format!("reading {}", path.display()))
    }
}

/// Serves `jar:file:<archive>!/<entry>` URIs by reading the entry out of a
/// local zip archive.
#[derive(Clone, Copy, Debug, Default)]
pub struct JarConnector;

impl UrlConnector for JarConnector {
    fn fetch(&self, uri: &Uri) -> Result<Vec<u8>> {
        let (outer, inner) =
            jar_parts(uri).ok_or_else(|| anyhow!("not a jar URI with an entry path: {uri}"))?;
        let entry = inner.trim_start_matches('/');
        if entry.is_empty() {
            bail!("jar URI names no archive entry: {uri}");
        }
        let archive_path = FileConnector::path_of(&Uri::parse(outer)?)
            .with_context(|| format!("locating archive of {uri}"))?;
        let file = File::open(&archive_path)
            .with_context(|| format!("opening {}", archive_path.display()))?;
        let mut archive = ZipArchive::new(file)
            .with_context(|| format!("reading archive {}", archive_path.display()))?;
        let mut entry_reader = archive
            .by_name(entry)
            .with_context(|| format!("no entry '{entry}' in {}", archive_path.display()))?;
        let mut bytes = Vec::new();
        entry_reader
            .read_to_end(&mut bytes)
            .with_context(|| format!("extracting '{entry}' from {}", archive_path.display()))?;
        Ok(bytes)
    }
}

/// Scheme → connector map behind a single coarse lock.
#[derive(Clone, Default)]
pub struct ConnectorRegistry {
    connectors: Arc<Mutex<BTreeMap<String, Arc<dyn UrlConnector>>>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `file` and `jar` connectors.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register("file", Arc::new(FileConnector));
        registry.register("jar", Arc::new(JarConnector));
        registry
    }

    /// Register `connector` for `scheme`, returning the one it replaced.
    pub fn register(
        &self,
        scheme: &str,
        connector: Arc<dyn UrlConnector>,
    ) -> Option<Arc<dyn UrlConnector>> {
        let mut guard = self
            .connectors
            .lock()
            .unwrap_or_else(|err| err.into_inner());
        guard.insert(scheme.to_ascii_lowercase(), connector)
    }

    pub fn lookup(&self, scheme: &str) -> Option<Arc<dyn UrlConnector>> {
        let guard = self
            .connectors
            .lock()
            .unwrap_or_else(|err| err.into_inner());
        guard.get(&scheme.to_ascii_lowercase()).cloned()
    }

    pub fn schemes(&self) -> Vec<String> {
        let guard = self
            .connectors
            .lock()
            .unwrap_or_else(|err| err.into_inner());
        guard.keys().cloned().collect()
    }

    /// Fetch `uri` with the connector registered for its scheme.
    ///
    /// The lock is released before the fetch runs.
    pub fn fetch(&self, uri: &Uri) -> Result<Vec<u8>> {
        let scheme = uri
            .scheme()
            .ok_or_else(|| anyhow!("cannot fetch relative URI {uri}"))?;
        let connector = self.lookup(scheme).ok_or_else(|| {
            anyhow!(
                "no connector registered for scheme '{scheme}' (fetching {uri}); known schemes: {:?}",
                self.schemes()
            )
        })?;
        debug!(%uri, "fetching");
        connector.fetch(uri).with_context(|| format!("fetching {uri}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::Path;
    use tempfile::{NamedTempFile, TempDir};
    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    struct Fixed(&'static [u8]);

    impl UrlConnector for Fixed {
        fn fetch(&self, _uri: &Uri) -> Result<Vec<u8>> {
            Ok(self.0.to_vec())
        }
    }

    #[test]
    fn file_connector_reads_local_files() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        file.write_all(b"payload")?;
        let uri = Uri::from_file_path(file.path())?;
        let registry = ConnectorRegistry::with_defaults();
        assert_eq!(registry.fetch(&uri)?, b"payload");
        Ok(())
    }

    #[test]
    fn registration_replaces_and_is_case_insensitive() -> Result<()> {
        let registry = ConnectorRegistry::new();
        assert!(registry.register("MEM", Arc::new(Fixed(b"one"))).is_none());
        assert!(registry.register("mem", Arc::new(Fixed(b"two"))).is_some());
        assert_eq!(registry.fetch(&Uri::parse("mem:anything")?)?, b"two");
        assert_eq!(registry.schemes(), vec!["mem".to_string()]);
        Ok(())
    }

    #[test]
    fn clones_share_registrations() -> Result<()> {
        let registry = ConnectorRegistry::new();
        let clone = registry.clone();
        clone.register("mem", Arc::new(Fixed(b"shared")));
        assert!(registry.lookup("mem").is_some());
        Ok(())
    }

    #[test]
    fn unknown_scheme_and_relative_uris_fail() {
        let registry = ConnectorRegistry::with_defaults();
        let err = registry
            .fetch(&Uri::parse("http://example.com/index.json").unwrap())
            .expect_err("no http connector");
        assert!(err.to_string().contains("no connector registered for scheme 'http'"));
        assert!(registry.fetch(&Uri::parse("relative.json").unwrap()).is_err());
    }

    #[test]
    fn file_paths_are_percent_decoded() -> Result<()> {
        let uri = Uri::parse("file:/tmp/with%20space/index.json")?;
        assert_eq!(
            FileConnector::path_of(&uri)?,
            PathBuf::from("/tmp/with space/index.json")
        );
        assert!(FileConnector::path_of(&Uri::parse("file://remote/x")?).is_err());
        assert!(FileConnector::path_of(&Uri::parse("http://host/x")?).is_err());
        Ok(())
    }

    fn write_archive(path: &Path, entries: &[(&str, &[u8])]) -> Result<()> {
        let mut writer = ZipWriter::new(File::create(path)?);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, body) in entries {
            writer.start_file(*name, options)?;
            writer.write_all(body)?;
        }
        writer.finish()?;
        Ok(())
    }

    #[test]
    fn jar_connector_reads_archive_entries() -> Result<()> {
        let dir = TempDir::new()?;
        let archive = dir.path().join("repo.jar");
        write_archive(
            &archive,
            &[("index.json", b"{}"), ("META-INF/nested.json", b"nested")],
        )?;
        let outer = Uri::from_file_path(&archive)?;
        let registry = ConnectorRegistry::with_defaults();

        let top = Uri::parse(&format!("jar:{outer}!/index.json"))?;
        assert_eq!(registry.fetch(&top)?, b"{}");
        let nested = Uri::parse(&format!("jar:{outer}!/META-INF/nested.json?navigate=false"))?;
        assert_eq!(registry.fetch(&nested)?, b"nested");

        let missing = Uri::parse(&format!("jar:{outer}!/absent.json"))?;
        let err = registry.fetch(&missing).expect_err("entry is absent");
        assert!(format!("{err:#}").contains("no entry 'absent.json'"));
        assert!(registry.fetch(&Uri::parse(&format!("jar:{outer}!/"))?).is_err());
        Ok(())
    }
}
