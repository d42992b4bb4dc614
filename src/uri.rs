//! URI references and relative resolution.
//!
//! Absolute URIs are `url::Url` values and hierarchical bases resolve through
//! `Url::join`. Relative references stay as text until they are resolved.
//! `jar:` URIs are opaque (`jar:<outer>!<inner path>`), so relative references
//! against them are resolved inside the inner path. A `..` that climbs above
//! the archive root leaves the archive and continues against the outer
//! artifact, unless the base carries a `navigate=false` query flag, in which
//! case it is an error.

use crate::error::UriError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use url::Url;

const JAR_SCHEME: &str = "jar";
const NAVIGATE_FALSE: &str = "navigate=false";

/// An absolute URI or a relative reference.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Uri(Repr);

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum Repr {
    Absolute(Url),
    Reference(String),
}

impl Uri {
    pub fn parse(input: &str) -> Result<Self, UriError> {
        if let Some(bad) = input.chars().find(|c| c.is_whitespace() || c.is_control()) {
            return Err(syntax(input, &format!("illegal character {bad:?}")));
        }
        match Url::parse(input) {
            Ok(url) if url.cannot_be_a_base() && url.path().is_empty() => {
                Err(syntax(input, "expected scheme-specific part"))
            }
            Ok(url) => Ok(Uri(Repr::Absolute(url))),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                Ok(Uri(Repr::Reference(input.to_string())))
            }
            Err(err) => Err(syntax(input, &err.to_string())),
        }
    }

    /// `file:` URI for an absolute local path.
    pub fn from_file_path(path: &Path) -> Result<Self, UriError> {
        Url::from_file_path(path)
            .map(|url| Uri(Repr::Absolute(url)))
            .map_err(|()| syntax(&path.display().to_string(), "not an absolute path"))
    }

    pub fn scheme(&self) -> Option<&str> {
        self.as_url().map(Url::scheme)
    }

    /// Underlying URL of an absolute URI.
    pub fn as_url(&self) -> Option<&Url> {
        match &self.0 {
            Repr::Absolute(url) => Some(url),
            Repr::Reference(_) => None,
        }
    }

    /// Everything after `scheme:` up to the fragment, for opaque URIs.
    pub fn scheme_specific_part(&self) -> Option<&str> {
        let url = self.as_url().filter(|url| url.cannot_be_a_base())?;
        let rest = &url.as_str()[url.scheme().len() + 1..];
        Some(rest.split_once('#').map_or(rest, |(ssp, _)| ssp))
    }

    pub fn is_absolute(&self) -> bool {
        matches!(self.0, Repr::Absolute(_))
    }

    pub fn is_opaque(&self) -> bool {
        self.as_url().is_some_and(Url::cannot_be_a_base)
    }

    fn is_jar(&self) -> bool {
        self.scheme() == Some(JAR_SCHEME)
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Repr::Absolute(url) => f.write_str(url.as_str()),
            Repr::Reference(reference) => f.write_str(reference),
        }
    }
}

impl FromStr for Uri {
    type Err = UriError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Uri::parse(input)
    }
}

impl Serialize for Uri {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Uri {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Uri::parse(&value).map_err(serde::de::Error::custom)
    }
}

/// Outer artifact and inner path (query stripped) of a `jar:` URI.
pub fn jar_parts(uri: &Uri) -> Option<(&str, &str)> {
    if !uri.is_jar() {
        return None;
    }
    let (outer, inner) = uri.scheme_specific_part()?.rsplit_once('!')?;
    Some((outer, inner.split_once('?').map_or(inner, |(path, _)| path)))
}

/// Resolve `reference` against `base`, with `jar:` container support.
///
/// A `!` in a relative reference splits it into an outer part, resolved
/// against `base`, and an inner path that is re-attached as
/// `jar:<resolved>!<inner>`.
pub fn resolve(base: &Uri, reference: &Uri) -> Result<Uri, UriError> {
    let raw = match &reference.0 {
        Repr::Absolute(_) => return Ok(reference.clone()),
        Repr::Reference(raw) => raw.as_str(),
    };
    let (outer, inner) = match raw.split_once('!') {
        Some((outer, inner)) => (outer, Some(inner)),
        None => (raw, None),
    };

    let resolved = match &base.0 {
        Repr::Absolute(url) if !url.cannot_be_a_base() => url
            .join(outer)
            .map(|url| Uri(Repr::Absolute(url)))
            .map_err(|err| syntax(outer, &err.to_string()))?,
        Repr::Absolute(_) if base.is_jar() => resolve_in_jar(base, outer)?,
        Repr::Absolute(_) => {
            return Err(UriError::OpaqueBase {
                base: base.to_string(),
                reference: raw.to_string(),
            });
        }
        Repr::Reference(_) => {
            return Err(UriError::RelativeBase {
                base: base.to_string(),
                reference: raw.to_string(),
            });
        }
    };

    match inner {
        Some(inner) => Uri::parse(&format!("jar:{resolved}!{inner}")),
        None => Ok(resolved),
    }
}

/// Parse and resolve in one step.
pub fn resolve_str(base: &Uri, reference: &str) -> Result<Uri, UriError> {
    resolve(base, &Uri::parse(reference)?)
}

fn resolve_in_jar(base: &Uri, reference: &str) -> Result<Uri, UriError> {
    let ssp = base.scheme_specific_part().unwrap_or_default();
    let (outer_raw, inner_raw) = ssp
        .rsplit_once('!')
        .ok_or_else(|| syntax(&base.to_string(), "jar URI is missing the '!' separator"))?;
    let outer_artifact = Uri::parse(outer_raw)?;
    let (base_path, base_query) = match inner_raw.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (inner_raw, None),
    };
    let navigate = !base_query.is_some_and(|query| {
        query.split('&').any(|param| param.trim() == NAVIGATE_FALSE)
    });

    // Network-path references name another host; they only make sense
    // against the outer artifact.
    if reference.starts_with("//") {
        return resolve(&outer_artifact, &Uri::parse(reference)?);
    }

    let (rest, fragment) = match reference.split_once('#') {
        Some((rest, fragment)) => (rest, Some(fragment)),
        None => (reference, None),
    };
    let (path, query) = match rest.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (rest, None),
    };

    let mut suffix = String::new();
    if let Some(fragment) = fragment {
        suffix.push('#');
        suffix.push_str(fragment);
    }

    if path.is_empty() {
        let query = match query.or(base_query) {
            Some(query) => format!("?{query}"),
            None => String::new(),
        };
        return Uri::parse(&format!("jar:{outer_raw}!{base_path}{query}{suffix}"));
    }

    let base_dir = match base_path.rfind('/') {
        Some(idx) => &base_path[..=idx],
        None => "",
    };
    let mut segments: Vec<&str> = if path.starts_with('/') {
        Vec::new()
    } else {
        base_dir.split('/').filter(|s| !s.is_empty()).collect()
    };

    let mut escapes = 0usize;
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    if !navigate {
                        return Err(UriError::NavigationOutsideArchive {
                            base: base.to_string(),
                            reference: reference.to_string(),
                        });
                    }
                    escapes += 1;
                }
            }
            other => segments.push(other),
        }
    }

    let names_directory = path.ends_with('/')
        || path
            .rsplit('/')
            .next()
            .is_some_and(|last| last == "." || last == "..");
    let trailing = if names_directory && !segments.is_empty() {
        "/"
    } else {
        ""
    };

    if escapes > 0 {
        // The archive root sits where the archive file does, so the first
        // `..` is consumed by leaving the archive.
        let mut parts: Vec<&str> = vec![".."; escapes - 1];
        parts.extend(segments.iter().copied());
        let mut relative = if parts.is_empty() {
            "./".to_string()
        } else {
            format!("{}{trailing}", parts.join("/"))
        };
        if let Some(query) = query {
            relative.push('?');
            relative.push_str(query);
        }
        relative.push_str(&suffix);
        return resolve(&outer_artifact, &Uri::parse(&relative)?);
    }

    if segments.is_empty() {
        return Ok(outer_artifact);
    }

    let mut params: Vec<&str> = query.into_iter().collect();
    if !navigate && !params.iter().any(|param| param.split('&').any(|p| p == NAVIGATE_FALSE)) {
        params.push(NAVIGATE_FALSE);
    }
    let query = if params.is_empty() {
        String::new()
    } else {
        format!("?{}", params.join("&"))
    };
    Uri::parse(&format!(
        "jar:{outer_raw}!/{}{trailing}{query}{suffix}",
        segments.join("/")
    ))
}

/// Last path segment of `uri`, looking inside the inner path of `jar:` URIs.
pub fn file_name(uri: &Uri) -> Option<String> {
    let last = if let Some((_, inner)) = jar_parts(uri) {
        inner.rsplit('/').next()
    } else {
        match &uri.0 {
            Repr::Absolute(url) => url.path_segments()?.next_back(),
            Repr::Reference(raw) => {
                let path = raw.split(['?', '#']).next().unwrap_or_default();
                path.rsplit('/').next()
            }
        }
    };
    last.filter(|name| !name.is_empty()).map(str::to_string)
}

fn syntax(input: &str, reason: &str) -> UriError {
    UriError::Syntax {
        input: input.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> Uri {
        Uri::parse(s).unwrap_or_else(|err| panic!("{s}: {err}"))
    }

    fn resolved(base: &str, reference: &str) -> String {
        resolve_str(&uri(base), reference)
            .unwrap_or_else(|err| panic!("{reference} against {base}: {err}"))
            .to_string()
    }

    #[test]
    fn parse_keeps_references_and_normalizes_urls() {
        for raw in [
            "http://host:8080/a/b?x=1#frag",
            "file:///tmp/index.json",
            "jar:file:/x.jar!/a/c.txt",
            "relative/path.txt",
            "../up",
            "",
        ] {
            assert_eq!(uri(raw).to_string(), raw);
        }
        assert_eq!(uri("file:/tmp/index.json"), uri("file:///tmp/index.json"));
        let jar = uri("jar:file:/x.jar!/a/c.txt?navigate=false#top");
        assert!(jar.is_absolute());
        assert!(jar.is_opaque());
        assert_eq!(
            jar.scheme_specific_part(),
            Some("file:/x.jar!/a/c.txt?navigate=false")
        );
        assert_eq!(jar_parts(&jar), Some(("file:/x.jar", "/a/c.txt")));
        assert!(!uri("b.txt").is_absolute());
        assert!(uri("b.txt").as_url().is_none());
        assert!(Uri::parse("has space").is_err());
        assert!(Uri::parse("mailto:").is_err());
    }

    #[test]
    fn file_paths_convert_to_file_uris() {
        let uri = Uri::from_file_path(Path::new("/tmp/with space/index.json")).unwrap();
        assert_eq!(uri.to_string(), "file:///tmp/with%20space/index.json");
        assert!(Uri::from_file_path(Path::new("relative/index.json")).is_err());
    }

    #[test]
    fn rfc3986_normal_examples() {
        let base = "http://a/b/c/d;p?q";
        let cases = [
            ("g", "http://a/b/c/g"),
            ("./g", "http://a/b/c/g"),
            ("g/", "http://a/b/c/g/"),
            ("/g", "http://a/g"),
            ("//g", "http://g/"),
            ("?y", "http://a/b/c/d;p?y"),
            ("g?y", "http://a/b/c/g?y"),
            ("#s", "http://a/b/c/d;p?q#s"),
            ("g#s", "http://a/b/c/g#s"),
            (";x", "http://a/b/c/;x"),
            ("", "http://a/b/c/d;p?q"),
            (".", "http://a/b/c/"),
            ("./", "http://a/b/c/"),
            ("..", "http://a/b/"),
            ("../", "http://a/b/"),
            ("../g", "http://a/b/g"),
            ("../..", "http://a/"),
            ("../../", "http://a/"),
            ("../../g", "http://a/g"),
            ("../../../g", "http://a/g"),
            ("g/./h/../i", "http://a/b/c/g/i"),
        ];
        for (reference, expected) in cases {
            assert_eq!(resolved(base, reference), expected, "reference {reference}");
        }
    }

    #[test]
    fn absolute_reference_is_returned_unchanged() {
        assert_eq!(
            resolved("jar:file:/x.jar!/a/c.txt", "file:///other/y.jar"),
            "file:///other/y.jar"
        );
        assert_eq!(
            resolved("http://repo/index.json", "jar:file:/y.jar!/z"),
            "jar:file:/y.jar!/z"
        );
    }

    #[test]
    fn resolves_sibling_inside_jar() {
        assert_eq!(
            resolved("jar:file:/x.jar!/a/c.txt", "b.txt"),
            "jar:file:/x.jar!/a/b.txt"
        );
        assert_eq!(
            resolved("jar:file:/x.jar!/a/c.txt", "sub/d.txt"),
            "jar:file:/x.jar!/a/sub/d.txt"
        );
        assert_eq!(
            resolved("jar:file:/x.jar!/a/b/c.txt", "../d.txt"),
            "jar:file:/x.jar!/a/d.txt"
        );
        assert_eq!(
            resolved("jar:file:/x.jar!/a/c.txt", "/top.txt"),
            "jar:file:/x.jar!/top.txt"
        );
    }

    #[test]
    fn empty_and_dot_references_inside_jar() {
        assert_eq!(
            resolved("jar:file:/x.jar!/a/c.txt", ""),
            "jar:file:/x.jar!/a/c.txt"
        );
        assert_eq!(
            resolved("jar:file:/x.jar!/a/c.txt", "#part"),
            "jar:file:/x.jar!/a/c.txt#part"
        );
        assert_eq!(resolved("jar:file:/x.jar!/a/c.txt", "."), "jar:file:/x.jar!/a/");
        assert_eq!(resolved("jar:file:/x.jar!/a/b/c.txt", ".."), "jar:file:/x.jar!/a/");
        assert_eq!(
            resolved("jar:file:/x.jar!/a/c.txt", "d?v=1"),
            "jar:file:/x.jar!/a/d?v=1"
        );
    }

    #[test]
    fn network_path_against_jar_uses_outer_artifact() {
        assert_eq!(resolved("jar:file:/x.jar!/a/c.txt", "//host/y"), "file://host/y");
    }

    #[test]
    fn climbing_to_jar_root_yields_outer_artifact() {
        assert_eq!(resolved("jar:file:/x.jar!/a/c.txt", "../"), "file:///x.jar");
    }

    #[test]
    fn escaping_the_jar_resolves_against_outer_artifact() {
        assert_eq!(resolved("jar:file:/x.jar!/a/c.txt", "../../x"), "file:///x");
        assert_eq!(uri(&resolved("jar:file:/x.jar!/a/c.txt", "../../x")), uri("file:/x"));
        assert_eq!(
            resolved("jar:file:/repo/deploy/x.jar!/a/c.txt", "../../../lib/y.jar"),
            "file:///repo/lib/y.jar"
        );
        assert_eq!(
            resolved("jar:file:/repo/x.jar!/index.json", "../"),
            "file:///repo/"
        );
    }

    #[test]
    fn navigate_false_forbids_escaping() {
        let base = uri("jar:file:/x.jar!/a/c.txt?navigate=false");
        let err = resolve_str(&base, "../../x").expect_err("escape must fail");
        assert!(matches!(err, UriError::NavigationOutsideArchive { .. }));
        assert_eq!(
            resolve_str(&base, "../b.txt").unwrap().to_string(),
            "jar:file:/x.jar!/b.txt?navigate=false"
        );
    }

    #[test]
    fn navigate_false_survives_repeated_resolution() {
        let base = uri("jar:file:/x.jar!/a/b/c.txt?navigate=false");
        let first = resolve_str(&base, "d.txt").unwrap();
        assert_eq!(first.to_string(), "jar:file:/x.jar!/a/b/d.txt?navigate=false");
        let second = resolve_str(&first, "../e.txt?v=2").unwrap();
        assert_eq!(second.to_string(), "jar:file:/x.jar!/a/e.txt?v=2&navigate=false");
        let err = resolve_str(&second, "../../f.txt").expect_err("still confined");
        assert!(matches!(err, UriError::NavigationOutsideArchive { .. }));
    }

    #[test]
    fn inner_path_in_reference_is_rewrapped() {
        assert_eq!(
            resolved("file:/repo/index.json", "nested.jar!/META-INF/index.json"),
            "jar:file:///repo/nested.jar!/META-INF/index.json"
        );
        assert_eq!(
            resolved("jar:file:/x.jar!/lib/index.json", "inner.jar!/a.txt"),
            "jar:jar:file:/x.jar!/lib/inner.jar!/a.txt"
        );
    }

    #[test]
    fn opaque_and_relative_bases_are_rejected() {
        let err = resolve_str(&uri("mailto:someone@example.com"), "x").expect_err("opaque");
        assert!(matches!(err, UriError::OpaqueBase { .. }));
        let err = resolve_str(&uri("dir/index.json"), "x").expect_err("relative");
        assert!(matches!(err, UriError::RelativeBase { .. }));
    }

    #[test]
    fn file_name_understands_jar_inner_paths() {
        assert_eq!(file_name(&uri("jar:file:/x.jar!/a/c.txt")).as_deref(), Some("c.txt"));
        assert_eq!(file_name(&uri("file:/tmp/a.jar")).as_deref(), Some("a.jar"));
        assert_eq!(
            file_name(&uri("http://host/b.jar?download=1")).as_deref(),
            Some("b.jar")
        );
        assert_eq!(file_name(&uri("lib/c.jar#x")).as_deref(), Some("c.jar"));
        assert_eq!(file_name(&uri("http://host/dir/")), None);
        assert_eq!(file_name(&uri("mailto:x@y")), None);
    }

    #[test]
    fn uri_serializes_as_string() {
        let parsed: Uri = serde_json::from_str("\"jar:file:/x.jar!/i.json\"").unwrap();
        assert!(parsed.is_opaque());
        assert_eq!(
            serde_json::to_string(&parsed).unwrap(),
            "\"jar:file:/x.jar!/i.json\""
        );
    }
}
