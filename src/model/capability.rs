use crate::model::attribute::AttributeValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Well-known namespaces, directive names and attribute names.
pub mod names {
    pub const IDENTITY_NAMESPACE: &str = "osgi.identity";
    pub const CONTENT_NAMESPACE: &str = "osgi.content";
    /// Private namespace marking the synthetic initial resource.
    pub const INITIAL_MARKER_NAMESPACE: &str = "__initial";

    pub const FILTER_DIRECTIVE: &str = "filter";
    pub const EFFECTIVE_DIRECTIVE: &str = "effective";
    pub const RESOLUTION_DIRECTIVE: &str = "resolution";
    pub const EFFECTIVE_RESOLVE: &str = "resolve";
    pub const RESOLUTION_OPTIONAL: &str = "optional";

    pub const VERSION_ATTRIBUTE: &str = "version";
    pub const CONTENT_MIME_ATTRIBUTE: &str = "mime";
    pub const CONTENT_URL_ATTRIBUTE: &str = "url";

    pub const MIME_BUNDLE: &str = "application/vnd.osgi.bundle";
}

/// Handle of a module loaded in the host registry.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(pub u64);

/// Handle of a resource stored in a session's `ResourceArena`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ResourceId(pub(crate) usize);

/// Identity of a resource. Two resources are the same only if their handles
/// are equal; structurally identical resources stay distinct.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum ResourceRef {
    Module(ModuleId),
    Arena(ResourceId),
}

impl ResourceRef {
    pub fn is_module(&self) -> bool {
        matches!(self, ResourceRef::Module(_))
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceRef::Module(id) => write!(f, "module#{}", id.0),
            ResourceRef::Arena(id) => write!(f, "resource#{}", id.0),
        }
    }
}

/// Something a resource offers, e.g. an exported package.
///
/// Capabilities are immutable once built. `copy_to` is the only way to attach
/// one to a different resource and always yields a fresh instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    namespace: String,
    #[serde(default)]
    directives: BTreeMap<String, String>,
    #[serde(default)]
    attributes: BTreeMap<String, AttributeValue>,
    #[serde(skip)]
    owner: Option<ResourceRef>,
}

impl Capability {
    /// Unowned capability in `namespace` with no directives or attributes.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            directives: BTreeMap::new(),
            attributes: BTreeMap::new(),
            owner: None,
        }
    }

    /// Set directive `name`, replacing any previous value.
    pub fn with_directive(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.directives.insert(name.into(), value.into());
        self
    }

    /// Set attribute `name`, replacing any previous value.
    pub fn with_attribute(
        mut self,
        name: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Same namespace, directives and attributes, owned by `owner`.
    pub fn copy_to(&self, owner: ResourceRef) -> Self {
        Self {
            namespace: self.namespace.clone(),
            directives: self.directives.clone(),
            attributes: self.attributes.clone(),
            owner: Some(owner),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn directives(&self) -> &BTreeMap<String, String> {
        &self.directives
    }

    pub fn directive(&self, name: &str) -> Option<&str> {
        self.directives.get(name).map(String::as_str)
    }

    pub fn attributes(&self) -> &BTreeMap<String, AttributeValue> {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    pub fn owner(&self) -> Option<ResourceRef> {
        self.owner
    }

    pub fn effective(&self) -> Option<&str> {
        self.directive(names::EFFECTIVE_DIRECTIVE)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.namespace)?;
        for (name, value) in &self.attributes {
            write!(f, " {name}={value:?}")?;
        }
        Ok(())
    }
}

/// Something a resource needs, narrowed by an optional LDAP `filter`
/// directive evaluated against candidate capability attributes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    namespace: String,
    #[serde(default)]
    directives: BTreeMap<String, String>,
    #[serde(default)]
    attributes: BTreeMap<String, AttributeValue>,
    #[serde(skip)]
    owner: Option<ResourceRef>,
}

impl Requirement {
    /// Unowned, unfiltered requirement in `namespace`.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            directives: BTreeMap::new(),
            attributes: BTreeMap::new(),
            owner: None,
        }
    }

    /// Shorthand for a requirement carrying only a filter directive.
    pub fn with_filter(namespace: impl Into<String>, filter: impl Into<String>) -> Self {
        Self::new(namespace).with_directive(names::FILTER_DIRECTIVE, filter)
    }

    /// Set directive `name`, replacing any previous value.
    pub fn with_directive(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.directives.insert(name.into(), value.into());
        self
    }

    /// Set attribute `name`, replacing any previous value.
    pub fn with_attribute(
        mut self,
        name: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn copy_to(&self, owner: ResourceRef) -> Self {
        Self {
            namespace: self.namespace.clone(),
            directives: self.directives.clone(),
            attributes: self.attributes.clone(),
            owner: Some(owner),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn directives(&self) -> &BTreeMap<String, String> {
        &self.directives
    }

    pub fn directive(&self, name: &str) -> Option<&str> {
        self.directives.get(name).map(String::as_str)
    }

    pub fn attributes(&self) -> &BTreeMap<String, AttributeValue> {
        &self.attributes
    }

    pub fn owner(&self) -> Option<ResourceRef> {
        self.owner
    }

    pub fn filter(&self) -> Option<&str> {
        self.directive(names::FILTER_DIRECTIVE)
    }

    pub fn effective(&self) -> Option<&str> {
        self.directive(names::EFFECTIVE_DIRECTIVE)
    }

    pub fn is_optional(&self) -> bool {
        self.directive(names::RESOLUTION_DIRECTIVE) == Some(names::RESOLUTION_OPTIONAL)
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.namespace)?;
        if let Some(filter) = self.filter() {
            write!(f, " {filter}")?;
        }
        Ok(())
    }
}
