//! Qualified names, namespaces, and the name registry.
//!
//! A [`QName`] is a `(local name, namespace URI, prefix)` triple. Equality and
//! hashing only consider the local name and the namespace URI; the prefix is
//! presentation. A [`NameRegistry`] interns names so that repeated lookups of
//! the same name return the same shared instance, which can then be compared
//! by identity with [`QName::same_instance`].
//!
//! The registry is an ordinary value: construct one, pass it around, drop it.
//! [`NameRegistry::default`] is the conventional default instance.
//!
//! See <https://www.w3.org/TR/xml-names/#NT-QName>

pub mod scope;

pub use scope::NamespaceStack;

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::util::dict::{Dict, SymbolId};

/// The namespace URI permanently bound to the `xml` prefix.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// The namespace URI reserved for `xmlns` declarations.
pub const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";

/// Splits a qualified name into its prefix and local name parts.
///
/// Only the first colon separates the prefix.
///
/// ```
/// use xmlweave::name::split_qname;
///
/// assert_eq!(split_qname("svg:rect"), (Some("svg"), "rect"));
/// assert_eq!(split_qname("div"), (None, "div"));
/// ```
#[must_use]
pub fn split_qname(qname: &str) -> (Option<&str>, &str) {
    match qname.find(':') {
        Some(pos) => (Some(&qname[..pos]), &qname[pos + 1..]),
        None => (None, qname),
    }
}

/// A prefix to URI binding.
///
/// The empty URI stands for "no namespace". A `None` prefix is the default
/// namespace binding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    prefix: Option<Arc<str>>,
    uri: Arc<str>,
}

impl Namespace {
    /// Creates a namespace binding.
    #[must_use]
    pub fn new(prefix: Option<&str>, uri: &str) -> Self {
        Self {
            prefix: prefix.filter(|p| !p.is_empty()).map(Arc::from),
            uri: Arc::from(uri),
        }
    }

    /// The "no namespace" value: no prefix, empty URI.
    #[must_use]
    pub fn none() -> Self {
        Self::new(None, "")
    }

    /// The pre-bound `xml` namespace.
    #[must_use]
    pub fn xml() -> Self {
        Self::new(Some("xml"), XML_NAMESPACE)
    }

    /// Returns the prefix, or `None` for the default namespace.
    #[must_use]
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Returns the namespace URI (empty for no namespace).
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Returns `true` if this is the "no namespace" binding.
    #[must_use]
    pub fn is_none(&self) -> bool {
        self.uri.is_empty()
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(p) => write!(f, "xmlns:{p}=\"{}\"", self.uri),
            None => write!(f, "xmlns=\"{}\"", self.uri),
        }
    }
}

#[derive(Debug)]
struct QNameData {
    local: Arc<str>,
    uri: Arc<str>,
    prefix: Option<Arc<str>>,
}

/// A qualified name.
///
/// Cloning is a reference-count bump. Two names are equal when their local
/// names and namespace URIs match, whatever their prefixes and whichever
/// registry produced them.
#[derive(Clone)]
pub struct QName(Arc<QNameData>);

impl QName {
    /// Creates a name outside of any registry.
    ///
    /// Prefer [`NameRegistry::qname`] when many equal names are created.
    #[must_use]
    pub fn new(local: &str, namespace: &Namespace) -> Self {
        Self(Arc::new(QNameData {
            local: Arc::from(local),
            uri: Arc::clone(&namespace.uri),
            prefix: namespace.prefix.clone(),
        }))
    }

    /// Creates a name with no namespace.
    #[must_use]
    pub fn local(local: &str) -> Self {
        Self::new(local, &Namespace::none())
    }

    /// Returns the local part of the name.
    #[must_use]
    pub fn local_name(&self) -> &str {
        &self.0.local
    }

    /// Returns the namespace URI, or the empty string for no namespace.
    #[must_use]
    pub fn namespace_uri(&self) -> &str {
        &self.0.uri
    }

    /// Returns the presentation prefix, if any.
    #[must_use]
    pub fn prefix(&self) -> Option<&str> {
        self.0.prefix.as_deref()
    }

    /// Returns the namespace binding this name was created with.
    #[must_use]
    pub fn namespace(&self) -> Namespace {
        Namespace {
            prefix: self.0.prefix.clone(),
            uri: Arc::clone(&self.0.uri),
        }
    }

    /// Returns `prefix:local`, or just `local` when there is no prefix.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        match self.prefix() {
            Some(p) => format!("{p}:{}", self.local_name()),
            None => self.local_name().to_owned(),
        }
    }

    /// Returns `true` if both handles point at the same interned instance.
    #[must_use]
    pub fn same_instance(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Returns `true` if this name has the given local name and URI.
    #[must_use]
    pub fn matches(&self, local: &str, uri: &str) -> bool {
        self.local_name() == local && self.namespace_uri() == uri
    }
}

impl PartialEq for QName {
    fn eq(&self, other: &Self) -> bool {
        self.same_instance(other)
            || (self.0.local == other.0.local && self.0.uri == other.0.uri)
    }
}

impl Eq for QName {}

impl Hash for QName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.local.hash(state);
        self.0.uri.hash(state);
    }
}

impl fmt::Debug for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace_uri().is_empty() {
            write!(f, "QName({})", self.qualified_name())
        } else {
            write!(
                f,
                "QName({} in {})",
                self.qualified_name(),
                self.namespace_uri()
            )
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.prefix() {
            Some(p) => write!(f, "{p}:{}", self.local_name()),
            None => f.write_str(self.local_name()),
        }
    }
}

/// Interning factory for qualified names and namespaces.
///
/// # Examples
///
/// ```
/// use xmlweave::name::{NameRegistry, Namespace};
///
/// let mut names = NameRegistry::new();
/// let ns = names.namespace(Some("dc"), "http://purl.org/dc/elements/1.1/");
/// let a = names.qname("title", &ns);
/// let b = names.qname("title", &ns);
/// assert!(a.same_instance(&b));
/// assert_eq!(a.qualified_name(), "dc:title");
/// ```
#[derive(Debug, Default)]
pub struct NameRegistry {
    dict: Dict,
    names: HashMap<(SymbolId, Option<SymbolId>, SymbolId), QName>,
    namespaces: HashMap<(Option<SymbolId>, SymbolId), Namespace>,
}

impl NameRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn shared(&mut self, s: &str) -> (SymbolId, Arc<str>) {
        let id = self.dict.intern(s);
        let shared = self.dict.shared(id).unwrap_or_else(|| Arc::from(s));
        (id, shared)
    }

    /// Returns the interned namespace for `(prefix, uri)`.
    pub fn namespace(&mut self, prefix: Option<&str>, uri: &str) -> Namespace {
        let prefix = prefix.filter(|p| !p.is_empty());
        let (uri_id, uri_arc) = self.shared(uri);
        let prefix_entry = prefix.map(|p| self.shared(p));
        let key = (prefix_entry.as_ref().map(|(id, _)| *id), uri_id);
        self.namespaces
            .entry(key)
            .or_insert_with(|| Namespace {
                prefix: prefix_entry.map(|(_, arc)| arc),
                uri: uri_arc,
            })
            .clone()
    }

    /// Returns the interned name `local` in `namespace`.
    pub fn qname(&mut self, local: &str, namespace: &Namespace) -> QName {
        let (local_id, local_arc) = self.shared(local);
        let (uri_id, _) = self.shared(namespace.uri());
        let prefix_id = namespace.prefix().map(|p| self.dict.intern(p));
        self.names
            .entry((local_id, prefix_id, uri_id))
            .or_insert_with(|| {
                QName(Arc::new(QNameData {
                    local: local_arc,
                    uri: Arc::clone(&namespace.uri),
                    prefix: namespace.prefix.clone(),
                }))
            })
            .clone()
    }

    /// Returns the interned name `local` in no namespace.
    pub fn local(&mut self, local: &str) -> QName {
        self.qname(local, &Namespace::none())
    }

    /// Returns the number of distinct names interned so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns `true` if no names have been interned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_split_qname() {
        assert_eq!(split_qname("xml:lang"), (Some("xml"), "lang"));
        assert_eq!(split_qname("div"), (None, "div"));
        assert_eq!(split_qname("a:b:c"), (Some("a"), "b:c"));
    }

    #[test]
    fn test_registry_returns_same_instance() {
        let mut names = NameRegistry::new();
        let ns = names.namespace(Some("p"), "urn:p");
        let a = names.qname("item", &ns);
        let b = names.qname("item", &ns);
        assert!(a.same_instance(&b));
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn test_equality_ignores_prefix() {
        let mut names = NameRegistry::new();
        let p = names.namespace(Some("p"), "urn:x");
        let q = names.namespace(Some("q"), "urn:x");
        let a = names.qname("item", &p);
        let b = names.qname("item", &q);
        assert!(!a.same_instance(&b));
        assert_eq!(a, b);
        assert_eq!(a.qualified_name(), "p:item");
        assert_eq!(b.qualified_name(), "q:item");
    }

    #[test]
    fn test_equality_across_registries() {
        let mut one = NameRegistry::new();
        let mut two = NameRegistry::new();
        let ns = Namespace::new(None, "urn:a");
        let a = one.qname("x", &ns);
        let b = two.qname("x", &ns);
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_different_uri_not_equal() {
        let a = QName::new("x", &Namespace::new(Some("p"), "urn:a"));
        let b = QName::new("x", &Namespace::new(Some("p"), "urn:b"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_predefined_namespaces() {
        assert!(Namespace::none().is_none());
        assert_eq!(Namespace::none().prefix(), None);
        assert_eq!(Namespace::xml().prefix(), Some("xml"));
        assert_eq!(Namespace::xml().uri(), XML_NAMESPACE);
    }

    #[test]
    fn test_empty_prefix_is_default() {
        let ns = Namespace::new(Some(""), "urn:d");
        assert_eq!(ns.prefix(), None);
        assert_eq!(ns.to_string(), "xmlns=\"urn:d\"");
    }
}
