//! Arena-based XML document tree.
//!
//! All nodes live in a contiguous `Vec<NodeData>` owned by the `Document` and
//! are referenced by `NodeId`, a newtype over `NonZeroU32`. Children are owned
//! by their parent's child list; the parent link is a plain index used for
//! lookup only, so there are no reference cycles and dropping the `Document`
//! frees everything at once.
//!
//! # Architecture
//!
//! Navigation links (parent, first\_child, last\_child, next\_sibling,
//! prev\_sibling) are arena indices. Attribute and namespace declaration
//! nodes are arena nodes too: their parent is the owning element, but they
//! are never part of its child list.
//!
//! Every mutation goes through `&mut Document`, checks the ownership
//! invariants first, and only then rewires links, so a failed call leaves the
//! tree untouched. Mutations also drop the cached document-order ranks (see
//! the `order` submodule).

mod factory;
mod node;
mod order;

pub use factory::{DefaultFactory, NodeFactory};
pub use node::{NodeKind, NodeType};

use std::num::NonZeroU32;
use std::sync::OnceLock;

use crate::error::TreeError;
use crate::name::{split_qname, Namespace, QName};

/// A typed index into the document's node arena.
///
/// `Option<NodeId>` has the same size as `NodeId` (niche optimization).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NodeId(NonZeroU32);

impl NodeId {
    /// Creates a `NodeId` from an arena index. Index 0 is the unused placeholder.
    #[allow(clippy::cast_possible_truncation)]
    fn from_index(index: usize) -> Self {
        Self(NonZeroU32::MIN.saturating_add(index.saturating_sub(1) as u32))
    }

    /// Returns the raw index as a `usize` for indexing into the arena.
    pub(crate) fn as_index(self) -> usize {
        self.0.get() as usize
    }
}

/// Storage for a single node in the document arena.
#[derive(Debug, Clone)]
pub struct NodeData {
    /// What kind of node this is and its payload.
    pub kind: NodeKind,
    /// Parent node. `None` for the document node and for detached nodes.
    pub parent: Option<NodeId>,
    /// First child node.
    pub first_child: Option<NodeId>,
    /// Last child node (for O(1) append).
    pub last_child: Option<NodeId>,
    /// Next sibling.
    pub next_sibling: Option<NodeId>,
    /// Previous sibling.
    pub prev_sibling: Option<NodeId>,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            first_child: None,
            last_child: None,
            next_sibling: None,
            prev_sibling: None,
        }
    }
}

/// An XML document.
///
/// The `Document` owns all nodes in an arena and provides methods for tree
/// navigation and mutation. Reads go through `&Document`, writes through
/// `&mut Document`.
///
/// # Examples
///
/// ```
/// use xmlweave::Document;
/// use xmlweave::name::QName;
///
/// let mut doc = Document::new();
/// let root = doc.add_element(doc.root(), QName::local("catalog")).unwrap();
/// let book = doc.add_element(root, QName::local("book")).unwrap();
/// doc.set_attribute(book, QName::local("id"), "b1").unwrap();
/// doc.add_text(book, "Dune").unwrap();
///
/// assert_eq!(doc.text_content(root), "Dune");
/// assert_eq!(doc.attribute_value(book, "id"), Some("b1"));
/// assert_eq!(doc.unique_path(book), "/catalog/book");
/// ```
#[derive(Debug, Clone)]
pub struct Document {
    /// The node arena. Index 0 is unused (placeholder for `NonZeroU32`).
    nodes: Vec<NodeData>,
    /// The document node id (not the root element).
    root: NodeId,
    /// Lazily computed document-order ranks, indexed by arena index.
    order: OnceLock<Vec<u32>>,
    /// XML version from the XML declaration (e.g. "1.0").
    pub version: Option<String>,
    /// Encoding from the XML declaration (e.g. "UTF-8").
    pub encoding: Option<String>,
    /// Standalone flag from the XML declaration.
    pub standalone: Option<bool>,
}

impl Document {
    /// Creates a new empty document containing only the document node.
    #[must_use]
    pub fn new() -> Self {
        let mut nodes = Vec::with_capacity(64);
        nodes.push(NodeData::new(NodeKind::Document));
        nodes.push(NodeData::new(NodeKind::Document));
        Self {
            nodes,
            root: NodeId::from_index(1),
            order: OnceLock::new(),
            version: None,
            encoding: None,
            standalone: None,
        }
    }

    /// Returns the document node id.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Returns the root element (the single top-level element), if any.
    #[must_use]
    pub fn root_element(&self) -> Option<NodeId> {
        self.children(self.root)
            .find(|&id| self.node_type(id) == NodeType::Element)
    }

    /// Returns a reference to the `NodeData` for the given node.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not produced by this document.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.as_index()]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.as_index()]
    }

    /// Returns the payload of a node.
    #[must_use]
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    /// Returns the node-type tag of a node.
    #[must_use]
    pub fn node_type(&self, id: NodeId) -> NodeType {
        self.node(id).kind.node_type()
    }

    /// Returns the total number of nodes in the arena, including detached ones.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len() - 1
    }

    // --- Names and values ---

    /// Returns the qualified name of an element or attribute node.
    #[must_use]
    pub fn qname(&self, id: NodeId) -> Option<&QName> {
        match self.kind(id) {
            NodeKind::Element { name, .. } | NodeKind::Attribute { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Returns the name of a node as `XPath`'s `name()` would.
    ///
    /// Elements and attributes give their qualified name, PIs their target,
    /// namespace nodes their prefix, entities and doctypes their name. Other
    /// nodes give the empty string.
    #[must_use]
    pub fn name(&self, id: NodeId) -> String {
        match self.kind(id) {
            NodeKind::Element { name, .. } | NodeKind::Attribute { name, .. } => {
                name.qualified_name()
            }
            NodeKind::ProcessingInstruction { target, .. } => target.clone(),
            NodeKind::Namespace { namespace } => namespace.prefix().unwrap_or("").to_owned(),
            NodeKind::Entity { name, .. } | NodeKind::DocumentType { name, .. } => name.clone(),
            _ => String::new(),
        }
    }

    /// Returns the local part of a node's name, or the empty string.
    #[must_use]
    pub fn local_name(&self, id: NodeId) -> &str {
        match self.kind(id) {
            NodeKind::Element { name, .. } | NodeKind::Attribute { name, .. } => {
                name.local_name()
            }
            NodeKind::ProcessingInstruction { target, .. } => target,
            NodeKind::Namespace { namespace } => namespace.prefix().unwrap_or(""),
            NodeKind::Entity { name, .. } | NodeKind::DocumentType { name, .. } => name,
            _ => "",
        }
    }

    /// Returns the namespace URI of an element or attribute, or the empty string.
    #[must_use]
    pub fn namespace_uri(&self, id: NodeId) -> &str {
        self.qname(id).map_or("", QName::namespace_uri)
    }

    /// Returns the payload text of a leaf node.
    ///
    /// Text, CDATA and comments give their content, PIs their data,
    /// attributes their value, entities their replacement text.
    #[must_use]
    pub fn node_text(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            NodeKind::Text { content }
            | NodeKind::CData { content }
            | NodeKind::Comment { content } => Some(content),
            NodeKind::Attribute { value, .. } => Some(value),
            NodeKind::ProcessingInstruction { data, .. } => data.as_deref(),
            NodeKind::Entity { text, .. } => text.as_deref(),
            _ => None,
        }
    }

    /// Returns the `XPath` string-value of any node.
    #[must_use]
    pub fn string_value(&self, id: NodeId) -> String {
        match self.kind(id) {
            NodeKind::Document | NodeKind::Element { .. } => self.text_content(id),
            NodeKind::Namespace { namespace } => namespace.uri().to_owned(),
            NodeKind::DocumentType { .. } => String::new(),
            _ => self.node_text(id).unwrap_or("").to_owned(),
        }
    }

    /// Returns the concatenated text of all Text/CDATA descendants.
    #[must_use]
    pub fn text_content(&self, id: NodeId) -> String {
        let mut result = String::new();
        self.collect_text(id, &mut result);
        result
    }

    fn collect_text(&self, id: NodeId, buf: &mut String) {
        match self.kind(id) {
            NodeKind::Text { content } | NodeKind::CData { content } => buf.push_str(content),
            NodeKind::Entity { text: Some(t), .. } => buf.push_str(t),
            NodeKind::Document | NodeKind::Element { .. } => {
                for child in self.children(id) {
                    self.collect_text(child, buf);
                }
            }
            _ => {}
        }
    }

    /// Replaces the payload text of a leaf node.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::IllegalAddition`] for containers, namespace and
    /// doctype nodes, which have no settable payload text.
    pub fn set_value(&mut self, id: NodeId, value: &str) -> Result<(), TreeError> {
        match &mut self.node_mut(id).kind {
            NodeKind::Text { content }
            | NodeKind::CData { content }
            | NodeKind::Comment { content } => *content = value.to_owned(),
            NodeKind::Attribute { value: v, .. } => *v = value.to_owned(),
            NodeKind::ProcessingInstruction { data, .. } => *data = Some(value.to_owned()),
            NodeKind::Entity { text, .. } => *text = Some(value.to_owned()),
            _ => {
                return Err(TreeError::IllegalAddition {
                    node: "text value".to_owned(),
                    parent: self.describe(id),
                    reason: "node has no settable value",
                })
            }
        }
        Ok(())
    }

    // --- Node creation ---

    /// Allocates a new detached node in the arena and returns its `NodeId`.
    pub fn create_node(&mut self, kind: NodeKind) -> NodeId {
        let index = self.nodes.len();
        self.nodes.push(NodeData::new(kind));
        self.invalidate_order();
        NodeId::from_index(index)
    }

    /// Creates a detached element.
    pub fn create_element(&mut self, name: QName) -> NodeId {
        self.create_node(DefaultFactory.element(name))
    }

    /// Creates a detached text node.
    pub fn create_text(&mut self, content: &str) -> NodeId {
        self.create_node(DefaultFactory.text(content))
    }

    /// Creates a detached CDATA node.
    pub fn create_cdata(&mut self, content: &str) -> NodeId {
        self.create_node(DefaultFactory.cdata(content))
    }

    /// Creates a detached comment.
    pub fn create_comment(&mut self, content: &str) -> NodeId {
        self.create_node(DefaultFactory.comment(content))
    }

    /// Creates a detached processing instruction.
    pub fn create_processing_instruction(&mut self, target: &str, data: Option<&str>) -> NodeId {
        self.create_node(DefaultFactory.processing_instruction(target, data))
    }

    /// Creates a detached entity reference.
    pub fn create_entity(&mut self, name: &str, text: Option<&str>) -> NodeId {
        self.create_node(DefaultFactory.entity(name, text))
    }

    /// Creates a detached document type declaration.
    pub fn create_document_type(
        &mut self,
        name: &str,
        public_id: Option<&str>,
        system_id: Option<&str>,
    ) -> NodeId {
        self.create_node(DefaultFactory.document_type(name, public_id, system_id))
    }

    /// Appends `text` to a text node's content. Returns `false` for other nodes.
    pub(crate) fn push_text(&mut self, id: NodeId, text: &str) -> bool {
        match &mut self.node_mut(id).kind {
            NodeKind::Text { content } => {
                content.push_str(text);
                true
            }
            _ => false,
        }
    }

    // --- Attributes ---

    /// Returns the attribute nodes of an element (empty for other nodes).
    #[must_use]
    pub fn attributes(&self, id: NodeId) -> &[NodeId] {
        match self.kind(id) {
            NodeKind::Element { attributes, .. } => attributes,
            _ => &[],
        }
    }

    /// Returns the number of attributes on an element.
    #[must_use]
    pub fn attribute_count(&self, id: NodeId) -> usize {
        self.attributes(id).len()
    }

    /// Finds an attribute node by expanded name.
    #[must_use]
    pub fn attribute(&self, elem: NodeId, name: &QName) -> Option<NodeId> {
        self.attributes(elem)
            .iter()
            .copied()
            .find(|&a| self.qname(a) == Some(name))
    }

    /// Finds an attribute node by its qualified name as written (`id`, `xml:lang`).
    #[must_use]
    pub fn attribute_node(&self, elem: NodeId, qualified: &str) -> Option<NodeId> {
        let (prefix, local) = split_qname(qualified);
        self.attributes(elem).iter().copied().find(|&a| {
            self.qname(a)
                .is_some_and(|q| q.local_name() == local && q.prefix() == prefix)
        })
    }

    /// Returns an attribute value by its qualified name as written.
    #[must_use]
    pub fn attribute_value(&self, elem: NodeId, qualified: &str) -> Option<&str> {
        self.attribute_node(elem, qualified)
            .and_then(|a| self.node_text(a))
    }

    /// Returns an attribute value by expanded name.
    #[must_use]
    pub fn attribute_value_ns(&self, elem: NodeId, name: &QName) -> Option<&str> {
        self.attribute(elem, name).and_then(|a| self.node_text(a))
    }

    /// Sets an attribute, replacing the value of an existing attribute with
    /// the same expanded name.
    ///
    /// Returns the attribute node. A replaced attribute keeps its node id and
    /// its position among the element's attributes.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::NotAnElement`] if `elem` is not an element.
    pub fn set_attribute(
        &mut self,
        elem: NodeId,
        name: QName,
        value: &str,
    ) -> Result<NodeId, TreeError> {
        self.expect_element(elem)?;
        if let Some(existing) = self.attribute(elem, &name) {
            if let NodeKind::Attribute { value: v, .. } = &mut self.node_mut(existing).kind {
                *v = value.to_owned();
            }
            return Ok(existing);
        }
        let attr = self.create_node(DefaultFactory.attribute(name, value));
        self.attach_attribute(elem, attr);
        Ok(attr)
    }

    /// Sets an attribute given its qualified name as written, resolving the
    /// prefix against the namespaces in scope at `elem`.
    ///
    /// Unprefixed attribute names are in no namespace.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::UnresolvedPrefix`] if the prefix is not bound,
    /// or [`TreeError::NotAnElement`] if `elem` is not an element.
    pub fn set_attribute_qualified(
        &mut self,
        elem: NodeId,
        qualified: &str,
        value: &str,
    ) -> Result<NodeId, TreeError> {
        self.expect_element(elem)?;
        let name = match split_qname(qualified) {
            (Some(prefix), local) => {
                let ns = self.namespace_for(elem, Some(prefix)).ok_or_else(|| {
                    TreeError::UnresolvedPrefix {
                        prefix: prefix.to_owned(),
                        name: qualified.to_owned(),
                    }
                })?;
                QName::new(local, &ns)
            }
            (None, local) => QName::local(local),
        };
        self.set_attribute(elem, name, value)
    }

    /// Removes an attribute by expanded name and returns the detached node.
    pub fn remove_attribute(&mut self, elem: NodeId, name: &QName) -> Option<NodeId> {
        let attr = self.attribute(elem, name)?;
        if let NodeKind::Element { attributes, .. } = &mut self.node_mut(elem).kind {
            attributes.retain(|&a| a != attr);
        }
        self.node_mut(attr).parent = None;
        self.invalidate_order();
        Some(attr)
    }

    pub(crate) fn attach_attribute(&mut self, elem: NodeId, attr: NodeId) {
        self.node_mut(attr).parent = Some(elem);
        if let NodeKind::Element { attributes, .. } = &mut self.node_mut(elem).kind {
            attributes.push(attr);
        }
        self.invalidate_order();
    }

    // --- Namespaces ---

    /// Returns the namespace declaration nodes made on an element.
    #[must_use]
    pub fn namespace_declarations(&self, id: NodeId) -> &[NodeId] {
        match self.kind(id) {
            NodeKind::Element { namespaces, .. } => namespaces,
            _ => &[],
        }
    }

    /// Returns the binding held by a namespace node.
    #[must_use]
    pub fn namespace(&self, id: NodeId) -> Option<&Namespace> {
        match self.kind(id) {
            NodeKind::Namespace { namespace } => Some(namespace),
            _ => None,
        }
    }

    /// Declares a namespace on an element and returns the declaration node.
    ///
    /// Redeclaring a prefix already declared on the same element replaces
    /// that declaration's URI in place. An empty `uri` with no prefix
    /// undeclares the default namespace for this element's subtree.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::NotAnElement`] if `elem` is not an element.
    pub fn declare_namespace(
        &mut self,
        elem: NodeId,
        prefix: Option<&str>,
        uri: &str,
    ) -> Result<NodeId, TreeError> {
        self.expect_element(elem)?;
        self.declare_namespace_with(elem, Namespace::new(prefix, uri))
    }

    pub(crate) fn declare_namespace_with(
        &mut self,
        elem: NodeId,
        namespace: Namespace,
    ) -> Result<NodeId, TreeError> {
        self.expect_element(elem)?;
        let existing = self
            .namespace_declarations(elem)
            .iter()
            .copied()
            .find(|&n| self.namespace(n).map(Namespace::prefix) == Some(namespace.prefix()));
        if let Some(decl) = existing {
            self.node_mut(decl).kind = NodeKind::Namespace { namespace };
            return Ok(decl);
        }
        let decl = self.create_node(DefaultFactory.namespace(namespace));
        self.node_mut(decl).parent = Some(elem);
        if let NodeKind::Element { namespaces, .. } = &mut self.node_mut(elem).kind {
            namespaces.push(decl);
        }
        self.invalidate_order();
        Ok(decl)
    }

    /// Resolves a prefix to a namespace, walking from `id` outward.
    ///
    /// Each element is checked for a declaration of the prefix and for its
    /// own name's binding; the nearest match wins. `xml` is always bound.
    /// For the default prefix, an `xmlns=""` undeclaration yields `None`.
    #[must_use]
    pub fn namespace_for(&self, id: NodeId, prefix: Option<&str>) -> Option<Namespace> {
        if prefix == Some("xml") {
            return Some(Namespace::xml());
        }
        let start = match self.node_type(id) {
            NodeType::Element => Some(id),
            _ => self.parent(id),
        };
        let mut current = start;
        while let Some(elem) = current {
            for &decl in self.namespace_declarations(elem) {
                if let Some(ns) = self.namespace(decl) {
                    if ns.prefix() == prefix {
                        return (!ns.is_none()).then(|| ns.clone());
                    }
                }
            }
            if let Some(name) = self.qname(elem) {
                if name.prefix() == prefix && !name.namespace_uri().is_empty() {
                    return Some(name.namespace());
                }
            }
            current = self
                .parent(elem)
                .filter(|&p| self.node_type(p) == NodeType::Element);
        }
        None
    }

    /// Returns the namespace declaration nodes in scope at an element,
    /// nearest declaration per prefix first, undeclarations omitted.
    #[must_use]
    pub fn in_scope_namespace_nodes(&self, elem: NodeId) -> Vec<NodeId> {
        let mut seen: Vec<Option<&str>> = Vec::new();
        let mut result = Vec::new();
        let mut current = Some(elem).filter(|&e| self.node_type(e) == NodeType::Element);
        while let Some(e) = current {
            for &decl in self.namespace_declarations(e) {
                if let Some(ns) = self.namespace(decl) {
                    if seen.contains(&ns.prefix()) {
                        continue;
                    }
                    seen.push(ns.prefix());
                    if !ns.is_none() {
                        result.push(decl);
                    }
                }
            }
            current = self
                .parent(e)
                .filter(|&p| self.node_type(p) == NodeType::Element);
        }
        result
    }

    /// Returns the namespace bindings in scope at an element.
    #[must_use]
    pub fn in_scope_namespaces(&self, elem: NodeId) -> Vec<Namespace> {
        self.in_scope_namespace_nodes(elem)
            .into_iter()
            .filter_map(|n| self.namespace(n).cloned())
            .collect()
    }

    // --- Navigation ---

    /// Returns the parent of a node.
    ///
    /// For attribute and namespace nodes this is the owning element.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Returns the first child of a node.
    #[must_use]
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).first_child
    }

    /// Returns the last child of a node.
    #[must_use]
    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).last_child
    }

    /// Returns the next sibling of a node.
    #[must_use]
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).next_sibling
    }

    /// Returns the previous sibling of a node.
    #[must_use]
    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).prev_sibling
    }

    /// Returns an iterator over the children of a node.
    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            doc: self,
            next: self.node(id).first_child,
        }
    }

    /// Returns an iterator over a node and its ancestors (walking up to root).
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            doc: self,
            next: Some(id),
        }
    }

    /// Returns an iterator over all descendants of a node (depth-first).
    ///
    /// Attribute and namespace nodes are not descendants.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            doc: self,
            root: id,
            next: self.first_child(id),
        }
    }

    /// Returns the document node that `id` is attached to, or `None` when
    /// the node's ancestor chain does not reach it.
    #[must_use]
    pub fn document_of(&self, id: NodeId) -> Option<NodeId> {
        self.ancestors(id).last().filter(|&top| top == self.root)
    }

    /// Returns the element children of a node, in order.
    #[must_use]
    pub fn elements(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .filter(|&c| self.node_type(c) == NodeType::Element)
            .collect()
    }

    /// Returns the element children whose qualified name is `qualified`.
    #[must_use]
    pub fn elements_named(&self, id: NodeId, qualified: &str) -> Vec<NodeId> {
        self.children(id)
            .filter(|&c| self.node_type(c) == NodeType::Element && self.name(c) == qualified)
            .collect()
    }

    /// Returns the first element child whose qualified name is `qualified`.
    #[must_use]
    pub fn element_named(&self, id: NodeId, qualified: &str) -> Option<NodeId> {
        self.children(id)
            .find(|&c| self.node_type(c) == NodeType::Element && self.name(c) == qualified)
    }

    /// Returns all children of a node, in order.
    #[must_use]
    pub fn content(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id).collect()
    }

    /// Returns the child at `index`, if any.
    #[must_use]
    pub fn node_at(&self, id: NodeId, index: usize) -> Option<NodeId> {
        self.children(id).nth(index)
    }

    /// Returns the number of children of a node.
    #[must_use]
    pub fn child_count(&self, id: NodeId) -> usize {
        self.children(id).count()
    }

    /// Returns the position of `child` among `parent`'s children.
    #[must_use]
    pub fn index_of(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        self.children(parent).position(|c| c == child)
    }

    // --- Mutation ---

    /// Appends a child node to the end of a parent's child list.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::IllegalAddition`] if the addition would give the
    /// child a second owner, create a cycle, put a node kind where it is not
    /// allowed, or add a second root element to a document. The tree is not
    /// modified on error.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        self.check_attach(parent, child)?;
        self.node_mut(child).parent = Some(parent);
        if let Some(last) = self.node(parent).last_child {
            self.node_mut(last).next_sibling = Some(child);
            self.node_mut(child).prev_sibling = Some(last);
            self.node_mut(parent).last_child = Some(child);
        } else {
            self.node_mut(parent).first_child = Some(child);
            self.node_mut(parent).last_child = Some(child);
        }
        self.invalidate_order();
        Ok(())
    }

    /// Inserts `new_child` before `reference` in the reference's parent.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::NotAChild`] if `reference` is detached, and the
    /// same errors as [`append_child`](Self::append_child) otherwise.
    pub fn insert_before(&mut self, reference: NodeId, new_child: NodeId) -> Result<(), TreeError> {
        let parent = self
            .parent(reference)
            .filter(|_| !self.is_owned_not_child(reference))
            .ok_or_else(|| TreeError::NotAChild {
                node: self.describe(reference),
                parent: "any node".to_owned(),
            })?;
        self.check_attach(parent, new_child)?;
        self.node_mut(new_child).parent = Some(parent);
        if let Some(prev) = self.node(reference).prev_sibling {
            self.node_mut(prev).next_sibling = Some(new_child);
            self.node_mut(new_child).prev_sibling = Some(prev);
        } else {
            self.node_mut(parent).first_child = Some(new_child);
        }
        self.node_mut(new_child).next_sibling = Some(reference);
        self.node_mut(reference).prev_sibling = Some(new_child);
        self.invalidate_order();
        Ok(())
    }

    /// Prepends a child node as the first child of a parent.
    ///
    /// # Errors
    ///
    /// Same as [`append_child`](Self::append_child).
    pub fn prepend_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        match self.first_child(parent) {
            Some(first) => self.insert_before(first, child),
            None => self.append_child(parent, child),
        }
    }

    /// Detaches a node from its parent. The node stays in the arena and can
    /// be attached again. Detaching a detached node does nothing.
    ///
    /// Attribute and namespace nodes are removed from their owner's lists.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.node(id).parent else {
            return;
        };
        if self.is_owned_not_child(id) {
            if let NodeKind::Element {
                attributes,
                namespaces,
                ..
            } = &mut self.node_mut(parent).kind
            {
                attributes.retain(|&a| a != id);
                namespaces.retain(|&n| n != id);
            }
            self.node_mut(id).parent = None;
            self.invalidate_order();
            return;
        }

        let prev = self.node(id).prev_sibling;
        let next = self.node(id).next_sibling;
        match prev {
            Some(p) => self.node_mut(p).next_sibling = next,
            None => self.node_mut(parent).first_child = next,
        }
        match next {
            Some(n) => self.node_mut(n).prev_sibling = prev,
            None => self.node_mut(parent).last_child = prev,
        }
        let data = self.node_mut(id);
        data.parent = None;
        data.prev_sibling = None;
        data.next_sibling = None;
        self.invalidate_order();
    }

    /// Removes `child` from `parent`'s children.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::NotAChild`] if `child` is not a child of `parent`.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        if self.parent(child) != Some(parent) || self.is_owned_not_child(child) {
            return Err(TreeError::NotAChild {
                node: self.describe(child),
                parent: self.describe(parent),
            });
        }
        self.detach(child);
        Ok(())
    }

    /// Detaches every child of a node.
    pub fn clear_content(&mut self, id: NodeId) {
        while let Some(child) = self.first_child(id) {
            self.detach(child);
        }
    }

    /// Creates an element and appends it to `parent`.
    ///
    /// # Errors
    ///
    /// Same as [`append_child`](Self::append_child).
    pub fn add_element(&mut self, parent: NodeId, name: QName) -> Result<NodeId, TreeError> {
        let elem = self.create_element(name);
        self.append_created(parent, elem)
    }

    /// Creates a text node and appends it to `parent`.
    ///
    /// # Errors
    ///
    /// Same as [`append_child`](Self::append_child).
    pub fn add_text(&mut self, parent: NodeId, text: &str) -> Result<NodeId, TreeError> {
        let node = self.create_text(text);
        self.append_created(parent, node)
    }

    /// Creates a CDATA node and appends it to `parent`.
    ///
    /// # Errors
    ///
    /// Same as [`append_child`](Self::append_child).
    pub fn add_cdata(&mut self, parent: NodeId, text: &str) -> Result<NodeId, TreeError> {
        let node = self.create_cdata(text);
        self.append_created(parent, node)
    }

    /// Creates a comment and appends it to `parent`.
    ///
    /// # Errors
    ///
    /// Same as [`append_child`](Self::append_child).
    pub fn add_comment(&mut self, parent: NodeId, text: &str) -> Result<NodeId, TreeError> {
        let node = self.create_comment(text);
        self.append_created(parent, node)
    }

    /// Creates a processing instruction and appends it to `parent`.
    ///
    /// # Errors
    ///
    /// Same as [`append_child`](Self::append_child).
    pub fn add_processing_instruction(
        &mut self,
        parent: NodeId,
        target: &str,
        data: Option<&str>,
    ) -> Result<NodeId, TreeError> {
        let node = self.create_processing_instruction(target, data);
        self.append_created(parent, node)
    }

    /// Creates an entity reference and appends it to `parent`.
    ///
    /// # Errors
    ///
    /// Same as [`append_child`](Self::append_child).
    pub fn add_entity(
        &mut self,
        parent: NodeId,
        name: &str,
        text: Option<&str>,
    ) -> Result<NodeId, TreeError> {
        let node = self.create_entity(name, text);
        self.append_created(parent, node)
    }

    fn append_created(&mut self, parent: NodeId, node: NodeId) -> Result<NodeId, TreeError> {
        self.append_child(parent, node)?;
        Ok(node)
    }

    /// Replaces the content of an element with a single text node.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::NotAnElement`] if `elem` is not an element.
    pub fn set_text(&mut self, elem: NodeId, text: &str) -> Result<(), TreeError> {
        self.expect_element(elem)?;
        self.clear_content(elem);
        if !text.is_empty() {
            self.add_text(elem, text)?;
        }
        Ok(())
    }

    /// Merges adjacent text nodes and drops empty ones in the subtree at `id`.
    pub fn normalize(&mut self, id: NodeId) {
        let mut child = self.first_child(id);
        while let Some(c) = child {
            let next = self.next_sibling(c);
            let merge_into = self
                .prev_sibling(c)
                .filter(|&p| self.node_type(p) == NodeType::Text);
            match &self.node(c).kind {
                NodeKind::Text { content } if content.is_empty() => self.detach(c),
                NodeKind::Text { content } => {
                    if let Some(prev) = merge_into {
                        let content = content.clone();
                        if let NodeKind::Text { content: prev_content } =
                            &mut self.node_mut(prev).kind
                        {
                            prev_content.push_str(&content);
                        }
                        self.detach(c);
                    }
                }
                NodeKind::Element { .. } => self.normalize(c),
                _ => {}
            }
            child = next;
        }
    }

    // --- Copying ---

    /// Creates a detached deep copy of a node within this document.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::IllegalAddition`] for the document node, which
    /// cannot be duplicated.
    pub fn copy_node(&mut self, id: NodeId) -> Result<NodeId, TreeError> {
        let fragment = Fragment::capture(self, id)?;
        Ok(self.materialize(fragment))
    }

    /// Creates a detached deep copy in this document of a node owned by
    /// another document.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::IllegalAddition`] for a document node.
    pub fn import_node(&mut self, source: &Document, id: NodeId) -> Result<NodeId, TreeError> {
        let fragment = Fragment::capture(source, id)?;
        Ok(self.materialize(fragment))
    }

    fn materialize(&mut self, fragment: Fragment) -> NodeId {
        let node = self.create_node(fragment.kind);
        for ns in fragment.namespaces {
            let decl = self.create_node(ns);
            self.node_mut(decl).parent = Some(node);
            if let NodeKind::Element { namespaces, .. } = &mut self.node_mut(node).kind {
                namespaces.push(decl);
            }
        }
        for attr in fragment.attributes {
            let a = self.create_node(attr);
            self.attach_attribute(node, a);
        }
        for child in fragment.children {
            let c = self.materialize(child);
            // Links are wired directly: the copy is a fresh subtree.
            self.node_mut(c).parent = Some(node);
            if let Some(last) = self.node(node).last_child {
                self.node_mut(last).next_sibling = Some(c);
                self.node_mut(c).prev_sibling = Some(last);
            } else {
                self.node_mut(node).first_child = Some(c);
            }
            self.node_mut(node).last_child = Some(c);
        }
        self.invalidate_order();
        node
    }

    // --- Paths ---

    /// Returns an `XPath`-like path to a node, without positional indices.
    #[must_use]
    pub fn path(&self, id: NodeId) -> String {
        self.build_path(id, false)
    }

    /// Returns an `XPath`-like path that identifies the node uniquely.
    ///
    /// A 1-based index is added to a step whenever the parent has more than
    /// one child matching that step, e.g. `/a/b[2]/text()[1]`.
    #[must_use]
    pub fn unique_path(&self, id: NodeId) -> String {
        self.build_path(id, true)
    }

    fn build_path(&self, id: NodeId, unique: bool) -> String {
        let step = match self.kind(id) {
            NodeKind::Document => return "/".to_owned(),
            NodeKind::Attribute { name, .. } => format!("@{}", name.qualified_name()),
            NodeKind::Namespace { namespace } => {
                format!("namespace::{}", namespace.prefix().unwrap_or(""))
            }
            _ => {
                let base = self.step_name(id);
                if unique {
                    match self.sibling_position(id) {
                        Some((pos, count)) if count > 1 => format!("{base}[{pos}]"),
                        _ => base,
                    }
                } else {
                    base
                }
            }
        };
        match self.parent(id) {
            Some(p) if p == self.root => format!("/{step}"),
            Some(p) => format!("{}/{step}", self.build_path(p, unique)),
            None => step,
        }
    }

    fn step_name(&self, id: NodeId) -> String {
        match self.kind(id) {
            NodeKind::Element { name, .. } => name.qualified_name(),
            NodeKind::Text { .. } | NodeKind::CData { .. } => "text()".to_owned(),
            NodeKind::Comment { .. } => "comment()".to_owned(),
            NodeKind::ProcessingInstruction { target, .. } => {
                format!("processing-instruction('{target}')")
            }
            _ => "node()".to_owned(),
        }
    }

    /// Returns the 1-based position of `id` among siblings with the same
    /// step name, and how many such siblings exist.
    fn sibling_position(&self, id: NodeId) -> Option<(usize, usize)> {
        let parent = self.parent(id)?;
        let step = self.step_name(id);
        let mut pos = 0;
        let mut count = 0;
        for sibling in self.children(parent) {
            if self.step_name(sibling) == step {
                count += 1;
                if sibling == id {
                    pos = count;
                }
            }
        }
        Some((pos, count))
    }

    // --- Invariant checks ---

    fn invalidate_order(&mut self) {
        if self.order.get().is_some() {
            self.order = OnceLock::new();
        }
    }

    /// Returns `true` for attribute and namespace nodes, which have a parent
    /// but are not in its child list.
    fn is_owned_not_child(&self, id: NodeId) -> bool {
        matches!(
            self.node_type(id),
            NodeType::Attribute | NodeType::Namespace
        )
    }

    fn expect_element(&self, id: NodeId) -> Result<(), TreeError> {
        if self.node_type(id) == NodeType::Element {
            Ok(())
        } else {
            Err(TreeError::NotAnElement {
                node: self.describe(id),
            })
        }
    }

    fn check_attach(&self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        let refuse = |reason: &'static str| TreeError::IllegalAddition {
            node: self.describe(child),
            parent: self.describe(parent),
            reason,
        };
        let parent_type = self.node_type(parent);
        let child_type = self.node_type(child);

        if !parent_type.is_container() {
            return Err(refuse("parent cannot hold children"));
        }
        match child_type {
            NodeType::Document => return Err(refuse("a document cannot be a child")),
            NodeType::Attribute => return Err(refuse("attributes are set, not appended")),
            NodeType::Namespace => return Err(refuse("namespaces are declared, not appended")),
            _ => {}
        }
        if self.parent(child).is_some() {
            return Err(refuse("node already has a parent; detach it first"));
        }
        if self.ancestors(parent).any(|a| a == child) {
            return Err(refuse("node is an ancestor of the parent"));
        }
        if parent_type == NodeType::Document {
            match child_type {
                NodeType::Element
                    if self
                        .children(parent)
                        .any(|c| self.node_type(c) == NodeType::Element) =>
                {
                    return Err(refuse("document already has a root element"));
                }
                NodeType::Text | NodeType::CData | NodeType::Entity => {
                    return Err(refuse("character data is not allowed at document level"));
                }
                _ => {}
            }
        } else if child_type == NodeType::DocumentType {
            return Err(refuse("a document type belongs to the document node"));
        }
        Ok(())
    }

    /// Short human-readable description of a node for error messages.
    pub(crate) fn describe(&self, id: NodeId) -> String {
        match self.kind(id) {
            NodeKind::Element { name, .. } => format!("element <{}>", name.qualified_name()),
            NodeKind::Attribute { name, .. } => format!("attribute @{}", name.qualified_name()),
            NodeKind::ProcessingInstruction { target, .. } => {
                format!("processing instruction '{target}'")
            }
            NodeKind::Entity { name, .. } => format!("entity &{name};"),
            other => format!("{} node", other.node_type()),
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// A detached, link-free snapshot of a subtree used for copying.
struct Fragment {
    kind: NodeKind,
    attributes: Vec<NodeKind>,
    namespaces: Vec<NodeKind>,
    children: Vec<Fragment>,
}

impl Fragment {
    fn capture(doc: &Document, id: NodeId) -> Result<Self, TreeError> {
        let (kind, attributes, namespaces) = match doc.kind(id) {
            NodeKind::Document => {
                return Err(TreeError::IllegalAddition {
                    node: "document node".to_owned(),
                    parent: "copy".to_owned(),
                    reason: "a document node cannot be copied",
                })
            }
            NodeKind::Element {
                name,
                attributes,
                namespaces,
            } => (
                DefaultFactory.element(name.clone()),
                attributes.iter().map(|&a| doc.kind(a).clone()).collect(),
                namespaces.iter().map(|&n| doc.kind(n).clone()).collect(),
            ),
            other => (other.clone(), Vec::new(), Vec::new()),
        };
        let children = doc
            .children(id)
            .map(|c| Self::capture(doc, c))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            kind,
            attributes,
            namespaces,
            children,
        })
    }
}

// --- Iterators ---

/// Iterator over the children of a node.
pub struct Children<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.doc.node(current).next_sibling;
        Some(current)
    }
}

/// Iterator over a node and its ancestors.
pub struct Ancestors<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.doc.node(current).parent;
        Some(current)
    }
}

/// Depth-first iterator over all descendants of a node.
pub struct Descendants<'a> {
    doc: &'a Document,
    root: NodeId,
    next: Option<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;

        if let Some(child) = self.doc.first_child(current) {
            self.next = Some(child);
            return Some(current);
        }
        if let Some(sibling) = self.doc.next_sibling(current) {
            if current != self.root {
                self.next = Some(sibling);
                return Some(current);
            }
        }

        let mut ancestor = self.doc.parent(current);
        while let Some(anc) = ancestor {
            if anc == self.root {
                self.next = None;
                return Some(current);
            }
            if let Some(sibling) = self.doc.next_sibling(anc) {
                self.next = Some(sibling);
                return Some(current);
            }
            ancestor = self.doc.parent(anc);
        }

        self.next = None;
        Some(current)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::name::XML_NAMESPACE;
    use pretty_assertions::assert_eq;

    fn el(doc: &mut Document, parent: NodeId, name: &str) -> NodeId {
        doc.add_element(parent, QName::local(name)).unwrap()
    }

    #[test]
    fn test_new_document_has_root() {
        let doc = Document::new();
        assert_eq!(doc.node_type(doc.root()), NodeType::Document);
        assert_eq!(doc.node_count(), 1);
        assert_eq!(doc.root_element(), None);
    }

    #[test]
    fn test_append_sets_links() {
        let mut doc = Document::new();
        let root = doc.root();
        let a = el(&mut doc, root, "a");
        let t1 = doc.add_text(a, "x").unwrap();
        let b = el(&mut doc, a, "b");
        let t2 = doc.add_text(a, "y").unwrap();

        assert_eq!(doc.content(a), vec![t1, b, t2]);
        assert_eq!(doc.next_sibling(t1), Some(b));
        assert_eq!(doc.prev_sibling(t2), Some(b));
        assert_eq!(doc.first_child(a), Some(t1));
        assert_eq!(doc.last_child(a), Some(t2));
        for child in doc.content(a) {
            assert_eq!(doc.parent(child), Some(a));
        }
    }

    #[test]
    fn test_remove_child_clears_parent() {
        let mut doc = Document::new();
        let root = doc.root();
        let a = el(&mut doc, root, "a");
        let b = el(&mut doc, a, "b");
        let c = el(&mut doc, a, "c");

        doc.remove_child(a, b).unwrap();
        assert_eq!(doc.parent(b), None);
        assert_eq!(doc.next_sibling(b), None);
        assert_eq!(doc.content(a), vec![c]);
        assert_eq!(doc.prev_sibling(c), None);
    }

    #[test]
    fn test_remove_non_child_fails() {
        let mut doc = Document::new();
        let root = doc.root();
        let a = el(&mut doc, root, "a");
        let b = el(&mut doc, a, "b");
        let c = el(&mut doc, b, "c");
        let err = doc.remove_child(a, c).unwrap_err();
        assert!(matches!(err, TreeError::NotAChild { .. }));
        assert_eq!(doc.parent(c), Some(b));
    }

    #[test]
    fn test_append_attached_node_is_illegal() {
        let mut doc = Document::new();
        let root = doc.root();
        let a = el(&mut doc, root, "a");
        let b = el(&mut doc, a, "b");
        let c = el(&mut doc, a, "c");

        let err = doc.append_child(c, b).unwrap_err();
        assert!(matches!(err, TreeError::IllegalAddition { .. }));
        // Unchanged after the failed call.
        assert_eq!(doc.parent(b), Some(a));
        assert_eq!(doc.content(a), vec![b, c]);

        doc.detach(b);
        doc.append_child(c, b).unwrap();
        assert_eq!(doc.parent(b), Some(c));
    }

    #[test]
    fn test_second_root_element_is_illegal() {
        let mut doc = Document::new();
        let root = doc.root();
        el(&mut doc, root, "a");
        let err = doc.add_element(root, QName::local("b")).unwrap_err();
        assert!(err.to_string().contains("root element"));
        doc.add_comment(root, "still fine").unwrap();
    }

    #[test]
    fn test_text_at_document_level_is_illegal() {
        let mut doc = Document::new();
        let root = doc.root();
        assert!(doc.add_text(root, "loose").is_err());
    }

    #[test]
    fn test_cycle_is_illegal() {
        let mut doc = Document::new();
        let a = doc.create_element(QName::local("a"));
        let b = doc.add_element(a, QName::local("b")).unwrap();
        assert!(doc.append_child(b, a).is_err());
        assert!(doc.append_child(a, a).is_err());
    }

    #[test]
    fn test_leaf_cannot_hold_children() {
        let mut doc = Document::new();
        let t = doc.create_text("t");
        let c = doc.create_comment("c");
        assert!(doc.append_child(t, c).is_err());
    }

    #[test]
    fn test_insert_before_and_prepend() {
        let mut doc = Document::new();
        let root = doc.root();
        let a = el(&mut doc, root, "a");
        let c = el(&mut doc, a, "c");
        let b = doc.create_element(QName::local("b"));
        doc.insert_before(c, b).unwrap();
        let first = doc.create_text("0");
        doc.prepend_child(a, first).unwrap();
        assert_eq!(doc.content(a), vec![first, b, c]);
        assert_eq!(doc.index_of(a, c), Some(2));
        assert_eq!(doc.node_at(a, 1), Some(b));
        assert_eq!(doc.node_at(a, 9), None);
    }

    #[test]
    fn test_set_attribute_replaces() {
        let mut doc = Document::new();
        let root = doc.root();
        let a = el(&mut doc, root, "a");
        let first = doc.set_attribute(a, QName::local("id"), "1").unwrap();
        doc.set_attribute(a, QName::local("x"), "x").unwrap();
        let second = doc.set_attribute(a, QName::local("id"), "2").unwrap();

        assert_eq!(first, second);
        assert_eq!(doc.attribute_count(a), 2);
        assert_eq!(doc.attribute_value(a, "id"), Some("2"));
        assert_eq!(doc.attributes(a)[0], first);
        assert_eq!(doc.parent(first), Some(a));
        // Attributes are not children.
        assert_eq!(doc.child_count(a), 0);
    }

    #[test]
    fn test_remove_attribute() {
        let mut doc = Document::new();
        let root = doc.root();
        let a = el(&mut doc, root, "a");
        let name = QName::local("id");
        doc.set_attribute(a, name.clone(), "1").unwrap();
        let removed = doc.remove_attribute(a, &name).unwrap();
        assert_eq!(doc.parent(removed), None);
        assert_eq!(doc.attribute_value(a, "id"), None);
        assert_eq!(doc.remove_attribute(a, &name), None);
    }

    #[test]
    fn test_set_attribute_qualified_resolves_prefix() {
        let mut doc = Document::new();
        let root = doc.root();
        let a = el(&mut doc, root, "a");
        doc.declare_namespace(a, Some("x"), "urn:x").unwrap();
        let b = el(&mut doc, a, "b");
        let attr = doc.set_attribute_qualified(b, "x:flag", "on").unwrap();
        assert_eq!(doc.namespace_uri(attr), "urn:x");
        assert_eq!(doc.name(attr), "x:flag");

        let err = doc.set_attribute_qualified(b, "y:flag", "on").unwrap_err();
        assert!(matches!(err, TreeError::UnresolvedPrefix { .. }));

        let lang = doc.set_attribute_qualified(b, "xml:lang", "en").unwrap();
        assert_eq!(doc.namespace_uri(lang), XML_NAMESPACE);
    }

    #[test]
    fn test_namespace_for_nearest_wins() {
        let mut doc = Document::new();
        let root = doc.root();
        let a = el(&mut doc, root, "a");
        doc.declare_namespace(a, Some("p"), "u1").unwrap();
        let b = el(&mut doc, a, "b");
        doc.declare_namespace(b, Some("p"), "u2").unwrap();
        let c = el(&mut doc, b, "c");

        assert_eq!(doc.namespace_for(c, Some("p")).unwrap().uri(), "u2");
        assert_eq!(doc.namespace_for(a, Some("p")).unwrap().uri(), "u1");
        assert_eq!(doc.namespace_for(c, Some("q")), None);
        assert_eq!(doc.namespace_for(c, Some("xml")), Some(Namespace::xml()));
    }

    #[test]
    fn test_default_namespace_undeclared() {
        let mut doc = Document::new();
        let root = doc.root();
        let a = el(&mut doc, root, "a");
        doc.declare_namespace(a, None, "urn:d").unwrap();
        let b = el(&mut doc, a, "b");
        doc.declare_namespace(b, None, "").unwrap();
        assert_eq!(doc.namespace_for(a, None).unwrap().uri(), "urn:d");
        assert_eq!(doc.namespace_for(b, None), None);
        assert!(doc.in_scope_namespaces(b).is_empty());
    }

    #[test]
    fn test_in_scope_namespaces() {
        let mut doc = Document::new();
        let root = doc.root();
        let a = el(&mut doc, root, "a");
        doc.declare_namespace(a, Some("p"), "u1").unwrap();
        doc.declare_namespace(a, Some("q"), "uq").unwrap();
        let b = el(&mut doc, a, "b");
        doc.declare_namespace(b, Some("p"), "u2").unwrap();

        let uris: Vec<String> = doc
            .in_scope_namespaces(b)
            .iter()
            .map(|n| format!("{}={}", n.prefix().unwrap_or(""), n.uri()))
            .collect();
        assert_eq!(uris, vec!["p=u2", "q=uq"]);
    }

    #[test]
    fn test_redeclare_on_same_element_replaces() {
        let mut doc = Document::new();
        let root = doc.root();
        let a = el(&mut doc, root, "a");
        let first = doc.declare_namespace(a, Some("p"), "u1").unwrap();
        let second = doc.declare_namespace(a, Some("p"), "u2").unwrap();
        assert_eq!(first, second);
        assert_eq!(doc.namespace_declarations(a).len(), 1);
        assert_eq!(doc.string_value(first), "u2");
    }

    #[test]
    fn test_document_of() {
        let mut doc = Document::new();
        let root = doc.root();
        let a = el(&mut doc, root, "a");
        let b = el(&mut doc, a, "b");
        let loose = doc.create_element(QName::local("loose"));
        let inner = doc.add_element(loose, QName::local("inner")).unwrap();
        assert_eq!(doc.document_of(b), Some(root));
        assert_eq!(doc.document_of(root), Some(root));
        assert_eq!(doc.document_of(inner), None);
        doc.detach(a);
        assert_eq!(doc.document_of(b), None);
    }

    #[test]
    fn test_text_and_string_values() {
        let mut doc = Document::new();
        let root = doc.root();
        let p = el(&mut doc, root, "p");
        doc.add_text(p, "hello ").unwrap();
        let b = el(&mut doc, p, "b");
        doc.add_cdata(b, "wor").unwrap();
        doc.add_comment(b, "ignored").unwrap();
        doc.add_entity(b, "ld", Some("ld")).unwrap();
        let attr = doc.set_attribute(p, QName::local("k"), "v").unwrap();

        assert_eq!(doc.text_content(p), "hello world");
        assert_eq!(doc.string_value(root), "hello world");
        assert_eq!(doc.string_value(attr), "v");
    }

    #[test]
    fn test_set_text_and_normalize() {
        let mut doc = Document::new();
        let root = doc.root();
        let a = el(&mut doc, root, "a");
        doc.add_text(a, "x").unwrap();
        el(&mut doc, a, "b");
        doc.set_text(a, "only").unwrap();
        assert_eq!(doc.child_count(a), 1);
        assert_eq!(doc.text_content(a), "only");

        doc.add_text(a, "").unwrap();
        doc.add_text(a, " more").unwrap();
        doc.normalize(a);
        assert_eq!(doc.child_count(a), 1);
        assert_eq!(doc.text_content(a), "only more");
    }

    #[test]
    fn test_unique_path() {
        let mut doc = Document::new();
        let root = doc.root();
        let a = el(&mut doc, root, "a");
        let b1 = el(&mut doc, a, "b");
        let b2 = el(&mut doc, a, "b");
        let c = el(&mut doc, a, "c");
        let t1 = doc.add_text(b2, "one").unwrap();
        doc.add_comment(b2, "sep").unwrap();
        let t2 = doc.add_text(b2, "two").unwrap();
        let id = doc.set_attribute(b2, QName::local("id"), "x").unwrap();

        assert_eq!(doc.unique_path(b1), "/a/b[1]");
        assert_eq!(doc.unique_path(b2), "/a/b[2]");
        assert_eq!(doc.unique_path(c), "/a/c");
        assert_eq!(doc.unique_path(t1), "/a/b[2]/text()[1]");
        assert_eq!(doc.unique_path(t2), "/a/b[2]/text()[2]");
        assert_eq!(doc.unique_path(id), "/a/b[2]/@id");
        assert_eq!(doc.path(t2), "/a/b/text()");
        assert_eq!(doc.unique_path(root), "/");
    }

    #[test]
    fn test_copy_node_is_detached_deep_copy() {
        let mut doc = Document::new();
        let root = doc.root();
        let a = el(&mut doc, root, "a");
        doc.declare_namespace(a, Some("p"), "urn:p").unwrap();
        doc.set_attribute(a, QName::local("id"), "1").unwrap();
        let b = el(&mut doc, a, "b");
        doc.add_text(b, "text").unwrap();

        let copy = doc.copy_node(a).unwrap();
        assert_ne!(copy, a);
        assert_eq!(doc.parent(copy), None);
        assert_eq!(doc.attribute_value(copy, "id"), Some("1"));
        assert_eq!(doc.text_content(copy), "text");
        assert_eq!(doc.namespace_for(copy, Some("p")).unwrap().uri(), "urn:p");
        let copied_b = doc.first_child(copy).unwrap();
        assert_eq!(doc.parent(copied_b), Some(copy));
        assert!(doc.copy_node(root).is_err());
    }

    #[test]
    fn test_import_node_from_other_document() {
        let mut source = Document::new();
        let sroot = source.root();
        let item = source.add_element(sroot, QName::local("item")).unwrap();
        source.add_text(item, "payload").unwrap();

        let mut target = Document::new();
        let troot = target.root();
        let holder = target.add_element(troot, QName::local("holder")).unwrap();
        let imported = target.import_node(&source, item).unwrap();
        target.append_child(holder, imported).unwrap();
        assert_eq!(target.text_content(holder), "payload");
        assert_eq!(source.parent(item), Some(sroot));
    }

    #[test]
    fn test_descendants_of_subtree_stop_at_root() {
        let mut doc = Document::new();
        let root = doc.root();
        let a = el(&mut doc, root, "a");
        let b = el(&mut doc, a, "b");
        let b1 = el(&mut doc, b, "b1");
        let c = el(&mut doc, a, "c");

        let desc: Vec<NodeId> = doc.descendants(b).collect();
        assert_eq!(desc, vec![b1]);
        let all: Vec<NodeId> = doc.descendants(root).collect();
        assert_eq!(all, vec![a, b, b1, c]);
        let ancestors: Vec<NodeId> = doc.ancestors(b1).collect();
        assert_eq!(ancestors, vec![b1, b, a, root]);
    }

    #[test]
    fn test_elements_named() {
        let mut doc = Document::new();
        let root = doc.root();
        let a = el(&mut doc, root, "a");
        let b1 = el(&mut doc, a, "b");
        doc.add_text(a, "t").unwrap();
        let c = el(&mut doc, a, "c");
        let b2 = el(&mut doc, a, "b");
        assert_eq!(doc.elements(a), vec![b1, c, b2]);
        assert_eq!(doc.elements_named(a, "b"), vec![b1, b2]);
        assert_eq!(doc.element_named(a, "c"), Some(c));
        assert_eq!(doc.element_named(a, "zzz"), None);
    }

    #[test]
    fn test_set_value() {
        let mut doc = Document::new();
        let t = doc.create_text("old");
        doc.set_value(t, "new").unwrap();
        assert_eq!(doc.node_text(t), Some("new"));
        let e = doc.create_element(QName::local("e"));
        assert!(doc.set_value(e, "x").is_err());
    }
}
