//! Streaming tree construction.
//!
//! A parser (or any other event source) drives a [`ContentHandler`]. The
//! [`TreeBuilder`] implementation turns the event stream into a
//! [`Document`]; [`walk`] goes the other way and replays a tree as events.
//!
//! # Examples
//!
//! ```
//! use xmlweave::builder::{ContentHandler, TreeBuilder};
//!
//! let mut builder = TreeBuilder::new();
//! builder.start_document().unwrap();
//! builder
//!     .start_element("p:a", &[("xmlns:p".to_string(), "urn:p".to_string())])
//!     .unwrap();
//! builder.characters("hello").unwrap();
//! builder.end_element("p:a").unwrap();
//! builder.end_document().unwrap();
//!
//! let doc = builder.finish().unwrap();
//! let a = doc.root_element().unwrap();
//! assert_eq!(doc.namespace_uri(a), "urn:p");
//! assert_eq!(doc.text_content(a), "hello");
//! ```

mod walker;

pub use walker::walk;

use tracing::trace;

use crate::error::TreeError;
use crate::name::{split_qname, NameRegistry, Namespace, NamespaceStack, QName};
use crate::tree::{DefaultFactory, Document, NodeFactory, NodeId, NodeKind, NodeType};

/// Receives construction events in document order.
///
/// All methods default to doing nothing, so an implementation only overrides
/// the events it cares about.
///
/// # Attribute pairs
///
/// Attributes are passed as `(qualified_name, value)` pairs, in source
/// order, with namespace declarations (`xmlns`, `xmlns:p`) included as
/// ordinary pairs.
#[allow(unused_variables)]
pub trait ContentHandler {
    /// The error type returned by the handler.
    type Error;

    /// Called before any other event.
    fn start_document(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Called after all other events.
    fn end_document(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Called for a start tag.
    fn start_element(
        &mut self,
        name: &str,
        attributes: &[(String, String)],
    ) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Called for an end tag (or the end of an empty-element tag).
    fn end_element(&mut self, name: &str) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Called for character data.
    fn characters(&mut self, text: &str) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Called for a CDATA section.
    fn cdata(&mut self, text: &str) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Called for a comment.
    fn comment(&mut self, text: &str) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Called for a processing instruction.
    fn processing_instruction(
        &mut self,
        target: &str,
        data: Option<&str>,
    ) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Called when an entity reference starts. Character events up to the
    /// matching [`end_entity`](Self::end_entity) are its replacement text.
    fn start_entity(&mut self, name: &str) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Called when an entity reference ends.
    fn end_entity(&mut self, name: &str) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Called for a document type declaration.
    fn document_type(
        &mut self,
        name: &str,
        public_id: Option<&str>,
        system_id: Option<&str>,
    ) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Options controlling how a [`TreeBuilder`] shapes the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuilderOptions {
    /// Merge character events into a directly preceding text node.
    pub merge_text: bool,
    /// Drop text that is entirely whitespace.
    pub strip_whitespace: bool,
    /// Drop comments.
    pub ignore_comments: bool,
}

impl Default for BuilderOptions {
    fn default() -> Self {
        Self {
            merge_text: true,
            strip_whitespace: false,
            ignore_comments: false,
        }
    }
}

impl BuilderOptions {
    /// Sets whether adjacent character events are merged.
    #[must_use]
    pub fn merge_text(mut self, yes: bool) -> Self {
        self.merge_text = yes;
        self
    }

    /// Sets whether whitespace-only text is dropped.
    #[must_use]
    pub fn strip_whitespace(mut self, yes: bool) -> Self {
        self.strip_whitespace = yes;
        self
    }

    /// Sets whether comments are dropped.
    #[must_use]
    pub fn ignore_comments(mut self, yes: bool) -> Self {
        self.ignore_comments = yes;
        self
    }
}

/// Builds a [`Document`] from construction events.
///
/// Each start tag opens a namespace scope, binds its `xmlns` pseudo
/// attributes, then resolves the element and attribute names against the
/// scope. The new element is appended to the current cursor and becomes the
/// cursor; the matching end tag moves the cursor back to the parent.
pub struct TreeBuilder {
    doc: Document,
    names: NameRegistry,
    scopes: NamespaceStack,
    cursor: Vec<NodeId>,
    entities: Vec<(NodeId, String)>,
    factory: Box<dyn NodeFactory>,
    options: BuilderOptions,
}

impl TreeBuilder {
    /// Creates a builder with default options and node factory.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(BuilderOptions::default())
    }

    /// Creates a builder with the given options.
    #[must_use]
    pub fn with_options(options: BuilderOptions) -> Self {
        let doc = Document::new();
        let root = doc.root();
        Self {
            doc,
            names: NameRegistry::new(),
            scopes: NamespaceStack::new(),
            cursor: vec![root],
            entities: Vec::new(),
            factory: Box::new(DefaultFactory),
            options,
        }
    }

    /// Replaces the node factory used for every node the builder creates.
    #[must_use]
    pub fn factory(mut self, factory: impl NodeFactory + 'static) -> Self {
        self.factory = Box::new(factory);
        self
    }

    /// Uses an existing name registry so that names are shared with other
    /// documents built from it.
    #[must_use]
    pub fn names(mut self, names: NameRegistry) -> Self {
        self.names = names;
        self
    }

    /// Returns the document built so far.
    #[must_use]
    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Returns the current cursor: the innermost open element, or the
    /// document node.
    #[must_use]
    pub fn current(&self) -> NodeId {
        self.cursor.last().copied().unwrap_or_else(|| self.doc.root())
    }

    /// Returns the number of open elements.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.cursor.len() - 1
    }

    /// Finishes construction and returns the document.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::UnclosedElements`] if start tags are unmatched.
    pub fn finish(self) -> Result<Document, TreeError> {
        if self.depth() > 0 {
            return Err(TreeError::UnclosedElements { open: self.depth() });
        }
        Ok(self.doc)
    }

    /// Finishes construction and also hands back the name registry.
    ///
    /// # Errors
    ///
    /// Same as [`finish`](Self::finish).
    pub fn finish_with_names(self) -> Result<(Document, NameRegistry), TreeError> {
        if self.depth() > 0 {
            return Err(TreeError::UnclosedElements { open: self.depth() });
        }
        Ok((self.doc, self.names))
    }

    fn resolve(
        &mut self,
        qualified: &str,
        default_applies: bool,
    ) -> Result<QName, TreeError> {
        let (prefix, local) = split_qname(qualified);
        let namespace = match prefix {
            Some(p) => {
                let uri = self
                    .scopes
                    .resolve(Some(p))
                    .ok_or_else(|| TreeError::UnresolvedPrefix {
                        prefix: p.to_owned(),
                        name: qualified.to_owned(),
                    })?
                    .to_owned();
                self.names.namespace(Some(p), &uri)
            }
            None if default_applies => match self.scopes.resolve(None) {
                Some(uri) => {
                    let uri = uri.to_owned();
                    self.names.namespace(None, &uri)
                }
                None => Namespace::none(),
            },
            None => Namespace::none(),
        };
        Ok(self.names.qname(local, &namespace))
    }

    fn open_element(
        &mut self,
        qualified: &str,
        attributes: &[(String, String)],
    ) -> Result<NodeId, TreeError> {
        let mut declared = Vec::new();
        for (name, value) in attributes {
            let prefix = match name.as_str() {
                "xmlns" => None,
                n => match n.strip_prefix("xmlns:") {
                    Some(p) => Some(p),
                    None => continue,
                },
            };
            if declared.iter().any(|ns: &Namespace| ns.prefix() == prefix) {
                return Err(TreeError::DuplicateAttribute {
                    element: qualified.to_owned(),
                    name: name.clone(),
                });
            }
            self.scopes.declare(prefix, value);
            declared.push(self.names.namespace(prefix, value));
        }

        let name = self.resolve(qualified, true)?;
        let mut resolved: Vec<(QName, &str)> = Vec::with_capacity(attributes.len());
        for (attr, value) in attributes {
            if attr == "xmlns" || attr.starts_with("xmlns:") {
                continue;
            }
            let attr_name = self.resolve(attr, false)?;
            if resolved.iter().any(|(n, _)| *n == attr_name) {
                return Err(TreeError::DuplicateAttribute {
                    element: qualified.to_owned(),
                    name: attr.clone(),
                });
            }
            resolved.push((attr_name, value.as_str()));
        }

        let parent = self.current();
        let elem = self.doc.create_node(self.factory.element(name));
        self.doc.append_child(parent, elem)?;
        for namespace in declared {
            self.doc.declare_namespace_with(elem, namespace)?;
        }
        for (attr_name, value) in resolved {
            let attr = self.doc.create_node(self.factory.attribute(attr_name, value));
            self.doc.attach_attribute(elem, attr);
        }
        Ok(elem)
    }

    fn append(&mut self, kind: NodeKind) -> Result<NodeId, TreeError> {
        let parent = self.current();
        let node = self.doc.create_node(kind);
        self.doc.append_child(parent, node)?;
        Ok(node)
    }
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TreeBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeBuilder")
            .field("depth", &self.depth())
            .field("nodes", &self.doc.node_count())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl ContentHandler for TreeBuilder {
    type Error = TreeError;

    fn start_document(&mut self) -> Result<(), TreeError> {
        trace!("start document");
        Ok(())
    }

    fn end_document(&mut self) -> Result<(), TreeError> {
        trace!(nodes = self.doc.node_count(), "end document");
        Ok(())
    }

    fn start_element(
        &mut self,
        name: &str,
        attributes: &[(String, String)],
    ) -> Result<(), TreeError> {
        self.scopes.push_scope();
        trace!(name, depth = self.scopes.depth(), "push scope");
        match self.open_element(name, attributes) {
            Ok(elem) => {
                self.cursor.push(elem);
                Ok(())
            }
            Err(err) => {
                self.scopes.pop_scope();
                Err(err)
            }
        }
    }

    fn end_element(&mut self, _name: &str) -> Result<(), TreeError> {
        if self.cursor.len() <= 1 {
            return Err(TreeError::UnbalancedEnd);
        }
        self.cursor.pop();
        self.scopes.pop_scope();
        Ok(())
    }

    fn characters(&mut self, text: &str) -> Result<(), TreeError> {
        if let Some((_, buffer)) = self.entities.last_mut() {
            buffer.push_str(text);
            return Ok(());
        }
        let blank = text.chars().all(char::is_whitespace);
        let parent = self.current();
        if blank && (self.options.strip_whitespace || self.doc.node_type(parent) == NodeType::Document)
        {
            return Ok(());
        }
        if self.options.merge_text {
            if let Some(last) = self.doc.last_child(parent) {
                if self.doc.push_text(last, text) {
                    return Ok(());
                }
            }
        }
        let kind = self.factory.text(text);
        self.append(kind).map(|_| ())
    }

    fn cdata(&mut self, text: &str) -> Result<(), TreeError> {
        let kind = self.factory.cdata(text);
        self.append(kind).map(|_| ())
    }

    fn comment(&mut self, text: &str) -> Result<(), TreeError> {
        if self.options.ignore_comments {
            return Ok(());
        }
        let kind = self.factory.comment(text);
        self.append(kind).map(|_| ())
    }

    fn processing_instruction(&mut self, target: &str, data: Option<&str>) -> Result<(), TreeError> {
        let kind = self.factory.processing_instruction(target, data);
        self.append(kind).map(|_| ())
    }

    fn start_entity(&mut self, name: &str) -> Result<(), TreeError> {
        let kind = self.factory.entity(name, None);
        let node = self.append(kind)?;
        self.entities.push((node, String::new()));
        Ok(())
    }

    fn end_entity(&mut self, _name: &str) -> Result<(), TreeError> {
        let (node, text) = self.entities.pop().ok_or(TreeError::UnbalancedEnd)?;
        if !text.is_empty() {
            self.doc.set_value(node, &text)?;
        }
        Ok(())
    }

    fn document_type(
        &mut self,
        name: &str,
        public_id: Option<&str>,
        system_id: Option<&str>,
    ) -> Result<(), TreeError> {
        let kind = self.factory.document_type(name, public_id, system_id);
        self.append(kind).map(|_| ())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn attrs(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_builds_nested_elements() {
        let mut b = TreeBuilder::new();
        b.start_document().unwrap();
        b.start_element("a", &attrs(&[("id", "1")])).unwrap();
        b.start_element("b", &[]).unwrap();
        b.characters("x").unwrap();
        b.end_element("b").unwrap();
        b.comment(" note ").unwrap();
        b.end_element("a").unwrap();
        b.end_document().unwrap();
        let doc = b.finish().unwrap();

        let a = doc.root_element().unwrap();
        assert_eq!(doc.name(a), "a");
        assert_eq!(doc.attribute_value(a, "id"), Some("1"));
        assert_eq!(doc.child_count(a), 2);
        assert_eq!(doc.text_content(a), "x");
    }

    #[test]
    fn test_characters_merge() {
        let mut b = TreeBuilder::new();
        b.start_element("a", &[]).unwrap();
        b.characters("one ").unwrap();
        b.characters("two").unwrap();
        b.end_element("a").unwrap();
        let doc = b.finish().unwrap();
        let a = doc.root_element().unwrap();
        assert_eq!(doc.child_count(a), 1);
        assert_eq!(doc.text_content(a), "one two");
    }

    #[test]
    fn test_characters_without_merge() {
        let mut b = TreeBuilder::with_options(BuilderOptions::default().merge_text(false));
        b.start_element("a", &[]).unwrap();
        b.characters("one ").unwrap();
        b.characters("two").unwrap();
        b.end_element("a").unwrap();
        let doc = b.finish().unwrap();
        assert_eq!(doc.child_count(doc.root_element().unwrap()), 2);
    }

    #[test]
    fn test_strip_whitespace_and_comments() {
        let options = BuilderOptions::default()
            .strip_whitespace(true)
            .ignore_comments(true);
        let mut b = TreeBuilder::with_options(options);
        b.start_element("a", &[]).unwrap();
        b.characters("\n  ").unwrap();
        b.comment("gone").unwrap();
        b.start_element("b", &[]).unwrap();
        b.end_element("b").unwrap();
        b.end_element("a").unwrap();
        let doc = b.finish().unwrap();
        assert_eq!(doc.child_count(doc.root_element().unwrap()), 1);
    }

    #[test]
    fn test_whitespace_at_document_level_is_ignored() {
        let mut b = TreeBuilder::new();
        b.characters("\n").unwrap();
        b.start_element("a", &[]).unwrap();
        b.end_element("a").unwrap();
        b.characters("\n").unwrap();
        let doc = b.finish().unwrap();
        assert_eq!(doc.child_count(doc.root()), 1);
    }

    #[test]
    fn test_namespace_scope_nearest_wins() {
        let mut b = TreeBuilder::new();
        b.start_element("p:a", &attrs(&[("xmlns:p", "u1")])).unwrap();
        b.start_element("b", &attrs(&[("xmlns:p", "u2")])).unwrap();
        b.start_element("p:c", &[]).unwrap();
        b.end_element("p:c").unwrap();
        b.end_element("b").unwrap();
        b.start_element("p:d", &[]).unwrap();
        b.end_element("p:d").unwrap();
        b.end_element("p:a").unwrap();
        let doc = b.finish().unwrap();

        let a = doc.root_element().unwrap();
        let bel = doc.first_child(a).unwrap();
        let c = doc.first_child(bel).unwrap();
        let d = doc.last_child(a).unwrap();
        assert_eq!(doc.namespace_uri(a), "u1");
        assert_eq!(doc.namespace_uri(c), "u2");
        assert_eq!(doc.namespace_uri(d), "u1");
        assert_eq!(doc.namespace_declarations(bel).len(), 1);
    }

    #[test]
    fn test_default_namespace_not_applied_to_attributes() {
        let mut b = TreeBuilder::new();
        b.start_element("a", &attrs(&[("xmlns", "urn:d"), ("k", "v")]))
            .unwrap();
        b.end_element("a").unwrap();
        let doc = b.finish().unwrap();
        let a = doc.root_element().unwrap();
        assert_eq!(doc.namespace_uri(a), "urn:d");
        let k = doc.attribute_node(a, "k").unwrap();
        assert_eq!(doc.namespace_uri(k), "");
    }

    #[test]
    fn test_duplicate_attribute_rejected() {
        let mut b = TreeBuilder::new();
        let err = b
            .start_element("a", &attrs(&[("id", "1"), ("id", "2")]))
            .unwrap_err();
        assert!(matches!(err, TreeError::DuplicateAttribute { .. }));
        assert_eq!(b.depth(), 0);
        assert_eq!(b.document().child_count(b.document().root()), 0);
    }

    #[test]
    fn test_duplicate_expanded_name_through_prefixes() {
        let mut b = TreeBuilder::new();
        let err = b
            .start_element(
                "a",
                &attrs(&[
                    ("xmlns:p", "urn:x"),
                    ("xmlns:q", "urn:x"),
                    ("p:k", "1"),
                    ("q:k", "2"),
                ]),
            )
            .unwrap_err();
        assert!(matches!(err, TreeError::DuplicateAttribute { .. }));
    }

    #[test]
    fn test_repeated_namespace_declaration_rejected() {
        let mut b = TreeBuilder::new();
        let err = b
            .start_element("a", &attrs(&[("xmlns:p", "urn:x"), ("xmlns:p", "urn:y")]))
            .unwrap_err();
        assert_eq!(
            err,
            TreeError::DuplicateAttribute {
                element: "a".to_owned(),
                name: "xmlns:p".to_owned(),
            }
        );
        let err = b
            .start_element("a", &attrs(&[("xmlns", "urn:x"), ("xmlns", "urn:x")]))
            .unwrap_err();
        assert!(matches!(err, TreeError::DuplicateAttribute { .. }));
        assert_eq!(b.depth(), 0);
    }

    #[test]
    fn test_unresolved_prefix() {
        let mut b = TreeBuilder::new();
        let err = b.start_element("x:a", &[]).unwrap_err();
        assert_eq!(
            err,
            TreeError::UnresolvedPrefix {
                prefix: "x".to_string(),
                name: "x:a".to_string(),
            }
        );
    }

    #[test]
    fn test_unbalanced_and_unclosed() {
        let mut b = TreeBuilder::new();
        assert_eq!(b.end_element("a").unwrap_err(), TreeError::UnbalancedEnd);
        b.start_element("a", &[]).unwrap();
        b.start_element("b", &[]).unwrap();
        assert_eq!(
            b.finish().unwrap_err(),
            TreeError::UnclosedElements { open: 2 }
        );
    }

    #[test]
    fn test_second_root_rejected() {
        let mut b = TreeBuilder::new();
        b.start_element("a", &[]).unwrap();
        b.end_element("a").unwrap();
        let err = b.start_element("b", &[]).unwrap_err();
        assert!(matches!(err, TreeError::IllegalAddition { .. }));
    }

    #[test]
    fn test_entity_collects_replacement_text() {
        let mut b = TreeBuilder::new();
        b.start_element("a", &[]).unwrap();
        b.characters("x").unwrap();
        b.start_entity("amp").unwrap();
        b.characters("&").unwrap();
        b.end_entity("amp").unwrap();
        b.characters("y").unwrap();
        b.end_element("a").unwrap();
        let doc = b.finish().unwrap();
        let a = doc.root_element().unwrap();
        assert_eq!(doc.child_count(a), 3);
        let entity = doc.node_at(a, 1).unwrap();
        assert!(matches!(
            doc.kind(entity),
            NodeKind::Entity { name, text: Some(t) } if name == "amp" && t == "&"
        ));
        assert_eq!(doc.text_content(a), "x&y");
    }

    #[test]
    fn test_document_type_and_top_level_nodes() {
        let mut b = TreeBuilder::new();
        b.document_type("a", None, Some("a.dtd")).unwrap();
        b.processing_instruction("style", Some("href='x'")).unwrap();
        b.start_element("a", &[]).unwrap();
        b.end_element("a").unwrap();
        b.comment("tail").unwrap();
        let doc = b.finish().unwrap();
        let types: Vec<NodeType> = doc.children(doc.root()).map(|c| doc.node_type(c)).collect();
        assert_eq!(
            types,
            vec![
                NodeType::DocumentType,
                NodeType::ProcessingInstruction,
                NodeType::Element,
                NodeType::Comment
            ]
        );
    }

    struct Upper;

    impl NodeFactory for Upper {
        fn text(&self, content: &str) -> NodeKind {
            NodeKind::Text {
                content: content.to_uppercase(),
            }
        }
    }

    #[test]
    fn test_custom_factory() {
        let mut b = TreeBuilder::new().factory(Upper).names(NameRegistry::new());
        b.start_element("a", &[]).unwrap();
        b.characters("shout").unwrap();
        b.end_element("a").unwrap();
        let doc = b.finish().unwrap();
        assert_eq!(doc.text_content(doc.root_element().unwrap()), "SHOUT");
    }

    #[test]
    fn test_names_are_interned() {
        let mut b = TreeBuilder::new();
        b.start_element("a", &[]).unwrap();
        b.start_element("b", &[]).unwrap();
        b.end_element("b").unwrap();
        b.start_element("b", &[]).unwrap();
        b.end_element("b").unwrap();
        b.end_element("a").unwrap();
        let (doc, names) = b.finish_with_names().unwrap();
        let a = doc.root_element().unwrap();
        let first = doc.qname(doc.node_at(a, 0).unwrap()).unwrap();
        let second = doc.qname(doc.node_at(a, 1).unwrap()).unwrap();
        assert!(first.same_instance(second));
        assert_eq!(names.len(), 2);
    }
}
