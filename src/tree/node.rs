//! Node type definitions.
//!
//! `NodeKind` is the closed set of node variants held in the document arena.
//! Each variant carries its own payload; navigation links (parent, children,
//! siblings) are stored in `NodeData`, not here.

use std::fmt;

use crate::name::{Namespace, QName};

use super::NodeId;

/// The kind of an XML node and its associated data.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// The document node. There is exactly one per `Document`.
    Document,

    /// An element node, e.g. `<p:item id="x">`.
    Element {
        /// The element's qualified name.
        name: QName,
        /// Attribute nodes, in declaration order. Their parent is this element.
        attributes: Vec<NodeId>,
        /// Namespace declaration nodes made on this element.
        namespaces: Vec<NodeId>,
    },

    /// An attribute node. Owned by an element but not one of its children.
    Attribute {
        /// The attribute's qualified name.
        name: QName,
        /// The attribute value (entity references already expanded).
        value: String,
    },

    /// A text node containing character data.
    Text {
        /// The text content.
        content: String,
    },

    /// A CDATA section, e.g. `<![CDATA[...]]>`.
    CData {
        /// The CDATA content (no escaping applied).
        content: String,
    },

    /// A comment node, e.g. `<!-- ... -->`.
    Comment {
        /// The comment text (without the delimiters).
        content: String,
    },

    /// A processing instruction, e.g. `<?target data?>`.
    ProcessingInstruction {
        /// The PI target.
        target: String,
        /// The PI data, if any.
        data: Option<String>,
    },

    /// An entity reference node, optionally with its replacement text.
    Entity {
        /// The entity name (without `&` and `;`).
        name: String,
        /// The resolved replacement text, if known.
        text: Option<String>,
    },

    /// A namespace declaration node. Owned by the declaring element.
    Namespace {
        /// The declared binding.
        namespace: Namespace,
    },

    /// A document type declaration, e.g. `<!DOCTYPE html>`.
    DocumentType {
        /// The root element name declared in the DOCTYPE.
        name: String,
        /// The PUBLIC identifier, if any.
        public_id: Option<String>,
        /// The SYSTEM identifier, if any.
        system_id: Option<String>,
    },
}

impl NodeKind {
    /// Returns the stable type tag for this variant.
    #[must_use]
    pub fn node_type(&self) -> NodeType {
        match self {
            Self::Document => NodeType::Document,
            Self::Element { .. } => NodeType::Element,
            Self::Attribute { .. } => NodeType::Attribute,
            Self::Text { .. } => NodeType::Text,
            Self::CData { .. } => NodeType::CData,
            Self::Comment { .. } => NodeType::Comment,
            Self::ProcessingInstruction { .. } => NodeType::ProcessingInstruction,
            Self::Entity { .. } => NodeType::Entity,
            Self::Namespace { .. } => NodeType::Namespace,
            Self::DocumentType { .. } => NodeType::DocumentType,
        }
    }
}

/// A node-type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeType {
    /// The document node.
    Document,
    /// An element.
    Element,
    /// An attribute.
    Attribute,
    /// Character data.
    Text,
    /// A CDATA section.
    CData,
    /// A comment.
    Comment,
    /// A processing instruction.
    ProcessingInstruction,
    /// An entity reference.
    Entity,
    /// A namespace declaration.
    Namespace,
    /// A document type declaration.
    DocumentType,
}

impl NodeType {
    /// All node types, in declaration order.
    pub const ALL: [Self; 10] = [
        Self::Document,
        Self::Element,
        Self::Attribute,
        Self::Text,
        Self::CData,
        Self::Comment,
        Self::ProcessingInstruction,
        Self::Entity,
        Self::Namespace,
        Self::DocumentType,
    ];

    /// Returns a dense index in `0..ALL.len()`.
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Returns `true` for node kinds that may hold child nodes.
    #[must_use]
    pub fn is_container(self) -> bool {
        matches!(self, Self::Document | Self::Element)
    }

    /// Returns `true` for node kinds whose string-value is their own payload.
    #[must_use]
    pub fn is_character_data(self) -> bool {
        matches!(self, Self::Text | Self::CData)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Document => "document",
            Self::Element => "element",
            Self::Attribute => "attribute",
            Self::Text => "text",
            Self::CData => "cdata",
            Self::Comment => "comment",
            Self::ProcessingInstruction => "processing-instruction",
            Self::Entity => "entity",
            Self::Namespace => "namespace",
            Self::DocumentType => "document-type",
        })
    }
}
