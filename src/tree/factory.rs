//! Node payload factory.
//!
//! Every node the tree builder creates goes through a [`NodeFactory`], so an
//! application can substitute its own node construction (normalizing text,
//! canonicalizing PI data, remapping names) without touching call sites.

use crate::name::{Namespace, QName};

use super::NodeKind;

/// Creates node payloads.
///
/// All methods have default implementations producing plain payloads, so an
/// implementation only overrides what it wants to change.
pub trait NodeFactory {
    /// Creates an element payload with no attributes or namespace nodes.
    fn element(&self, name: QName) -> NodeKind {
        NodeKind::Element {
            name,
            attributes: Vec::new(),
            namespaces: Vec::new(),
        }
    }

    /// Creates an attribute payload.
    fn attribute(&self, name: QName, value: &str) -> NodeKind {
        NodeKind::Attribute {
            name,
            value: value.to_owned(),
        }
    }

    /// Creates a text payload.
    fn text(&self, content: &str) -> NodeKind {
        NodeKind::Text {
            content: content.to_owned(),
        }
    }

    /// Creates a CDATA payload.
    fn cdata(&self, content: &str) -> NodeKind {
        NodeKind::CData {
            content: content.to_owned(),
        }
    }

    /// Creates a comment payload.
    fn comment(&self, content: &str) -> NodeKind {
        NodeKind::Comment {
            content: content.to_owned(),
        }
    }

    /// Creates a processing instruction payload.
    fn processing_instruction(&self, target: &str, data: Option<&str>) -> NodeKind {
        NodeKind::ProcessingInstruction {
            target: target.to_owned(),
            data: data.map(str::to_owned),
        }
    }

    /// Creates an entity reference payload.
    fn entity(&self, name: &str, text: Option<&str>) -> NodeKind {
        NodeKind::Entity {
            name: name.to_owned(),
            text: text.map(str::to_owned),
        }
    }

    /// Creates a namespace declaration payload.
    fn namespace(&self, namespace: Namespace) -> NodeKind {
        NodeKind::Namespace { namespace }
    }

    /// Creates a document type payload.
    fn document_type(
        &self,
        name: &str,
        public_id: Option<&str>,
        system_id: Option<&str>,
    ) -> NodeKind {
        NodeKind::DocumentType {
            name: name.to_owned(),
            public_id: public_id.map(str::to_owned),
            system_id: system_id.map(str::to_owned),
        }
    }
}

/// The factory used when none is supplied.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFactory;

impl NodeFactory for DefaultFactory {}
