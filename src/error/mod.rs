//! Error types for tree construction, mutation, and reading.
//!
//! Structural errors are raised synchronously by the call that would break a
//! tree invariant; nothing is coerced or recovered silently. Query errors
//! live in [`crate::xpath::XPathError`] and rule engine errors in
//! [`crate::stylesheet::StylesheetError`].

use thiserror::Error;

/// An error raised when a tree operation would violate a structural invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// The node cannot be attached where it was requested.
    ///
    /// Raised for nodes that already have a parent, for node kinds that
    /// cannot be children (documents, attributes, namespaces), for parents
    /// that cannot hold children, for cycles, and for a second root element.
    #[error("illegal addition of {node} to {parent}: {reason}")]
    IllegalAddition {
        /// Description of the node being attached.
        node: String,
        /// Description of the intended parent.
        parent: String,
        /// Why the addition was refused.
        reason: &'static str,
    },

    /// The same attribute name appeared twice in one start-element event.
    #[error("duplicate attribute '{name}' on element '{element}'")]
    DuplicateAttribute {
        /// The element being constructed.
        element: String,
        /// The repeated attribute name.
        name: String,
    },

    /// A namespace prefix could not be resolved in the current scope.
    #[error("unresolved namespace prefix '{prefix}' in '{name}'")]
    UnresolvedPrefix {
        /// The unbound prefix.
        prefix: String,
        /// The qualified name that used it.
        name: String,
    },

    /// The node is not a child of the given parent.
    #[error("{node} is not a child of {parent}")]
    NotAChild {
        /// Description of the node.
        node: String,
        /// Description of the supposed parent.
        parent: String,
    },

    /// An element-only operation was applied to another node kind.
    #[error("{node} is not an element")]
    NotAnElement {
        /// Description of the node.
        node: String,
    },

    /// An end-element event arrived with no element open.
    #[error("end of element without a matching start")]
    UnbalancedEnd,

    /// Construction finished while elements were still open.
    #[error("{open} element(s) still open at end of document")]
    UnclosedElements {
        /// Number of open elements.
        open: usize,
    },
}

/// An error raised while reading XML text into a document.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The input is not well-formed according to the underlying reader.
    #[error("malformed XML at byte {position}: {message}")]
    Syntax {
        /// Description from the reader.
        message: String,
        /// 0-based byte offset where the reader stopped.
        position: u64,
    },

    /// The byte input could not be decoded to UTF-8.
    #[error("cannot decode input: {0}")]
    Encoding(String),

    /// The event stream was rejected by the tree builder.
    #[error("tree construction failed at byte {position}: {source}")]
    Tree {
        /// The structural error.
        #[source]
        source: TreeError,
        /// 0-based byte offset of the offending event.
        position: u64,
    },
}
