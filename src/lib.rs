//! # xmlweave
//!
//! An arena-backed XML object model with an `XPath` 1.0 engine and a
//! priority-ordered, pattern-driven rule processor.
//!
//! ## Quick Start
//!
//! ```
//! use xmlweave::Document;
//! use xmlweave::xpath::XPath;
//!
//! let doc = Document::parse_str("<root><child>Hello</child></root>").unwrap();
//! let root = doc.root_element().unwrap();
//! assert_eq!(doc.name(root), "root");
//!
//! let child = XPath::compile("child").unwrap();
//! assert_eq!(child.value_of(&doc, root).unwrap(), "Hello");
//! ```
//!
//! ## Modules
//!
//! - [`name`]: qualified names, namespaces and the name registry.
//! - [`tree`]: the document tree, its mutation API and document order.
//! - [`builder`]: event-driven tree construction and tree replay.
//! - [`reader`]: XML text to tree.
//! - [`serial`]: tree to XML text.
//! - [`xpath`]: compiling and evaluating `XPath` 1.0 expressions.
//! - [`stylesheet`]: match patterns, rules, modes and the rule processor.

pub mod builder;
pub mod error;
pub mod name;
pub mod reader;
pub mod serial;
pub mod stylesheet;
pub mod tree;
pub mod util;
pub mod xpath;

// Re-export primary types at the crate root for convenience.
pub use error::{ParseError, TreeError};
pub use name::{Namespace, QName};
pub use tree::{Document, NodeId, NodeType};
