//! `XPath` 1.0 query language implementation.
//!
//! This module implements the `XPath` 1.0 specification
//! (<https://www.w3.org/TR/xpath-10/>): a compiler from expression strings to
//! an AST and an evaluator over [`Document`] trees.
//!
//! # Quick Start
//!
//! ```
//! use xmlweave::Document;
//! use xmlweave::xpath::XPath;
//!
//! let doc = Document::parse_str("<root><a>1</a><a>2</a></root>").unwrap();
//! let xpath = XPath::compile("count(/root/a)").unwrap();
//! assert_eq!(xpath.number_value_of(&doc, doc.root()).unwrap(), 2.0);
//!
//! let second = XPath::compile("/root/a[position() = 2]").unwrap();
//! let nodes = second.select_nodes(&doc, doc.root()).unwrap();
//! assert_eq!(doc.string_value(nodes[0]), "2");
//! ```
//!
//! # Submodules
//!
//! - [`ast`]: Abstract syntax tree types for compiled expressions.
//! - [`lexer`]: Tokenizer for expression strings.
//! - [`parser`]: Recursive descent parser.
//! - [`functions`]: The core function library.
//! - [`eval`]: Expression evaluator against a document tree.
//! - [`types`]: Value types, errors and number conversions.

pub mod ast;
pub mod eval;
pub mod functions;
pub mod lexer;
pub mod parser;
pub mod types;

use std::fmt;

pub use eval::{Bindings, XPathContext};
pub use types::{format_number, parse_number, XPathError, XPathValue};

use crate::tree::{Document, NodeId};

use ast::Expr;

/// A compiled `XPath` expression.
///
/// Compiling validates the syntax and the function calls. A compiled
/// expression is immutable and can be evaluated any number of times against
/// any node, from any thread.
#[derive(Debug, Clone)]
pub struct XPath {
    source: String,
    expr: Expr,
    bindings: Bindings,
}

impl XPath {
    /// Compiles an expression.
    ///
    /// # Errors
    ///
    /// Returns [`XPathError::Syntax`] with the byte offset of the offending
    /// token if the expression is not valid `XPath` 1.0, names an unknown
    /// function, or calls a function with the wrong number of arguments.
    pub fn compile(source: &str) -> Result<Self, XPathError> {
        let expr = parser::parse(source)?;
        tracing::debug!(xpath = source, "compiled xpath expression");
        Ok(Self {
            source: source.to_owned(),
            expr,
            bindings: Bindings::new(),
        })
    }

    pub(crate) fn from_parts(source: &str, expr: Expr, bindings: Bindings) -> Self {
        Self {
            source: source.to_owned(),
            expr,
            bindings,
        }
    }

    /// Binds a prefix for name tests in this expression.
    #[must_use]
    pub fn with_namespace(mut self, prefix: &str, uri: &str) -> Self {
        self.bindings.bind_namespace(prefix, uri);
        self
    }

    /// Binds a variable for this expression.
    #[must_use]
    pub fn with_variable(mut self, name: &str, value: impl Into<XPathValue>) -> Self {
        self.bindings.set_variable(name, value.into());
        self
    }

    /// Replaces all bindings at once.
    #[must_use]
    pub fn with_bindings(mut self, bindings: Bindings) -> Self {
        self.bindings = bindings;
        self
    }

    /// Returns the expression as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns the compiled syntax tree.
    #[must_use]
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Returns the bindings in effect for this expression.
    #[must_use]
    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    /// Evaluates the expression with `node` as the context node.
    ///
    /// # Errors
    ///
    /// Returns [`XPathError::UndefinedVariable`] or
    /// [`XPathError::UnresolvedPrefix`] for missing bindings.
    pub fn evaluate(&self, doc: &Document, node: NodeId) -> Result<XPathValue, XPathError> {
        XPathContext::new(doc, node, &self.bindings).evaluate(&self.expr)
    }

    /// Evaluates and returns the selected nodes in document order. A result
    /// that is not a node-set selects nothing.
    ///
    /// # Errors
    ///
    /// See [`XPath::evaluate`].
    pub fn select_nodes(&self, doc: &Document, node: NodeId) -> Result<Vec<NodeId>, XPathError> {
        let mut nodes = self.evaluate(doc, node)?.into_nodes();
        doc.sort_document_order(&mut nodes);
        Ok(nodes)
    }

    /// Evaluates and returns the first selected node in document order.
    ///
    /// # Errors
    ///
    /// See [`XPath::evaluate`].
    pub fn select_single_node(
        &self,
        doc: &Document,
        node: NodeId,
    ) -> Result<Option<NodeId>, XPathError> {
        Ok(self.select_nodes(doc, node)?.first().copied())
    }

    /// Evaluates and converts the result with `string()`.
    ///
    /// # Errors
    ///
    /// See [`XPath::evaluate`].
    pub fn value_of(&self, doc: &Document, node: NodeId) -> Result<String, XPathError> {
        let ctx = XPathContext::new(doc, node, &self.bindings);
        Ok(ctx.string_of(&ctx.evaluate(&self.expr)?))
    }

    /// Evaluates and converts the result with `number()`.
    ///
    /// # Errors
    ///
    /// See [`XPath::evaluate`].
    pub fn number_value_of(&self, doc: &Document, node: NodeId) -> Result<f64, XPathError> {
        let ctx = XPathContext::new(doc, node, &self.bindings);
        Ok(ctx.number_of(&ctx.evaluate(&self.expr)?))
    }

    /// Evaluates and converts the result with `boolean()`.
    ///
    /// # Errors
    ///
    /// See [`XPath::evaluate`].
    pub fn matches(&self, doc: &Document, node: NodeId) -> Result<bool, XPathError> {
        Ok(self.evaluate(doc, node)?.to_boolean())
    }
}

impl fmt::Display for XPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Compiles and evaluates an expression in one call.
///
/// For evaluating the same expression repeatedly, compile it once with
/// [`XPath::compile`].
///
/// ```
/// use xmlweave::Document;
/// use xmlweave::xpath::{evaluate, XPathValue};
///
/// let doc = Document::parse_str("<root><child>Hello</child></root>").unwrap();
/// let root = doc.root_element().unwrap();
/// assert_eq!(
///     evaluate(&doc, root, "string(child)").unwrap(),
///     XPathValue::String("Hello".to_string())
/// );
/// ```
///
/// # Errors
///
/// Returns [`XPathError`] if the expression is malformed or refers to
/// missing bindings.
pub fn evaluate(doc: &Document, node: NodeId, expression: &str) -> Result<XPathValue, XPathError> {
    let expr = parser::parse(expression)?;
    XPathContext::new(doc, node, Bindings::empty()).evaluate(&expr)
}

/// Compiles an expression and returns the selected nodes in document order.
///
/// # Errors
///
/// See [`evaluate`].
pub fn select_nodes(doc: &Document, node: NodeId, expression: &str) -> Result<Vec<NodeId>, XPathError> {
    XPath::compile(expression)?.select_nodes(doc, node)
}

/// Compiles an expression and returns its `string()` value.
///
/// # Errors
///
/// See [`evaluate`].
pub fn value_of(doc: &Document, node: NodeId, expression: &str) -> Result<String, XPathError> {
    XPath::compile(expression)?.value_of(doc, node)
}
