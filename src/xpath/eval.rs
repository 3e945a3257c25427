//! `XPath` 1.0 expression evaluator.
//!
//! Walks an [`Expr`] against a [`Document`] and produces an [`XPathValue`].
//!
//! # Evaluation Context
//!
//! Per `XPath` 1.0 section 1, an expression is evaluated with respect to a
//! context node, a context position and size, variable bindings and
//! namespace declarations. [`XPathContext`] holds all of these; it is `Copy`
//! so that predicates can rebind the node and position cheaply.
//!
//! # Location Paths
//!
//! Each step collects the axis nodes of every context node in axis order
//! (nearest first on reverse axes), applies the node test, then applies the
//! predicates one at a time with positions recomputed after each. The
//! results of all context nodes are merged into document order without
//! duplicates before the next step runs.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::tree::{Document, NodeId, NodeType};

use super::ast::{Axis, BinaryOp, Expr, NodeTest, Step};
use super::types::{format_number, parse_number, XPathError, XPathValue};

/// Variable and namespace bindings visible to an expression.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    variables: HashMap<String, XPathValue>,
    namespaces: HashMap<String, String>,
}

impl Bindings {
    /// Creates an empty set of bindings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared empty bindings.
    pub(crate) fn empty() -> &'static Self {
        static EMPTY: OnceLock<Bindings> = OnceLock::new();
        EMPTY.get_or_init(Self::default)
    }

    /// Binds `$name`, replacing any previous value.
    pub fn set_variable(&mut self, name: &str, value: XPathValue) {
        self.variables.insert(name.to_owned(), value);
    }

    /// Binds `prefix` for name tests, replacing any previous binding.
    pub fn bind_namespace(&mut self, prefix: &str, uri: &str) {
        self.namespaces.insert(prefix.to_owned(), uri.to_owned());
    }

    /// Returns the value bound to `$name`.
    #[must_use]
    pub fn variable(&self, name: &str) -> Option<&XPathValue> {
        self.variables.get(name)
    }

    /// Returns the URI bound to `prefix`.
    #[must_use]
    pub fn namespace(&self, prefix: &str) -> Option<&str> {
        self.namespaces.get(prefix).map(String::as_str)
    }
}

/// Evaluation context for an `XPath` 1.0 expression.
///
/// ```
/// use xmlweave::xpath::eval::{Bindings, XPathContext};
/// use xmlweave::xpath::parser::parse;
/// use xmlweave::xpath::XPathValue;
/// use xmlweave::Document;
///
/// let doc = Document::parse_str("<root><a/><b/></root>").unwrap();
/// let root = doc.root_element().unwrap();
/// let bindings = Bindings::new();
/// let ctx = XPathContext::new(&doc, root, &bindings);
/// let value = ctx.evaluate(&parse("count(*)").unwrap()).unwrap();
/// assert_eq!(value, XPathValue::Number(2.0));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct XPathContext<'a> {
    doc: &'a Document,
    node: NodeId,
    position: usize,
    size: usize,
    bindings: &'a Bindings,
}

impl<'a> XPathContext<'a> {
    /// Creates a context at `node` with position and size 1.
    #[must_use]
    pub fn new(doc: &'a Document, node: NodeId, bindings: &'a Bindings) -> Self {
        Self {
            doc,
            node,
            position: 1,
            size: 1,
            bindings,
        }
    }

    /// The document being queried.
    #[must_use]
    pub fn document(&self) -> &'a Document {
        self.doc
    }

    /// The context node.
    #[must_use]
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// The 1-based context position.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    /// The context size.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    fn at(self, node: NodeId, position: usize, size: usize) -> Self {
        Self {
            node,
            position,
            size,
            ..self
        }
    }

    /// Evaluates an expression in this context.
    ///
    /// # Errors
    ///
    /// Returns [`XPathError::UndefinedVariable`] for unbound variables and
    /// [`XPathError::UnresolvedPrefix`] for name tests whose prefix has no
    /// binding. Type mismatches are never errors.
    pub fn evaluate(&self, expr: &Expr) -> Result<XPathValue, XPathError> {
        match expr {
            Expr::Number(n) => Ok(XPathValue::Number(*n)),
            Expr::Literal(s) => Ok(XPathValue::String(s.clone())),
            Expr::Variable(name) => self.bindings.variable(name).cloned().ok_or_else(|| {
                XPathError::UndefinedVariable {
                    name: name.clone(),
                }
            }),
            Expr::Binary { op, left, right } => self.eval_binary(*op, left, right),
            Expr::Negate(inner) => {
                let n = self.number_of(&self.evaluate(inner)?);
                Ok(XPathValue::Number(-n))
            }
            Expr::Call { function, args } => function.call(self, args),
            Expr::Path { absolute, steps } => {
                let start = if *absolute { self.tree_root() } else { self.node };
                let nodes = self.apply_steps(vec![start], steps)?;
                Ok(XPathValue::NodeSet(nodes))
            }
            Expr::Filter {
                primary,
                predicates,
                steps,
            } => {
                let mut nodes = self.evaluate(primary)?.into_nodes();
                self.doc.sort_document_order(&mut nodes);
                for predicate in predicates {
                    nodes = self.filter(&nodes, predicate)?;
                }
                if !steps.is_empty() {
                    nodes = self.apply_steps(nodes, steps)?;
                }
                Ok(XPathValue::NodeSet(nodes))
            }
            Expr::Union(left, right) => {
                let mut nodes = self.evaluate(left)?.into_nodes();
                nodes.extend(self.evaluate(right)?.into_nodes());
                self.doc.sort_document_order(&mut nodes);
                Ok(XPathValue::NodeSet(nodes))
            }
        }
    }

    /// The top of the context node's tree: the document node, or the root
    /// of a detached fragment.
    pub(crate) fn tree_root(&self) -> NodeId {
        self.doc.ancestors(self.node).last().unwrap_or(self.node)
    }

    // --- Conversions ---

    /// `string()` conversion.
    #[must_use]
    pub fn string_of(&self, value: &XPathValue) -> String {
        match value {
            XPathValue::NodeSet(nodes) => self
                .first_node(nodes)
                .map_or_else(String::new, |n| self.doc.string_value(n)),
            XPathValue::Boolean(b) => b.to_string(),
            XPathValue::Number(n) => format_number(*n),
            XPathValue::String(s) => s.clone(),
        }
    }

    /// `number()` conversion.
    #[must_use]
    pub fn number_of(&self, value: &XPathValue) -> f64 {
        match value {
            XPathValue::Number(n) => *n,
            XPathValue::Boolean(b) => f64::from(u8::from(*b)),
            XPathValue::String(s) => parse_number(s),
            XPathValue::NodeSet(_) => parse_number(&self.string_of(value)),
        }
    }

    /// The first node of a set in document order. Sets held in variables
    /// are not necessarily sorted.
    pub(crate) fn first_node(&self, nodes: &[NodeId]) -> Option<NodeId> {
        nodes
            .iter()
            .copied()
            .min_by(|&a, &b| self.doc.compare_order(a, b))
    }

    // --- Operators ---

    fn eval_binary(&self, op: BinaryOp, left: &Expr, right: &Expr) -> Result<XPathValue, XPathError> {
        match op {
            BinaryOp::Or => {
                let value = self.evaluate(left)?.to_boolean() || self.evaluate(right)?.to_boolean();
                Ok(XPathValue::Boolean(value))
            }
            BinaryOp::And => {
                let value = self.evaluate(left)?.to_boolean() && self.evaluate(right)?.to_boolean();
                Ok(XPathValue::Boolean(value))
            }
            BinaryOp::Eq
            | BinaryOp::Neq
            | BinaryOp::Lt
            | BinaryOp::Lte
            | BinaryOp::Gt
            | BinaryOp::Gte => {
                let lhs = self.evaluate(left)?;
                let rhs = self.evaluate(right)?;
                Ok(XPathValue::Boolean(self.compare(op, &lhs, &rhs)))
            }
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                let a = self.number_of(&self.evaluate(left)?);
                let b = self.number_of(&self.evaluate(right)?);
                let n = match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => a / b,
                    _ => a % b,
                };
                Ok(XPathValue::Number(n))
            }
        }
    }

    /// Comparison per `XPath` 1.0 section 3.4. A node-set compares true if
    /// any member satisfies the relation.
    fn compare(&self, op: BinaryOp, lhs: &XPathValue, rhs: &XPathValue) -> bool {
        match (lhs, rhs) {
            (XPathValue::NodeSet(a), XPathValue::NodeSet(b)) => {
                let right: Vec<XPathValue> = b
                    .iter()
                    .map(|&n| XPathValue::String(self.doc.string_value(n)))
                    .collect();
                a.iter().any(|&n| {
                    let left = XPathValue::String(self.doc.string_value(n));
                    right.iter().any(|r| self.compare_atomic(op, &left, r))
                })
            }
            (XPathValue::NodeSet(a), XPathValue::Boolean(_)) => {
                self.compare_atomic(op, &XPathValue::Boolean(!a.is_empty()), rhs)
            }
            (XPathValue::Boolean(_), XPathValue::NodeSet(b)) => {
                self.compare_atomic(op, lhs, &XPathValue::Boolean(!b.is_empty()))
            }
            (XPathValue::NodeSet(a), _) => a.iter().any(|&n| {
                let left = XPathValue::String(self.doc.string_value(n));
                self.compare_atomic(op, &left, rhs)
            }),
            (_, XPathValue::NodeSet(b)) => b.iter().any(|&n| {
                let right = XPathValue::String(self.doc.string_value(n));
                self.compare_atomic(op, lhs, &right)
            }),
            _ => self.compare_atomic(op, lhs, rhs),
        }
    }

    fn compare_atomic(&self, op: BinaryOp, lhs: &XPathValue, rhs: &XPathValue) -> bool {
        if op.is_equality() {
            let equal = match (lhs, rhs) {
                (XPathValue::Boolean(_), _) | (_, XPathValue::Boolean(_)) => {
                    lhs.to_boolean() == rhs.to_boolean()
                }
                (XPathValue::Number(_), _) | (_, XPathValue::Number(_)) => {
                    self.number_of(lhs) == self.number_of(rhs)
                }
                _ => self.string_of(lhs) == self.string_of(rhs),
            };
            // NaN is unequal to everything, itself included.
            return match op {
                BinaryOp::Eq => equal,
                _ => !equal,
            };
        }
        let (a, b) = (self.number_of(lhs), self.number_of(rhs));
        match op {
            BinaryOp::Lt => a < b,
            BinaryOp::Lte => a <= b,
            BinaryOp::Gt => a > b,
            _ => a >= b,
        }
    }

    // --- Location paths ---

    fn apply_steps(&self, mut nodes: Vec<NodeId>, steps: &[Step]) -> Result<Vec<NodeId>, XPathError> {
        for step in steps {
            let mut next = Vec::new();
            for &node in &nodes {
                next.extend(self.apply_step(node, step)?);
            }
            self.doc.sort_document_order(&mut next);
            nodes = next;
        }
        Ok(nodes)
    }

    /// Runs one step from one context node. The result is in axis order.
    fn apply_step(&self, node: NodeId, step: &Step) -> Result<Vec<NodeId>, XPathError> {
        let candidates = self.axis_nodes(node, step.axis);
        if candidates.is_empty() {
            return Ok(candidates);
        }

        let prefix = match &step.test {
            NodeTest::Name {
                prefix: Some(prefix),
                ..
            }
            | NodeTest::PrefixWildcard(prefix) => Some(prefix.as_str()),
            _ => None,
        };
        let mut nodes = match prefix {
            None => candidates
                .into_iter()
                .filter(|&n| self.node_test(n, step.axis, &step.test, ""))
                .collect(),
            Some(prefix) => self.prefixed_test(node, prefix, candidates, step)?,
        };

        for predicate in &step.predicates {
            nodes = self.filter(&nodes, predicate)?;
        }
        Ok(nodes)
    }

    /// Applies a prefixed name test. The prefix is looked up in the
    /// expression's bindings, then at the step's context node, then at each
    /// candidate. It is an error only if it resolves nowhere.
    fn prefixed_test(
        &self,
        node: NodeId,
        prefix: &str,
        candidates: Vec<NodeId>,
        step: &Step,
    ) -> Result<Vec<NodeId>, XPathError> {
        let fixed = self.lookup_prefix(node, prefix);
        let mut resolved = fixed.is_some();
        let mut nodes = Vec::new();
        for candidate in candidates {
            let uri = match &fixed {
                Some(uri) => Some(uri.clone()),
                None => self
                    .doc
                    .namespace_for(candidate, Some(prefix))
                    .map(|ns| ns.uri().to_owned()),
            };
            let Some(uri) = uri else {
                continue;
            };
            resolved = true;
            if self.node_test(candidate, step.axis, &step.test, &uri) {
                nodes.push(candidate);
            }
        }
        if resolved {
            Ok(nodes)
        } else {
            Err(XPathError::UnresolvedPrefix {
                prefix: prefix.to_owned(),
            })
        }
    }

    /// Applies one predicate. A number selects by position; anything else
    /// is converted to boolean.
    #[allow(clippy::cast_precision_loss)]
    fn filter(&self, nodes: &[NodeId], predicate: &Expr) -> Result<Vec<NodeId>, XPathError> {
        let size = nodes.len();
        let mut kept = Vec::new();
        for (i, &node) in nodes.iter().enumerate() {
            let position = i + 1;
            let keep = match self.at(node, position, size).evaluate(predicate)? {
                XPathValue::Number(n) => n == position as f64,
                other => other.to_boolean(),
            };
            if keep {
                kept.push(node);
            }
        }
        Ok(kept)
    }

    /// The nodes on `axis` from `node`, in axis order.
    fn axis_nodes(&self, node: NodeId, axis: Axis) -> Vec<NodeId> {
        let doc = self.doc;
        match axis {
            Axis::Child => doc.children(node).collect(),
            Axis::Descendant => doc.descendants(node).collect(),
            Axis::DescendantOrSelf => std::iter::once(node).chain(doc.descendants(node)).collect(),
            Axis::Parent => doc.parent(node).into_iter().collect(),
            Axis::Ancestor => doc.ancestors(node).skip(1).collect(),
            Axis::AncestorOrSelf => doc.ancestors(node).collect(),
            Axis::Following => doc.following(node),
            Axis::FollowingSibling => doc.following_siblings(node),
            Axis::Preceding => {
                let mut nodes = doc.preceding(node);
                nodes.reverse();
                nodes
            }
            Axis::PrecedingSibling => {
                let mut nodes = doc.preceding_siblings(node);
                nodes.reverse();
                nodes
            }
            Axis::Attribute => doc.attributes(node).to_vec(),
            Axis::Namespace => {
                if doc.node_type(node) == NodeType::Element {
                    doc.in_scope_namespace_nodes(node)
                } else {
                    Vec::new()
                }
            }
            Axis::SelfAxis => vec![node],
        }
    }

    fn lookup_prefix(&self, node: NodeId, prefix: &str) -> Option<String> {
        if let Some(uri) = self.bindings.namespace(prefix) {
            return Some(uri.to_owned());
        }
        self.doc
            .namespace_for(node, Some(prefix))
            .map(|ns| ns.uri().to_owned())
    }

    /// Tests one node. `uri` is the resolved namespace of a prefixed test,
    /// or empty for unprefixed ones.
    fn node_test(&self, node: NodeId, axis: Axis, test: &NodeTest, uri: &str) -> bool {
        let doc = self.doc;
        let ty = doc.node_type(node);
        match test {
            NodeTest::Node => ty != NodeType::DocumentType,
            NodeTest::Text => ty.is_character_data(),
            NodeTest::Comment => ty == NodeType::Comment,
            NodeTest::ProcessingInstruction(target) => {
                ty == NodeType::ProcessingInstruction
                    && target.as_deref().map_or(true, |t| doc.local_name(node) == t)
            }
            NodeTest::Wildcard => ty == axis.principal_node_type(),
            NodeTest::PrefixWildcard(_) => {
                ty == axis.principal_node_type()
                    && ty != NodeType::Namespace
                    && doc.namespace_uri(node) == uri
            }
            NodeTest::Name { prefix, local } => {
                if ty != axis.principal_node_type() {
                    return false;
                }
                if ty == NodeType::Namespace {
                    // Namespace nodes are named by their prefix.
                    return prefix.is_none() && doc.local_name(node) == local;
                }
                doc.local_name(node) == local && doc.namespace_uri(node) == uri
            }
        }
    }
}
