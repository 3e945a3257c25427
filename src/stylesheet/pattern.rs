//! Match patterns.
//!
//! A pattern is compiled from `XPath` syntax into one of two forms. Single
//! node tests (`para`, `p:*`, `@id`, `text()`, `/`) become a
//! [`NodeTestPattern`] that rejects on node type and name without evaluating
//! anything. Everything else becomes an [`ExpressionPattern`], which is
//! matched by brute force.

use std::fmt;

use crate::tree::{Document, NodeId, NodeType};
use crate::xpath::ast::{Axis, Expr, NodeTest, Step};
use crate::xpath::lexer::{self, Token, TokenKind};
use crate::xpath::{parser, Bindings, XPath, XPathError, XPathValue};

/// A compiled match pattern.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// A single node test.
    NodeTest(NodeTestPattern),
    /// Any other expression.
    Expression(ExpressionPattern),
}

impl Pattern {
    /// Compiles a pattern with no namespace bindings. Prefixes are then
    /// resolved in the scope of the node being matched.
    ///
    /// # Errors
    ///
    /// Returns [`XPathError::Syntax`] if `source` is not a valid expression.
    pub fn compile(source: &str) -> Result<Self, XPathError> {
        Self::compile_with(source, &Bindings::new())
    }

    /// Compiles a pattern. Prefixes bound in `bindings` are resolved now;
    /// others are resolved in the scope of the node being matched.
    ///
    /// # Errors
    ///
    /// Returns [`XPathError::Syntax`] if `source` is not a valid expression.
    pub fn compile_with(source: &str, bindings: &Bindings) -> Result<Self, XPathError> {
        let expr = parser::parse(source)?;
        Ok(Self::from_expr(source, expr, bindings))
    }

    /// Compiles a pattern and splits a top-level union into alternatives.
    ///
    /// ```
    /// use xmlweave::stylesheet::Pattern;
    ///
    /// let alternatives = Pattern::compile_union("title | para[1] | @id").unwrap();
    /// assert_eq!(alternatives.len(), 3);
    /// assert!(matches!(alternatives[0], Pattern::NodeTest(_)));
    /// assert!(matches!(alternatives[1], Pattern::Expression(_)));
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`XPathError::Syntax`] if `source` is not a valid expression.
    pub fn compile_union(source: &str) -> Result<Vec<Self>, XPathError> {
        Self::compile_union_with(source, &Bindings::new())
    }

    /// [`Pattern::compile_union`] with namespace bindings.
    ///
    /// # Errors
    ///
    /// Returns [`XPathError::Syntax`] if `source` is not a valid expression.
    pub fn compile_union_with(source: &str, bindings: &Bindings) -> Result<Vec<Self>, XPathError> {
        let mut alternatives = Vec::new();
        split_union(parser::parse(source)?, &mut alternatives);
        let sources = union_sources(source);
        if sources.len() == alternatives.len() {
            return Ok(alternatives
                .into_iter()
                .zip(&sources)
                .map(|(expr, text)| Self::from_expr(text, expr, bindings))
                .collect());
        }
        Ok(alternatives
            .into_iter()
            .map(|expr| Self::from_expr(source, expr, bindings))
            .collect())
    }

    fn from_expr(source: &str, expr: Expr, bindings: &Bindings) -> Self {
        match NodeTestPattern::from_expr(&expr, bindings) {
            Some(test) => Self::NodeTest(test),
            None => Self::Expression(ExpressionPattern {
                xpath: XPath::from_parts(source, expr, bindings.clone()),
            }),
        }
    }

    /// Returns `true` if `node` matches.
    ///
    /// # Errors
    ///
    /// Expression patterns propagate evaluation errors such as unbound
    /// variables.
    pub fn matches(&self, doc: &Document, node: NodeId) -> Result<bool, XPathError> {
        match self {
            Self::NodeTest(test) => Ok(test.matches(doc, node)),
            Self::Expression(expr) => expr.matches(doc, node),
        }
    }

    /// The priority a rule gets when none is given explicitly.
    ///
    /// `0` for a name or a targeted PI test, `-0.25` for `p:*`, `-0.5` for
    /// other node tests, and `0.5` for expressions.
    #[must_use]
    pub fn default_priority(&self) -> f64 {
        match self {
            Self::NodeTest(test) => match test.name {
                NameTest::Local { .. } | NameTest::Target(_) => 0.0,
                NameTest::Namespace(_) => -0.25,
                NameTest::Any => -0.5,
            },
            Self::Expression(_) => 0.5,
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NodeTest(test) => f.write_str(&test.source),
            Self::Expression(expr) => f.write_str(expr.xpath.as_str()),
        }
    }
}

fn split_union(expr: Expr, out: &mut Vec<Expr>) {
    match expr {
        Expr::Union(left, right) => {
            split_union(*left, out);
            split_union(*right, out);
        }
        other => out.push(other),
    }
}

/// The source text of each union alternative, in the order `split_union`
/// yields them. Parenthesized unions are opened up the same way the parser
/// flattens them.
fn union_sources(source: &str) -> Vec<String> {
    let mut out = Vec::new();
    if let Ok(tokens) = lexer::tokenize(source) {
        split_tokens(source, &tokens, source.len(), &mut out);
    }
    out
}

fn split_tokens(source: &str, tokens: &[Token], end: usize, out: &mut Vec<String>) {
    let mut depth = 0usize;
    let mut start = 0;
    for (i, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::LeftParen | TokenKind::LeftBracket => depth += 1,
            TokenKind::RightParen | TokenKind::RightBracket => depth = depth.saturating_sub(1),
            TokenKind::Pipe if depth == 0 => {
                union_piece(source, &tokens[start..i], token.position, out);
                start = i + 1;
            }
            _ => {}
        }
    }
    union_piece(source, &tokens[start..], end, out);
}

fn union_piece(source: &str, tokens: &[Token], end: usize, out: &mut Vec<String>) {
    let Some(first) = tokens.first() else {
        return;
    };
    match tokens.last() {
        Some(last) if tokens.len() > 1 && is_group(tokens) => {
            split_tokens(source, &tokens[1..tokens.len() - 1], last.position, out);
        }
        _ => out.push(source[first.position..end].trim().to_owned()),
    }
}

/// Returns `true` if the tokens are one parenthesized group.
fn is_group(tokens: &[Token]) -> bool {
    if !matches!(tokens.first().map(|t| &t.kind), Some(TokenKind::LeftParen)) {
        return false;
    }
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::LeftParen => depth += 1,
            TokenKind::RightParen => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return i == tokens.len() - 1;
                }
            }
            _ => {}
        }
    }
    false
}

/// How a node test names its namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
enum NamespaceRef {
    /// Resolved at compile time.
    Uri(String),
    /// Resolved in the scope of the matched node.
    Prefix(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NameTest {
    Any,
    Local {
        local: String,
        namespace: NamespaceRef,
    },
    Namespace(NamespaceRef),
    /// `processing-instruction('target')`
    Target(String),
}

/// A pattern that is a single node test.
#[derive(Debug, Clone)]
pub struct NodeTestPattern {
    /// Bit `t` is set when node type `t` can match.
    types: u16,
    name: NameTest,
    source: String,
}

impl NodeTestPattern {
    fn from_expr(expr: &Expr, bindings: &Bindings) -> Option<Self> {
        let Expr::Path { absolute, steps } = expr else {
            return None;
        };
        let source = match (absolute, steps.as_slice()) {
            (true, []) => {
                return Some(Self {
                    types: mask(&[NodeType::Document]),
                    name: NameTest::Any,
                    source: "/".to_owned(),
                })
            }
            (false, [step]) if step.predicates.is_empty() => step,
            _ => return None,
        };
        Self::from_step(source, bindings)
    }

    fn from_step(step: &Step, bindings: &Bindings) -> Option<Self> {
        let principal = match step.axis {
            Axis::Child => NodeType::Element,
            Axis::Attribute => NodeType::Attribute,
            _ => return None,
        };
        let namespace = |prefix: &str| match bindings.namespace(prefix) {
            Some(uri) => NamespaceRef::Uri(uri.to_owned()),
            None => NamespaceRef::Prefix(prefix.to_owned()),
        };
        let (types, name) = match &step.test {
            NodeTest::Name { prefix, local } => {
                let namespace = prefix
                    .as_deref()
                    .map_or_else(|| NamespaceRef::Uri(String::new()), namespace);
                (
                    mask(&[principal]),
                    NameTest::Local {
                        local: local.clone(),
                        namespace,
                    },
                )
            }
            NodeTest::Wildcard => (mask(&[principal]), NameTest::Any),
            NodeTest::PrefixWildcard(prefix) => {
                (mask(&[principal]), NameTest::Namespace(namespace(prefix)))
            }
            NodeTest::Node if step.axis == Axis::Attribute => (mask(&[principal]), NameTest::Any),
            NodeTest::Node => (
                mask(&[
                    NodeType::Element,
                    NodeType::Text,
                    NodeType::CData,
                    NodeType::Comment,
                    NodeType::ProcessingInstruction,
                    NodeType::Entity,
                ]),
                NameTest::Any,
            ),
            // The remaining tests select nothing on the attribute axis.
            _ if step.axis == Axis::Attribute => (0, NameTest::Any),
            NodeTest::Text => (mask(&[NodeType::Text, NodeType::CData]), NameTest::Any),
            NodeTest::Comment => (mask(&[NodeType::Comment]), NameTest::Any),
            NodeTest::ProcessingInstruction(target) => (
                mask(&[NodeType::ProcessingInstruction]),
                target.clone().map_or(NameTest::Any, NameTest::Target),
            ),
        };
        let source = match step.axis {
            Axis::Attribute => format!("@{}", step.test),
            _ => step.test.to_string(),
        };
        Some(Self {
            types,
            name,
            source,
        })
    }

    /// Returns `true` if the pattern can match nodes of type `ty`.
    #[must_use]
    pub fn accepts_type(&self, ty: NodeType) -> bool {
        self.types & (1 << ty.index()) != 0
    }

    /// The node types the pattern can match.
    pub fn node_types(&self) -> impl Iterator<Item = NodeType> + '_ {
        NodeType::ALL.into_iter().filter(|&ty| self.accepts_type(ty))
    }

    /// The local name the pattern requires, if any.
    #[must_use]
    pub fn local_name(&self) -> Option<&str> {
        match &self.name {
            NameTest::Local { local, .. } => Some(local),
            _ => None,
        }
    }

    /// Returns `true` if `node` passes the test.
    #[must_use]
    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        if !self.accepts_type(doc.node_type(node)) {
            return false;
        }
        match &self.name {
            NameTest::Any => true,
            NameTest::Target(target) => doc.local_name(node) == target,
            NameTest::Local { local, namespace } => {
                doc.local_name(node) == local && namespace_matches(doc, node, namespace)
            }
            NameTest::Namespace(namespace) => namespace_matches(doc, node, namespace),
        }
    }
}

fn namespace_matches(doc: &Document, node: NodeId, namespace: &NamespaceRef) -> bool {
    let uri = doc.namespace_uri(node);
    match namespace {
        NamespaceRef::Uri(expected) => uri == expected,
        NamespaceRef::Prefix(prefix) => doc
            .namespace_for(node, Some(prefix))
            .is_some_and(|ns| ns.uri() == uri),
    }
}

fn mask(types: &[NodeType]) -> u16 {
    types.iter().fold(0, |m, ty| m | (1 << ty.index()))
}

/// A pattern matched by evaluating an expression.
#[derive(Debug, Clone)]
pub struct ExpressionPattern {
    xpath: XPath,
}

impl ExpressionPattern {
    /// Returns the compiled expression.
    #[must_use]
    pub fn xpath(&self) -> &XPath {
        &self.xpath
    }

    /// A node matches when the expression, evaluated with the node or one of
    /// its ancestors as context, selects it. If evaluating at the node itself
    /// gives a non-node-set, its boolean value decides.
    ///
    /// A context where a prefix of the expression is not in scope selects
    /// nothing, as it would for a node test.
    ///
    /// # Errors
    ///
    /// Propagates other evaluation errors, such as unbound variables.
    pub fn matches(&self, doc: &Document, node: NodeId) -> Result<bool, XPathError> {
        match self.evaluate_at(doc, node)? {
            Some(XPathValue::NodeSet(nodes)) => {
                if nodes.contains(&node) {
                    return Ok(true);
                }
            }
            Some(other) => return Ok(other.to_boolean()),
            None => {}
        }
        for ancestor in doc.ancestors(node).skip(1) {
            if let Some(XPathValue::NodeSet(nodes)) = self.evaluate_at(doc, ancestor)? {
                if nodes.contains(&node) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn evaluate_at(&self, doc: &Document, context: NodeId) -> Result<Option<XPathValue>, XPathError> {
        match self.xpath.evaluate(doc, context) {
            Ok(value) => Ok(Some(value)),
            Err(XPathError::UnresolvedPrefix { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn doc() -> Document {
        Document::parse_str(
            r#"<doc xmlns:m="urn:m"><title id="t">T</title><para>one</para><para>two</para><m:note/><!--c--><?pi x?></doc>"#,
        )
        .unwrap()
    }

    fn matching(doc: &Document, source: &str) -> Vec<String> {
        let pattern = Pattern::compile(source).unwrap();
        let root = doc.root();
        let mut all: Vec<NodeId> = std::iter::once(root).chain(doc.descendants(root)).collect();
        let attrs: Vec<NodeId> = all.iter().flat_map(|&n| doc.attributes(n).to_vec()).collect();
        all.extend(attrs);
        all.into_iter()
            .filter(|&n| pattern.matches(doc, n).unwrap())
            .map(|n| format!("{}:{}", doc.node_type(n), doc.name(n)))
            .collect()
    }

    #[test]
    fn test_node_test_classification() {
        for source in ["para", "m:note", "*", "m:*", "@id", "@*", "text()", "comment()", "node()", "/"] {
            assert!(
                matches!(Pattern::compile(source).unwrap(), Pattern::NodeTest(_)),
                "{source}"
            );
        }
        for source in ["para[1]", "doc/para", "//para", "ancestor::doc", "id('t')"] {
            assert!(
                matches!(Pattern::compile(source).unwrap(), Pattern::Expression(_)),
                "{source}"
            );
        }
    }

    #[test]
    fn test_default_priorities() {
        let priority = |s: &str| Pattern::compile(s).unwrap().default_priority();
        assert_eq!(priority("para"), 0.0);
        assert_eq!(priority("@id"), 0.0);
        assert_eq!(priority("processing-instruction('pi')"), 0.0);
        assert_eq!(priority("m:*"), -0.25);
        assert_eq!(priority("*"), -0.5);
        assert_eq!(priority("text()"), -0.5);
        assert_eq!(priority("doc/para"), 0.5);
    }

    #[test]
    fn test_name_patterns() {
        let doc = doc();
        assert_eq!(matching(&doc, "para"), vec!["element:para", "element:para"]);
        assert_eq!(matching(&doc, "m:note"), vec!["element:m:note"]);
        assert_eq!(matching(&doc, "m:*"), vec!["element:m:note"]);
        assert_eq!(matching(&doc, "@id"), vec!["attribute:id"]);
        assert!(matching(&doc, "note").is_empty());
    }

    #[test]
    fn test_type_patterns() {
        let doc = doc();
        assert_eq!(matching(&doc, "text()").len(), 3);
        assert_eq!(matching(&doc, "comment()"), vec!["comment:"]);
        assert_eq!(matching(&doc, "processing-instruction()"), vec!["processing-instruction:pi"]);
        assert_eq!(matching(&doc, "/"), vec!["document:"]);
        // node() never matches the document node or attributes.
        assert!(!matching(&doc, "node()").iter().any(|m| m.starts_with("document") || m.starts_with("attribute")));
    }

    #[test]
    fn test_expression_patterns() {
        let doc = doc();
        assert_eq!(matching(&doc, "doc/para"), vec!["element:para", "element:para"]);
        assert_eq!(matching(&doc, "para[2]"), vec!["element:para"]);
        assert_eq!(matching(&doc, "//title/@id"), vec!["attribute:id"]);
        assert_eq!(matching(&doc, "id('t')"), vec!["element:title"]);
    }

    #[test]
    fn test_bound_prefix_resolves_at_compile_time() {
        let doc = Document::parse_str(r#"<r xmlns="urn:d"><x/></r>"#).unwrap();
        let mut bindings = Bindings::new();
        bindings.bind_namespace("d", "urn:d");
        let pattern = Pattern::compile_with("d:x", &bindings).unwrap();
        let x = doc.first_child(doc.root_element().unwrap()).unwrap();
        assert!(pattern.matches(&doc, x).unwrap());
        assert!(!Pattern::compile("x").unwrap().matches(&doc, x).unwrap());
    }

    #[test]
    fn test_display_keeps_source() {
        assert_eq!(Pattern::compile("@id").unwrap().to_string(), "@id");
        assert_eq!(Pattern::compile("a/b").unwrap().to_string(), "a/b");
    }

    #[test]
    fn test_union_alternatives_keep_their_own_source() {
        let names: Vec<String> = Pattern::compile_union("title | para[1] | (@id | m:*)")
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(names, vec!["title", "para[1]", "@id", "m:*"]);
        let names: Vec<String> = Pattern::compile_union("a[b | c]|d")
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(names, vec!["a[b | c]", "d"]);
    }

    #[test]
    fn test_prefix_declared_below_the_root() {
        let doc = Document::parse_str(
            r#"<r><q xmlns:p="urn:p"><p:x><y/></p:x></q><other><z/></other></r>"#,
        )
        .unwrap();
        let pattern = Pattern::compile("p:x/y").unwrap();
        let r = doc.root_element().unwrap();
        let q = doc.first_child(r).unwrap();
        let y = doc.first_child(doc.first_child(q).unwrap()).unwrap();
        let z = doc.first_child(doc.last_child(r).unwrap()).unwrap();
        assert!(pattern.matches(&doc, y).unwrap());
        assert!(!pattern.matches(&doc, z).unwrap());
        assert!(!pattern.matches(&doc, doc.root()).unwrap());
    }
}
