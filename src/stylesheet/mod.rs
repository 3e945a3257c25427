//! Pattern-driven rule engine.
//!
//! A [`Stylesheet`] holds rules, each pairing a match [`Pattern`] with an
//! [`Action`]. Running it against a node fires the best matching rule, or a
//! built-in rule if none matches. Actions receive a [`Processor`] through
//! which they write output and continue the walk; the engine never recurses
//! past a fired rule on its own.
//!
//! ```
//! use xmlweave::Document;
//! use xmlweave::stylesheet::{Processor, Stylesheet, StylesheetError};
//! use xmlweave::NodeId;
//!
//! let doc = Document::parse_str("<doc><title>Hi</title><p>one</p></doc>").unwrap();
//!
//! let mut style = Stylesheet::new();
//! style
//!     .add("title", |p: &mut Processor<'_>, node: NodeId| -> Result<(), StylesheetError> {
//!         p.write("# ");
//!         p.apply_templates(node)?;
//!         p.write("\n");
//!         Ok(())
//!     })
//!     .unwrap();
//! style
//!     .add("p", |p: &mut Processor<'_>, node: NodeId| -> Result<(), StylesheetError> {
//!         let text = p.value_of(node, "string(.)")?;
//!         p.write(&text);
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! assert_eq!(style.run(&doc, doc.root(), None).unwrap(), "# Hi\none");
//! ```

mod mode;
mod pattern;
mod rule;

pub use mode::Mode;
pub use pattern::{ExpressionPattern, NodeTestPattern, Pattern};
pub use rule::{Action, Rule, RuleId, RuleManager};

use std::error::Error;
use std::sync::Arc;

use thiserror::Error;

use crate::tree::{Document, NodeId, NodeType};
use crate::xpath::{Bindings, XPath, XPathError};

/// An error raised while running a stylesheet.
#[derive(Debug, Error)]
pub enum StylesheetError {
    /// An action failed.
    #[error("action failed: {0}")]
    Action(#[source] Box<dyn Error + Send + Sync>),

    /// A pattern or expression could not be compiled or evaluated.
    #[error(transparent)]
    XPath(#[from] XPathError),
}

impl StylesheetError {
    /// Wraps an error raised inside an action.
    pub fn action(err: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        Self::Action(err.into())
    }
}

/// The nodes a stylesheet is run against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A single node, a document or an element.
    Node(NodeId),
    /// A list of nodes.
    Nodes(Vec<NodeId>),
}

impl From<NodeId> for Target {
    fn from(node: NodeId) -> Self {
        Self::Node(node)
    }
}

impl From<Vec<NodeId>> for Target {
    fn from(nodes: Vec<NodeId>) -> Self {
        Self::Nodes(nodes)
    }
}

impl From<&[NodeId]> for Target {
    fn from(nodes: &[NodeId]) -> Self {
        Self::Nodes(nodes.to_vec())
    }
}

/// A set of rules with an optional default mode.
#[derive(Debug, Default)]
pub struct Stylesheet {
    rules: RuleManager,
    default_mode: Option<String>,
    namespaces: Bindings,
}

impl Stylesheet {
    /// Creates an empty stylesheet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the mode used when `run` or `apply_templates` is given none.
    #[must_use]
    pub fn with_default_mode(mut self, mode: &str) -> Self {
        self.default_mode = Some(mode.to_owned());
        self
    }

    /// Binds a prefix for patterns added afterwards and for expressions
    /// evaluated through [`Processor::value_of`].
    #[must_use]
    pub fn with_namespace(mut self, prefix: &str, uri: &str) -> Self {
        self.namespaces.bind_namespace(prefix, uri);
        self
    }

    /// Compiles `pattern` and adds a rule for it in the stylesheet's default
    /// mode, the one set with [`Stylesheet::with_default_mode`] if any. A
    /// union pattern becomes one rule per alternative, each with its own
    /// default priority, all removable through the returned id.
    ///
    /// # Errors
    ///
    /// Returns [`StylesheetError::XPath`] if the pattern does not compile.
    pub fn add(
        &mut self,
        pattern: &str,
        action: impl Action + 'static,
    ) -> Result<RuleId, StylesheetError> {
        let action: Arc<dyn Action> = Arc::new(action);
        let alternatives = Pattern::compile_union_with(pattern, &self.namespaces)?
            .into_iter()
            .map(|pattern| {
                let rule = Rule::with_action(pattern, Arc::clone(&action));
                match &self.default_mode {
                    Some(mode) => rule.in_mode(mode),
                    None => rule,
                }
            })
            .collect();
        Ok(self.rules.add_alternatives(alternatives))
    }

    /// Adds a prepared rule.
    pub fn add_rule(&mut self, rule: Rule) -> RuleId {
        self.rules.add_rule(rule)
    }

    /// Removes a rule and all of its union alternatives.
    pub fn remove_rule(&mut self, id: RuleId) -> bool {
        self.rules.remove_rule(id)
    }

    /// Removes every rule.
    pub fn clear(&mut self) {
        self.rules.clear();
    }

    /// The registered rules.
    #[must_use]
    pub fn rules(&self) -> &RuleManager {
        &self.rules
    }

    /// Fires the matching rule for each target node and returns the output.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by an action or a pattern.
    pub fn run(
        &self,
        doc: &Document,
        target: impl Into<Target>,
        mode: Option<&str>,
    ) -> Result<String, StylesheetError> {
        let mut processor = self.processor(doc, mode);
        match target.into() {
            Target::Node(node) => processor.fire_rule(node)?,
            Target::Nodes(nodes) => {
                for node in nodes {
                    processor.fire_rule(node)?;
                }
            }
        }
        Ok(processor.into_output())
    }

    /// Processes the children of a document or element, or of each document
    /// and element in a list, and returns the output. Other nodes are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by an action or a pattern.
    pub fn apply_templates(
        &self,
        doc: &Document,
        target: impl Into<Target>,
        mode: Option<&str>,
    ) -> Result<String, StylesheetError> {
        let mut processor = self.processor(doc, mode);
        match target.into() {
            Target::Node(node) => processor.apply_templates(node)?,
            Target::Nodes(nodes) => processor.apply_templates_to(&nodes)?,
        }
        Ok(processor.into_output())
    }

    fn processor<'a>(&'a self, doc: &'a Document, mode: Option<&str>) -> Processor<'a> {
        let mode = mode.map(str::to_owned).or_else(|| self.default_mode.clone());
        tracing::debug!(mode = ?mode, rules = self.rules.rule_count(), "running stylesheet");
        Processor {
            stylesheet: self,
            doc,
            mode,
            output: String::new(),
        }
    }
}

/// The state of one stylesheet run, handed to every action.
#[derive(Debug)]
pub struct Processor<'a> {
    stylesheet: &'a Stylesheet,
    doc: &'a Document,
    mode: Option<String>,
    output: String,
}

impl<'a> Processor<'a> {
    /// The document being processed.
    #[must_use]
    pub fn document(&self) -> &'a Document {
        self.doc
    }

    /// The current mode, `None` for the default mode.
    #[must_use]
    pub fn mode(&self) -> Option<&str> {
        self.mode.as_deref()
    }

    /// Fires the best matching rule for `node` in the current mode, or the
    /// built-in rule if none matches.
    ///
    /// # Errors
    ///
    /// Propagates errors from the fired action and from patterns.
    pub fn fire_rule(&mut self, node: NodeId) -> Result<(), StylesheetError> {
        let stylesheet = self.stylesheet;
        let rule = match stylesheet.rules.mode(self.mode.as_deref()) {
            Some(mode) => mode.matching_rule(self.doc, node)?,
            None => None,
        };
        match rule {
            Some(rule) => {
                tracing::trace!(node = %self.doc.describe(node), pattern = %rule.pattern(), "firing rule");
                rule.action().fire(self, node)
            }
            None => self.builtin_rule(node),
        }
    }

    fn builtin_rule(&mut self, node: NodeId) -> Result<(), StylesheetError> {
        match self.doc.node_type(node) {
            NodeType::Document | NodeType::Element => self.apply_templates(node),
            NodeType::Text | NodeType::CData | NodeType::Attribute | NodeType::Entity => {
                let value = self.doc.string_value(node);
                self.output.push_str(&value);
                Ok(())
            }
            NodeType::Comment
            | NodeType::ProcessingInstruction
            | NodeType::Namespace
            | NodeType::DocumentType => Ok(()),
        }
    }

    /// Fires rules for each child of `node` in the current mode.
    ///
    /// # Errors
    ///
    /// See [`Processor::fire_rule`].
    pub fn apply_templates(&mut self, node: NodeId) -> Result<(), StylesheetError> {
        let doc = self.doc;
        for child in doc.children(node) {
            self.fire_rule(child)?;
        }
        Ok(())
    }

    /// Fires rules for each child of `node` in another mode.
    ///
    /// # Errors
    ///
    /// See [`Processor::fire_rule`].
    pub fn apply_templates_in(
        &mut self,
        node: NodeId,
        mode: Option<&str>,
    ) -> Result<(), StylesheetError> {
        let saved = std::mem::replace(&mut self.mode, mode.map(str::to_owned));
        let result = self.apply_templates(node);
        self.mode = saved;
        result
    }

    /// Processes the children of each document and element in `nodes`,
    /// skipping other node kinds.
    ///
    /// # Errors
    ///
    /// See [`Processor::fire_rule`].
    pub fn apply_templates_to(&mut self, nodes: &[NodeId]) -> Result<(), StylesheetError> {
        for &node in nodes {
            if self.doc.node_type(node).is_container() {
                self.apply_templates(node)?;
            }
        }
        Ok(())
    }

    /// Evaluates `expr` with `node` as context and fires the rule for each
    /// selected node, in document order.
    ///
    /// # Errors
    ///
    /// Returns [`StylesheetError::XPath`] if the expression fails, otherwise
    /// see [`Processor::fire_rule`].
    pub fn apply_templates_select(&mut self, node: NodeId, expr: &str) -> Result<(), StylesheetError> {
        let selected = self.compile(expr)?.select_nodes(self.doc, node)?;
        for node in selected {
            self.fire_rule(node)?;
        }
        Ok(())
    }

    /// Evaluates `expr` with `node` as context and returns its string value.
    ///
    /// # Errors
    ///
    /// Returns [`StylesheetError::XPath`] if the expression fails.
    pub fn value_of(&self, node: NodeId, expr: &str) -> Result<String, StylesheetError> {
        Ok(self.compile(expr)?.value_of(self.doc, node)?)
    }

    fn compile(&self, expr: &str) -> Result<XPath, XPathError> {
        Ok(XPath::compile(expr)?.with_bindings(self.stylesheet.namespaces.clone()))
    }

    /// Appends text to the output.
    pub fn write(&mut self, text: &str) {
        self.output.push_str(text);
    }

    /// The output so far.
    #[must_use]
    pub fn output(&self) -> &str {
        &self.output
    }

    fn into_output(self) -> String {
        self.output
    }
}
