//! Abstract syntax tree for compiled `XPath` 1.0 expressions.
//!
//! The tree follows the grammar at <https://www.w3.org/TR/xpath-10/#section-Basics>.
//! Function calls are resolved against the core library while parsing, so an
//! [`Expr::Call`] always names a known function with an accepted arity.

use std::fmt;

use crate::tree::NodeType;

use super::functions::Function;

/// An `XPath` 1.0 expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A numeric literal.
    Number(f64),

    /// A string literal.
    Literal(String),

    /// A variable reference, without the leading `$`.
    Variable(String),

    /// A binary operation.
    Binary {
        /// The operator.
        op: BinaryOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },

    /// Unary minus.
    Negate(Box<Expr>),

    /// A call to a core library function.
    Call {
        /// The resolved function.
        function: Function,
        /// Argument expressions.
        args: Vec<Expr>,
    },

    /// A location path. An absolute path with no steps is `/`.
    Path {
        /// `true` for paths starting at the root.
        absolute: bool,
        /// Steps, applied left to right.
        steps: Vec<Step>,
    },

    /// A filter expression, optionally continued by a relative path
    /// (`$set[1]/item`, `(a|b)//c`).
    Filter {
        /// The primary expression.
        primary: Box<Expr>,
        /// Predicates applied to the primary node-set in document order.
        predicates: Vec<Expr>,
        /// Steps applied after the predicates.
        steps: Vec<Step>,
    },

    /// Union of two node-sets.
    Union(Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Returns the steps of a relative location path, if this is one.
    #[must_use]
    pub fn relative_steps(&self) -> Option<&[Step]> {
        match self {
            Self::Path {
                absolute: false,
                steps,
            } => Some(steps),
            _ => None,
        }
    }
}

/// Binary operators, loosest binding first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// `or`
    Or,
    /// `and`
    And,
    /// `=`
    Eq,
    /// `!=`
    Neq,
    /// `<`
    Lt,
    /// `<=`
    Lte,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `div`
    Div,
    /// `mod`
    Mod,
}

impl BinaryOp {
    /// Returns `true` for `=` and `!=`.
    #[must_use]
    pub fn is_equality(self) -> bool {
        matches!(self, Self::Eq | Self::Neq)
    }

    /// Returns `true` for the four ordering comparisons.
    #[must_use]
    pub fn is_relational(self) -> bool {
        matches!(self, Self::Lt | Self::Lte | Self::Gt | Self::Gte)
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Or => "or",
            Self::And => "and",
            Self::Eq => "=",
            Self::Neq => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "div",
            Self::Mod => "mod",
        })
    }
}

/// One location step: `axis::test[predicate]...`.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// The axis to walk.
    pub axis: Axis,
    /// The test applied to each node on the axis.
    pub test: NodeTest,
    /// Predicates, applied in order with positions along the axis.
    pub predicates: Vec<Expr>,
}

impl Step {
    /// A step with no predicates.
    #[must_use]
    pub fn new(axis: Axis, test: NodeTest) -> Self {
        Self {
            axis,
            test,
            predicates: Vec::new(),
        }
    }
}

/// The 13 `XPath` axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// `child`
    Child,
    /// `descendant`
    Descendant,
    /// `descendant-or-self`
    DescendantOrSelf,
    /// `parent`
    Parent,
    /// `ancestor`
    Ancestor,
    /// `ancestor-or-self`
    AncestorOrSelf,
    /// `following`
    Following,
    /// `following-sibling`
    FollowingSibling,
    /// `preceding`
    Preceding,
    /// `preceding-sibling`
    PrecedingSibling,
    /// `attribute`
    Attribute,
    /// `namespace`
    Namespace,
    /// `self`
    SelfAxis,
}

impl Axis {
    /// Every axis, in declaration order.
    pub const ALL: [Self; 13] = [
        Self::Child,
        Self::Descendant,
        Self::DescendantOrSelf,
        Self::Parent,
        Self::Ancestor,
        Self::AncestorOrSelf,
        Self::Following,
        Self::FollowingSibling,
        Self::Preceding,
        Self::PrecedingSibling,
        Self::Attribute,
        Self::Namespace,
        Self::SelfAxis,
    ];

    /// Returns the axis name as written in expressions.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Child => "child",
            Self::Descendant => "descendant",
            Self::DescendantOrSelf => "descendant-or-self",
            Self::Parent => "parent",
            Self::Ancestor => "ancestor",
            Self::AncestorOrSelf => "ancestor-or-self",
            Self::Following => "following",
            Self::FollowingSibling => "following-sibling",
            Self::Preceding => "preceding",
            Self::PrecedingSibling => "preceding-sibling",
            Self::Attribute => "attribute",
            Self::Namespace => "namespace",
            Self::SelfAxis => "self",
        }
    }

    /// Looks up an axis by name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|axis| axis.name() == name)
    }

    /// Returns `true` for axes whose proximity order runs against
    /// document order. Positions on these axes count from the nearest node.
    #[must_use]
    pub fn is_reverse(self) -> bool {
        matches!(
            self,
            Self::Ancestor | Self::AncestorOrSelf | Self::Preceding | Self::PrecedingSibling
        )
    }

    /// Returns the node type a name test selects on this axis.
    #[must_use]
    pub fn principal_node_type(self) -> NodeType {
        match self {
            Self::Attribute => NodeType::Attribute,
            Self::Namespace => NodeType::Namespace,
            _ => NodeType::Element,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A node test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTest {
    /// A name test, `local` or `prefix:local`. An unprefixed test matches
    /// only names in no namespace.
    Name {
        /// Prefix as written.
        prefix: Option<String>,
        /// Local part.
        local: String,
    },
    /// `*`
    Wildcard,
    /// `prefix:*`
    PrefixWildcard(String),
    /// `node()`
    Node,
    /// `text()`, which also matches CDATA sections.
    Text,
    /// `comment()`
    Comment,
    /// `processing-instruction()` with an optional target literal.
    ProcessingInstruction(Option<String>),
}

impl fmt::Display for NodeTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name {
                prefix: Some(p),
                local,
            } => write!(f, "{p}:{local}"),
            Self::Name {
                prefix: None,
                local,
            } => f.write_str(local),
            Self::Wildcard => f.write_str("*"),
            Self::PrefixWildcard(p) => write!(f, "{p}:*"),
            Self::Node => f.write_str("node()"),
            Self::Text => f.write_str("text()"),
            Self::Comment => f.write_str("comment()"),
            Self::ProcessingInstruction(None) => f.write_str("processing-instruction()"),
            Self::ProcessingInstruction(Some(t)) => write!(f, "processing-instruction('{t}')"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_names_roundtrip() {
        for axis in Axis::ALL {
            assert_eq!(Axis::from_name(axis.name()), Some(axis));
        }
        assert_eq!(Axis::from_name("children"), None);
    }

    #[test]
    fn test_reverse_axes() {
        let reverse: Vec<Axis> = Axis::ALL.into_iter().filter(|a| a.is_reverse()).collect();
        assert_eq!(
            reverse,
            vec![
                Axis::Ancestor,
                Axis::AncestorOrSelf,
                Axis::Preceding,
                Axis::PrecedingSibling
            ]
        );
    }

    #[test]
    fn test_principal_node_type() {
        assert_eq!(Axis::Attribute.principal_node_type(), NodeType::Attribute);
        assert_eq!(Axis::Namespace.principal_node_type(), NodeType::Namespace);
        assert_eq!(Axis::Following.principal_node_type(), NodeType::Element);
    }

    #[test]
    fn test_node_test_display() {
        let name = NodeTest::Name {
            prefix: Some("svg".to_string()),
            local: "rect".to_string(),
        };
        assert_eq!(name.to_string(), "svg:rect");
        assert_eq!(NodeTest::PrefixWildcard("svg".to_string()).to_string(), "svg:*");
        assert_eq!(
            NodeTest::ProcessingInstruction(Some("xml-stylesheet".to_string())).to_string(),
            "processing-instruction('xml-stylesheet')"
        );
    }

    #[test]
    fn test_operator_classes() {
        assert!(BinaryOp::Neq.is_equality());
        assert!(BinaryOp::Gte.is_relational());
        assert!(!BinaryOp::Mod.is_relational());
        assert_eq!(BinaryOp::Div.to_string(), "div");
    }
}
