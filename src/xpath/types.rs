//! `XPath` 1.0 values and errors.
//!
//! The four data types from <https://www.w3.org/TR/xpath-10/#section-Data-Model>,
//! plus the number/string conversions that do not need a document. Node-set
//! conversions need string-values and live on the evaluation context.

use std::fmt;

use thiserror::Error;

use crate::tree::NodeId;

/// An `XPath` 1.0 value.
#[derive(Debug, Clone, PartialEq)]
pub enum XPathValue {
    /// A node-set. Values produced by the evaluator are in document order
    /// without duplicates.
    NodeSet(Vec<NodeId>),
    /// A boolean.
    Boolean(bool),
    /// An IEEE 754 double.
    Number(f64),
    /// A string.
    String(String),
}

impl XPathValue {
    /// Returns the node-set, or `None` for the other types.
    #[must_use]
    pub fn as_nodes(&self) -> Option<&[NodeId]> {
        match self {
            Self::NodeSet(nodes) => Some(nodes),
            _ => None,
        }
    }

    /// Consumes the value and returns its nodes. Values of other types are
    /// treated as the empty node-set.
    #[must_use]
    pub fn into_nodes(self) -> Vec<NodeId> {
        match self {
            Self::NodeSet(nodes) => nodes,
            _ => Vec::new(),
        }
    }

    /// Boolean conversion. A node-set is true when non-empty.
    #[must_use]
    pub fn to_boolean(&self) -> bool {
        match self {
            Self::NodeSet(nodes) => !nodes.is_empty(),
            Self::Boolean(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
        }
    }

    /// Returns the name of the value's type.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::NodeSet(_) => "node-set",
            Self::Boolean(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
        }
    }
}

impl fmt::Display for XPathValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NodeSet(nodes) => write!(f, "node-set({})", nodes.len()),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Number(n) => f.write_str(&format_number(*n)),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<bool> for XPathValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<f64> for XPathValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for XPathValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for XPathValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<NodeId>> for XPathValue {
    fn from(value: Vec<NodeId>) -> Self {
        Self::NodeSet(value)
    }
}

/// An error from compiling or evaluating an `XPath` expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum XPathError {
    /// The expression is not valid `XPath` 1.0.
    #[error("XPath syntax error at position {position}: {message}")]
    Syntax {
        /// What was wrong.
        message: String,
        /// 0-based byte offset of the offending token.
        position: usize,
    },

    /// A `$name` reference has no binding.
    #[error("undefined variable ${name}")]
    UndefinedVariable {
        /// The variable name.
        name: String,
    },

    /// A name test uses a prefix bound neither on the expression nor at
    /// the context node.
    #[error("unresolved namespace prefix '{prefix}'")]
    UnresolvedPrefix {
        /// The prefix.
        prefix: String,
    },
}

impl XPathError {
    pub(crate) fn syntax(message: impl Into<String>, position: usize) -> Self {
        Self::Syntax {
            message: message.into(),
            position,
        }
    }
}

/// Formats a number the way `string()` does.
///
/// `NaN`, `Infinity` and `-Infinity` are spelled out, both zeros print as
/// `0`, and integral values have no fractional part.
///
/// ```
/// use xmlweave::xpath::format_number;
///
/// assert_eq!(format_number(3.0), "3");
/// assert_eq!(format_number(-0.0), "0");
/// assert_eq!(format_number(0.5), "0.5");
/// assert_eq!(format_number(f64::NAN), "NaN");
/// ```
#[must_use]
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_owned()
    } else if n.is_infinite() {
        let text = if n > 0.0 { "Infinity" } else { "-Infinity" };
        text.to_owned()
    } else if n == 0.0 {
        "0".to_owned()
    } else {
        // f64's Display never uses exponent notation and drops ".0".
        format!("{n}")
    }
}

/// Converts a string to a number the way `number()` does.
///
/// Only an optional minus sign, digits, and an optional fraction are
/// accepted, surrounded by optional whitespace. Anything else is `NaN`.
#[must_use]
pub fn parse_number(s: &str) -> f64 {
    let trimmed = s.trim_matches(is_xml_whitespace);
    let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
    let mut seen_digit = false;
    let mut seen_dot = false;
    for c in digits.chars() {
        match c {
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => return f64::NAN,
        }
    }
    if !seen_digit {
        return f64::NAN;
    }
    trimmed.parse().unwrap_or(f64::NAN)
}

/// The four XML whitespace characters.
pub(crate) fn is_xml_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}
