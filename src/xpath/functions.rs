//! The `XPath` 1.0 core function library.
//!
//! All 27 functions from <https://www.w3.org/TR/xpath-10/#corelib>. Calls are
//! resolved by the parser, which also checks the argument count, so
//! [`Function::call`] only ever sees an accepted arity.

use crate::name::XML_NAMESPACE;
use crate::tree::{NodeId, NodeType};

use super::ast::Expr;
use super::eval::XPathContext;
use super::types::{is_xml_whitespace, parse_number, XPathError, XPathValue};

/// A core library function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    // Node-set functions.
    /// `last()`
    Last,
    /// `position()`
    Position,
    /// `count(node-set)`
    Count,
    /// `id(object)`
    Id,
    /// `local-name(node-set?)`
    LocalName,
    /// `namespace-uri(node-set?)`
    NamespaceUri,
    /// `name(node-set?)`
    Name,

    // String functions.
    /// `string(object?)`
    String,
    /// `concat(string, string, string*)`
    Concat,
    /// `starts-with(string, string)`
    StartsWith,
    /// `contains(string, string)`
    Contains,
    /// `substring-before(string, string)`
    SubstringBefore,
    /// `substring-after(string, string)`
    SubstringAfter,
    /// `substring(string, number, number?)`
    Substring,
    /// `string-length(string?)`
    StringLength,
    /// `normalize-space(string?)`
    NormalizeSpace,
    /// `translate(string, string, string)`
    Translate,

    // Boolean functions.
    /// `boolean(object)`
    Boolean,
    /// `not(boolean)`
    Not,
    /// `true()`
    True,
    /// `false()`
    False,
    /// `lang(string)`
    Lang,

    // Number functions.
    /// `number(object?)`
    Number,
    /// `sum(node-set)`
    Sum,
    /// `floor(number)`
    Floor,
    /// `ceiling(number)`
    Ceiling,
    /// `round(number)`
    Round,
}

impl Function {
    /// Every function, in library order.
    pub const ALL: [Self; 27] = [
        Self::Last,
        Self::Position,
        Self::Count,
        Self::Id,
        Self::LocalName,
        Self::NamespaceUri,
        Self::Name,
        Self::String,
        Self::Concat,
        Self::StartsWith,
        Self::Contains,
        Self::SubstringBefore,
        Self::SubstringAfter,
        Self::Substring,
        Self::StringLength,
        Self::NormalizeSpace,
        Self::Translate,
        Self::Boolean,
        Self::Not,
        Self::True,
        Self::False,
        Self::Lang,
        Self::Number,
        Self::Sum,
        Self::Floor,
        Self::Ceiling,
        Self::Round,
    ];

    /// Looks up a function by name.
    #[must_use]
    pub fn lookup(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    /// Returns the function name as written in expressions.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Last => "last",
            Self::Position => "position",
            Self::Count => "count",
            Self::Id => "id",
            Self::LocalName => "local-name",
            Self::NamespaceUri => "namespace-uri",
            Self::Name => "name",
            Self::String => "string",
            Self::Concat => "concat",
            Self::StartsWith => "starts-with",
            Self::Contains => "contains",
            Self::SubstringBefore => "substring-before",
            Self::SubstringAfter => "substring-after",
            Self::Substring => "substring",
            Self::StringLength => "string-length",
            Self::NormalizeSpace => "normalize-space",
            Self::Translate => "translate",
            Self::Boolean => "boolean",
            Self::Not => "not",
            Self::True => "true",
            Self::False => "false",
            Self::Lang => "lang",
            Self::Number => "number",
            Self::Sum => "sum",
            Self::Floor => "floor",
            Self::Ceiling => "ceiling",
            Self::Round => "round",
        }
    }

    /// Returns `true` if the function takes `n` arguments.
    #[must_use]
    pub fn accepts(self, n: usize) -> bool {
        match self {
            Self::Last | Self::Position | Self::True | Self::False => n == 0,
            Self::Count
            | Self::Id
            | Self::Boolean
            | Self::Not
            | Self::Lang
            | Self::Sum
            | Self::Floor
            | Self::Ceiling
            | Self::Round => n == 1,
            Self::LocalName
            | Self::NamespaceUri
            | Self::Name
            | Self::String
            | Self::StringLength
            | Self::NormalizeSpace
            | Self::Number => n <= 1,
            Self::Concat => n >= 2,
            Self::StartsWith
            | Self::Contains
            | Self::SubstringBefore
            | Self::SubstringAfter => n == 2,
            Self::Substring => n == 2 || n == 3,
            Self::Translate => n == 3,
        }
    }

    /// Evaluates a call with the given argument expressions.
    pub(crate) fn call(
        self,
        ctx: &XPathContext<'_>,
        args: &[Expr],
    ) -> Result<XPathValue, XPathError> {
        let value = match self {
            Self::Last => XPathValue::Number(count_f64(ctx.size())),
            Self::Position => XPathValue::Number(count_f64(ctx.position())),
            Self::Count => {
                let nodes = arg(ctx, args, 0)?.into_nodes();
                XPathValue::Number(count_f64(nodes.len()))
            }
            Self::Id => XPathValue::NodeSet(id(ctx, &arg(ctx, args, 0)?)),
            Self::LocalName | Self::NamespaceUri | Self::Name => {
                let node = match args.first() {
                    Some(expr) => ctx.first_node(ctx.evaluate(expr)?.as_nodes().unwrap_or(&[])),
                    None => Some(ctx.node()),
                };
                let doc = ctx.document();
                let text = node.map_or_else(String::new, |n| match self {
                    Self::LocalName => doc.local_name(n).to_owned(),
                    Self::NamespaceUri => doc.namespace_uri(n).to_owned(),
                    _ => doc.name(n),
                });
                XPathValue::String(text)
            }

            Self::String => XPathValue::String(string_arg(ctx, args, 0)?),
            Self::Concat => {
                let mut out = String::new();
                for expr in args {
                    out.push_str(&ctx.string_of(&ctx.evaluate(expr)?));
                }
                XPathValue::String(out)
            }
            Self::StartsWith => {
                let (s, prefix) = (string_arg(ctx, args, 0)?, string_arg(ctx, args, 1)?);
                XPathValue::Boolean(s.starts_with(&prefix))
            }
            Self::Contains => {
                let (s, needle) = (string_arg(ctx, args, 0)?, string_arg(ctx, args, 1)?);
                XPathValue::Boolean(s.contains(&needle))
            }
            Self::SubstringBefore => {
                let (s, needle) = (string_arg(ctx, args, 0)?, string_arg(ctx, args, 1)?);
                let before = s.find(&needle).map_or("", |i| &s[..i]);
                XPathValue::String(before.to_owned())
            }
            Self::SubstringAfter => {
                let (s, needle) = (string_arg(ctx, args, 0)?, string_arg(ctx, args, 1)?);
                let after = s.find(&needle).map_or("", |i| &s[i + needle.len()..]);
                XPathValue::String(after.to_owned())
            }
            Self::Substring => {
                let s = string_arg(ctx, args, 0)?;
                let start = round(number_arg(ctx, args, 1)?);
                let end = match args.get(2) {
                    Some(expr) => start + round(ctx.number_of(&ctx.evaluate(expr)?)),
                    None => f64::INFINITY,
                };
                XPathValue::String(substring(&s, start, end))
            }
            Self::StringLength => {
                let s = string_arg(ctx, args, 0)?;
                XPathValue::Number(count_f64(s.chars().count()))
            }
            Self::NormalizeSpace => {
                let s = string_arg(ctx, args, 0)?;
                let words: Vec<&str> = s
                    .split(is_xml_whitespace)
                    .filter(|w| !w.is_empty())
                    .collect();
                XPathValue::String(words.join(" "))
            }
            Self::Translate => {
                let s = string_arg(ctx, args, 0)?;
                let from: Vec<char> = string_arg(ctx, args, 1)?.chars().collect();
                let to: Vec<char> = string_arg(ctx, args, 2)?.chars().collect();
                XPathValue::String(translate(&s, &from, &to))
            }

            Self::Boolean => XPathValue::Boolean(arg(ctx, args, 0)?.to_boolean()),
            Self::Not => XPathValue::Boolean(!arg(ctx, args, 0)?.to_boolean()),
            Self::True => XPathValue::Boolean(true),
            Self::False => XPathValue::Boolean(false),
            Self::Lang => {
                let wanted = string_arg(ctx, args, 0)?;
                XPathValue::Boolean(lang_matches(ctx, &wanted))
            }

            Self::Number => XPathValue::Number(number_arg(ctx, args, 0)?),
            Self::Sum => {
                let doc = ctx.document();
                let total = arg(ctx, args, 0)?
                    .into_nodes()
                    .into_iter()
                    .map(|n| parse_number(&doc.string_value(n)))
                    .sum();
                XPathValue::Number(total)
            }
            Self::Floor => XPathValue::Number(number_arg(ctx, args, 0)?.floor()),
            Self::Ceiling => XPathValue::Number(number_arg(ctx, args, 0)?.ceil()),
            Self::Round => XPathValue::Number(round(number_arg(ctx, args, 0)?)),
        };
        Ok(value)
    }
}

/// Evaluates argument `i`. Arity was checked at compile time, so a missing
/// argument only happens for optional ones, which default to the context node.
fn arg(ctx: &XPathContext<'_>, args: &[Expr], i: usize) -> Result<XPathValue, XPathError> {
    match args.get(i) {
        Some(expr) => ctx.evaluate(expr),
        None => Ok(XPathValue::NodeSet(vec![ctx.node()])),
    }
}

fn string_arg(ctx: &XPathContext<'_>, args: &[Expr], i: usize) -> Result<String, XPathError> {
    Ok(ctx.string_of(&arg(ctx, args, i)?))
}

fn number_arg(ctx: &XPathContext<'_>, args: &[Expr], i: usize) -> Result<f64, XPathError> {
    Ok(ctx.number_of(&arg(ctx, args, i)?))
}

#[allow(clippy::cast_precision_loss)]
fn count_f64(n: usize) -> f64 {
    n as f64
}

/// `round()`: halves round towards positive infinity, and `-0.5 <= n < 0`
/// gives negative zero.
pub(crate) fn round(n: f64) -> f64 {
    if n.is_nan() || n.is_infinite() || n == 0.0 {
        n
    } else if (-0.5..0.0).contains(&n) {
        -0.0
    } else {
        (n + 0.5).floor()
    }
}

/// Characters at 1-based positions `p` with `start <= p < end`. Comparisons
/// involving `NaN` are false, so a `NaN` bound selects nothing.
fn substring(s: &str, start: f64, end: f64) -> String {
    s.chars()
        .enumerate()
        .filter(|&(i, _)| {
            let p = count_f64(i + 1);
            p >= start && p < end
        })
        .map(|(_, c)| c)
        .collect()
}

fn translate(s: &str, from: &[char], to: &[char]) -> String {
    s.chars()
        .filter_map(|c| match from.iter().position(|&f| f == c) {
            Some(i) => to.get(i).copied(),
            None => Some(c),
        })
        .collect()
}

/// Elements in the context node's tree whose `id` or `xml:id` attribute
/// equals one of the whitespace-separated tokens of `value`.
fn id(ctx: &XPathContext<'_>, value: &XPathValue) -> Vec<NodeId> {
    let doc = ctx.document();
    let text = match value {
        XPathValue::NodeSet(nodes) => nodes
            .iter()
            .map(|&n| doc.string_value(n))
            .collect::<Vec<_>>()
            .join(" "),
        other => ctx.string_of(other),
    };
    let tokens: Vec<&str> = text
        .split(is_xml_whitespace)
        .filter(|t| !t.is_empty())
        .collect();
    if tokens.is_empty() {
        return Vec::new();
    }

    let top = ctx.tree_root();
    std::iter::once(top)
        .chain(doc.descendants(top))
        .filter(|&n| doc.node_type(n) == NodeType::Element)
        .filter(|&e| {
            doc.attributes(e).iter().any(|&a| {
                doc.qname(a).is_some_and(|name| {
                    let is_id = name.matches("id", "") || name.matches("id", XML_NAMESPACE);
                    is_id && tokens.contains(&doc.string_value(a).as_str())
                })
            })
        })
        .collect()
}

/// `lang()`: the nearest `xml:lang` on the context node or an ancestor
/// equals `wanted` or starts with `wanted` followed by `-`, ignoring case.
fn lang_matches(ctx: &XPathContext<'_>, wanted: &str) -> bool {
    let doc = ctx.document();
    let declared = doc.ancestors(ctx.node()).find_map(|n| {
        doc.attributes(n).iter().find_map(|&a| {
            doc.qname(a)
                .filter(|name| name.matches("lang", XML_NAMESPACE))
                .map(|_| doc.string_value(a))
        })
    });
    let Some(lang) = declared else {
        return false;
    };
    let lang = lang.to_ascii_lowercase();
    let wanted = wanted.to_ascii_lowercase();
    lang == wanted
        || lang
            .strip_prefix(&wanted)
            .is_some_and(|rest| rest.starts_with('-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_and_names() {
        for f in Function::ALL {
            assert_eq!(Function::lookup(f.name()), Some(f));
        }
        assert_eq!(Function::lookup("matches"), None);
    }

    #[test]
    fn test_arity() {
        assert!(Function::Concat.accepts(5));
        assert!(!Function::Concat.accepts(1));
        assert!(Function::Substring.accepts(3));
        assert!(!Function::Substring.accepts(1));
        assert!(Function::Name.accepts(0));
        assert!(!Function::Last.accepts(1));
    }

    #[test]
    fn test_round() {
        assert_eq!(round(2.5), 3.0);
        assert_eq!(round(-2.5), -2.0);
        assert_eq!(round(1.4), 1.0);
        assert!(round(-0.3).is_sign_negative());
        assert!(round(f64::NAN).is_nan());
        assert_eq!(round(f64::INFINITY), f64::INFINITY);
    }

    #[test]
    fn test_substring_edges() {
        assert_eq!(substring("12345", 2.0, 5.0), "234");
        assert_eq!(substring("12345", round(1.5), round(1.5) + round(2.6)), "234");
        assert_eq!(substring("12345", 0.0, 3.0), "12");
        assert_eq!(substring("12345", f64::NAN, f64::INFINITY), "");
        assert_eq!(substring("12345", 1.0, f64::NAN), "");
        assert_eq!(substring("12345", -42.0, f64::INFINITY), "12345");
        assert_eq!(
            substring("12345", f64::NEG_INFINITY, f64::NEG_INFINITY + f64::INFINITY),
            ""
        );
    }

    #[test]
    fn test_translate() {
        let from: Vec<char> = "abc".chars().collect();
        let to: Vec<char> = "ABC".chars().collect();
        assert_eq!(translate("bar", &from, &to), "BAr");
        let from: Vec<char> = "abc-".chars().collect();
        let to: Vec<char> = "ABC".chars().collect();
        assert_eq!(translate("--aaa--", &from, &to), "AAA");
    }
}
