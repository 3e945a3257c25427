//! `XPath` 1.0 tokenizer.
//!
//! Tokens carry the byte offset where they start so that syntax errors can
//! point at the offending token.
//!
//! # Disambiguation
//!
//! The rules from `XPath` 1.0 section 3.7 are applied while scanning:
//!
//! - After a token that ends an operand, `*` is the multiply operator and
//!   `and`, `or`, `div`, `mod` are operators. Elsewhere they are name tests.
//! - A name followed by `(` is a function name, or a node type test for
//!   `node`, `text`, `comment` and `processing-instruction`.
//! - A name followed by `::` is an axis name.

use std::fmt;

use super::types::XPathError;

const NODE_TYPES: &[&str] = &["comment", "text", "processing-instruction", "node"];

/// The kind of a token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `[`
    LeftBracket,
    /// `]`
    RightBracket,
    /// `.`
    Dot,
    /// `..`
    DotDot,
    /// `@`
    At,
    /// `,`
    Comma,
    /// `::`
    ColonColon,
    /// `/`
    Slash,
    /// `//`
    DoubleSlash,
    /// `|`
    Pipe,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*` as the multiply operator.
    Multiply,
    /// `=`
    Equal,
    /// `!=`
    NotEqual,
    /// `<`
    Less,
    /// `<=`
    LessEqual,
    /// `>`
    Greater,
    /// `>=`
    GreaterEqual,
    /// `and`
    And,
    /// `or`
    Or,
    /// `mod`
    Mod,
    /// `div`
    Div,
    /// A number literal.
    Number(f64),
    /// A string literal, without quotes.
    Literal(String),
    /// `$name`, without the `$`.
    Variable(String),
    /// A name test. `local` is `*` for `*` and `prefix:*`.
    NameTest {
        /// Prefix, if written.
        prefix: Option<String>,
        /// Local part or `*`.
        local: String,
    },
    /// A name followed by `(` that is not a node type.
    FunctionName(String),
    /// `node`, `text`, `comment` or `processing-instruction` followed by `(`.
    NodeType(String),
    /// A name followed by `::`.
    AxisName(String),
}

impl TokenKind {
    /// Returns `true` if a following `*` or operator name must be read as
    /// an operator.
    fn ends_operand(&self) -> bool {
        matches!(
            self,
            Self::RightParen
                | Self::RightBracket
                | Self::Dot
                | Self::DotDot
                | Self::Number(_)
                | Self::Literal(_)
                | Self::Variable(_)
                | Self::NameTest { .. }
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LeftParen => f.write_str("("),
            Self::RightParen => f.write_str(")"),
            Self::LeftBracket => f.write_str("["),
            Self::RightBracket => f.write_str("]"),
            Self::Dot => f.write_str("."),
            Self::DotDot => f.write_str(".."),
            Self::At => f.write_str("@"),
            Self::Comma => f.write_str(","),
            Self::ColonColon => f.write_str("::"),
            Self::Slash => f.write_str("/"),
            Self::DoubleSlash => f.write_str("//"),
            Self::Pipe => f.write_str("|"),
            Self::Plus => f.write_str("+"),
            Self::Minus => f.write_str("-"),
            Self::Multiply => f.write_str("*"),
            Self::Equal => f.write_str("="),
            Self::NotEqual => f.write_str("!="),
            Self::Less => f.write_str("<"),
            Self::LessEqual => f.write_str("<="),
            Self::Greater => f.write_str(">"),
            Self::GreaterEqual => f.write_str(">="),
            Self::And => f.write_str("and"),
            Self::Or => f.write_str("or"),
            Self::Mod => f.write_str("mod"),
            Self::Div => f.write_str("div"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Literal(s) => write!(f, "\"{s}\""),
            Self::Variable(name) => write!(f, "${name}"),
            Self::NameTest {
                prefix: Some(p),
                local,
            } => write!(f, "{p}:{local}"),
            Self::NameTest {
                prefix: None,
                local,
            } => f.write_str(local),
            Self::FunctionName(s) | Self::NodeType(s) | Self::AxisName(s) => f.write_str(s),
        }
    }
}

/// A token and the byte offset where it starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// What was read.
    pub kind: TokenKind,
    /// 0-based byte offset in the expression.
    pub position: usize,
}

/// Splits an expression into tokens.
///
/// # Errors
///
/// Returns [`XPathError::Syntax`] for unterminated literals and characters
/// that cannot start a token.
pub fn tokenize(input: &str) -> Result<Vec<Token>, XPathError> {
    Lexer::new(input).run()
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Token>, XPathError> {
        loop {
            self.skip_whitespace();
            let start = self.pos;
            let Some(c) = self.peek() else {
                break;
            };
            let kind = self.next_kind(c)?;
            self.tokens.push(Token {
                kind,
                position: start,
            });
        }
        Ok(self.tokens)
    }

    fn after_operand(&self) -> bool {
        self.tokens.last().is_some_and(|t| t.kind.ends_operand())
    }

    fn next_kind(&mut self, c: char) -> Result<TokenKind, XPathError> {
        let start = self.pos;
        let single = |lexer: &mut Self, kind: TokenKind| {
            lexer.pos += 1;
            Ok(kind)
        };
        match c {
            '(' => single(self, TokenKind::LeftParen),
            ')' => single(self, TokenKind::RightParen),
            '[' => single(self, TokenKind::LeftBracket),
            ']' => single(self, TokenKind::RightBracket),
            '@' => single(self, TokenKind::At),
            ',' => single(self, TokenKind::Comma),
            '|' => single(self, TokenKind::Pipe),
            '+' => single(self, TokenKind::Plus),
            '-' => single(self, TokenKind::Minus),
            '=' => single(self, TokenKind::Equal),
            '*' => {
                self.pos += 1;
                if self.after_operand() {
                    Ok(TokenKind::Multiply)
                } else {
                    Ok(TokenKind::NameTest {
                        prefix: None,
                        local: "*".to_owned(),
                    })
                }
            }
            ':' if self.rest().starts_with("::") => {
                self.pos += 2;
                Ok(TokenKind::ColonColon)
            }
            '/' => Ok(self.pair('/', TokenKind::DoubleSlash, TokenKind::Slash)),
            '<' => Ok(self.pair('=', TokenKind::LessEqual, TokenKind::Less)),
            '>' => Ok(self.pair('=', TokenKind::GreaterEqual, TokenKind::Greater)),
            '!' if self.rest().starts_with("!=") => {
                self.pos += 2;
                Ok(TokenKind::NotEqual)
            }
            '.' => {
                if self.rest().starts_with("..") {
                    self.pos += 2;
                    Ok(TokenKind::DotDot)
                } else if self.rest()[1..].starts_with(|d: char| d.is_ascii_digit()) {
                    self.read_number()
                } else {
                    self.pos += 1;
                    Ok(TokenKind::Dot)
                }
            }
            '"' | '\'' => self.read_literal(c),
            '$' => {
                self.pos += 1;
                match self.read_qname() {
                    Some(name) => Ok(TokenKind::Variable(name)),
                    None => Err(XPathError::syntax("expected a name after '$'", start)),
                }
            }
            '0'..='9' => self.read_number(),
            c if is_name_start(c) => Ok(self.read_name()),
            other => Err(XPathError::syntax(
                format!("unexpected character '{other}'"),
                start,
            )),
        }
    }

    /// Reads `first` followed optionally by `second`.
    fn pair(&mut self, second: char, long: TokenKind, short: TokenKind) -> TokenKind {
        self.pos += 1;
        if self.peek() == Some(second) {
            self.pos += 1;
            long
        } else {
            short
        }
    }

    fn read_literal(&mut self, quote: char) -> Result<TokenKind, XPathError> {
        let start = self.pos;
        self.pos += 1;
        match self.rest().find(quote) {
            Some(len) => {
                let value = self.rest()[..len].to_owned();
                self.pos += len + 1;
                Ok(TokenKind::Literal(value))
            }
            None => Err(XPathError::syntax("unterminated string literal", start)),
        }
    }

    fn read_number(&mut self) -> Result<TokenKind, XPathError> {
        let start = self.pos;
        self.advance_while(|c| c.is_ascii_digit());
        if self.peek() == Some('.') && !self.rest().starts_with("..") {
            self.pos += 1;
            self.advance_while(|c| c.is_ascii_digit());
        }
        let text = &self.input[start..self.pos];
        text.parse()
            .map(TokenKind::Number)
            .map_err(|_| XPathError::syntax(format!("invalid number '{text}'"), start))
    }

    /// Reads `NCName` or `NCName:NCName`. Stops before `::` and before `:*`.
    fn read_qname(&mut self) -> Option<String> {
        let start = self.pos;
        if !self.peek().is_some_and(is_name_start) {
            return None;
        }
        self.advance_while(is_name_char);
        let rest = self.rest();
        if rest.starts_with(':') && rest[1..].starts_with(is_name_start) {
            self.pos += 1;
            self.advance_while(is_name_char);
        }
        Some(self.input[start..self.pos].to_owned())
    }

    fn read_name(&mut self) -> TokenKind {
        let name = self.read_qname().unwrap_or_default();

        if self.after_operand() {
            match name.as_str() {
                "and" => return TokenKind::And,
                "or" => return TokenKind::Or,
                "mod" => return TokenKind::Mod,
                "div" => return TokenKind::Div,
                _ => {}
            }
        }

        if !name.contains(':') && self.rest().starts_with(":*") {
            self.pos += 2;
            return TokenKind::NameTest {
                prefix: Some(name),
                local: "*".to_owned(),
            };
        }

        let lookahead = self.rest().trim_start_matches(|c: char| c.is_ascii_whitespace());
        if lookahead.starts_with("::") {
            return TokenKind::AxisName(name);
        }
        if lookahead.starts_with('(') {
            return if NODE_TYPES.contains(&name.as_str()) {
                TokenKind::NodeType(name)
            } else {
                TokenKind::FunctionName(name)
            };
        }

        match name.split_once(':') {
            Some((prefix, local)) => TokenKind::NameTest {
                prefix: Some(prefix.to_owned()),
                local: local.to_owned(),
            },
            None => TokenKind::NameTest {
                prefix: None,
                local: name,
            },
        }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn advance_while(&mut self, pred: impl Fn(char) -> bool) {
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        self.advance_while(|c| c.is_ascii_whitespace());
    }
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '\u{B7}')
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn name(local: &str) -> TokenKind {
        TokenKind::NameTest {
            prefix: None,
            local: local.to_string(),
        }
    }

    #[test]
    fn test_simple_path() {
        assert_eq!(
            kinds("/a//b"),
            vec![
                TokenKind::Slash,
                name("a"),
                TokenKind::DoubleSlash,
                name("b")
            ]
        );
    }

    #[test]
    fn test_star_disambiguation() {
        assert_eq!(kinds("*"), vec![name("*")]);
        assert_eq!(
            kinds("2 * 3"),
            vec![
                TokenKind::Number(2.0),
                TokenKind::Multiply,
                TokenKind::Number(3.0)
            ]
        );
        assert_eq!(
            kinds("a/*"),
            vec![name("a"), TokenKind::Slash, name("*")]
        );
        assert_eq!(
            kinds("count(*) * 2"),
            vec![
                TokenKind::FunctionName("count".to_string()),
                TokenKind::LeftParen,
                name("*"),
                TokenKind::RightParen,
                TokenKind::Multiply,
                TokenKind::Number(2.0)
            ]
        );
    }

    #[test]
    fn test_operator_names() {
        assert_eq!(
            kinds("div div div"),
            vec![name("div"), TokenKind::Div, name("div")]
        );
        assert_eq!(
            kinds("a and b or c"),
            vec![name("a"), TokenKind::And, name("b"), TokenKind::Or, name("c")]
        );
        assert_eq!(kinds("and"), vec![name("and")]);
    }

    #[test]
    fn test_function_node_type_and_axis() {
        assert_eq!(
            kinds("child::text()"),
            vec![
                TokenKind::AxisName("child".to_string()),
                TokenKind::ColonColon,
                TokenKind::NodeType("text".to_string()),
                TokenKind::LeftParen,
                TokenKind::RightParen
            ]
        );
        assert_eq!(
            kinds("concat ('a')")[0],
            TokenKind::FunctionName("concat".to_string())
        );
    }

    #[test]
    fn test_qualified_names() {
        assert_eq!(
            kinds("svg:rect"),
            vec![TokenKind::NameTest {
                prefix: Some("svg".to_string()),
                local: "rect".to_string()
            }]
        );
        assert_eq!(
            kinds("svg:*"),
            vec![TokenKind::NameTest {
                prefix: Some("svg".to_string()),
                local: "*".to_string()
            }]
        );
        assert_eq!(
            kinds("$p:v"),
            vec![TokenKind::Variable("p:v".to_string())]
        );
    }

    #[test]
    fn test_numbers_and_dots() {
        assert_eq!(
            kinds(".5 + 1.25"),
            vec![
                TokenKind::Number(0.5),
                TokenKind::Plus,
                TokenKind::Number(1.25)
            ]
        );
        assert_eq!(
            kinds("../."),
            vec![TokenKind::DotDot, TokenKind::Slash, TokenKind::Dot]
        );
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(
            kinds("a<=1!=b>=2"),
            vec![
                name("a"),
                TokenKind::LessEqual,
                TokenKind::Number(1.0),
                TokenKind::NotEqual,
                name("b"),
                TokenKind::GreaterEqual,
                TokenKind::Number(2.0)
            ]
        );
    }

    #[test]
    fn test_positions() {
        let tokens = tokenize("a  [ 'x' ]").unwrap();
        let positions: Vec<usize> = tokens.iter().map(|t| t.position).collect();
        assert_eq!(positions, vec![0, 3, 5, 9]);
    }

    #[test]
    fn test_errors_carry_position() {
        assert_eq!(
            tokenize("a = 'open").unwrap_err(),
            XPathError::syntax("unterminated string literal", 4)
        );
        assert_eq!(
            tokenize("a # b").unwrap_err(),
            XPathError::syntax("unexpected character '#'", 2)
        );
        assert!(tokenize("a ! b").is_err());
        assert!(tokenize("$ x").is_err());
    }

    #[test]
    fn test_empty_input() {
        assert!(tokenize("   ").unwrap().is_empty());
    }
}
