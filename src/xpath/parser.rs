//! `XPath` 1.0 expression parser.
//!
//! A recursive descent parser over the tokens produced by
//! [`super::lexer::tokenize`], following the grammar at
//! <https://www.w3.org/TR/xpath-10/#section-Grammar>.
//!
//! # Operator Precedence
//!
//! From lowest to highest:
//! 1. `or`
//! 2. `and`
//! 3. `=`, `!=`
//! 4. `<`, `<=`, `>`, `>=`
//! 5. `+`, `-`
//! 6. `*`, `div`, `mod`
//! 7. Unary `-`
//! 8. `|`
//! 9. Path and filter expressions
//!
//! Function names are resolved against the core library here, so unknown
//! functions and wrong argument counts are reported as syntax errors at the
//! function name.

use super::ast::{Axis, BinaryOp, Expr, NodeTest, Step};
use super::functions::Function;
use super::lexer::{tokenize, Token, TokenKind};
use super::types::XPathError;

/// Parses an expression string into an [`Expr`].
///
/// # Errors
///
/// Returns [`XPathError::Syntax`] if the input is not a valid `XPath` 1.0
/// expression. The position is the byte offset of the offending token, or
/// the input length when the expression ends too early.
///
/// # Examples
///
/// ```
/// use xmlweave::xpath::parser::parse;
///
/// assert!(parse("//book[@price > 10]").is_ok());
/// assert!(parse("//book[").is_err());
/// ```
pub fn parse(input: &str) -> Result<Expr, XPathError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(XPathError::syntax("empty expression", 0));
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        end: input.len(),
    };
    let expr = parser.parse_expr()?;
    if let Some(token) = parser.peek() {
        return Err(parser.error(format!("unexpected '{}' after expression", token.kind)));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Byte length of the input, reported for errors at end of input.
    end: usize,
}

impl Parser {
    // -----------------------------------------------------------------------
    // Token access helpers
    // -----------------------------------------------------------------------

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.peek().map(|t| &t.kind)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == Some(kind)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<(), XPathError> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{kind}', found {}", self.describe_current())))
        }
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn describe_current(&self) -> String {
        self.peek()
            .map_or_else(|| "end of expression".to_owned(), |t| format!("'{}'", t.kind))
    }

    /// Byte offset of the current token.
    fn position(&self) -> usize {
        self.peek().map_or(self.end, |t| t.position)
    }

    fn error(&self, message: impl Into<String>) -> XPathError {
        XPathError::syntax(message, self.position())
    }

    fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    // -----------------------------------------------------------------------
    // Grammar productions
    // -----------------------------------------------------------------------

    /// ```text
    /// Expr ::= OrExpr
    /// ```
    fn parse_expr(&mut self) -> Result<Expr, XPathError> {
        self.parse_or_expr()
    }

    /// ```text
    /// OrExpr ::= AndExpr ('or' AndExpr)*
    /// ```
    fn parse_or_expr(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.parse_and_expr()?;
        while self.eat(&TokenKind::Or) {
            let right = self.parse_and_expr()?;
            left = Self::binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    /// ```text
    /// AndExpr ::= EqualityExpr ('and' EqualityExpr)*
    /// ```
    fn parse_and_expr(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.parse_equality_expr()?;
        while self.eat(&TokenKind::And) {
            let right = self.parse_equality_expr()?;
            left = Self::binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    /// ```text
    /// EqualityExpr ::= RelationalExpr (('=' | '!=') RelationalExpr)*
    /// ```
    fn parse_equality_expr(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.parse_relational_expr()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Equal) => BinaryOp::Eq,
                Some(TokenKind::NotEqual) => BinaryOp::Neq,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_relational_expr()?;
            left = Self::binary(op, left, right);
        }
        Ok(left)
    }

    /// ```text
    /// RelationalExpr ::= AdditiveExpr (('<' | '<=' | '>' | '>=') AdditiveExpr)*
    /// ```
    fn parse_relational_expr(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.parse_additive_expr()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Less) => BinaryOp::Lt,
                Some(TokenKind::LessEqual) => BinaryOp::Lte,
                Some(TokenKind::Greater) => BinaryOp::Gt,
                Some(TokenKind::GreaterEqual) => BinaryOp::Gte,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_additive_expr()?;
            left = Self::binary(op, left, right);
        }
        Ok(left)
    }

    /// ```text
    /// AdditiveExpr ::= MultiplicativeExpr (('+' | '-') MultiplicativeExpr)*
    /// ```
    fn parse_additive_expr(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.parse_multiplicative_expr()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Plus) => BinaryOp::Add,
                Some(TokenKind::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_multiplicative_expr()?;
            left = Self::binary(op, left, right);
        }
        Ok(left)
    }

    /// ```text
    /// MultiplicativeExpr ::= UnaryExpr (('*' | 'div' | 'mod') UnaryExpr)*
    /// ```
    fn parse_multiplicative_expr(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.parse_unary_expr()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Multiply) => BinaryOp::Mul,
                Some(TokenKind::Div) => BinaryOp::Div,
                Some(TokenKind::Mod) => BinaryOp::Mod,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_unary_expr()?;
            left = Self::binary(op, left, right);
        }
        Ok(left)
    }

    /// ```text
    /// UnaryExpr ::= UnionExpr | '-' UnaryExpr
    /// ```
    fn parse_unary_expr(&mut self) -> Result<Expr, XPathError> {
        if self.eat(&TokenKind::Minus) {
            let inner = self.parse_unary_expr()?;
            Ok(Expr::Negate(Box::new(inner)))
        } else {
            self.parse_union_expr()
        }
    }

    /// ```text
    /// UnionExpr ::= PathExpr ('|' PathExpr)*
    /// ```
    fn parse_union_expr(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.parse_path_expr()?;
        while self.eat(&TokenKind::Pipe) {
            let right = self.parse_path_expr()?;
            left = Expr::Union(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    /// ```text
    /// PathExpr ::= LocationPath
    ///            | FilterExpr
    ///            | FilterExpr '/' RelativeLocationPath
    ///            | FilterExpr '//' RelativeLocationPath
    /// ```
    fn parse_path_expr(&mut self) -> Result<Expr, XPathError> {
        match self.peek_kind() {
            Some(
                TokenKind::Slash
                | TokenKind::DoubleSlash
                | TokenKind::Dot
                | TokenKind::DotDot
                | TokenKind::At
                | TokenKind::AxisName(_)
                | TokenKind::NodeType(_)
                | TokenKind::NameTest { .. },
            ) => self.parse_location_path(),
            Some(
                TokenKind::Variable(_)
                | TokenKind::Literal(_)
                | TokenKind::Number(_)
                | TokenKind::LeftParen
                | TokenKind::FunctionName(_),
            ) => self.parse_filter_expr(),
            _ => Err(self.error(format!(
                "expected expression, found {}",
                self.describe_current()
            ))),
        }
    }

    /// ```text
    /// FilterExpr ::= PrimaryExpr Predicate*
    /// ```
    ///
    /// A following `/` or `//` continues the filter with a relative path.
    fn parse_filter_expr(&mut self) -> Result<Expr, XPathError> {
        let primary = self.parse_primary_expr()?;
        let predicates = self.parse_predicates()?;

        let mut steps = Vec::new();
        if self.check(&TokenKind::Slash) || self.check(&TokenKind::DoubleSlash) {
            self.parse_path_continuation(&mut steps)?;
        }

        if predicates.is_empty() && steps.is_empty() {
            Ok(primary)
        } else {
            Ok(Expr::Filter {
                primary: Box::new(primary),
                predicates,
                steps,
            })
        }
    }

    /// ```text
    /// PrimaryExpr ::= VariableReference | '(' Expr ')' | Literal | Number | FunctionCall
    /// ```
    fn parse_primary_expr(&mut self) -> Result<Expr, XPathError> {
        match self.peek_kind().cloned() {
            Some(TokenKind::Variable(name)) => {
                self.pos += 1;
                Ok(Expr::Variable(name))
            }
            Some(TokenKind::Literal(value)) => {
                self.pos += 1;
                Ok(Expr::Literal(value))
            }
            Some(TokenKind::Number(value)) => {
                self.pos += 1;
                Ok(Expr::Number(value))
            }
            Some(TokenKind::LeftParen) => {
                self.pos += 1;
                let expr = self.parse_expr()?;
                self.expect(&TokenKind::RightParen)?;
                Ok(expr)
            }
            Some(TokenKind::FunctionName(_)) => self.parse_function_call(),
            _ => Err(self.error(format!(
                "expected primary expression, found {}",
                self.describe_current()
            ))),
        }
    }

    /// ```text
    /// FunctionCall ::= FunctionName '(' (Argument (',' Argument)*)? ')'
    /// ```
    fn parse_function_call(&mut self) -> Result<Expr, XPathError> {
        let start = self.position();
        let Some(Token {
            kind: TokenKind::FunctionName(name),
            ..
        }) = self.advance()
        else {
            return Err(self.error("expected function name"));
        };
        self.expect(&TokenKind::LeftParen)?;

        let mut args = Vec::new();
        if !self.eat(&TokenKind::RightParen) {
            loop {
                args.push(self.parse_expr()?);
                if self.eat(&TokenKind::Comma) {
                    continue;
                }
                self.expect(&TokenKind::RightParen)?;
                break;
            }
        }

        let Some(function) = Function::lookup(&name) else {
            return Err(XPathError::syntax(format!("unknown function '{name}'"), start));
        };
        if !function.accepts(args.len()) {
            return Err(XPathError::syntax(
                format!("wrong number of arguments to {name}(): {}", args.len()),
                start,
            ));
        }
        Ok(Expr::Call { function, args })
    }

    /// ```text
    /// LocationPath ::= RelativeLocationPath | AbsoluteLocationPath
    /// AbsoluteLocationPath ::= '/' RelativeLocationPath? | '//' RelativeLocationPath
    /// ```
    fn parse_location_path(&mut self) -> Result<Expr, XPathError> {
        let mut steps = Vec::new();
        let absolute = match self.peek_kind() {
            Some(TokenKind::Slash) => {
                self.pos += 1;
                if self.starts_step() {
                    self.parse_relative_location_path(&mut steps)?;
                }
                true
            }
            Some(TokenKind::DoubleSlash) => {
                self.pos += 1;
                steps.push(Step::new(Axis::DescendantOrSelf, NodeTest::Node));
                self.parse_relative_location_path(&mut steps)?;
                true
            }
            _ => {
                self.parse_relative_location_path(&mut steps)?;
                false
            }
        };
        Ok(Expr::Path { absolute, steps })
    }

    /// Parses `'/' RelativeLocationPath` or `'//' RelativeLocationPath`.
    fn parse_path_continuation(&mut self, steps: &mut Vec<Step>) -> Result<(), XPathError> {
        if self.eat(&TokenKind::DoubleSlash) {
            steps.push(Step::new(Axis::DescendantOrSelf, NodeTest::Node));
        } else {
            self.expect(&TokenKind::Slash)?;
        }
        self.parse_relative_location_path(steps)
    }

    /// ```text
    /// RelativeLocationPath ::= Step (('/' | '//') Step)*
    /// ```
    fn parse_relative_location_path(&mut self, steps: &mut Vec<Step>) -> Result<(), XPathError> {
        steps.push(self.parse_step()?);
        loop {
            if self.eat(&TokenKind::Slash) {
                steps.push(self.parse_step()?);
            } else if self.eat(&TokenKind::DoubleSlash) {
                steps.push(Step::new(Axis::DescendantOrSelf, NodeTest::Node));
                steps.push(self.parse_step()?);
            } else {
                return Ok(());
            }
        }
    }

    fn starts_step(&self) -> bool {
        matches!(
            self.peek_kind(),
            Some(
                TokenKind::Dot
                    | TokenKind::DotDot
                    | TokenKind::At
                    | TokenKind::AxisName(_)
                    | TokenKind::NodeType(_)
                    | TokenKind::NameTest { .. }
            )
        )
    }

    /// ```text
    /// Step ::= AxisSpecifier NodeTest Predicate* | '.' | '..'
    /// AxisSpecifier ::= AxisName '::' | '@'?
    /// ```
    fn parse_step(&mut self) -> Result<Step, XPathError> {
        if self.eat(&TokenKind::Dot) {
            return Ok(Step::new(Axis::SelfAxis, NodeTest::Node));
        }
        if self.eat(&TokenKind::DotDot) {
            return Ok(Step::new(Axis::Parent, NodeTest::Node));
        }

        let axis = match self.peek_kind().cloned() {
            Some(TokenKind::At) => {
                self.pos += 1;
                Axis::Attribute
            }
            Some(TokenKind::AxisName(name)) => {
                let Some(axis) = Axis::from_name(&name) else {
                    return Err(self.error(format!("unknown axis '{name}'")));
                };
                self.pos += 1;
                self.expect(&TokenKind::ColonColon)?;
                axis
            }
            _ => Axis::Child,
        };

        let test = self.parse_node_test()?;
        let predicates = self.parse_predicates()?;
        Ok(Step {
            axis,
            test,
            predicates,
        })
    }

    /// ```text
    /// NodeTest ::= NameTest | NodeType '(' ')' | 'processing-instruction' '(' Literal ')'
    /// ```
    fn parse_node_test(&mut self) -> Result<NodeTest, XPathError> {
        match self.peek_kind().cloned() {
            Some(TokenKind::NameTest { prefix, local }) => {
                self.pos += 1;
                Ok(match (prefix, local.as_str()) {
                    (None, "*") => NodeTest::Wildcard,
                    (Some(p), "*") => NodeTest::PrefixWildcard(p),
                    (prefix, _) => NodeTest::Name { prefix, local },
                })
            }
            Some(TokenKind::NodeType(kind)) => {
                self.pos += 1;
                self.expect(&TokenKind::LeftParen)?;
                let test = match kind.as_str() {
                    "node" => NodeTest::Node,
                    "text" => NodeTest::Text,
                    "comment" => NodeTest::Comment,
                    _ => match self.peek_kind().cloned() {
                        Some(TokenKind::Literal(target)) => {
                            self.pos += 1;
                            NodeTest::ProcessingInstruction(Some(target))
                        }
                        _ => NodeTest::ProcessingInstruction(None),
                    },
                };
                self.expect(&TokenKind::RightParen)?;
                Ok(test)
            }
            _ => Err(self.error(format!(
                "expected node test, found {}",
                self.describe_current()
            ))),
        }
    }

    /// ```text
    /// Predicate ::= '[' Expr ']'
    /// ```
    fn parse_predicates(&mut self) -> Result<Vec<Expr>, XPathError> {
        let mut predicates = Vec::new();
        while self.eat(&TokenKind::LeftBracket) {
            predicates.push(self.parse_expr()?);
            self.expect(&TokenKind::RightBracket)?;
        }
        Ok(predicates)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn child(local: &str) -> Step {
        Step::new(
            Axis::Child,
            NodeTest::Name {
                prefix: None,
                local: local.to_string(),
            },
        )
    }

    #[test]
    fn test_root_only() {
        assert_eq!(
            parse("/").unwrap(),
            Expr::Path {
                absolute: true,
                steps: Vec::new()
            }
        );
    }

    #[test]
    fn test_double_slash_expands() {
        assert_eq!(
            parse("//a").unwrap(),
            Expr::Path {
                absolute: true,
                steps: vec![
                    Step::new(Axis::DescendantOrSelf, NodeTest::Node),
                    child("a")
                ]
            }
        );
        assert_eq!(
            parse("a//b").unwrap().relative_steps().unwrap().len(),
            3
        );
    }

    #[test]
    fn test_abbreviations() {
        let expr = parse("../@id").unwrap();
        let steps = expr.relative_steps().unwrap();
        assert_eq!(steps[0], Step::new(Axis::Parent, NodeTest::Node));
        assert_eq!(steps[1].axis, Axis::Attribute);
        assert_eq!(parse(".").unwrap().relative_steps().unwrap()[0].axis, Axis::SelfAxis);
    }

    #[test]
    fn test_precedence() {
        let expr = parse("1 + 2 * 3 = 7 or false()").unwrap();
        let Expr::Binary { op, left, .. } = expr else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::Or);
        let Expr::Binary { op, left, .. } = *left else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::Eq);
        let Expr::Binary { op, right, .. } = *left else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::Add);
        assert!(matches!(*right, Expr::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn test_unary_minus_nests() {
        assert_eq!(
            parse("--1").unwrap(),
            Expr::Negate(Box::new(Expr::Negate(Box::new(Expr::Number(1.0)))))
        );
    }

    #[test]
    fn test_filter_with_continuation() {
        let expr = parse("$items[1]//name").unwrap();
        let Expr::Filter {
            primary,
            predicates,
            steps,
        } = expr
        else {
            panic!("expected filter");
        };
        assert_eq!(*primary, Expr::Variable("items".to_string()));
        assert_eq!(predicates, vec![Expr::Number(1.0)]);
        assert_eq!(steps.len(), 2);
    }

    #[test]
    fn test_plain_primary_is_not_wrapped() {
        assert_eq!(parse("'x'").unwrap(), Expr::Literal("x".to_string()));
        assert_eq!(parse("(1)").unwrap(), Expr::Number(1.0));
    }

    #[test]
    fn test_node_tests() {
        let expr = parse("child::processing-instruction('x')/p:*/comment()").unwrap();
        let steps = expr.relative_steps().unwrap();
        assert_eq!(
            steps[0].test,
            NodeTest::ProcessingInstruction(Some("x".to_string()))
        );
        assert_eq!(steps[1].test, NodeTest::PrefixWildcard("p".to_string()));
        assert_eq!(steps[2].test, NodeTest::Comment);
    }

    #[test]
    fn test_functions_resolved() {
        let expr = parse("count(//a)").unwrap();
        assert!(matches!(
            expr,
            Expr::Call {
                function: Function::Count,
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_function_reports_position() {
        assert_eq!(
            parse("1 + frobnicate()").unwrap_err(),
            XPathError::syntax("unknown function 'frobnicate'", 4)
        );
    }

    #[test]
    fn test_wrong_arity() {
        let err = parse("concat('a')").unwrap_err();
        assert!(matches!(err, XPathError::Syntax { position: 0, .. }));
        assert!(parse("true(1)").is_err());
        assert!(parse("substring('abc', 1, 2, 3)").is_err());
    }

    #[test]
    fn test_error_positions() {
        assert!(matches!(
            parse("//a[").unwrap_err(),
            XPathError::Syntax { position: 4, .. }
        ));
        assert!(matches!(
            parse("a b").unwrap_err(),
            XPathError::Syntax { position: 2, .. }
        ));
        assert!(matches!(
            parse("bogus::a").unwrap_err(),
            XPathError::Syntax { position: 0, .. }
        ));
        assert!(parse("").is_err());
        assert!(parse("a/").is_err());
    }
}
