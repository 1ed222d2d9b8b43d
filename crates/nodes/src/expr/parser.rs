//! Parser: recursive descent over the lexer's tokens.
//!
//! Identifiers are checked here, not at evaluation time: an expression that
//! mentions anything other than `inputs`, `context`, `meta` or a whitelisted
//! function never makes it to the evaluator.

use serde_json::{Number, Value};

use super::lexer::{Lexer, Token, TokenKind};
use super::{ExprError, MAX_DEPTH};

/// The variables an expression may read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Var {
    Inputs,
    Context,
    Meta,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

/// Whitelisted functions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Func {
    Len,
    Sum,
    Min,
    Max,
    Abs,
    Round,
    Floor,
    Ceil,
    Upper,
    Lower,
    Trim,
    Str,
    Num,
    Keys,
    Values,
    Contains,
    Join,
    Pluck,
    Default,
}

impl Func {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "len" => Self::Len,
            "sum" => Self::Sum,
            "min" => Self::Min,
            "max" => Self::Max,
            "abs" => Self::Abs,
            "round" => Self::Round,
            "floor" => Self::Floor,
            "ceil" => Self::Ceil,
            "upper" => Self::Upper,
            "lower" => Self::Lower,
            "trim" => Self::Trim,
            "str" => Self::Str,
            "num" => Self::Num,
            "keys" => Self::Keys,
            "values" => Self::Values,
            "contains" => Self::Contains,
            "join" => Self::Join,
            "pluck" => Self::Pluck,
            "default" => Self::Default,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Len => "len",
            Self::Sum => "sum",
            Self::Min => "min",
            Self::Max => "max",
            Self::Abs => "abs",
            Self::Round => "round",
            Self::Floor => "floor",
            Self::Ceil => "ceil",
            Self::Upper => "upper",
            Self::Lower => "lower",
            Self::Trim => "trim",
            Self::Str => "str",
            Self::Num => "num",
            Self::Keys => "keys",
            Self::Values => "values",
            Self::Contains => "contains",
            Self::Join => "join",
            Self::Pluck => "pluck",
            Self::Default => "default",
        }
    }

    /// Accepted argument counts as `(min, max)`; `None` means unbounded.
    fn arity(self) -> (usize, Option<usize>) {
        match self {
            Self::Min | Self::Max => (1, None),
            Self::Round => (1, Some(2)),
            Self::Join => (1, Some(2)),
            Self::Contains | Self::Pluck | Self::Default => (2, Some(2)),
            _ => (1, Some(1)),
        }
    }

    fn describe_arity(self) -> &'static str {
        match self.arity() {
            (1, None) => "at least 1",
            (1, Some(2)) => "1 or 2",
            (2, Some(2)) => "2",
            _ => "1",
        }
    }
}

/// Expression syntax tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Literal(Value),
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Var(Var),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
    Call(Func, Vec<Expr>),
}

/// Binary operator levels, lowest precedence first.
const LEVELS: &[&[(TokenKind, BinaryOp)]] = &[
    &[(TokenKind::OrOr, BinaryOp::Or)],
    &[(TokenKind::AndAnd, BinaryOp::And)],
    &[(TokenKind::EqEq, BinaryOp::Eq), (TokenKind::NotEq, BinaryOp::NotEq)],
    &[
        (TokenKind::Lt, BinaryOp::Lt),
        (TokenKind::LtEq, BinaryOp::LtEq),
        (TokenKind::Gt, BinaryOp::Gt),
        (TokenKind::GtEq, BinaryOp::GtEq),
    ],
    &[(TokenKind::Plus, BinaryOp::Add), (TokenKind::Minus, BinaryOp::Sub)],
    &[
        (TokenKind::Star, BinaryOp::Mul),
        (TokenKind::Slash, BinaryOp::Div),
        (TokenKind::Percent, BinaryOp::Rem),
    ],
];

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    /// Parse a complete expression.
    pub fn parse(input: &str) -> Result<Expr, ExprError> {
        let tokens = Lexer::new(input).tokenize()?;
        let mut parser = Self {
            tokens,
            pos: 0,
            depth: 0,
        };
        let expr = parser.parse_expr()?;
        if !parser.check(TokenKind::Eof) {
            return Err(parser.unexpected("end of input"));
        }
        Ok(expr)
    }

    fn parse_expr(&mut self) -> Result<Expr, ExprError> {
        let condition = self.parse_binary(0)?;
        if !self.eat(TokenKind::Question) {
            return Ok(condition);
        }
        let saved = self.depth;
        self.enter()?;
        let then = self.parse_expr()?;
        self.expect(TokenKind::Colon)?;
        let otherwise = self.parse_expr()?;
        self.depth = saved;
        Ok(Expr::Conditional(Box::new(condition), Box::new(then), Box::new(otherwise)))
    }

    fn parse_binary(&mut self, level: usize) -> Result<Expr, ExprError> {
        let Some(ops) = LEVELS.get(level) else {
            return self.parse_unary();
        };

        let saved = self.depth;
        let mut lhs = self.parse_binary(level + 1)?;
        while let Some(op) = ops
            .iter()
            .find(|(kind, _)| self.check(*kind))
            .map(|(_, op)| *op)
        {
            self.advance();
            // Each operator in a chain nests the tree one level deeper.
            self.enter()?;
            let rhs = self.parse_binary(level + 1)?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        self.depth = saved;
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        let op = if self.eat(TokenKind::Bang) {
            UnaryOp::Not
        } else if self.eat(TokenKind::Minus) {
            UnaryOp::Neg
        } else {
            return self.parse_postfix();
        };
        self.enter()?;
        let operand = self.parse_unary()?;
        self.depth -= 1;
        Ok(Expr::Unary(op, Box::new(operand)))
    }

    fn parse_postfix(&mut self) -> Result<Expr, ExprError> {
        let saved = self.depth;
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat(TokenKind::Dot) {
                let token = self.advance();
                match token.kind {
                    TokenKind::Identifier => {
                        self.enter()?;
                        expr = Expr::Member(Box::new(expr), token.text);
                    }
                    // `inputs.0.1` lexes the `0.1` as one number.
                    TokenKind::Number => {
                        for segment in token.text.split('.') {
                            self.enter()?;
                            expr = Expr::Member(Box::new(expr), segment.to_owned());
                        }
                    }
                    _ => {
                        return Err(ExprError::Parse {
                            offset: token.offset,
                            message: format!("expected field name after '.', found {}", token.kind),
                        })
                    }
                }
            } else if self.eat(TokenKind::LBracket) {
                self.enter()?;
                let index = self.parse_expr()?;
                self.expect(TokenKind::RBracket)?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else {
                break;
            }
        }
        self.depth = saved;
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        let token = self.advance();
        match token.kind {
            TokenKind::Number => Ok(Expr::Literal(number_literal(&token)?)),
            TokenKind::Str => Ok(Expr::Literal(Value::String(token.text))),
            TokenKind::LParen => {
                self.enter()?;
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                self.depth -= 1;
                Ok(expr)
            }
            TokenKind::LBracket => {
                self.enter()?;
                let items = self.parse_list(TokenKind::RBracket, Self::parse_expr)?;
                self.depth -= 1;
                Ok(Expr::Array(items))
            }
            TokenKind::LBrace => {
                self.enter()?;
                let entries = self.parse_list(TokenKind::RBrace, Self::parse_entry)?;
                self.depth -= 1;
                Ok(Expr::Object(entries))
            }
            TokenKind::Identifier => self.parse_identifier(token),
            _ => Err(ExprError::Parse {
                offset: token.offset,
                message: format!("expected a value, found {}", token.kind),
            }),
        }
    }

    fn parse_identifier(&mut self, token: Token) -> Result<Expr, ExprError> {
        match token.text.as_str() {
            "true" => return Ok(Expr::Literal(Value::Bool(true))),
            "false" => return Ok(Expr::Literal(Value::Bool(false))),
            "null" => return Ok(Expr::Literal(Value::Null)),
            "inputs" => return Ok(Expr::Var(Var::Inputs)),
            "context" => return Ok(Expr::Var(Var::Context)),
            "meta" => return Ok(Expr::Var(Var::Meta)),
            _ => {}
        }

        if !self.eat(TokenKind::LParen) {
            return Err(ExprError::UnknownIdentifier(token.text));
        }
        let func = Func::from_name(&token.text).ok_or(ExprError::UnknownFunction(token.text))?;
        self.enter()?;
        let args = self.parse_list(TokenKind::RParen, Self::parse_expr)?;
        self.depth -= 1;

        let (min, max) = func.arity();
        if args.len() < min || max.is_some_and(|max| args.len() > max) {
            return Err(ExprError::Arity {
                function: func.name(),
                expected: func.describe_arity(),
                found: args.len(),
            });
        }
        Ok(Expr::Call(func, args))
    }

    fn parse_entry(&mut self) -> Result<(String, Expr), ExprError> {
        let token = self.advance();
        let key = match token.kind {
            TokenKind::Identifier | TokenKind::Str | TokenKind::Number => token.text,
            _ => {
                return Err(ExprError::Parse {
                    offset: token.offset,
                    message: format!("expected object key, found {}", token.kind),
                })
            }
        };
        self.expect(TokenKind::Colon)?;
        Ok((key, self.parse_expr()?))
    }

    /// Comma-separated items up to `close`; the opening token is consumed.
    fn parse_list<T>(
        &mut self,
        close: TokenKind,
        mut item: impl FnMut(&mut Self) -> Result<T, ExprError>,
    ) -> Result<Vec<T>, ExprError> {
        let mut items = Vec::new();
        if self.eat(close) {
            return Ok(items);
        }
        loop {
            items.push(item(self)?);
            if self.eat(close) {
                return Ok(items);
            }
            self.expect(TokenKind::Comma)?;
            // Trailing comma.
            if self.eat(close) {
                return Ok(items);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Token helpers
    // -----------------------------------------------------------------------

    fn enter(&mut self) -> Result<(), ExprError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExprError::TooDeep { max: MAX_DEPTH });
        }
        Ok(())
    }

    fn peek(&self) -> &Token {
        // The lexer always terminates the stream with Eof.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ExprError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&kind.to_string()))
        }
    }

    fn unexpected(&self, expected: &str) -> ExprError {
        let token = self.peek();
        ExprError::Parse {
            offset: token.offset,
            message: format!("expected {expected}, found {}", token.kind),
        }
    }
}

fn number_literal(token: &Token) -> Result<Value, ExprError> {
    if !token.text.contains('.') {
        if let Ok(n) = token.text.parse::<i64>() {
            return Ok(Value::from(n));
        }
    }
    token
        .text
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| ExprError::Parse {
            offset: token.offset,
            message: format!("invalid number '{}'", token.text),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn precedence_binds_multiplication_tighter() {
        let expr = Parser::parse("1 + 2 * 3").unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Add,
                Box::new(Expr::Literal(json!(1))),
                Box::new(Expr::Binary(
                    BinaryOp::Mul,
                    Box::new(Expr::Literal(json!(2))),
                    Box::new(Expr::Literal(json!(3))),
                )),
            )
        );
    }

    #[test]
    fn member_chain_with_numeric_segments() {
        let expr = Parser::parse("inputs.0.1").unwrap();
        assert_eq!(
            expr,
            Expr::Member(
                Box::new(Expr::Member(Box::new(Expr::Var(Var::Inputs)), "0".into())),
                "1".into(),
            )
        );
    }

    #[test]
    fn unknown_identifiers_are_rejected() {
        assert_eq!(
            Parser::parse("__import__").unwrap_err(),
            ExprError::UnknownIdentifier("__import__".into())
        );
        assert_eq!(
            Parser::parse("eval('1')").unwrap_err(),
            ExprError::UnknownFunction("eval".into())
        );
    }

    #[test]
    fn arity_is_checked_at_parse_time() {
        assert!(matches!(
            Parser::parse("len(1, 2)").unwrap_err(),
            ExprError::Arity { function: "len", found: 2, .. }
        ));
        assert!(Parser::parse("max(1, 2, 3)").is_ok());
    }

    #[test]
    fn object_and_array_literals_allow_trailing_commas() {
        let expr = Parser::parse("{ a: [1, 2,], 'b': null, }").unwrap();
        assert_eq!(
            expr,
            Expr::Object(vec![
                (
                    "a".into(),
                    Expr::Array(vec![Expr::Literal(json!(1)), Expr::Literal(json!(2))]),
                ),
                ("b".into(), Expr::Literal(Value::Null)),
            ])
        );
    }

    #[test]
    fn trailing_tokens_are_an_error() {
        assert!(matches!(Parser::parse("1 2"), Err(ExprError::Parse { offset: 2, .. })));
    }

    #[test]
    fn nesting_is_bounded() {
        let nested = |open: &str, close: &str, levels: usize| {
            format!("{}1{}", open.repeat(levels), close.repeat(levels))
        };
        assert!(Parser::parse(&nested("[", "]", MAX_DEPTH)).is_ok());
        assert!(Parser::parse(&nested("(", ")", MAX_DEPTH)).is_ok());
        assert!(Parser::parse(&nested("abs(", ")", MAX_DEPTH)).is_ok());
        assert!(Parser::parse(&nested("-", "", MAX_DEPTH)).is_ok());
        assert_eq!(
            Parser::parse(&nested("[", "]", MAX_DEPTH + 1)).unwrap_err(),
            ExprError::TooDeep { max: MAX_DEPTH }
        );
        assert_eq!(
            Parser::parse(&nested("-", "", MAX_DEPTH + 1)).unwrap_err(),
            ExprError::TooDeep { max: MAX_DEPTH }
        );

        let deep = format!("{}1{}", "(".repeat(100), ")".repeat(100));
        assert_eq!(Parser::parse(&deep).unwrap_err(), ExprError::TooDeep { max: MAX_DEPTH });

        let long_chain = vec!["1"; 100].join(" + ");
        assert_eq!(Parser::parse(&long_chain).unwrap_err(), ExprError::TooDeep { max: MAX_DEPTH });
    }
}
