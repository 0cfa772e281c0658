//! Expression parser
//!
//! Parses expression text into the engine-neutral syntax tree, assigning
//! every node an id and recording its source offset.
//!
//! Supported syntax:
//! - Identifiers and field selection: `order.customer.id`
//! - Literals: `42`, `42u`, `0x2A`, `3.14`, `"string"`, `r"raw"`, `b"bytes"`,
//!   `true`, `false`, `null`
//! - List and map construction: `[1, 2]`, `{"a": 1}`
//! - Indexing: `tags[0]`, `limits["eu"]`
//! - Unary operators: `!`, `-`
//! - Binary operators by precedence: `* / %`, `+ -`,
//!   `< <= > >= == != in`, `&&`, `||`
//! - Conditional: `a ? b : c`
//! - Global and receiver-style calls: `size(tags)`, `name.startsWith("x")`
//! - Macros: `has(a.b)`, `list.all(x, p)`, `list.exists(x, p)`,
//!   `list.exists_one(x, p)`, `list.map(x, e)`, `list.map(x, p, e)`,
//!   `list.filter(x, p)`

use crate::error::{ParseError, Result};
use crate::lexer::{Lexer, Spanned, Token};
use arbor_core::expr::ast::operators;
use arbor_core::expr::{Expr, ExprId, ExprKind, Literal, SourceInfo};

/// A parsed expression and its source-position table
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedExpression {
    pub source: String,
    pub expr: Expr,
    pub source_info: SourceInfo,
}

/// Expression parser
pub struct ExpressionParser;

impl ExpressionParser {
    /// Parse an expression from a string
    pub fn parse(input: &str) -> Result<ParsedExpression> {
        if input.trim().is_empty() {
            return Err(ParseError::InvalidExpression("Empty expression".to_string()));
        }

        let tokens = Lexer::new(input).tokenize()?;
        let mut parser = Parser::new(tokens, SourceInfo::new(input));
        let expr = parser.expression()?;
        parser.expect_end()?;

        tracing::trace!(
            "Parsed expression with {} nodes: {}",
            parser.source_info.positions.len(),
            input
        );

        Ok(ParsedExpression {
            source: input.to_string(),
            expr,
            source_info: parser.source_info,
        })
    }
}

/// Recursive-descent parser state
pub(crate) struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    next_id: ExprId,
    pub(crate) source_info: SourceInfo,
}

impl Parser {
    fn new(tokens: Vec<Spanned>, source_info: SourceInfo) -> Self {
        Parser {
            tokens,
            pos: 0,
            next_id: 1,
            source_info,
        }
    }

    // =========================================================================
    // Node construction
    // =========================================================================

    pub(crate) fn new_expr(&mut self, offset: usize, kind: ExprKind) -> Expr {
        let id = self.next_id;
        self.next_id += 1;
        self.source_info.positions.insert(id, offset);
        Expr::new(id, kind)
    }

    pub(crate) fn call(&mut self, offset: usize, function: &str, args: Vec<Expr>) -> Expr {
        self.new_expr(
            offset,
            ExprKind::Call {
                function: function.to_string(),
                target: None,
                args,
            },
        )
    }

    pub(crate) fn ident(&mut self, offset: usize, name: &str) -> Expr {
        self.new_expr(offset, ExprKind::Ident(name.to_string()))
    }

    pub(crate) fn literal(&mut self, offset: usize, literal: Literal) -> Expr {
        self.new_expr(offset, ExprKind::Literal(literal))
    }

    /// Offset of the first character of `expr`
    pub(crate) fn start_of(&self, expr: &Expr) -> usize {
        self.source_info.positions.get(&expr.id).copied().unwrap_or(0)
    }

    // =========================================================================
    // Token cursor
    // =========================================================================

    fn current(&self) -> &Spanned {
        // tokenize() always ends with Eof and the cursor never moves past it
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_token(&self, ahead: usize) -> &Token {
        let index = (self.pos + ahead).min(self.tokens.len() - 1);
        &self.tokens[index].token
    }

    fn advance(&mut self) -> Spanned {
        let spanned = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        spanned
    }

    fn eat(&mut self, token: &Token) -> bool {
        if &self.current().token == token {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token, expected: &str) -> Result<usize> {
        if self.current().token == token {
            Ok(self.advance().offset)
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn expect_end(&self) -> Result<()> {
        if self.current().token == Token::Eof {
            Ok(())
        } else {
            Err(self.unexpected("end of expression or operator"))
        }
    }

    fn expect_ident(&mut self, expected: &str) -> Result<(String, usize)> {
        match &self.current().token {
            Token::Ident(name) => {
                let name = name.clone();
                let offset = self.advance().offset;
                Ok((name, offset))
            }
            _ => Err(self.unexpected(expected)),
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let current = self.current();
        match current.token {
            Token::Eof => ParseError::UnexpectedEnd {
                expected: expected.to_string(),
                offset: current.offset,
            },
            ref token => ParseError::UnexpectedToken {
                found: token.to_string(),
                expected: expected.to_string(),
                offset: current.offset,
            },
        }
    }

    // =========================================================================
    // Grammar
    // =========================================================================

    /// expression = or ["?" or ":" expression]
    pub(crate) fn expression(&mut self) -> Result<Expr> {
        let condition = self.logical_or()?;
        if !self.eat(&Token::Question) {
            return Ok(condition);
        }
        let then = self.logical_or()?;
        self.expect(Token::Colon, "':' of conditional")?;
        let otherwise = self.expression()?;
        let start = self.start_of(&condition);
        Ok(self.call(start, operators::CONDITIONAL, vec![condition, then, otherwise]))
    }

    fn logical_or(&mut self) -> Result<Expr> {
        let mut left = self.logical_and()?;
        while self.eat(&Token::OrOr) {
            let right = self.logical_and()?;
            let start = self.start_of(&left);
            left = self.call(start, operators::LOGICAL_OR, vec![left, right]);
        }
        Ok(left)
    }

    fn logical_and(&mut self) -> Result<Expr> {
        let mut left = self.relation()?;
        while self.eat(&Token::AndAnd) {
            let right = self.relation()?;
            let start = self.start_of(&left);
            left = self.call(start, operators::LOGICAL_AND, vec![left, right]);
        }
        Ok(left)
    }

    fn relation(&mut self) -> Result<Expr> {
        let mut left = self.addition()?;
        loop {
            let function = match self.current().token {
                Token::Less => operators::LESS,
                Token::LessEq => operators::LESS_EQUALS,
                Token::Greater => operators::GREATER,
                Token::GreaterEq => operators::GREATER_EQUALS,
                Token::EqEq => operators::EQUALS,
                Token::NotEq => operators::NOT_EQUALS,
                Token::In => operators::IN,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.addition()?;
            let start = self.start_of(&left);
            left = self.call(start, function, vec![left, right]);
        }
    }

    fn addition(&mut self) -> Result<Expr> {
        let mut left = self.multiplication()?;
        loop {
            let function = match self.current().token {
                Token::Plus => operators::ADD,
                Token::Minus => operators::SUBTRACT,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.multiplication()?;
            let start = self.start_of(&left);
            left = self.call(start, function, vec![left, right]);
        }
    }

    fn multiplication(&mut self) -> Result<Expr> {
        let mut left = self.unary()?;
        loop {
            let function = match self.current().token {
                Token::Star => operators::MULTIPLY,
                Token::Slash => operators::DIVIDE,
                Token::Percent => operators::MODULO,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.unary()?;
            let start = self.start_of(&left);
            left = self.call(start, function, vec![left, right]);
        }
    }

    fn unary(&mut self) -> Result<Expr> {
        let offset = self.current().offset;
        match self.current().token {
            Token::Not => {
                self.advance();
                let operand = self.unary()?;
                Ok(self.call(offset, operators::LOGICAL_NOT, vec![operand]))
            }
            Token::Minus => {
                self.advance();
                if let Some(literal) = self.negative_literal()? {
                    return Ok(self.literal(offset, literal));
                }
                let operand = self.unary()?;
                Ok(self.call(offset, operators::NEGATE, vec![operand]))
            }
            _ => self.member(),
        }
    }

    /// Fold `-` directly followed by a numeric literal into the literal
    fn negative_literal(&mut self) -> Result<Option<Literal>> {
        if matches!(self.peek_token(1), Token::Dot | Token::LBracket) {
            return Ok(None);
        }
        let literal = match self.current().token {
            Token::Int(i) => Literal::Int(-i),
            Token::Double(d) => Literal::Double(-d),
            Token::IntOverflow(magnitude) if magnitude == i64::MIN.unsigned_abs() => {
                Literal::Int(i64::MIN)
            }
            Token::IntOverflow(magnitude) => {
                return Err(ParseError::InvalidLiteral {
                    literal: format!("-{}", magnitude),
                    message: "integer out of range".to_string(),
                    offset: self.current().offset,
                })
            }
            _ => return Ok(None),
        };
        self.advance();
        Ok(Some(literal))
    }

    fn member(&mut self) -> Result<Expr> {
        let mut expr = self.primary()?;
        loop {
            match self.current().token {
                Token::Dot => {
                    self.advance();
                    let (field, field_offset) = self.expect_ident("field or method name")?;
                    if self.eat(&Token::LParen) {
                        let args = self.arguments(Token::RParen, "')' or ','")?;
                        expr = self.receiver_call(expr, field, field_offset, args)?;
                    } else {
                        let start = self.start_of(&expr);
                        expr = self.new_expr(
                            start,
                            ExprKind::Select {
                                operand: Box::new(expr),
                                field,
                                test_only: false,
                            },
                        );
                    }
                }
                Token::LBracket => {
                    self.advance();
                    let index = self.expression()?;
                    self.expect(Token::RBracket, "']'")?;
                    let start = self.start_of(&expr);
                    expr = self.call(start, operators::INDEX, vec![expr, index]);
                }
                _ => return Ok(expr),
            }
        }
    }

    fn primary(&mut self) -> Result<Expr> {
        let offset = self.current().offset;
        let token = self.current().token.clone();
        match token {
            Token::Ident(name) => {
                self.advance();
                if self.eat(&Token::LParen) {
                    let args = self.arguments(Token::RParen, "')' or ','")?;
                    return self.global_call(name, offset, args);
                }
                Ok(self.ident(offset, &name))
            }
            Token::LParen => {
                self.advance();
                let inner = self.expression()?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            Token::LBracket => {
                self.advance();
                let items = self.arguments(Token::RBracket, "']' or ','")?;
                Ok(self.new_expr(offset, ExprKind::List(items)))
            }
            Token::LBrace => {
                self.advance();
                let entries = self.map_entries()?;
                Ok(self.new_expr(offset, ExprKind::Map(entries)))
            }
            Token::Int(i) => self.consume_literal(offset, Literal::Int(i)),
            Token::Uint(u) => self.consume_literal(offset, Literal::Uint(u)),
            Token::Double(d) => self.consume_literal(offset, Literal::Double(d)),
            Token::String(s) => self.consume_literal(offset, Literal::String(s)),
            Token::Bytes(b) => self.consume_literal(offset, Literal::Bytes(b)),
            Token::True => self.consume_literal(offset, Literal::Bool(true)),
            Token::False => self.consume_literal(offset, Literal::Bool(false)),
            Token::Null => self.consume_literal(offset, Literal::Null),
            Token::IntOverflow(magnitude) => Err(ParseError::InvalidLiteral {
                literal: magnitude.to_string(),
                message: "integer out of range".to_string(),
                offset,
            }),
            _ => Err(self.unexpected("an operand")),
        }
    }

    fn consume_literal(&mut self, offset: usize, literal: Literal) -> Result<Expr> {
        self.advance();
        Ok(self.literal(offset, literal))
    }

    /// Comma-separated expressions up to `close`; a trailing comma is allowed
    fn arguments(&mut self, close: Token, expected: &str) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        if self.eat(&close) {
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            if self.eat(&close) {
                return Ok(args);
            }
            self.expect(Token::Comma, expected)?;
            if self.eat(&close) {
                return Ok(args);
            }
        }
    }

    fn map_entries(&mut self) -> Result<Vec<(Expr, Expr)>> {
        let mut entries = Vec::new();
        if self.eat(&Token::RBrace) {
            return Ok(entries);
        }
        loop {
            let key = self.expression()?;
            self.expect(Token::Colon, "':' after map key")?;
            let value = self.expression()?;
            entries.push((key, value));
            if self.eat(&Token::RBrace) {
                return Ok(entries);
            }
            self.expect(Token::Comma, "'}' or ','")?;
            if self.eat(&Token::RBrace) {
                return Ok(entries);
            }
        }
    }
}
