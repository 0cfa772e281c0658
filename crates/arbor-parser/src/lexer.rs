//! Tokenizer for expression source text

use crate::error::{ParseError, Result};
use std::fmt;

/// Expression token
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Int(i64),
    /// Magnitude of an int literal that only fits when negated
    IntOverflow(u64),
    Uint(u64),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    True,
    False,
    Null,
    In,

    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Dot,
    Comma,
    Colon,
    Question,

    Not,
    Minus,
    Plus,
    Star,
    Slash,
    Percent,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    EqEq,
    NotEq,
    AndAnd,
    OrOr,

    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Token::Ident(name) => return f.write_str(name),
            Token::Int(i) => return write!(f, "{}", i),
            Token::IntOverflow(u) => return write!(f, "{}", u),
            Token::Uint(u) => return write!(f, "{}u", u),
            Token::Double(d) => return write!(f, "{}", d),
            Token::String(s) => return write!(f, "{:?}", s),
            Token::Bytes(_) => "bytes literal",
            Token::True => "true",
            Token::False => "false",
            Token::Null => "null",
            Token::In => "in",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::Dot => ".",
            Token::Comma => ",",
            Token::Colon => ":",
            Token::Question => "?",
            Token::Not => "!",
            Token::Minus => "-",
            Token::Plus => "+",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::Less => "<",
            Token::LessEq => "<=",
            Token::Greater => ">",
            Token::GreaterEq => ">=",
            Token::EqEq => "==",
            Token::NotEq => "!=",
            Token::AndAnd => "&&",
            Token::OrOr => "||",
            Token::Eof => "end of expression",
        };
        f.write_str(text)
    }
}

/// A token and the character offset it starts at
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

/// Converts source text into tokens
pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    /// Tokenize the whole input; the last token is always `Eof`
    pub fn tokenize(mut self) -> Result<Vec<Spanned>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            let offset = self.pos;
            let Some(c) = self.peek() else {
                tokens.push(Spanned {
                    token: Token::Eof,
                    offset,
                });
                return Ok(tokens);
            };

            let token = match c {
                '0'..='9' => self.number()?,
                '.' if self.peek_at(1).is_some_and(|d| d.is_ascii_digit()) => self.number()?,
                '"' | '\'' => Token::String(self.string(c, false)?),
                'r' | 'R' if matches!(self.peek_at(1), Some('"' | '\'')) => {
                    self.pos += 1;
                    let quote = self.peek().unwrap_or('"');
                    Token::String(self.string(quote, true)?)
                }
                'b' | 'B' if matches!(self.peek_at(1), Some('"' | '\'')) => {
                    self.pos += 1;
                    let quote = self.peek().unwrap_or('"');
                    Token::Bytes(self.string(quote, false)?.into_bytes())
                }
                c if c.is_alphabetic() || c == '_' => self.word(),
                _ => self.punctuation(c, offset)?,
            };
            tokens.push(Spanned { token, offset });
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).copied()
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.pos += 1;
            } else if c == '/' && self.peek_at(1) == Some('/') {
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    fn word(&mut self) -> Token {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        match word.as_str() {
            "true" => Token::True,
            "false" => Token::False,
            "null" => Token::Null,
            "in" => Token::In,
            _ => Token::Ident(word),
        }
    }

    fn number(&mut self) -> Result<Token> {
        let start = self.pos;

        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x' | 'X')) {
            self.pos += 2;
            let digits_start = self.pos;
            while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                self.pos += 1;
            }
            let digits: String = self.chars[digits_start..self.pos].iter().collect();
            return self.integer(&digits, 16, start);
        }

        let mut is_double = false;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            is_double = true;
            self.pos += 1;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let sign = usize::from(matches!(self.peek_at(1), Some('+' | '-')));
            if self.peek_at(1 + sign).is_some_and(|c| c.is_ascii_digit()) {
                is_double = true;
                self.pos += 1 + sign;
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.pos += 1;
                }
            }
        }

        let text: String = self.chars[start..self.pos].iter().collect();
        if is_double {
            return text
                .parse::<f64>()
                .map(Token::Double)
                .map_err(|e| invalid_literal(&text, e.to_string(), start));
        }
        self.integer(&text, 10, start)
    }

    fn integer(&mut self, digits: &str, radix: u32, start: usize) -> Result<Token> {
        let unsigned = matches!(self.peek(), Some('u' | 'U'));
        if unsigned {
            self.pos += 1;
        }
        let literal: String = self.chars[start..self.pos].iter().collect();
        if digits.is_empty() {
            return Err(invalid_literal(&literal, "missing digits", start));
        }

        let magnitude = u64::from_str_radix(digits, radix)
            .map_err(|_| invalid_literal(&literal, "integer out of range", start))?;
        if unsigned {
            return Ok(Token::Uint(magnitude));
        }
        Ok(i64::try_from(magnitude)
            .map(Token::Int)
            .unwrap_or(Token::IntOverflow(magnitude)))
    }

    fn string(&mut self, quote: char, raw: bool) -> Result<String> {
        let start = self.pos;
        self.pos += 1;
        let mut value = String::new();
        loop {
            let Some(c) = self.peek() else {
                return Err(ParseError::UnterminatedString { offset: start });
            };
            self.pos += 1;
            match c {
                c if c == quote => return Ok(value),
                '\n' => return Err(ParseError::UnterminatedString { offset: start }),
                '\\' if !raw => {
                    let escape_offset = self.pos - 1;
                    let Some(escaped) = self.peek() else {
                        return Err(ParseError::UnterminatedString { offset: start });
                    };
                    self.pos += 1;
                    let resolved = match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '0' => '\0',
                        '\\' | '"' | '\'' | '`' | '?' => escaped,
                        other => {
                            return Err(invalid_literal(
                                &format!("\\{}", other),
                                "unknown escape sequence",
                                escape_offset,
                            ))
                        }
                    };
                    value.push(resolved);
                }
                c => value.push(c),
            }
        }
    }

    fn punctuation(&mut self, c: char, offset: usize) -> Result<Token> {
        let next = self.peek_at(1);
        let (token, width) = match (c, next) {
            ('&', Some('&')) => (Token::AndAnd, 2),
            ('|', Some('|')) => (Token::OrOr, 2),
            ('=', Some('=')) => (Token::EqEq, 2),
            ('!', Some('=')) => (Token::NotEq, 2),
            ('<', Some('=')) => (Token::LessEq, 2),
            ('>', Some('=')) => (Token::GreaterEq, 2),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            ('[', _) => (Token::LBracket, 1),
            (']', _) => (Token::RBracket, 1),
            ('{', _) => (Token::LBrace, 1),
            ('}', _) => (Token::RBrace, 1),
            ('.', _) => (Token::Dot, 1),
            (',', _) => (Token::Comma, 1),
            (':', _) => (Token::Colon, 1),
            ('?', _) => (Token::Question, 1),
            ('!', _) => (Token::Not, 1),
            ('-', _) => (Token::Minus, 1),
            ('+', _) => (Token::Plus, 1),
            ('*', _) => (Token::Star, 1),
            ('/', _) => (Token::Slash, 1),
            ('%', _) => (Token::Percent, 1),
            ('<', _) => (Token::Less, 1),
            ('>', _) => (Token::Greater, 1),
            _ => {
                return Err(ParseError::UnexpectedCharacter {
                    character: c,
                    offset,
                })
            }
        };
        self.pos += width;
        Ok(token)
    }
}

fn invalid_literal(literal: &str, message: impl Into<String>, offset: usize) -> ParseError {
    ParseError::InvalidLiteral {
        literal: literal.to_string(),
        message: message.into(),
        offset,
    }
}
