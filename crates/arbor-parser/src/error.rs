//! Parser error types

use thiserror::Error;

/// Parser error
///
/// Offsets are character offsets into the expression source.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Invalid expression syntax
    #[error("Invalid expression syntax: {0}")]
    InvalidExpression(String),

    /// A token that cannot start or continue an expression here
    #[error("Unexpected '{found}' at offset {offset}, expected {expected}")]
    UnexpectedToken {
        found: String,
        expected: String,
        offset: usize,
    },

    /// Input ended in the middle of an expression
    #[error("Unexpected end of expression, expected {expected}")]
    UnexpectedEnd { expected: String, offset: usize },

    /// A character no token starts with
    #[error("Unexpected character '{character}' at offset {offset}")]
    UnexpectedCharacter { character: char, offset: usize },

    /// Malformed or out-of-range literal
    #[error("Invalid literal '{literal}' at offset {offset}: {message}")]
    InvalidLiteral {
        literal: String,
        message: String,
        offset: usize,
    },

    /// String literal without its closing quote
    #[error("Unterminated string starting at offset {offset}")]
    UnterminatedString { offset: usize },

    /// Macro called with the wrong shape of arguments
    #[error("Invalid use of macro '{name}' at offset {offset}: {message}")]
    InvalidMacro {
        name: String,
        message: String,
        offset: usize,
    },
}

impl ParseError {
    /// Character offset the error refers to
    pub fn offset(&self) -> usize {
        match self {
            ParseError::InvalidExpression(_) => 0,
            ParseError::UnexpectedToken { offset, .. }
            | ParseError::UnexpectedEnd { offset, .. }
            | ParseError::UnexpectedCharacter { offset, .. }
            | ParseError::InvalidLiteral { offset, .. }
            | ParseError::UnterminatedString { offset }
            | ParseError::InvalidMacro { offset, .. } => *offset,
        }
    }
}

/// Result type for parser operations
pub type Result<T> = std::result::Result<T, ParseError>;
