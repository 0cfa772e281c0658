//! Compiler error types

use arbor_core::BridgeError;
use thiserror::Error;

/// Compiler error
///
/// Every variant names the failing rule by its dotted id path from the
/// root, e.g. `fraud.velocity.burst`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    /// Expression text is not well formed
    #[error("Parse failure in rule '{path}' at offset {offset}: {message}")]
    ParseFailure {
        path: String,
        message: String,
        offset: usize,
    },

    /// Expression does not type-check against its schema
    #[error("Type check failure in rule '{path}': {message}")]
    TypeCheckFailure { path: String, message: String },

    /// Inferred result type differs from the declared one
    #[error("Result type mismatch in rule '{path}': expected {expected}, got {actual}")]
    ResultTypeMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    /// Rule has an expression but neither it nor an ancestor has a schema
    #[error("No schema in scope for rule '{path}'")]
    MissingSchema { path: String },

    /// Schema could not be turned into engine declarations
    #[error("Invalid schema for rule '{path}': {source}")]
    Declaration {
        path: String,
        #[source]
        source: BridgeError,
    },

    /// Two siblings share an id
    #[error("Duplicate rule id '{path}'")]
    DuplicateRuleId { path: String },
}

impl CompileError {
    /// Dotted id path of the failing rule
    pub fn path(&self) -> &str {
        match self {
            CompileError::ParseFailure { path, .. }
            | CompileError::TypeCheckFailure { path, .. }
            | CompileError::ResultTypeMismatch { path, .. }
            | CompileError::MissingSchema { path }
            | CompileError::Declaration { path, .. }
            | CompileError::DuplicateRuleId { path } => path,
        }
    }
}

/// Type checker error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CheckError {
    /// Identifier that is neither declared nor a bound variable
    #[error("Undeclared reference: {0}")]
    UndeclaredReference(String),

    /// Field that the selected type does not have
    #[error("Undefined field '{field}' on {type_name}")]
    UndefinedField { type_name: String, field: String },

    /// Function that exists but not for these argument types
    #[error("No matching overload for {function}({args})")]
    NoMatchingOverload { function: String, args: String },

    /// Type error
    #[error("Type error: {0}")]
    TypeError(String),
}

/// Result type for compiler operations
pub type Result<T> = std::result::Result<T, CompileError>;
