//! Error types for Arbor Core

use thiserror::Error;

/// Errors raised while building schemas and registries
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Duplicate schema element: {0}")]
    DuplicateElement(String),

    #[error("Reserved identifier cannot be declared: {0}")]
    ReservedIdentifier(String),

    #[error("Conflicting descriptor registered for message: {0}")]
    ConflictingDescriptor(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

/// Errors raised by the type bridge
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    /// Message types referenced by a schema that the registry does not know
    #[error("Unresolved message types: {}", .0.join(", "))]
    UnresolvedMessages(Vec<String>),

    /// The schema produced no declarations at all
    #[error("Schema produced no declarations to compile against")]
    EmptyDeclarations,

    /// The engine type has no counterpart in the abstract type model
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    #[error("Result type mismatch: expected {expected}, got {actual}")]
    ResultTypeMismatch { expected: String, actual: String },

    #[error("Cannot convert {actual} value to {expected}: {message}")]
    Conversion {
        expected: String,
        actual: String,
        message: String,
    },
}

impl BridgeError {
    pub(crate) fn conversion(
        expected: impl ToString,
        actual: impl ToString,
        message: impl Into<String>,
    ) -> Self {
        BridgeError::Conversion {
            expected: expected.to_string(),
            actual: actual.to_string(),
            message: message.into(),
        }
    }
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Result type for bridge operations
pub type BridgeResult<T> = std::result::Result<T, BridgeError>;
