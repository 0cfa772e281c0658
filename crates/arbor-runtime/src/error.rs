//! Runtime error types

use arbor_core::expr::EngineError;
use arbor_core::BridgeError;
use serde::Serialize;
use thiserror::Error;

/// Evaluation error
///
/// Any error aborts the whole evaluation; no partial result is returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    /// A rule with an expression has no compiled program
    #[error("Rule '{path}' has an expression but no compiled program")]
    MissingProgram { path: String },

    /// Engine result could not be converted to a native value
    #[error("Cannot convert result of rule '{path}': {source}")]
    RuntimeConversion {
        path: String,
        #[source]
        source: BridgeError,
    },

    /// Expression references `self` but the rule sets no self value
    #[error("Rule '{path}' references self but has no self value")]
    UnresolvedSelfReference { path: String },

    /// The engine failed to evaluate an expression
    #[error("Evaluation of rule '{path}' failed: {source}")]
    Evaluator {
        path: String,
        #[source]
        source: EngineError,
    },

    /// Diagnostics requested on a tree compiled without trace retention
    #[error("Diagnostics requested but the rule tree was compiled without diagnostics collection")]
    DiagnosticsRequestedWithoutTracing,

    /// Evaluation was cancelled by the caller
    #[error("Evaluation cancelled")]
    Cancelled,

    /// A worker task panicked or was aborted
    #[error("Worker failure: {0}")]
    WorkerFailure(String),
}

/// Coarse classification of evaluation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad input data or expression outcome
    Evaluation,
    /// Caller misuse of the API
    Usage,
    /// Caller-initiated cancellation
    Cancelled,
    /// Failure of the runtime itself
    Internal,
}

impl EvalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EvalError::RuntimeConversion { .. }
            | EvalError::UnresolvedSelfReference { .. }
            | EvalError::Evaluator { .. } => ErrorKind::Evaluation,
            EvalError::DiagnosticsRequestedWithoutTracing => ErrorKind::Usage,
            EvalError::Cancelled => ErrorKind::Cancelled,
            EvalError::MissingProgram { .. } | EvalError::WorkerFailure(_) => ErrorKind::Internal,
        }
    }

    /// Returns true if the evaluation was cancelled rather than failed
    pub fn is_cancelled(&self) -> bool {
        matches!(self, EvalError::Cancelled)
    }

    /// Dotted path of the failing rule, if the error names one
    pub fn path(&self) -> Option<&str> {
        match self {
            EvalError::MissingProgram { path }
            | EvalError::RuntimeConversion { path, .. }
            | EvalError::UnresolvedSelfReference { path }
            | EvalError::Evaluator { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, EvalError>;
