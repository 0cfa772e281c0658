//! The expression engine contract

use super::ast::{EvalTrace, SyntaxTree};
use super::types::{Declarations, ExprType};
use super::value::{Activation, ExprValue};
use thiserror::Error;

/// Errors reported by an expression engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// The expression text is not well formed
    #[error("Parse error at offset {offset}: {message}")]
    Parse { message: String, offset: usize },

    /// The expression does not type-check against its declarations
    #[error("Type check error: {0}")]
    Check(String),

    /// A declared identifier had no binding at evaluation time
    #[error("No binding for identifier: {0}")]
    UnboundIdentifier(String),

    /// Evaluation failed
    #[error("Evaluation error: {0}")]
    Runtime(String),
}

/// Result type for engine operations
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Output of compiling one expression
#[derive(Debug)]
pub struct Compiled<P> {
    /// Engine-specific executable artifact
    pub program: P,

    /// Inferred type of the expression, when the engine knows it
    pub result_type: Option<ExprType>,

    /// Checked syntax tree, present when retention was requested
    pub syntax_tree: Option<SyntaxTree>,
}

/// Output of evaluating one program
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub value: ExprValue,

    /// Sparse value trace, present for programs compiled with retention
    pub trace: Option<EvalTrace>,
}

/// An expression parser, type checker and evaluator
///
/// The rule-tree orchestrators only ever talk to an engine through this
/// trait. A compiled rule tree is bound to the engine that compiled it.
pub trait ExpressionEngine: Send + Sync + 'static {
    /// Compiled artifact, shared read-only across concurrent evaluations
    type Program: Send + Sync + 'static;

    /// Engine name, for logging
    fn name(&self) -> &str;

    /// Parse and check `source` against `declarations`.
    ///
    /// With `retain_syntax_tree`, the result carries the checked syntax tree
    /// and the program records a value trace on every evaluation.
    fn compile(
        &self,
        source: &str,
        declarations: &Declarations,
        retain_syntax_tree: bool,
    ) -> EngineResult<Compiled<Self::Program>>;

    /// Evaluate a compiled program against variable bindings
    fn evaluate(&self, program: &Self::Program, activation: &Activation)
        -> EngineResult<Evaluation>;
}
