//! Expression engine contract
//!
//! Everything an expression engine exchanges with the rule-tree
//! orchestrators:
//! - `types`: declaration types (`ExprType`, `Decl`, `Declarations`)
//! - `value`: engine runtime values and variable bindings
//! - `ast`: the retained syntax tree, source positions and value trace
//! - `engine`: the `ExpressionEngine` trait itself

pub mod ast;
pub mod engine;
pub mod types;
pub mod value;

pub use ast::{
    Comprehension, EvalTrace, Expr, ExprId, ExprKind, Literal, SourceInfo, SourcePosition,
    SyntaxTree,
};
pub use engine::{Compiled, EngineError, EngineResult, Evaluation, ExpressionEngine};
pub use types::{
    Decl, Declarations, ExprType, MessageType, Overload, PrimitiveKind, WellKnownType,
};
pub use value::{Activation, ExprValue};
