//! Arbor Compiler - Rule tree compiler
//!
//! This crate compiles a caller-built rule tree into an immutable
//! `CompiledTree` through any `ExpressionEngine`, and provides the type
//! checker used by the standard engine.

pub mod compiled;
pub mod compiler;
pub mod error;
pub mod semantic;

// Re-export main types
pub use compiled::{CompiledProgram, CompiledRule, CompiledTree};
pub use compiler::{CompileOptions, Compiler};
pub use error::{CheckError, CompileError, Result};

// Re-export semantic types
pub use semantic::{CheckedExpression, TypeChecker};
