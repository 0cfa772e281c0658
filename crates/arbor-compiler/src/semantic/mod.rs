//! Semantic analysis module
//!
//! This module provides type checking for parsed expressions.

pub mod builtins;
pub mod type_checker;

// Re-export for convenience
pub use type_checker::{CheckedExpression, TypeChecker};
