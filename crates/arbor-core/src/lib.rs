//! Arbor Core - Core types and definitions for Arbor rule trees
//!
//! This crate provides the fundamental types used across the Arbor workspace:
//! - The abstract type model (`ValueType`) and schemas
//! - Native runtime values
//! - Rule tree nodes and evaluation options
//! - The contract an expression engine implements (`expr`)
//! - The type bridge between the two type systems (`bridge`)
//! - Error types

pub mod bridge;
pub mod error;
pub mod expr;
pub mod rule;
pub mod types;

// Re-export commonly used types
pub use bridge::{MessageDescriptor, MessageRegistry, TypeBridge};
pub use error::{BridgeError, CoreError};
pub use expr::{ExpressionEngine, ExprType, ExprValue};
pub use rule::{DiscardFail, EvalOptions, RuleNode, SortFunc};
pub use types::{MapKey, PrimitiveType, Schema, SchemaElement, Value, ValueType};

/// Identifier bound to a rule node's own `self` value inside its expression
pub const SELF_IDENT: &str = "self";
