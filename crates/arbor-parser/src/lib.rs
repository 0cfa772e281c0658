//! Arbor Parser - Expression parser for the Arbor standard engine
//!
//! This crate turns expression text into the engine-neutral syntax tree
//! defined in `arbor_core::expr`, with node ids, a source-position table
//! and a record of every expanded macro.

pub mod error;
pub mod expression_parser;
pub mod lexer;
pub mod macros;

// Re-export main parser types
pub use error::{ParseError, Result};
pub use expression_parser::{ExpressionParser, ParsedExpression};
