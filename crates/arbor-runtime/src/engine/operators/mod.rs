//! Operator execution modules
//!
//! This module contains the implementation of operator evaluation for the
//! standard engine's interpreter.

mod binary;
mod comparison;
mod unary;

pub(crate) use binary::execute_binary_op;
pub(crate) use comparison::{map_lookup, values_equal};
pub(crate) use unary::execute_unary_op;
