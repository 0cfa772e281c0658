//! Unary operator execution

use arbor_core::expr::ast::operators;
use arbor_core::expr::{EngineError, EngineResult, ExprValue};

/// Execute a unary operation
pub(crate) fn execute_unary_op(function: &str, operand: &ExprValue) -> EngineResult<ExprValue> {
    match (function, operand) {
        (operators::LOGICAL_NOT, ExprValue::Bool(b)) => Ok(ExprValue::Bool(!b)),
        (operators::NEGATE, ExprValue::Int(i)) => i
            .checked_neg()
            .map(ExprValue::Int)
            .ok_or_else(|| EngineError::Runtime("integer overflow".into())),
        (operators::NEGATE, ExprValue::Double(d)) => Ok(ExprValue::Double(-d)),
        (operators::NEGATE, ExprValue::Duration(d)) => Ok(ExprValue::Duration(-*d)),
        _ => Err(EngineError::Runtime(format!(
            "Cannot apply {} to {}",
            operators::unary(function).unwrap_or(function),
            operand.type_name()
        ))),
    }
}
