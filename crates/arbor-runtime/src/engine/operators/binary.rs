//! Binary operator execution

use super::comparison::{compare, map_lookup, values_equal};
use arbor_core::expr::ast::operators;
use arbor_core::expr::{EngineError, EngineResult, ExprValue};
use std::cmp::Ordering;

/// Execute a binary operation
///
/// `&&` and `||` are not handled here; they short-circuit in the
/// interpreter.
pub(crate) fn execute_binary_op(
    function: &str,
    left: &ExprValue,
    right: &ExprValue,
) -> EngineResult<ExprValue> {
    match function {
        operators::EQUALS => Ok(ExprValue::Bool(values_equal(left, right))),
        operators::NOT_EQUALS => Ok(ExprValue::Bool(!values_equal(left, right))),
        operators::LESS => order(left, right, |o| o == Ordering::Less),
        operators::LESS_EQUALS => order(left, right, |o| o != Ordering::Greater),
        operators::GREATER => order(left, right, |o| o == Ordering::Greater),
        operators::GREATER_EQUALS => order(left, right, |o| o != Ordering::Less),
        operators::INDEX => index(left, right),
        operators::IN => contains(right, left),
        operators::ADD
        | operators::SUBTRACT
        | operators::MULTIPLY
        | operators::DIVIDE
        | operators::MODULO => arithmetic(function, left, right),
        _ => Err(EngineError::Runtime(format!("Unknown operator {}", function))),
    }
}

fn order(
    left: &ExprValue,
    right: &ExprValue,
    test: impl FnOnce(Ordering) -> bool,
) -> EngineResult<ExprValue> {
    compare(left, right).map(|ordering| ExprValue::Bool(test(ordering)))
}

fn index(container: &ExprValue, key: &ExprValue) -> EngineResult<ExprValue> {
    match (container, key) {
        (ExprValue::List(items), ExprValue::Int(_) | ExprValue::Uint(_)) => {
            let position = match key {
                ExprValue::Int(i) => usize::try_from(*i).ok(),
                ExprValue::Uint(u) => usize::try_from(*u).ok(),
                _ => None,
            };
            position
                .and_then(|p| items.get(p))
                .cloned()
                .ok_or_else(|| EngineError::Runtime(format!("Index {} out of range", key)))
        }
        (ExprValue::Map(_), _) => map_lookup(container, key)
            .cloned()
            .ok_or_else(|| EngineError::Runtime(format!("No such key: {}", key))),
        _ => Err(EngineError::Runtime(format!(
            "Cannot index {} with {}",
            container.type_name(),
            key.type_name()
        ))),
    }
}

fn contains(container: &ExprValue, element: &ExprValue) -> EngineResult<ExprValue> {
    match container {
        ExprValue::List(items) => Ok(ExprValue::Bool(
            items.iter().any(|item| values_equal(item, element)),
        )),
        ExprValue::Map(_) => Ok(ExprValue::Bool(map_lookup(container, element).is_some())),
        other => Err(EngineError::Runtime(format!(
            "Operator 'in' requires a list or map, got {}",
            other.type_name()
        ))),
    }
}

fn arithmetic(function: &str, left: &ExprValue, right: &ExprValue) -> EngineResult<ExprValue> {
    let overflow = || EngineError::Runtime("integer overflow".into());

    match (left, right) {
        (ExprValue::Int(l), ExprValue::Int(r)) => {
            let (l, r) = (*l, *r);
            let result = match function {
                operators::ADD => l.checked_add(r),
                operators::SUBTRACT => l.checked_sub(r),
                operators::MULTIPLY => l.checked_mul(r),
                operators::DIVIDE => {
                    if r == 0 {
                        return Err(division_by_zero());
                    }
                    l.checked_div(r)
                }
                _ => {
                    if r == 0 {
                        return Err(division_by_zero());
                    }
                    l.checked_rem(r)
                }
            };
            result.map(ExprValue::Int).ok_or_else(overflow)
        }
        (ExprValue::Uint(l), ExprValue::Uint(r)) => {
            let (l, r) = (*l, *r);
            let result = match function {
                operators::ADD => l.checked_add(r),
                operators::SUBTRACT => l.checked_sub(r),
                operators::MULTIPLY => l.checked_mul(r),
                operators::DIVIDE => {
                    if r == 0 {
                        return Err(division_by_zero());
                    }
                    l.checked_div(r)
                }
                _ => {
                    if r == 0 {
                        return Err(division_by_zero());
                    }
                    l.checked_rem(r)
                }
            };
            result.map(ExprValue::Uint).ok_or_else(overflow)
        }
        _ => match (as_double(left), as_double(right)) {
            (Some(l), Some(r)) => double_arithmetic(function, l, r),
            _ => other_arithmetic(function, left, right),
        },
    }
}

/// Mixed numeric operands are promoted to double
fn as_double(value: &ExprValue) -> Option<f64> {
    match value {
        ExprValue::Int(i) => Some(*i as f64),
        ExprValue::Uint(u) => Some(*u as f64),
        ExprValue::Double(d) => Some(*d),
        _ => None,
    }
}

fn double_arithmetic(function: &str, l: f64, r: f64) -> EngineResult<ExprValue> {
    let result = match function {
        operators::ADD => l + r,
        operators::SUBTRACT => l - r,
        operators::MULTIPLY => l * r,
        operators::DIVIDE => l / r,
        _ => {
            return Err(EngineError::Runtime(
                "Operator % is not defined for double".into(),
            ))
        }
    };
    Ok(ExprValue::Double(result))
}

fn other_arithmetic(function: &str, left: &ExprValue, right: &ExprValue) -> EngineResult<ExprValue> {
    let out_of_range = || EngineError::Runtime("timestamp out of range".into());

    match (function, left, right) {
        (operators::ADD, ExprValue::String(l), ExprValue::String(r)) => {
            Ok(ExprValue::String(format!("{}{}", l, r)))
        }
        (operators::ADD, ExprValue::Bytes(l), ExprValue::Bytes(r)) => {
            Ok(ExprValue::Bytes([l.as_slice(), r.as_slice()].concat()))
        }
        (operators::ADD, ExprValue::List(l), ExprValue::List(r)) => {
            Ok(ExprValue::List(l.iter().chain(r).cloned().collect()))
        }
        (operators::ADD, ExprValue::Duration(l), ExprValue::Duration(r)) => l
            .checked_add(r)
            .map(ExprValue::Duration)
            .ok_or_else(|| EngineError::Runtime("duration overflow".into())),
        (operators::SUBTRACT, ExprValue::Duration(l), ExprValue::Duration(r)) => l
            .checked_sub(r)
            .map(ExprValue::Duration)
            .ok_or_else(|| EngineError::Runtime("duration overflow".into())),
        (operators::ADD, ExprValue::Timestamp(t), ExprValue::Duration(d))
        | (operators::ADD, ExprValue::Duration(d), ExprValue::Timestamp(t)) => t
            .checked_add_signed(*d)
            .map(ExprValue::Timestamp)
            .ok_or_else(out_of_range),
        (operators::SUBTRACT, ExprValue::Timestamp(t), ExprValue::Duration(d)) => t
            .checked_sub_signed(*d)
            .map(ExprValue::Timestamp)
            .ok_or_else(out_of_range),
        (operators::SUBTRACT, ExprValue::Timestamp(l), ExprValue::Timestamp(r)) => {
            Ok(ExprValue::Duration(l.signed_duration_since(*r)))
        }
        _ => Err(EngineError::Runtime(format!(
            "Cannot apply {} to {} and {}",
            operators::binary(function).map_or(function, |(symbol, _)| symbol),
            left.type_name(),
            right.type_name()
        ))),
    }
}

fn division_by_zero() -> EngineError {
    EngineError::Runtime("division by zero".into())
}
