//! Equality and ordering

use arbor_core::expr::{EngineError, EngineResult, ExprValue};
use std::cmp::Ordering;

/// Structural equality; numbers compare by value across int, uint and double
pub(crate) fn values_equal(left: &ExprValue, right: &ExprValue) -> bool {
    if let Some(ordering) = numeric_order(left, right) {
        return ordering == Some(Ordering::Equal);
    }

    match (left, right) {
        (ExprValue::List(l), ExprValue::List(r)) => {
            l.len() == r.len() && l.iter().zip(r).all(|(a, b)| values_equal(a, b))
        }
        (ExprValue::Map(l), ExprValue::Map(r)) => {
            l.len() == r.len()
                && l.iter().all(|(key, value)| {
                    map_lookup(right, key).map_or(false, |other| values_equal(value, other))
                })
        }
        (
            ExprValue::Message {
                type_name: lt,
                fields: lf,
            },
            ExprValue::Message {
                type_name: rt,
                fields: rf,
            },
        ) => {
            lt == rt
                && lf.len() == rf.len()
                && lf
                    .iter()
                    .all(|(name, value)| rf.get(name).map_or(false, |other| values_equal(value, other)))
        }
        _ => left == right,
    }
}

/// Look up a map entry, matching numeric keys by value
pub(crate) fn map_lookup<'a>(map: &'a ExprValue, key: &ExprValue) -> Option<&'a ExprValue> {
    match map {
        ExprValue::Map(entries) => entries
            .iter()
            .find(|(k, _)| values_equal(k, key))
            .map(|(_, v)| v),
        _ => None,
    }
}

/// Order two values of the same kind
pub(crate) fn compare(left: &ExprValue, right: &ExprValue) -> EngineResult<Ordering> {
    if let Some(ordering) = numeric_order(left, right) {
        return ordering.ok_or_else(|| {
            EngineError::Runtime(format!("Cannot order {} and {}", left, right))
        });
    }

    match (left, right) {
        (ExprValue::String(l), ExprValue::String(r)) => Ok(l.cmp(r)),
        (ExprValue::Bytes(l), ExprValue::Bytes(r)) => Ok(l.cmp(r)),
        (ExprValue::Bool(l), ExprValue::Bool(r)) => Ok(l.cmp(r)),
        (ExprValue::Duration(l), ExprValue::Duration(r)) => Ok(l.cmp(r)),
        (ExprValue::Timestamp(l), ExprValue::Timestamp(r)) => Ok(l.cmp(r)),
        _ => Err(EngineError::Runtime(format!(
            "Cannot compare {} and {}",
            left.type_name(),
            right.type_name()
        ))),
    }
}

/// Ordering of two numbers; outer `None` when either is not a number,
/// inner `None` when a NaN is involved
fn numeric_order(left: &ExprValue, right: &ExprValue) -> Option<Option<Ordering>> {
    let ordering = match (left, right) {
        (ExprValue::Int(l), ExprValue::Int(r)) => Some(l.cmp(r)),
        (ExprValue::Uint(l), ExprValue::Uint(r)) => Some(l.cmp(r)),
        (ExprValue::Double(l), ExprValue::Double(r)) => l.partial_cmp(r),
        (ExprValue::Int(l), ExprValue::Uint(r)) => Some(int_uint(*l, *r)),
        (ExprValue::Uint(l), ExprValue::Int(r)) => Some(int_uint(*r, *l).reverse()),
        (ExprValue::Int(l), ExprValue::Double(r)) => (*l as f64).partial_cmp(r),
        (ExprValue::Double(l), ExprValue::Int(r)) => l.partial_cmp(&(*r as f64)),
        (ExprValue::Uint(l), ExprValue::Double(r)) => (*l as f64).partial_cmp(r),
        (ExprValue::Double(l), ExprValue::Uint(r)) => l.partial_cmp(&(*r as f64)),
        _ => return None,
    };
    Some(ordering)
}

fn int_uint(i: i64, u: u64) -> Ordering {
    match u64::try_from(i) {
        Ok(i) => i.cmp(&u),
        Err(_) => Ordering::Less,
    }
}
