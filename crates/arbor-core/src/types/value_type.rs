//! Abstract value types
//!
//! `ValueType` describes the type of a schema element or of an expression
//! result without reference to any particular expression engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Primitive scalar types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveType {
    String,
    Int,
    Float,
    Bool,
}

/// Engine-neutral type of a schema element or expression result
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// Scalar type
    Primitive(PrimitiveType),

    /// Span of time
    Duration,

    /// Point in time
    Timestamp,

    /// Homogeneous list
    List(Box<ValueType>),

    /// Map from key type to value type
    Map(Box<ValueType>, Box<ValueType>),

    /// Structured message identified by its full name only
    Message(String),

    /// Dynamic type, matches anything when expected
    Any,

    /// Host-defined function exposed into expressions
    Function {
        params: Vec<ValueType>,
        result: Box<ValueType>,
    },
}

impl ValueType {
    pub fn string() -> Self {
        ValueType::Primitive(PrimitiveType::String)
    }

    pub fn int() -> Self {
        ValueType::Primitive(PrimitiveType::Int)
    }

    pub fn float() -> Self {
        ValueType::Primitive(PrimitiveType::Float)
    }

    pub fn bool() -> Self {
        ValueType::Primitive(PrimitiveType::Bool)
    }

    /// Create a list type
    pub fn list(item: ValueType) -> Self {
        ValueType::List(Box::new(item))
    }

    /// Create a map type
    pub fn map(key: ValueType, value: ValueType) -> Self {
        ValueType::Map(Box::new(key), Box::new(value))
    }

    /// Create a message type
    pub fn message(full_name: impl Into<String>) -> Self {
        ValueType::Message(full_name.into())
    }

    /// Create a function type
    pub fn function(params: Vec<ValueType>, result: ValueType) -> Self {
        ValueType::Function {
            params,
            result: Box::new(result),
        }
    }

    /// Returns true if this is a function type
    pub fn is_function(&self) -> bool {
        matches!(self, ValueType::Function { .. })
    }

    /// Check whether `actual` satisfies this type when this type is the
    /// expected one.
    ///
    /// This is structural equality, except that `Any` on the expected side
    /// matches anything at any depth.
    pub fn accepts(&self, actual: &ValueType) -> bool {
        match (self, actual) {
            (ValueType::Any, _) => true,
            (ValueType::List(expected), ValueType::List(actual)) => expected.accepts(actual),
            (ValueType::Map(ek, ev), ValueType::Map(ak, av)) => ek.accepts(ak) && ev.accepts(av),
            (
                ValueType::Function { params, result },
                ValueType::Function {
                    params: actual_params,
                    result: actual_result,
                },
            ) => {
                params.len() == actual_params.len()
                    && params.iter().zip(actual_params).all(|(e, a)| e.accepts(a))
                    && result.accepts(actual_result)
            }
            _ => self == actual,
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PrimitiveType::String => "string",
            PrimitiveType::Int => "int",
            PrimitiveType::Float => "float",
            PrimitiveType::Bool => "bool",
        };
        f.write_str(name)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Primitive(p) => write!(f, "{}", p),
            ValueType::Duration => f.write_str("duration"),
            ValueType::Timestamp => f.write_str("timestamp"),
            ValueType::List(item) => write!(f, "list({})", item),
            ValueType::Map(k, v) => write!(f, "map({}, {})", k, v),
            ValueType::Message(name) => write!(f, "message({})", name),
            ValueType::Any => f.write_str("any"),
            ValueType::Function { params, result } => {
                let params: Vec<String> = params.iter().map(|p| p.to_string()).collect();
                write!(f, "({}) -> {}", params.join(", "), result)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_equality_is_by_name() {
        assert_eq!(ValueType::message("acme.Order"), ValueType::message("acme.Order"));
        assert_ne!(ValueType::message("acme.Order"), ValueType::message("acme.User"));
    }

    #[test]
    fn test_any_accepts_everything() {
        assert!(ValueType::Any.accepts(&ValueType::int()));
        assert!(ValueType::Any.accepts(&ValueType::list(ValueType::message("x.Y"))));
        assert!(ValueType::list(ValueType::Any).accepts(&ValueType::list(ValueType::bool())));
        assert!(ValueType::map(ValueType::string(), ValueType::Any)
            .accepts(&ValueType::map(ValueType::string(), ValueType::Timestamp)));
    }

    #[test]
    fn test_accepts_is_not_symmetric() {
        assert!(!ValueType::bool().accepts(&ValueType::Any));
        assert!(!ValueType::int().accepts(&ValueType::float()));
        assert!(!ValueType::list(ValueType::int()).accepts(&ValueType::list(ValueType::string())));
    }

    #[test]
    fn test_function_accepts() {
        let expected = ValueType::function(vec![ValueType::Any], ValueType::bool());
        let actual = ValueType::function(vec![ValueType::string()], ValueType::bool());
        assert!(expected.accepts(&actual));

        let wrong_arity = ValueType::function(vec![], ValueType::bool());
        assert!(!expected.accepts(&wrong_arity));
    }

    #[test]
    fn test_display() {
        assert_eq!(ValueType::list(ValueType::int()).to_string(), "list(int)");
        assert_eq!(
            ValueType::map(ValueType::string(), ValueType::bool()).to_string(),
            "map(string, bool)"
        );
        assert_eq!(ValueType::message("acme.Order").to_string(), "message(acme.Order)");
        assert_eq!(
            ValueType::function(vec![ValueType::string(), ValueType::int()], ValueType::bool())
                .to_string(),
            "(string, int) -> bool"
        );
    }

    #[test]
    fn test_value_type_serde() {
        let ty = ValueType::map(ValueType::string(), ValueType::list(ValueType::Timestamp));
        let json = serde_json::to_string(&ty).unwrap();
        let back: ValueType = serde_json::from_str(&json).unwrap();
        assert_eq!(ty, back);
    }
}
