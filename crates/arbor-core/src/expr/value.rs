//! Engine runtime values and variable bindings

use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// A runtime value as an expression engine produces and consumes it
#[derive(Debug, Clone, PartialEq)]
pub enum ExprValue {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    Duration(Duration),
    Timestamp(DateTime<Utc>),
    List(Vec<ExprValue>),
    /// Map entries in insertion order
    Map(Vec<(ExprValue, ExprValue)>),
    Message {
        type_name: String,
        fields: BTreeMap<String, ExprValue>,
    },
    /// A type used as a value, by name
    Type(String),
}

impl ExprValue {
    /// Name of the runtime type
    pub fn type_name(&self) -> &str {
        match self {
            ExprValue::Null => "null_type",
            ExprValue::Bool(_) => "bool",
            ExprValue::Int(_) => "int",
            ExprValue::Uint(_) => "uint",
            ExprValue::Double(_) => "double",
            ExprValue::String(_) => "string",
            ExprValue::Bytes(_) => "bytes",
            ExprValue::Duration(_) => "duration",
            ExprValue::Timestamp(_) => "timestamp",
            ExprValue::List(_) => "list",
            ExprValue::Map(_) => "map",
            ExprValue::Message { type_name, .. } => type_name,
            ExprValue::Type(_) => "type",
        }
    }

    /// Look up a map entry by key
    pub fn map_get(&self, key: &ExprValue) -> Option<&ExprValue> {
        match self {
            ExprValue::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ExprValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for ExprValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprValue::Null => f.write_str("null"),
            ExprValue::Bool(b) => write!(f, "{}", b),
            ExprValue::Int(i) => write!(f, "{}", i),
            ExprValue::Uint(u) => write!(f, "{}u", u),
            ExprValue::Double(d) => write!(f, "{:?}", d),
            ExprValue::String(s) => write!(f, "{:?}", s),
            ExprValue::Bytes(b) => write!(f, "b{:?}", String::from_utf8_lossy(b)),
            ExprValue::Duration(d) => write!(f, "duration({:?})", crate::types::value::format_duration(d)),
            ExprValue::Timestamp(t) => write!(f, "timestamp({:?})", t.to_rfc3339()),
            ExprValue::List(items) => {
                let items: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", items.join(", "))
            }
            ExprValue::Map(entries) => {
                let entries: Vec<String> =
                    entries.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
                write!(f, "{{{}}}", entries.join(", "))
            }
            ExprValue::Message { type_name, fields } => {
                let fields: Vec<String> =
                    fields.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
                write!(f, "{}{{{}}}", type_name, fields.join(", "))
            }
            ExprValue::Type(name) => f.write_str(name),
        }
    }
}

/// Variable bindings handed to an engine for one evaluation
///
/// The shared bindings are read-only and may be used by many evaluations
/// at once; local bindings shadow them.
#[derive(Debug, Clone, Default)]
pub struct Activation {
    shared: Arc<HashMap<String, ExprValue>>,
    locals: HashMap<String, ExprValue>,
}

impl Activation {
    /// Create an activation over shared bindings
    pub fn new(shared: Arc<HashMap<String, ExprValue>>) -> Self {
        Self {
            shared,
            locals: HashMap::new(),
        }
    }

    /// Create an activation from owned bindings
    pub fn from_bindings(bindings: HashMap<String, ExprValue>) -> Self {
        Self::new(Arc::new(bindings))
    }

    /// Add a local binding
    pub fn with_binding(mut self, name: impl Into<String>, value: ExprValue) -> Self {
        self.locals.insert(name.into(), value);
        self
    }

    /// Resolve a variable
    pub fn resolve(&self, name: &str) -> Option<&ExprValue> {
        self.locals.get(name).or_else(|| self.shared.get(name))
    }
}
