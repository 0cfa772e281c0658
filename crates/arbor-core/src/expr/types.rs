//! Engine declaration types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Primitive kinds known to expression engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveKind {
    Bool,
    Int,
    Uint,
    Double,
    String,
    Bytes,
}

/// Well-known wrapper types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WellKnownType {
    Any,
    Duration,
    Timestamp,
}

/// Type of a declaration or expression as an engine sees it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExprType {
    /// Dynamic type, resolved at runtime
    Dyn,
    Null,
    Primitive(PrimitiveKind),
    WellKnown(WellKnownType),
    List(Box<ExprType>),
    Map(Box<ExprType>, Box<ExprType>),
    /// Structured message, by full name
    Message(String),
    Function {
        params: Vec<ExprType>,
        result: Box<ExprType>,
    },
    /// Unbound type parameter of a generic overload
    TypeParam(String),
    /// Type of a type value
    Type(Box<ExprType>),
    /// Type of an expression that failed to check
    Error,
}

impl ExprType {
    pub const BOOL: ExprType = ExprType::Primitive(PrimitiveKind::Bool);
    pub const INT: ExprType = ExprType::Primitive(PrimitiveKind::Int);
    pub const UINT: ExprType = ExprType::Primitive(PrimitiveKind::Uint);
    pub const DOUBLE: ExprType = ExprType::Primitive(PrimitiveKind::Double);
    pub const STRING: ExprType = ExprType::Primitive(PrimitiveKind::String);
    pub const BYTES: ExprType = ExprType::Primitive(PrimitiveKind::Bytes);
    pub const DURATION: ExprType = ExprType::WellKnown(WellKnownType::Duration);
    pub const TIMESTAMP: ExprType = ExprType::WellKnown(WellKnownType::Timestamp);

    pub fn list(item: ExprType) -> Self {
        ExprType::List(Box::new(item))
    }

    pub fn map(key: ExprType, value: ExprType) -> Self {
        ExprType::Map(Box::new(key), Box::new(value))
    }

    /// Returns true for types that defer checking to runtime
    pub fn is_dynamic(&self) -> bool {
        matches!(
            self,
            ExprType::Dyn | ExprType::WellKnown(WellKnownType::Any) | ExprType::TypeParam(_)
        )
    }

    /// Check if a value of type `other` may be used where `self` is expected
    pub fn is_assignable_from(&self, other: &ExprType) -> bool {
        if self.is_dynamic() || other.is_dynamic() {
            return true;
        }
        match (self, other) {
            (ExprType::List(a), ExprType::List(b)) => a.is_assignable_from(b),
            (ExprType::Map(ak, av), ExprType::Map(bk, bv)) => {
                ak.is_assignable_from(bk) && av.is_assignable_from(bv)
            }
            (ExprType::Type(a), ExprType::Type(b)) => a.is_assignable_from(b),
            _ => self == other,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ExprType::Primitive(PrimitiveKind::Int | PrimitiveKind::Uint | PrimitiveKind::Double)
        )
    }
}

impl fmt::Display for ExprType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprType::Dyn => f.write_str("dyn"),
            ExprType::Null => f.write_str("null_type"),
            ExprType::Primitive(kind) => {
                let name = match kind {
                    PrimitiveKind::Bool => "bool",
                    PrimitiveKind::Int => "int",
                    PrimitiveKind::Uint => "uint",
                    PrimitiveKind::Double => "double",
                    PrimitiveKind::String => "string",
                    PrimitiveKind::Bytes => "bytes",
                };
                f.write_str(name)
            }
            ExprType::WellKnown(WellKnownType::Any) => f.write_str("any"),
            ExprType::WellKnown(WellKnownType::Duration) => f.write_str("duration"),
            ExprType::WellKnown(WellKnownType::Timestamp) => f.write_str("timestamp"),
            ExprType::List(item) => write!(f, "list({})", item),
            ExprType::Map(k, v) => write!(f, "map({}, {})", k, v),
            ExprType::Message(name) => f.write_str(name),
            ExprType::Function { params, result } => {
                let params: Vec<String> = params.iter().map(|p| p.to_string()).collect();
                write!(f, "({}) -> {}", params.join(", "), result)
            }
            ExprType::TypeParam(name) => f.write_str(name),
            ExprType::Type(inner) => write!(f, "type({})", inner),
            ExprType::Error => f.write_str("*error*"),
        }
    }
}

/// One signature of a declared function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overload {
    pub id: String,
    pub params: Vec<ExprType>,
    pub result: ExprType,
}

/// A declaration visible to an expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Decl {
    /// A variable
    Ident { name: String, ty: ExprType },
    /// A host function
    Function { name: String, overloads: Vec<Overload> },
}

impl Decl {
    pub fn ident(name: impl Into<String>, ty: ExprType) -> Self {
        Decl::Ident {
            name: name.into(),
            ty,
        }
    }

    /// Declare a function with a single overload
    pub fn function(name: impl Into<String>, params: Vec<ExprType>, result: ExprType) -> Self {
        let name = name.into();
        Decl::Function {
            overloads: vec![Overload {
                id: format!("{}_{}", name, params.len()),
                params,
                result,
            }],
            name,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Decl::Ident { name, .. } | Decl::Function { name, .. } => name,
        }
    }
}

/// Field layout of a message type, in engine terms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageType {
    pub full_name: String,
    pub fields: BTreeMap<String, ExprType>,
}

/// Declarations an expression is compiled against
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Declarations {
    pub decls: Vec<Decl>,

    /// Message types referenced by `decls`, keyed by full name
    pub messages: BTreeMap<String, MessageType>,
}

impl Declarations {
    /// Find a declaration by name
    pub fn get(&self, name: &str) -> Option<&Decl> {
        self.decls.iter().find(|d| d.name() == name)
    }

    /// Add a declaration, replacing any with the same name
    pub fn declare(&mut self, decl: Decl) {
        self.decls.retain(|d| d.name() != decl.name());
        self.decls.push(decl);
    }

    pub fn message(&self, full_name: &str) -> Option<&MessageType> {
        self.messages.get(full_name)
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }
}
