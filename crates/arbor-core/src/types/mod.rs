//! Type system for Arbor
//!
//! This module contains the engine-neutral type system:
//! - The abstract `ValueType` model
//! - Schema definitions
//! - Native runtime values

pub mod schema;
pub mod value;
pub mod value_type;

pub use schema::{Schema, SchemaElement};
pub use value::{MapKey, Value};
pub use value_type::{PrimitiveType, ValueType};
