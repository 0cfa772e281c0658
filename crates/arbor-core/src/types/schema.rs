//! Schema definitions
//!
//! A schema is the ordered set of named, typed elements an expression can
//! reference.

use super::value_type::ValueType;
use crate::error::{CoreError, Result};
use crate::SELF_IDENT;
use serde::{Deserialize, Serialize};

/// An ordered set of named, typed elements
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawSchema")]
pub struct Schema {
    /// Optional schema identifier
    pub id: Option<String>,

    elements: Vec<SchemaElement>,
}

/// A named element of a schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaElement {
    pub name: String,

    #[serde(rename = "type", with = "serde_yaml::with::singleton_map_recursive")]
    pub value_type: ValueType,
}

#[derive(Deserialize)]
struct RawSchema {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    elements: Vec<SchemaElement>,
}

impl TryFrom<RawSchema> for Schema {
    type Error = CoreError;

    fn try_from(raw: RawSchema) -> Result<Self> {
        let mut schema = Schema::from_elements(
            raw.elements.into_iter().map(|e| (e.name, e.value_type)),
        )?;
        schema.id = raw.id;
        Ok(schema)
    }
}

impl Schema {
    /// Create an empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a schema from `(name, type)` pairs, preserving order
    pub fn from_elements<N, I>(elements: I) -> Result<Self>
    where
        N: Into<String>,
        I: IntoIterator<Item = (N, ValueType)>,
    {
        elements
            .into_iter()
            .try_fold(Schema::new(), |schema, (name, ty)| schema.with_element(name, ty))
    }

    /// Set the schema identifier
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Add an element, rejecting duplicates and reserved names
    pub fn with_element(mut self, name: impl Into<String>, value_type: ValueType) -> Result<Self> {
        let name = name.into();
        if name == SELF_IDENT {
            return Err(CoreError::ReservedIdentifier(name));
        }
        if self.contains(&name) {
            return Err(CoreError::DuplicateElement(name));
        }
        self.elements.push(SchemaElement { name, value_type });
        Ok(self)
    }

    /// Elements in declaration order
    pub fn elements(&self) -> &[SchemaElement] {
        &self.elements
    }

    /// Get an element by name
    pub fn get(&self, name: &str) -> Option<&SchemaElement> {
        self.elements.iter().find(|e| e.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Element names in declaration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.elements.iter().map(|e| e.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}
