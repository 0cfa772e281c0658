//! Message descriptor registry

use crate::error::{CoreError, Result};
use crate::types::ValueType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Field layout of a structured message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDescriptor {
    /// Fully qualified name, e.g. `acme.orders.Order`
    pub full_name: String,

    /// Fields in declaration order
    pub fields: Vec<FieldDescriptor>,
}

/// A field of a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,

    #[serde(rename = "type", with = "serde_yaml::with::singleton_map_recursive")]
    pub value_type: ValueType,
}

impl MessageDescriptor {
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            fields: Vec::new(),
        }
    }

    /// Add a field
    pub fn with_field(mut self, name: impl Into<String>, value_type: ValueType) -> Self {
        self.fields.push(FieldDescriptor {
            name: name.into(),
            value_type,
        });
        self
    }

    /// Get a field's type by name
    pub fn field(&self, name: &str) -> Option<&ValueType> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| &f.value_type)
    }
}

/// Registry of message descriptors, owned by the caller
///
/// Registration is idempotent: registering an identical descriptor twice is
/// a no-op, while a different descriptor under a known name is rejected.
#[derive(Debug, Default)]
pub struct MessageRegistry {
    descriptors: RwLock<HashMap<String, Arc<MessageDescriptor>>>,
}

impl MessageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor
    pub fn register(&self, descriptor: MessageDescriptor) -> Result<()> {
        let mut descriptors = self
            .descriptors
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = descriptors.get(&descriptor.full_name) {
            if **existing == descriptor {
                return Ok(());
            }
            return Err(CoreError::ConflictingDescriptor(descriptor.full_name));
        }

        tracing::debug!("Registered message descriptor: {}", descriptor.full_name);
        descriptors.insert(descriptor.full_name.clone(), Arc::new(descriptor));
        Ok(())
    }

    /// Register several descriptors
    pub fn register_all(&self, descriptors: impl IntoIterator<Item = MessageDescriptor>) -> Result<()> {
        descriptors.into_iter().try_for_each(|d| self.register(d))
    }

    /// Look up a descriptor by full name
    pub fn get(&self, full_name: &str) -> Option<Arc<MessageDescriptor>> {
        self.descriptors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(full_name)
            .cloned()
    }

    pub fn contains(&self, full_name: &str) -> bool {
        self.get(full_name).is_some()
    }

    pub fn len(&self) -> usize {
        self.descriptors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
