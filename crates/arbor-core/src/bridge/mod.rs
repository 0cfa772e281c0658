//! Type bridge between the abstract type model and expression engines
//!
//! `TypeBridge` converts in both directions:
//! - schemas into engine declarations (`declarations`)
//! - engine result types back into `ValueType`s and validates them
//!   against declared types (`result_type`)
//! - runtime values between native and engine form (`convert`)

mod convert;
mod declarations;
mod registry;
mod result_type;

pub use registry::{FieldDescriptor, MessageDescriptor, MessageRegistry};

use std::sync::Arc;

/// Converts between `ValueType`/`Value` and engine types/values
#[derive(Debug, Clone, Default)]
pub struct TypeBridge {
    registry: Arc<MessageRegistry>,
}

impl TypeBridge {
    /// Create a bridge resolving message types through `registry`
    pub fn new(registry: Arc<MessageRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<MessageRegistry> {
        &self.registry
    }
}
