//! Engine result types back to value types

use super::TypeBridge;
use crate::error::{BridgeError, BridgeResult};
use crate::expr::{ExprType, PrimitiveKind, WellKnownType};
use crate::types::ValueType;

impl TypeBridge {
    /// Map an engine type to a value type.
    ///
    /// Dynamic kinds map to `Any`; kinds without a counterpart are an error.
    pub fn from_expr_type(&self, ty: &ExprType) -> BridgeResult<ValueType> {
        let value_type = match ty {
            ExprType::Dyn | ExprType::WellKnown(WellKnownType::Any) | ExprType::TypeParam(_) => {
                ValueType::Any
            }
            ExprType::Primitive(PrimitiveKind::Bool) => ValueType::bool(),
            ExprType::Primitive(PrimitiveKind::Int) => ValueType::int(),
            ExprType::Primitive(PrimitiveKind::Double) => ValueType::float(),
            ExprType::Primitive(PrimitiveKind::String) => ValueType::string(),
            ExprType::WellKnown(WellKnownType::Duration) => ValueType::Duration,
            ExprType::WellKnown(WellKnownType::Timestamp) => ValueType::Timestamp,
            ExprType::List(item) => ValueType::list(self.from_expr_type(item)?),
            ExprType::Map(k, v) => ValueType::map(self.from_expr_type(k)?, self.from_expr_type(v)?),
            ExprType::Message(name) => ValueType::Message(name.clone()),
            ExprType::Function { params, result } => ValueType::function(
                params
                    .iter()
                    .map(|p| self.from_expr_type(p))
                    .collect::<BridgeResult<_>>()?,
                self.from_expr_type(result)?,
            ),
            ExprType::Primitive(PrimitiveKind::Uint | PrimitiveKind::Bytes)
            | ExprType::Null
            | ExprType::Type(_)
            | ExprType::Error => return Err(BridgeError::UnsupportedType(ty.to_string())),
        };
        Ok(value_type)
    }

    /// Check an engine result type against a declared type.
    ///
    /// Two absent types match; one absent type never does.
    pub fn validate_result_type(
        &self,
        actual: Option<&ExprType>,
        declared: Option<&ValueType>,
    ) -> BridgeResult<()> {
        match (actual, declared) {
            (None, None) => Ok(()),
            (None, Some(declared)) => Err(BridgeError::ResultTypeMismatch {
                expected: declared.to_string(),
                actual: "<none>".to_string(),
            }),
            (Some(actual), None) => Err(BridgeError::ResultTypeMismatch {
                expected: "<none>".to_string(),
                actual: actual.to_string(),
            }),
            (Some(actual), Some(declared)) => {
                let converted = self.from_expr_type(actual)?;
                if declared.accepts(&converted) {
                    Ok(())
                } else {
                    Err(BridgeError::ResultTypeMismatch {
                        expected: declared.to_string(),
                        actual: converted.to_string(),
                    })
                }
            }
        }
    }
}
