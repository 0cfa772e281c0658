//! Schema to engine declarations

use super::TypeBridge;
use crate::error::{BridgeError, BridgeResult};
use crate::expr::{Decl, Declarations, ExprType, MessageType, PrimitiveKind, WellKnownType};
use crate::types::{PrimitiveType, Schema, ValueType};
use std::collections::{BTreeMap, BTreeSet};

/// Accumulates message types and unresolved names while lowering types
#[derive(Default)]
struct Lowering {
    messages: BTreeMap<String, MessageType>,
    unresolved: BTreeSet<String>,
}

impl TypeBridge {
    /// Map every schema element to an engine declaration.
    ///
    /// Function elements become function declarations, everything else an
    /// identifier. All message types that cannot be resolved are reported
    /// together.
    pub fn to_declarations(&self, schema: &Schema) -> BridgeResult<Declarations> {
        let mut lowering = Lowering::default();
        let mut decls = Vec::with_capacity(schema.len());

        for element in schema.elements() {
            let decl = match &element.value_type {
                ValueType::Function { params, result } => {
                    let params = params.iter().map(|p| self.lower(p, &mut lowering)).collect();
                    let result = self.lower(result, &mut lowering);
                    Decl::function(&element.name, params, result)
                }
                other => Decl::ident(&element.name, self.lower(other, &mut lowering)),
            };
            decls.push(decl);
        }

        if !lowering.unresolved.is_empty() {
            return Err(BridgeError::UnresolvedMessages(
                lowering.unresolved.into_iter().collect(),
            ));
        }
        if decls.is_empty() {
            return Err(BridgeError::EmptyDeclarations);
        }

        Ok(Declarations {
            decls,
            messages: lowering.messages,
        })
    }

    /// Map a single data type to its engine type.
    ///
    /// Function types only make sense as schema elements and are rejected.
    pub fn to_expr_type(&self, value_type: &ValueType) -> BridgeResult<ExprType> {
        if value_type.is_function() {
            return Err(BridgeError::UnsupportedType(value_type.to_string()));
        }
        let mut lowering = Lowering::default();
        let ty = self.lower(value_type, &mut lowering);
        if lowering.unresolved.is_empty() {
            Ok(ty)
        } else {
            Err(BridgeError::UnresolvedMessages(
                lowering.unresolved.into_iter().collect(),
            ))
        }
    }

    fn lower(&self, value_type: &ValueType, lowering: &mut Lowering) -> ExprType {
        match value_type {
            ValueType::Primitive(p) => ExprType::Primitive(match p {
                PrimitiveType::String => PrimitiveKind::String,
                PrimitiveType::Int => PrimitiveKind::Int,
                PrimitiveType::Float => PrimitiveKind::Double,
                PrimitiveType::Bool => PrimitiveKind::Bool,
            }),
            ValueType::Duration => ExprType::WellKnown(WellKnownType::Duration),
            ValueType::Timestamp => ExprType::WellKnown(WellKnownType::Timestamp),
            ValueType::List(item) => ExprType::list(self.lower(item, lowering)),
            ValueType::Map(k, v) => ExprType::map(self.lower(k, lowering), self.lower(v, lowering)),
            ValueType::Message(name) => {
                self.resolve_message(name, lowering);
                ExprType::Message(name.clone())
            }
            ValueType::Any => ExprType::Dyn,
            ValueType::Function { params, result } => ExprType::Function {
                params: params.iter().map(|p| self.lower(p, lowering)).collect(),
                result: Box::new(self.lower(result, lowering)),
            },
        }
    }

    /// Add a message type and the message types its fields reference
    fn resolve_message(&self, name: &str, lowering: &mut Lowering) {
        if lowering.messages.contains_key(name) || lowering.unresolved.contains(name) {
            return;
        }
        let Some(descriptor) = self.registry.get(name) else {
            lowering.unresolved.insert(name.to_string());
            return;
        };

        // Insert before lowering the fields so self-referencing messages terminate
        lowering.messages.insert(
            name.to_string(),
            MessageType {
                full_name: name.to_string(),
                fields: BTreeMap::new(),
            },
        );
        let fields = descriptor
            .fields
            .iter()
            .map(|f| (f.name.clone(), self.lower(&f.value_type, lowering)))
            .collect();
        if let Some(message) = lowering.messages.get_mut(name) {
            message.fields = fields;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{MessageDescriptor, MessageRegistry};
    use std::sync::Arc;

    fn bridge_with_orders() -> TypeBridge {
        let registry = MessageRegistry::new();
        registry
            .register(
                MessageDescriptor::new("acme.Order")
                    .with_field("total", ValueType::float())
                    .with_field("customer", ValueType::message("acme.Customer"))
                    .with_field("parent", ValueType::message("acme.Order")),
            )
            .unwrap();
        registry
            .register(MessageDescriptor::new("acme.Customer").with_field("id", ValueType::string()))
            .unwrap();
        TypeBridge::new(Arc::new(registry))
    }

    #[test]
    fn test_declarations_in_schema_order() {
        let schema = Schema::from_elements([
            ("amount", ValueType::float()),
            ("tags", ValueType::list(ValueType::string())),
            ("seen", ValueType::Timestamp),
        ])
        .unwrap();

        let decls = TypeBridge::default().to_declarations(&schema).unwrap();
        assert_eq!(
            decls.decls,
            vec![
                Decl::ident("amount", ExprType::DOUBLE),
                Decl::ident("tags", ExprType::list(ExprType::STRING)),
                Decl::ident("seen", ExprType::TIMESTAMP),
            ]
        );
        assert!(decls.messages.is_empty());
    }

    #[test]
    fn test_function_element_becomes_function_decl() {
        let schema = Schema::new()
            .with_element(
                "risk",
                ValueType::function(vec![ValueType::string()], ValueType::int()),
            )
            .unwrap();

        let decls = TypeBridge::default().to_declarations(&schema).unwrap();
        assert_eq!(
            decls.get("risk"),
            Some(&Decl::function("risk", vec![ExprType::STRING], ExprType::INT))
        );
    }

    #[test]
    fn test_messages_resolved_transitively() {
        let schema = Schema::new()
            .with_element("order", ValueType::message("acme.Order"))
            .unwrap();

        let decls = bridge_with_orders().to_declarations(&schema).unwrap();
        assert_eq!(decls.messages.len(), 2);
        let order = decls.message("acme.Order").unwrap();
        assert_eq!(order.fields.get("total"), Some(&ExprType::DOUBLE));
        assert_eq!(
            order.fields.get("parent"),
            Some(&ExprType::Message("acme.Order".into()))
        );
        assert!(decls.message("acme.Customer").is_some());
    }

    #[test]
    fn test_unresolved_messages_aggregated() {
        let schema = Schema::from_elements([
            ("a", ValueType::message("x.Missing")),
            ("b", ValueType::list(ValueType::message("y.AlsoMissing"))),
            ("c", ValueType::message("x.Missing")),
        ])
        .unwrap();

        let err = TypeBridge::default().to_declarations(&schema).unwrap_err();
        assert_eq!(
            err,
            BridgeError::UnresolvedMessages(vec!["x.Missing".into(), "y.AlsoMissing".into()])
        );
    }

    #[test]
    fn test_empty_schema_fails() {
        let err = TypeBridge::default().to_declarations(&Schema::new()).unwrap_err();
        assert_eq!(err, BridgeError::EmptyDeclarations);
    }

    #[test]
    fn test_any_lowers_to_dyn() {
        let ty = TypeBridge::default()
            .to_expr_type(&ValueType::map(ValueType::string(), ValueType::Any))
            .unwrap();
        assert_eq!(ty, ExprType::map(ExprType::STRING, ExprType::Dyn));
    }

    #[test]
    fn test_function_is_not_a_data_type() {
        let err = TypeBridge::default()
            .to_expr_type(&ValueType::function(vec![], ValueType::bool()))
            .unwrap_err();
        assert!(matches!(err, BridgeError::UnsupportedType(_)));
    }
}
