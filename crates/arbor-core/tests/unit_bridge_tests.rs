//! Unit tests for the type bridge
//!
//! Tests the mapping between the abstract type model and engine types,
//! including the declaration round-trip property.

use arbor_core::bridge::{MessageDescriptor, MessageRegistry, TypeBridge};
use arbor_core::expr::{Decl, ExprType, ExprValue};
use arbor_core::types::{PrimitiveType, Schema, Value, ValueType};
use arbor_core::BridgeError;
use proptest::prelude::*;
use std::sync::Arc;

// =============================================================================
// Round-trip property
// =============================================================================

/// Value types that have an engine counterpart without a registry
fn data_type_strategy() -> impl Strategy<Value = ValueType> {
    let leaf = prop_oneof![
        Just(ValueType::Primitive(PrimitiveType::String)),
        Just(ValueType::Primitive(PrimitiveType::Int)),
        Just(ValueType::Primitive(PrimitiveType::Float)),
        Just(ValueType::Primitive(PrimitiveType::Bool)),
        Just(ValueType::Duration),
        Just(ValueType::Timestamp),
    ];
    leaf.prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            inner.clone().prop_map(ValueType::list),
            (inner.clone(), inner).prop_map(|(k, v)| ValueType::map(k, v)),
        ]
    })
}

proptest! {
    #[test]
    fn test_declaration_type_round_trip(t in data_type_strategy()) {
        let bridge = TypeBridge::default();
        let lowered = bridge.to_expr_type(&t).unwrap();
        prop_assert_eq!(bridge.from_expr_type(&lowered).unwrap(), t.clone());
    }

    #[test]
    fn test_round_tripped_type_validates(t in data_type_strategy()) {
        let bridge = TypeBridge::default();
        let lowered = bridge.to_expr_type(&t).unwrap();
        prop_assert!(bridge.validate_result_type(Some(&lowered), Some(&t)).is_ok());
    }
}

#[test]
fn test_message_round_trip_with_registry() {
    let registry = Arc::new(MessageRegistry::new());
    registry
        .register(MessageDescriptor::new("acme.Order").with_field("total", ValueType::float()))
        .unwrap();
    let bridge = TypeBridge::new(registry);

    let t = ValueType::list(ValueType::message("acme.Order"));
    let lowered = bridge.to_expr_type(&t).unwrap();
    assert_eq!(lowered, ExprType::list(ExprType::Message("acme.Order".into())));
    assert_eq!(bridge.from_expr_type(&lowered).unwrap(), t);
}

// =============================================================================
// Schema Tests
// =============================================================================

#[test]
fn test_schema_from_yaml_to_declarations() {
    let yaml = r#"
id: payments
elements:
  - name: amount
    type: { primitive: float }
  - name: country
    type: { primitive: string }
  - name: tags
    type: { list: { primitive: string } }
"#;
    let schema: Schema = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(schema.id.as_deref(), Some("payments"));

    let decls = TypeBridge::default().to_declarations(&schema).unwrap();
    assert_eq!(decls.len(), 3);
    assert_eq!(decls.get("amount"), Some(&Decl::ident("amount", ExprType::DOUBLE)));
    assert_eq!(
        decls.get("tags"),
        Some(&Decl::ident("tags", ExprType::list(ExprType::STRING)))
    );
}

#[test]
fn test_schema_yaml_rejects_self() {
    let yaml = r#"
elements:
  - name: self
    type: { primitive: int }
"#;
    assert!(serde_yaml::from_str::<Schema>(yaml).is_err());
}

#[test]
fn test_unresolved_messages_reported_together() {
    let schema = Schema::from_elements([
        ("order", ValueType::message("acme.Order")),
        ("user", ValueType::map(ValueType::string(), ValueType::message("acme.User"))),
    ])
    .unwrap();

    let err = TypeBridge::default().to_declarations(&schema).unwrap_err();
    assert_eq!(err.to_string(), "Unresolved message types: acme.Order, acme.User");
}

// =============================================================================
// Runtime Value Tests
// =============================================================================

#[test]
fn test_convert_guided_by_declared_type() -> anyhow::Result<()> {
    let bridge = TypeBridge::default();

    let value = ExprValue::List(vec![ExprValue::Int(1), ExprValue::Double(2.5)]);
    let converted = bridge.convert_runtime_value(&value, &ValueType::list(ValueType::float()))?;
    assert_eq!(converted, Value::List(vec![Value::Float(1.0), Value::Float(2.5)]));

    let dynamic = bridge.convert_runtime_value(&value, &ValueType::Any)?;
    assert_eq!(dynamic, Value::List(vec![Value::Int(1), Value::Float(2.5)]));
    Ok(())
}

#[test]
fn test_convert_failure_is_an_error_not_a_panic() {
    let bridge = TypeBridge::default();
    let err = bridge
        .convert_runtime_value(&ExprValue::String("yes".into()), &ValueType::bool())
        .unwrap_err();
    match err {
        BridgeError::Conversion { expected, actual, .. } => {
            assert_eq!(expected, "bool");
            assert_eq!(actual, "string");
        }
        other => panic!("Expected conversion error, got {:?}", other),
    }
}
