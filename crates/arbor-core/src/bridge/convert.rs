//! Runtime value conversion between native and engine form

use super::TypeBridge;
use crate::error::{BridgeError, BridgeResult};
use crate::expr::ExprValue;
use crate::types::{MapKey, PrimitiveType, Value, ValueType};
use std::collections::BTreeMap;

impl TypeBridge {
    /// Convert an engine value to a native value of type `want`.
    ///
    /// `Any` converts by the value's own shape. Null is accepted for `Any`
    /// and message types only.
    pub fn convert_runtime_value(&self, value: &ExprValue, want: &ValueType) -> BridgeResult<Value> {
        let mismatch = || BridgeError::conversion(want, value.type_name(), "type mismatch");

        match want {
            ValueType::Any => self.convert_dynamic(value),
            ValueType::Primitive(PrimitiveType::Bool) => match value {
                ExprValue::Bool(b) => Ok(Value::Bool(*b)),
                _ => Err(mismatch()),
            },
            ValueType::Primitive(PrimitiveType::Int) => match value {
                ExprValue::Int(i) => Ok(Value::Int(*i)),
                ExprValue::Uint(u) => uint_to_int(*u, want),
                _ => Err(mismatch()),
            },
            ValueType::Primitive(PrimitiveType::Float) => match value {
                ExprValue::Double(d) => Ok(Value::Float(*d)),
                ExprValue::Int(i) => Ok(Value::Float(*i as f64)),
                ExprValue::Uint(u) => Ok(Value::Float(*u as f64)),
                _ => Err(mismatch()),
            },
            ValueType::Primitive(PrimitiveType::String) => match value {
                ExprValue::String(s) => Ok(Value::String(s.clone())),
                _ => Err(mismatch()),
            },
            ValueType::Duration => match value {
                ExprValue::Duration(d) => Ok(Value::Duration(*d)),
                _ => Err(mismatch()),
            },
            ValueType::Timestamp => match value {
                ExprValue::Timestamp(t) => Ok(Value::Timestamp(*t)),
                _ => Err(mismatch()),
            },
            ValueType::List(item) => match value {
                ExprValue::List(items) => items
                    .iter()
                    .map(|v| self.convert_runtime_value(v, item))
                    .collect::<BridgeResult<Vec<_>>>()
                    .map(Value::List),
                _ => Err(mismatch()),
            },
            ValueType::Map(key_type, value_type) => match value {
                ExprValue::Map(entries) => {
                    let mut map = BTreeMap::new();
                    for (k, v) in entries {
                        let key = to_map_key(self.convert_runtime_value(k, key_type)?)?;
                        map.insert(key, self.convert_runtime_value(v, value_type)?);
                    }
                    Ok(Value::Map(map))
                }
                _ => Err(mismatch()),
            },
            ValueType::Message(name) => match value {
                ExprValue::Null => Ok(Value::Null),
                ExprValue::Message { type_name, fields } if type_name == name => {
                    self.convert_message(type_name, fields)
                }
                _ => Err(mismatch()),
            },
            ValueType::Function { .. } => Err(BridgeError::conversion(
                want,
                value.type_name(),
                "functions have no runtime value",
            )),
        }
    }

    /// Convert an engine value by its own shape
    pub fn convert_dynamic(&self, value: &ExprValue) -> BridgeResult<Value> {
        let converted = match value {
            ExprValue::Null => Value::Null,
            ExprValue::Bool(b) => Value::Bool(*b),
            ExprValue::Int(i) => Value::Int(*i),
            ExprValue::Uint(u) => return uint_to_int(*u, &ValueType::Any),
            ExprValue::Double(d) => Value::Float(*d),
            ExprValue::String(s) => Value::String(s.clone()),
            ExprValue::Duration(d) => Value::Duration(*d),
            ExprValue::Timestamp(t) => Value::Timestamp(*t),
            ExprValue::List(items) => Value::List(
                items
                    .iter()
                    .map(|v| self.convert_dynamic(v))
                    .collect::<BridgeResult<_>>()?,
            ),
            ExprValue::Map(entries) => {
                let mut map = BTreeMap::new();
                for (k, v) in entries {
                    map.insert(to_map_key(self.convert_dynamic(k)?)?, self.convert_dynamic(v)?);
                }
                Value::Map(map)
            }
            ExprValue::Message { type_name, fields } => {
                return self.convert_message(type_name, fields)
            }
            ExprValue::Bytes(_) | ExprValue::Type(_) => {
                return Err(BridgeError::conversion(
                    ValueType::Any,
                    value.type_name(),
                    "no native representation",
                ))
            }
        };
        Ok(converted)
    }

    /// Convert message fields, typed by the registered descriptor when known
    fn convert_message(
        &self,
        type_name: &str,
        fields: &BTreeMap<String, ExprValue>,
    ) -> BridgeResult<Value> {
        let descriptor = self.registry.get(type_name);
        let mut converted = BTreeMap::new();
        for (name, field_value) in fields {
            let field_type = descriptor
                .as_ref()
                .and_then(|d| d.field(name))
                .unwrap_or(&ValueType::Any);
            converted.insert(
                name.clone(),
                self.convert_runtime_value(field_value, field_type)?,
            );
        }
        Ok(Value::Message {
            type_name: type_name.to_string(),
            fields: converted,
        })
    }

    /// Convert a native value to an engine value
    pub fn to_expr_value(&self, value: &Value) -> ExprValue {
        match value {
            Value::Null => ExprValue::Null,
            Value::Bool(b) => ExprValue::Bool(*b),
            Value::Int(i) => ExprValue::Int(*i),
            Value::Float(f) => ExprValue::Double(*f),
            Value::String(s) => ExprValue::String(s.clone()),
            Value::Duration(d) => ExprValue::Duration(*d),
            Value::Timestamp(t) => ExprValue::Timestamp(*t),
            Value::List(items) => ExprValue::List(items.iter().map(|v| self.to_expr_value(v)).collect()),
            Value::Map(entries) => ExprValue::Map(
                entries
                    .iter()
                    .map(|(k, v)| (map_key_to_expr(k), self.to_expr_value(v)))
                    .collect(),
            ),
            Value::Message { type_name, fields } => ExprValue::Message {
                type_name: type_name.clone(),
                fields: fields
                    .iter()
                    .map(|(k, v)| (k.clone(), self.to_expr_value(v)))
                    .collect(),
            },
        }
    }
}

fn uint_to_int(u: u64, want: &ValueType) -> BridgeResult<Value> {
    i64::try_from(u)
        .map(Value::Int)
        .map_err(|_| BridgeError::conversion(want, "uint", format!("{} overflows int", u)))
}

fn to_map_key(value: Value) -> BridgeResult<MapKey> {
    match value {
        Value::Bool(b) => Ok(MapKey::Bool(b)),
        Value::Int(i) => Ok(MapKey::Int(i)),
        Value::String(s) => Ok(MapKey::String(s)),
        other => Err(BridgeError::conversion(
            "map key",
            other.type_name(),
            "map keys must be bool, int or string",
        )),
    }
}

fn map_key_to_expr(key: &MapKey) -> ExprValue {
    match key {
        MapKey::Bool(b) => ExprValue::Bool(*b),
        MapKey::Int(i) => ExprValue::Int(*i),
        MapKey::String(s) => ExprValue::String(s.clone()),
    }
}
