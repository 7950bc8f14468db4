//! Coercion of validated values into canonical form.

use serde_json::{Map, Number, Value};

use crate::coerce::{as_boolean, as_integer, as_number};
use crate::node::{AdditionalProperties, SchemaKind, SchemaNode};

impl SchemaNode {
    /// Canonical form of `value`: scalars coerced to the declared type,
    /// undeclared properties removed unless the object allows them, and
    /// declared defaults filled in for absent optional properties.
    ///
    /// Values that already have the declared JSON type are returned unchanged,
    /// so sanitizing canonical data is a no-op.
    pub fn sanitize(&self, value: &Value) -> Value {
        let Some(kind) = self.kind_for(value) else {
            return value.clone();
        };
        match kind {
            SchemaKind::Object(object) => {
                let Value::Object(map) = value else {
                    return value.clone();
                };
                let mut out = Map::new();
                for (name, item) in map {
                    match object.properties.get(name) {
                        Some(property) => {
                            out.insert(name.clone(), property.sanitize(item));
                        }
                        None => match &object.additional {
                            AdditionalProperties::Allowed => {
                                out.insert(name.clone(), item.clone());
                            }
                            AdditionalProperties::Schema(schema) => {
                                out.insert(name.clone(), schema.sanitize(item));
                            }
                            AdditionalProperties::Forbidden | AdditionalProperties::Discarded => {}
                        },
                    }
                }
                for (name, property) in &object.properties {
                    if let (false, Some(default)) = (out.contains_key(name), &property.default) {
                        out.insert(name.clone(), default.clone());
                    }
                }
                Value::Object(out)
            }
            SchemaKind::Array(array) => match (value, &array.items) {
                (Value::Array(items), Some(schema)) => {
                    Value::Array(items.iter().map(|item| schema.sanitize(item)).collect())
                }
                _ => value.clone(),
            },
            SchemaKind::Number(_) => match value {
                Value::Number(_) => value.clone(),
                other => as_number(other)
                    .and_then(Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or_else(|| other.clone()),
            },
            SchemaKind::Integer(_) => match value {
                Value::Number(n) if n.is_i64() || n.is_u64() => value.clone(),
                other => as_integer(other)
                    .map(Value::from)
                    .unwrap_or_else(|| other.clone()),
            },
            SchemaKind::Boolean => as_boolean(value)
                .map(Value::Bool)
                .unwrap_or_else(|| value.clone()),
            SchemaKind::String(_) | SchemaKind::Null => value.clone(),
        }
    }
}
