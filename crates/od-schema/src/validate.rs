//! Structural validation against a schema tree.

use serde_json::Value;
use thiserror::Error;

use crate::coerce::{as_boolean, as_integer, as_number, loosely_equal};
use crate::node::{AdditionalProperties, NumberSchema, SchemaKind, SchemaNode, SchemaType, StringSchema};

/// The first violation found while validating a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SchemaViolation {
    /// Parameter path of the offending value, e.g. `elements[0][xpath]`. Empty for the root.
    pub param: String,
    pub message: String,
}

impl SchemaViolation {
    fn new(param: &str, message: String) -> Self {
        Self {
            param: param.to_string(),
            message,
        }
    }
}

/// `viewport` + `width` -> `viewport[width]`.
pub fn child_param(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}[{key}]")
    }
}

fn label(param: &str) -> &str {
    if param.is_empty() {
        "value"
    } else {
        param
    }
}

impl SchemaNode {
    /// Validate `value`, reporting the first violation.
    pub fn validate(&self, value: &Value, param: &str) -> Result<(), SchemaViolation> {
        let Some(kind) = self.kind_for(value) else {
            let types = self
                .types()
                .iter()
                .map(|t| t.as_str())
                .collect::<Vec<_>>()
                .join(",");
            return Err(SchemaViolation::new(
                param,
                format!("{} is not of type {types}.", label(param)),
            ));
        };

        if let Some(allowed) = &self.enum_values {
            let candidate = self.sanitize(value);
            if !allowed.iter().any(|option| loosely_equal(option, &candidate)) {
                let options = allowed.iter().map(Value::to_string).collect::<Vec<_>>().join(", ");
                return Err(SchemaViolation::new(
                    param,
                    format!("{} is not one of {options}.", label(param)),
                ));
            }
        }

        match kind {
            SchemaKind::Object(object) => {
                let Value::Object(map) = value else {
                    return Ok(());
                };
                for (name, property) in &object.properties {
                    if property.required && !map.contains_key(name) {
                        return Err(SchemaViolation::new(
                            param,
                            format!("{name} is a required property of {}.", label(param)),
                        ));
                    }
                }
                for (name, item) in map {
                    let item_param = child_param(param, name);
                    match object.properties.get(name) {
                        Some(property) => property.validate(item, &item_param)?,
                        None => match &object.additional {
                            AdditionalProperties::Allowed | AdditionalProperties::Discarded => {}
                            AdditionalProperties::Forbidden => {
                                return Err(SchemaViolation::new(
                                    &item_param,
                                    format!("{item_param} is not a valid property of Object."),
                                ))
                            }
                            AdditionalProperties::Schema(schema) => schema.validate(item, &item_param)?,
                        },
                    }
                }
                Ok(())
            }
            SchemaKind::Array(array) => {
                let Value::Array(items) = value else {
                    return Ok(());
                };
                if let Some(min) = array.min_items {
                    if items.len() < min {
                        return Err(SchemaViolation::new(
                            param,
                            format!("{} must contain at least {min} items.", label(param)),
                        ));
                    }
                }
                if let Some(max) = array.max_items {
                    if items.len() > max {
                        return Err(SchemaViolation::new(
                            param,
                            format!("{} must contain at most {max} items.", label(param)),
                        ));
                    }
                }
                if let Some(schema) = &array.items {
                    for (index, item) in items.iter().enumerate() {
                        schema.validate(item, &child_param(param, &index.to_string()))?;
                    }
                }
                Ok(())
            }
            SchemaKind::String(string) => match value {
                Value::String(s) => validate_string(string, s, param),
                _ => Ok(()),
            },
            SchemaKind::Number(numeric) => match as_number(value) {
                Some(n) => validate_bounds(numeric, n, param),
                None => Ok(()),
            },
            SchemaKind::Integer(numeric) => match as_integer(value) {
                Some(n) => validate_bounds(numeric, n as f64, param),
                None => Ok(()),
            },
            SchemaKind::Boolean | SchemaKind::Null => Ok(()),
        }
    }

    /// The kind a value is checked against: an exact type match first, then a
    /// match after scalar coercion, in declaration order.
    pub(crate) fn kind_for(&self, value: &Value) -> Option<&SchemaKind> {
        self.kinds
            .iter()
            .find(|kind| matches_exactly(kind.schema_type(), value))
            .or_else(|| {
                self.kinds
                    .iter()
                    .find(|kind| matches_coerced(kind.schema_type(), value))
            })
    }
}

fn matches_exactly(schema_type: SchemaType, value: &Value) -> bool {
    match schema_type {
        SchemaType::Object => value.is_object(),
        SchemaType::Array => value.is_array(),
        SchemaType::String => value.is_string(),
        SchemaType::Number => value.is_number(),
        SchemaType::Integer => value.is_number() && as_integer(value).is_some(),
        SchemaType::Boolean => value.is_boolean(),
        SchemaType::Null => value.is_null(),
    }
}

fn matches_coerced(schema_type: SchemaType, value: &Value) -> bool {
    match schema_type {
        SchemaType::Number => as_number(value).is_some(),
        SchemaType::Integer => as_integer(value).is_some(),
        SchemaType::Boolean => as_boolean(value).is_some(),
        other => matches_exactly(other, value),
    }
}

fn validate_string(string: &StringSchema, value: &str, param: &str) -> Result<(), SchemaViolation> {
    let length = value.chars().count();
    if let Some(min) = string.min_length {
        if length < min {
            return Err(SchemaViolation::new(
                param,
                format!("{} must be at least {min} characters long.", label(param)),
            ));
        }
    }
    if let Some(max) = string.max_length {
        if length > max {
            return Err(SchemaViolation::new(
                param,
                format!("{} must be at most {max} characters long.", label(param)),
            ));
        }
    }
    if let Some(format) = string.format {
        if !format.is_valid(value) {
            return Err(SchemaViolation::new(
                param,
                format!("{} is not a valid {}.", label(param), format.as_str()),
            ));
        }
    }
    if let Some(pattern) = &string.pattern {
        if !pattern.is_match(value) {
            return Err(SchemaViolation::new(
                param,
                format!("{} does not match pattern {}.", label(param), pattern.as_str()),
            ));
        }
    }
    Ok(())
}

fn validate_bounds(numeric: &NumberSchema, value: f64, param: &str) -> Result<(), SchemaViolation> {
    if let Some(min) = numeric.minimum {
        let below = if numeric.exclusive_minimum { value <= min } else { value < min };
        if below {
            let relation = if numeric.exclusive_minimum {
                "greater than"
            } else {
                "greater than or equal to"
            };
            return Err(SchemaViolation::new(
                param,
                format!("{} must be {relation} {min}", label(param)),
            ));
        }
    }
    if let Some(max) = numeric.maximum {
        let above = if numeric.exclusive_maximum { value >= max } else { value > max };
        if above {
            let relation = if numeric.exclusive_maximum {
                "less than"
            } else {
                "less than or equal to"
            };
            return Err(SchemaViolation::new(
                param,
                format!("{} must be {relation} {max}", label(param)),
            ));
        }
    }
    Ok(())
}
