//! Parsing JSON Schema fragments into schema nodes.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::node::{
    AdditionalProperties, ArraySchema, NumberSchema, ObjectSchema, Pattern, SchemaKind, SchemaNode,
    SchemaType, StringFormat, StringSchema,
};

#[derive(Debug, Error)]
pub enum FragmentError {
    #[error("schema fragment is not an object")]
    NotAnObject,
    #[error("schema fragment lacks a valid type declaration")]
    MissingType,
    #[error("unknown schema type `{0}`")]
    UnknownType(String),
    #[error("invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("keyword `{keyword}` {reason}")]
    InvalidKeyword { keyword: &'static str, reason: &'static str },
    #[error("in `{path}`: {source}")]
    Nested {
        path: String,
        #[source]
        source: Box<FragmentError>,
    },
}

impl FragmentError {
    fn nested(path: impl Into<String>, source: FragmentError) -> Self {
        Self::Nested {
            path: path.into(),
            source: Box::new(source),
        }
    }

    /// The innermost error, skipping `Nested` wrappers.
    pub fn root_cause(&self) -> &FragmentError {
        match self {
            Self::Nested { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl SchemaNode {
    /// Parse a JSON Schema fragment.
    ///
    /// Objects without an explicit `additionalProperties` keep undeclared
    /// properties. Properties listed in an object's `required` array, or
    /// carrying `"required": true` themselves, are marked required.
    pub fn from_fragment(fragment: &Value) -> Result<Self, FragmentError> {
        let Value::Object(map) = fragment else {
            return Err(FragmentError::NotAnObject);
        };
        let types = parse_types(map)?;

        let mut kinds = Vec::with_capacity(types.len());
        for schema_type in types {
            kinds.push(parse_kind(schema_type, map)?);
        }

        let mut node = SchemaNode::from_kinds(kinds);
        node.required = matches!(map.get("required"), Some(Value::Bool(true)));
        node.readonly = map
            .get("readonly")
            .or_else(|| map.get("readOnly"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        node.default = map.get("default").cloned();
        node.description = map
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string);
        node.enum_values = match map.get("enum") {
            None => None,
            Some(Value::Array(values)) => Some(values.clone()),
            Some(_) => {
                return Err(FragmentError::InvalidKeyword {
                    keyword: "enum",
                    reason: "must be an array",
                })
            }
        };
        Ok(node)
    }
}

/// `type` must be a type name or a non-empty array of them.
pub fn has_type_declaration(fragment: &Map<String, Value>) -> bool {
    match fragment.get("type") {
        Some(Value::String(_)) => true,
        Some(Value::Array(names)) => !names.is_empty() && names.iter().all(Value::is_string),
        _ => false,
    }
}

fn parse_types(map: &Map<String, Value>) -> Result<Vec<SchemaType>, FragmentError> {
    if !has_type_declaration(map) {
        return Err(FragmentError::MissingType);
    }
    let names: Vec<&str> = match map.get("type") {
        Some(Value::String(name)) => vec![name.as_str()],
        Some(Value::Array(names)) => names.iter().filter_map(Value::as_str).collect(),
        _ => return Err(FragmentError::MissingType),
    };
    let mut types = Vec::with_capacity(names.len());
    for name in names {
        let schema_type =
            SchemaType::parse(name).ok_or_else(|| FragmentError::UnknownType(name.to_string()))?;
        if !types.contains(&schema_type) {
            types.push(schema_type);
        }
    }
    Ok(types)
}

fn parse_kind(schema_type: SchemaType, map: &Map<String, Value>) -> Result<SchemaKind, FragmentError> {
    let kind = match schema_type {
        SchemaType::Object => SchemaKind::Object(parse_object(map)?),
        SchemaType::Array => SchemaKind::Array(parse_array(map)?),
        SchemaType::String => SchemaKind::String(parse_string(map)?),
        SchemaType::Number => SchemaKind::Number(parse_number(map)?),
        SchemaType::Integer => SchemaKind::Integer(parse_number(map)?),
        SchemaType::Boolean => SchemaKind::Boolean,
        SchemaType::Null => SchemaKind::Null,
    };
    Ok(kind)
}

fn parse_object(map: &Map<String, Value>) -> Result<ObjectSchema, FragmentError> {
    let mut properties = BTreeMap::new();
    match map.get("properties") {
        None => {}
        Some(Value::Object(declared)) => {
            for (name, fragment) in declared {
                let node = SchemaNode::from_fragment(fragment)
                    .map_err(|err| FragmentError::nested(format!("properties.{name}"), err))?;
                properties.insert(name.clone(), node);
            }
        }
        Some(_) => {
            return Err(FragmentError::InvalidKeyword {
                keyword: "properties",
                reason: "must be an object",
            })
        }
    }

    if let Some(Value::Array(names)) = map.get("required") {
        for name in names.iter().filter_map(Value::as_str) {
            if let Some(property) = properties.get_mut(name) {
                property.required = true;
            }
        }
    }

    let additional = match map.get("additionalProperties") {
        None | Some(Value::Bool(true)) => AdditionalProperties::Allowed,
        Some(Value::Bool(false)) => AdditionalProperties::Forbidden,
        Some(fragment @ Value::Object(_)) => AdditionalProperties::Schema(Box::new(
            SchemaNode::from_fragment(fragment)
                .map_err(|err| FragmentError::nested("additionalProperties", err))?,
        )),
        Some(_) => {
            return Err(FragmentError::InvalidKeyword {
                keyword: "additionalProperties",
                reason: "must be a boolean or a schema",
            })
        }
    };

    Ok(ObjectSchema {
        properties,
        additional,
    })
}

fn parse_array(map: &Map<String, Value>) -> Result<ArraySchema, FragmentError> {
    let items = match map.get("items") {
        None => None,
        Some(fragment) => Some(Box::new(
            SchemaNode::from_fragment(fragment).map_err(|err| FragmentError::nested("items", err))?,
        )),
    };
    Ok(ArraySchema {
        items,
        min_items: count_keyword(map, "minItems")?,
        max_items: count_keyword(map, "maxItems")?,
    })
}

fn parse_string(map: &Map<String, Value>) -> Result<StringSchema, FragmentError> {
    let pattern = match map.get("pattern") {
        None => None,
        Some(Value::String(source)) => {
            Some(Pattern::new(source.as_str()).map_err(|source_err| FragmentError::InvalidPattern {
                pattern: source.clone(),
                source: source_err,
            })?)
        }
        Some(_) => {
            return Err(FragmentError::InvalidKeyword {
                keyword: "pattern",
                reason: "must be a string",
            })
        }
    };
    Ok(StringSchema {
        min_length: count_keyword(map, "minLength")?,
        max_length: count_keyword(map, "maxLength")?,
        pattern,
        format: map
            .get("format")
            .and_then(Value::as_str)
            .and_then(StringFormat::parse),
    })
}

fn parse_number(map: &Map<String, Value>) -> Result<NumberSchema, FragmentError> {
    let mut numeric = NumberSchema {
        minimum: number_keyword(map, "minimum")?,
        maximum: number_keyword(map, "maximum")?,
        ..NumberSchema::default()
    };
    // Boolean modifiers (draft 4) and numeric bounds (draft 6+) are both accepted.
    match map.get("exclusiveMinimum") {
        None => {}
        Some(Value::Bool(flag)) => numeric.exclusive_minimum = *flag,
        Some(Value::Number(n)) => {
            numeric.minimum = n.as_f64();
            numeric.exclusive_minimum = true;
        }
        Some(_) => {
            return Err(FragmentError::InvalidKeyword {
                keyword: "exclusiveMinimum",
                reason: "must be a boolean or a number",
            })
        }
    }
    match map.get("exclusiveMaximum") {
        None => {}
        Some(Value::Bool(flag)) => numeric.exclusive_maximum = *flag,
        Some(Value::Number(n)) => {
            numeric.maximum = n.as_f64();
            numeric.exclusive_maximum = true;
        }
        Some(_) => {
            return Err(FragmentError::InvalidKeyword {
                keyword: "exclusiveMaximum",
                reason: "must be a boolean or a number",
            })
        }
    }
    Ok(numeric)
}

fn number_keyword(map: &Map<String, Value>, keyword: &'static str) -> Result<Option<f64>, FragmentError> {
    match map.get(keyword) {
        None => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(_) => Err(FragmentError::InvalidKeyword {
            keyword,
            reason: "must be a number",
        }),
    }
}

fn count_keyword(map: &Map<String, Value>, keyword: &'static str) -> Result<Option<usize>, FragmentError> {
    match map.get(keyword) {
        None => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .map(Some)
            .ok_or(FragmentError::InvalidKeyword {
                keyword,
                reason: "must be a non-negative integer",
            }),
    }
}
