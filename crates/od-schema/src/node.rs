//! Typed schema tree.

use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;
use serde_json::{Map, Value};

/// Primitive JSON types a schema node can accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaType {
    Object,
    Array,
    String,
    Number,
    Integer,
    Boolean,
    Null,
}

impl SchemaType {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "object" => Some(Self::Object),
            "array" => Some(Self::Array),
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "integer" => Some(Self::Integer),
            "boolean" => Some(Self::Boolean),
            "null" => Some(Self::Null),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Object => "object",
            Self::Array => "array",
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Null => "null",
        }
    }
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// String formats understood by the validator. Unknown formats are ignored at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringFormat {
    Uuid,
    Uri,
    DateTime,
}

impl StringFormat {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "uuid" => Some(Self::Uuid),
            "uri" => Some(Self::Uri),
            "date-time" => Some(Self::DateTime),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uuid => "uuid",
            Self::Uri => "uri",
            Self::DateTime => "date-time",
        }
    }

    pub fn is_valid(self, value: &str) -> bool {
        match self {
            // Hyphenated form only; `Uuid::try_parse` also accepts simple and braced forms.
            Self::Uuid => value.len() == 36 && uuid::Uuid::try_parse(value).is_ok(),
            Self::Uri => url::Url::parse(value).is_ok(),
            Self::DateTime => chrono::DateTime::parse_from_rfc3339(value).is_ok(),
        }
    }
}

/// A compiled regular expression that remembers its source text.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(source: impl Into<String>) -> Result<Self, regex::Error> {
        let source = source.into();
        let regex = Regex::new(&source)?;
        Ok(Self { source, regex })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Unanchored search, as JSON Schema `pattern` requires.
    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// How an object treats properties it does not declare.
#[derive(Debug, Clone, PartialEq)]
pub enum AdditionalProperties {
    /// Kept as-is.
    Allowed,
    /// Validation fails.
    Forbidden,
    /// Accepted by validation, removed by sanitization.
    Discarded,
    /// Each undeclared value must match the schema.
    Schema(Box<SchemaNode>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSchema {
    pub properties: BTreeMap<String, SchemaNode>,
    pub additional: AdditionalProperties,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ArraySchema {
    pub items: Option<Box<SchemaNode>>,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StringSchema {
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<Pattern>,
    pub format: Option<StringFormat>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NumberSchema {
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: bool,
    pub exclusive_maximum: bool,
}

/// One accepted type together with the constraints that apply to it.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaKind {
    Object(ObjectSchema),
    Array(ArraySchema),
    String(StringSchema),
    Number(NumberSchema),
    Integer(NumberSchema),
    Boolean,
    Null,
}

impl SchemaKind {
    pub fn schema_type(&self) -> SchemaType {
        match self {
            Self::Object(_) => SchemaType::Object,
            Self::Array(_) => SchemaType::Array,
            Self::String(_) => SchemaType::String,
            Self::Number(_) => SchemaType::Number,
            Self::Integer(_) => SchemaType::Integer,
            Self::Boolean => SchemaType::Boolean,
            Self::Null => SchemaType::Null,
        }
    }
}

/// A node in the schema tree. `kinds` is never empty; a node with several kinds
/// accepts a union of types.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    pub(crate) kinds: Vec<SchemaKind>,
    pub required: bool,
    pub readonly: bool,
    pub default: Option<Value>,
    pub enum_values: Option<Vec<Value>>,
    pub description: Option<String>,
}

impl SchemaNode {
    fn with_kind(kind: SchemaKind) -> Self {
        Self {
            kinds: vec![kind],
            required: false,
            readonly: false,
            default: None,
            enum_values: None,
            description: None,
        }
    }

    pub(crate) fn from_kinds(kinds: Vec<SchemaKind>) -> Self {
        debug_assert!(!kinds.is_empty());
        Self {
            kinds,
            ..Self::with_kind(SchemaKind::Null)
        }
    }

    /// Object with the given properties and no additional properties allowed.
    pub fn object<K, I>(properties: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, SchemaNode)>,
    {
        Self::with_kind(SchemaKind::Object(ObjectSchema {
            properties: properties
                .into_iter()
                .map(|(name, node)| (name.into(), node))
                .collect(),
            additional: AdditionalProperties::Forbidden,
        }))
    }

    pub fn array(items: SchemaNode) -> Self {
        Self::with_kind(SchemaKind::Array(ArraySchema {
            items: Some(Box::new(items)),
            ..ArraySchema::default()
        }))
    }

    pub fn string() -> Self {
        Self::with_kind(SchemaKind::String(StringSchema::default()))
    }

    pub fn number() -> Self {
        Self::with_kind(SchemaKind::Number(NumberSchema::default()))
    }

    pub fn integer() -> Self {
        Self::with_kind(SchemaKind::Integer(NumberSchema::default()))
    }

    pub fn boolean() -> Self {
        Self::with_kind(SchemaKind::Boolean)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn minimum(mut self, minimum: f64) -> Self {
        for numeric in self.numeric_kinds_mut() {
            numeric.minimum = Some(minimum);
        }
        self
    }

    pub fn maximum(mut self, maximum: f64) -> Self {
        for numeric in self.numeric_kinds_mut() {
            numeric.maximum = Some(maximum);
        }
        self
    }

    pub fn pattern(mut self, pattern: Pattern) -> Self {
        for kind in &mut self.kinds {
            if let SchemaKind::String(string) = kind {
                string.pattern = Some(pattern.clone());
            }
        }
        self
    }

    pub fn format(mut self, format: StringFormat) -> Self {
        for kind in &mut self.kinds {
            if let SchemaKind::String(string) = kind {
                string.format = Some(format);
            }
        }
        self
    }

    pub fn additional_properties(mut self, additional: AdditionalProperties) -> Self {
        for kind in &mut self.kinds {
            if let SchemaKind::Object(object) = kind {
                object.additional = additional.clone();
            }
        }
        self
    }

    pub fn kinds(&self) -> &[SchemaKind] {
        &self.kinds
    }

    pub fn types(&self) -> Vec<SchemaType> {
        self.kinds.iter().map(SchemaKind::schema_type).collect()
    }

    /// Declared properties of the first object kind, if any.
    pub fn properties(&self) -> Option<&BTreeMap<String, SchemaNode>> {
        self.kinds.iter().find_map(|kind| match kind {
            SchemaKind::Object(object) => Some(&object.properties),
            _ => None,
        })
    }

    pub fn property(&self, name: &str) -> Option<&SchemaNode> {
        self.properties().and_then(|properties| properties.get(name))
    }

    /// Item schema of the first array kind, if any.
    pub fn items(&self) -> Option<&SchemaNode> {
        self.kinds.iter().find_map(|kind| match kind {
            SchemaKind::Array(array) => array.items.as_deref(),
            _ => None,
        })
    }

    /// Copy of this node with every read-only top-level property removed.
    pub fn without_readonly_properties(&self) -> Self {
        let mut copy = self.clone();
        for kind in &mut copy.kinds {
            if let SchemaKind::Object(object) = kind {
                object.properties.retain(|_, property| !property.readonly);
            }
        }
        copy
    }

    fn numeric_kinds_mut(&mut self) -> impl Iterator<Item = &mut NumberSchema> {
        self.kinds.iter_mut().filter_map(|kind| match kind {
            SchemaKind::Number(numeric) | SchemaKind::Integer(numeric) => Some(numeric),
            _ => None,
        })
    }

    /// Render the node back into a JSON Schema document.
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        let types = self.types();
        let type_value = match types.as_slice() {
            [single] => Value::from(single.as_str()),
            many => Value::Array(many.iter().map(|t| Value::from(t.as_str())).collect()),
        };
        out.insert("type".into(), type_value);
        if let Some(description) = &self.description {
            out.insert("description".into(), Value::from(description.as_str()));
        }
        if self.required {
            out.insert("required".into(), Value::Bool(true));
        }
        if self.readonly {
            out.insert("readonly".into(), Value::Bool(true));
        }
        if let Some(default) = &self.default {
            out.insert("default".into(), default.clone());
        }
        if let Some(values) = &self.enum_values {
            out.insert("enum".into(), Value::Array(values.clone()));
        }
        for kind in &self.kinds {
            render_kind(kind, &mut out);
        }
        Value::Object(out)
    }
}

fn render_kind(kind: &SchemaKind, out: &mut Map<String, Value>) {
    match kind {
        SchemaKind::Object(object) => {
            let properties = object
                .properties
                .iter()
                .map(|(name, node)| (name.clone(), node.to_json()))
                .collect::<Map<_, _>>();
            out.insert("properties".into(), Value::Object(properties));
            let additional = match &object.additional {
                AdditionalProperties::Forbidden => Value::Bool(false),
                AdditionalProperties::Allowed | AdditionalProperties::Discarded => Value::Bool(true),
                AdditionalProperties::Schema(node) => node.to_json(),
            };
            out.insert("additionalProperties".into(), additional);
        }
        SchemaKind::Array(array) => {
            if let Some(items) = &array.items {
                out.insert("items".into(), items.to_json());
            }
            if let Some(min) = array.min_items {
                out.insert("minItems".into(), Value::from(min));
            }
            if let Some(max) = array.max_items {
                out.insert("maxItems".into(), Value::from(max));
            }
        }
        SchemaKind::String(string) => {
            if let Some(min) = string.min_length {
                out.insert("minLength".into(), Value::from(min));
            }
            if let Some(max) = string.max_length {
                out.insert("maxLength".into(), Value::from(max));
            }
            if let Some(pattern) = &string.pattern {
                out.insert("pattern".into(), Value::from(pattern.as_str()));
            }
            if let Some(format) = string.format {
                out.insert("format".into(), Value::from(format.as_str()));
            }
        }
        SchemaKind::Number(numeric) | SchemaKind::Integer(numeric) => {
            if let Some(min) = numeric.minimum {
                out.insert("minimum".into(), Value::from(min));
                if numeric.exclusive_minimum {
                    out.insert("exclusiveMinimum".into(), Value::Bool(true));
                }
            }
            if let Some(max) = numeric.maximum {
                out.insert("maximum".into(), Value::from(max));
                if numeric.exclusive_maximum {
                    out.insert("exclusiveMaximum".into(), Value::Bool(true));
                }
            }
        }
        SchemaKind::Boolean | SchemaKind::Null => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builders_apply_constraints_to_matching_kinds_only() {
        let node = SchemaNode::number().minimum(0.0).maximum(1.0).format(StringFormat::Uri);
        assert_eq!(
            node.kinds(),
            &[SchemaKind::Number(NumberSchema {
                minimum: Some(0.0),
                maximum: Some(1.0),
                ..NumberSchema::default()
            })]
        );
    }

    #[test]
    fn renders_json_schema() {
        let node = SchemaNode::object([
            ("id", SchemaNode::string().format(StringFormat::Uuid).required().readonly()),
            ("size", SchemaNode::integer().minimum(0.0)),
        ]);
        assert_eq!(
            node.to_json(),
            json!({
                "type": "object",
                "properties": {
                    "id": {"type": "string", "required": true, "readonly": true, "format": "uuid"},
                    "size": {"type": "integer", "minimum": 0.0}
                },
                "additionalProperties": false
            })
        );
    }

    #[test]
    fn readonly_properties_are_removed_from_copy() {
        let node = SchemaNode::object([
            ("id", SchemaNode::string().readonly()),
            ("name", SchemaNode::string()),
        ]);
        let writable = node.without_readonly_properties();
        assert!(writable.property("id").is_none());
        assert!(writable.property("name").is_some());
        assert!(node.property("id").is_some());
    }

    #[test]
    fn uuid_format_requires_hyphenated_form() {
        assert!(StringFormat::Uuid.is_valid("3fa85f64-5717-4562-b3fc-2c963f66afa6"));
        assert!(!StringFormat::Uuid.is_valid("3fa85f6457174562b3fc2c963f66afa6"));
        assert!(!StringFormat::Uuid.is_valid("not-a-uuid"));
    }
}
