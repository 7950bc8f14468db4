//! Construction and read access for URL metrics.

use std::fmt;
use std::sync::{Arc, LazyLock, OnceLock};

use od_schema::{Pattern, SchemaViolation};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::collaborators::{
    AspectRatioBounds, ExtensionRegistry, RandomUuid, UuidGenerator, ViewportAspectRatioBounds,
    DEFAULT_XPATH_PATTERN,
};
use crate::model::{ElementData, Viewport};
use crate::schema::{Strictness, UrlMetricSchema};

static DEFAULT_XPATH: LazyLock<Pattern> =
    LazyLock::new(|| Pattern::new(DEFAULT_XPATH_PATTERN).expect("default XPath pattern compiles"));

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainViolation {
    #[error("Viewport height must be greater than zero.")]
    ZeroViewportHeight,
    #[error("Viewport aspect ratio ({ratio:.3}) is not in the accepted range of {min:?} to {max:?}.")]
    AspectRatioOutOfRange { ratio: f64, min: f64, max: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The input does not match the schema.
    Structural,
    /// The input matches the schema but breaks a domain rule.
    DomainInvariant,
}

#[derive(Debug, Error)]
pub enum UrlMetricError {
    #[error(transparent)]
    Structural(#[from] SchemaViolation),
    #[error(transparent)]
    DomainInvariant(#[from] DomainViolation),
    #[error("invalid URL metric JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

impl UrlMetricError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Structural(_) | Self::Decode(_) => ErrorKind::Structural,
            Self::DomainInvariant(_) => ErrorKind::DomainInvariant,
        }
    }
}

/// Collaborators and settings used to build URL metrics.
///
/// The schema is built on first use and reused afterwards; the context is
/// immutable once built, so it can be shared between threads.
#[derive(Clone)]
pub struct MetricContext {
    bounds: Arc<dyn AspectRatioBounds>,
    uuids: Arc<dyn UuidGenerator>,
    extensions: ExtensionRegistry,
    xpath_pattern: Pattern,
    strictness: Strictness,
    schema: OnceLock<Arc<UrlMetricSchema>>,
}

impl MetricContext {
    pub fn new() -> Self {
        Self {
            bounds: Arc::new(ViewportAspectRatioBounds::default()),
            uuids: Arc::new(RandomUuid),
            extensions: ExtensionRegistry::new(),
            xpath_pattern: DEFAULT_XPATH.clone(),
            strictness: Strictness::Strict,
            schema: OnceLock::new(),
        }
    }

    pub fn with_bounds(mut self, bounds: impl AspectRatioBounds + 'static) -> Self {
        self.bounds = Arc::new(bounds);
        self
    }

    pub fn with_uuid_generator(mut self, uuids: impl UuidGenerator + 'static) -> Self {
        self.uuids = Arc::new(uuids);
        self
    }

    pub fn with_extensions(mut self, extensions: ExtensionRegistry) -> Self {
        self.extensions = extensions;
        self.schema = OnceLock::new();
        self
    }

    pub fn with_xpath_pattern(mut self, pattern: Pattern) -> Self {
        self.xpath_pattern = pattern;
        self.schema = OnceLock::new();
        self
    }

    pub fn with_strictness(mut self, strictness: Strictness) -> Self {
        self.strictness = strictness;
        self.schema = OnceLock::new();
        self
    }

    pub fn strictness(&self) -> Strictness {
        self.strictness
    }

    pub fn bounds(&self) -> &dyn AspectRatioBounds {
        self.bounds.as_ref()
    }

    pub fn schema(&self) -> &UrlMetricSchema {
        self.schema.get_or_init(|| {
            Arc::new(UrlMetricSchema::build(
                &self.extensions,
                &self.xpath_pattern,
                self.strictness,
            ))
        })
    }
}

impl Default for MetricContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MetricContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricContext")
            .field("min_aspect_ratio", &self.bounds.minimum_viewport_aspect_ratio())
            .field("max_aspect_ratio", &self.bounds.maximum_viewport_aspect_ratio())
            .field("extensions", &self.extensions)
            .field("xpath_pattern", &self.xpath_pattern.as_str())
            .field("strictness", &self.strictness)
            .finish()
    }
}

#[derive(Deserialize)]
struct BaseFields {
    uuid: Uuid,
    url: String,
    timestamp: f64,
    viewport: Viewport,
    elements: Vec<ElementData>,
}

/// Layout measurements from one client visit to one URL.
///
/// Built only through [`UrlMetric::new`]; the canonical data never changes
/// afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct UrlMetric {
    data: Map<String, Value>,
    uuid: Uuid,
    url: String,
    timestamp: f64,
    viewport: Viewport,
    elements: Vec<ElementData>,
}

impl UrlMetric {
    /// Validate and sanitize untrusted input.
    ///
    /// A missing `uuid` is generated first. The input is then checked against
    /// the context's schema, the viewport aspect ratio is checked against the
    /// context's bounds, and the sanitized result becomes the canonical data.
    pub fn new(raw: Value, context: &MetricContext) -> Result<Self, UrlMetricError> {
        let mut raw = raw;
        if let Value::Object(map) = &mut raw {
            if !map.contains_key("uuid") {
                map.insert(
                    "uuid".to_string(),
                    Value::String(context.uuids.generate().to_string()),
                );
            }
        }

        let schema = context.schema();
        schema.root().validate(&raw, "")?;
        check_viewport_aspect_ratio(&raw, context.bounds())?;

        let Value::Object(mut data) = schema.root().sanitize(&raw) else {
            // Validation guarantees an object at the root.
            return Err(SchemaViolation {
                param: String::new(),
                message: "value is not of type object.".to_string(),
            }
            .into());
        };
        let fields: BaseFields = serde_json::from_value(Value::Object(data.clone()))?;
        data.insert("uuid".to_string(), Value::String(fields.uuid.to_string()));
        debug!(uuid = %fields.uuid, url = %fields.url, elements = fields.elements.len(), "constructed URL metric");

        Ok(Self {
            data,
            uuid: fields.uuid,
            url: fields.url,
            timestamp: fields.timestamp,
            viewport: fields.viewport,
            elements: fields.elements,
        })
    }

    pub fn from_json_str(json: &str, context: &MetricContext) -> Result<Self, UrlMetricError> {
        let raw: Value = serde_json::from_str(json)?;
        Self::new(raw, context)
    }

    /// Any top-level field, including extension fields. `None` for unknown keys.
    ///
    /// `uuid` is stored in lowercase hyphenated form whatever the input casing.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn viewport_width(&self) -> u64 {
        self.viewport.width
    }

    pub fn elements(&self) -> &[ElementData] {
        &self.elements
    }

    /// The element reported as the largest contentful paint, if any.
    pub fn lcp_element(&self) -> Option<&ElementData> {
        self.elements.iter().find(|element| element.is_lcp())
    }

    /// The canonical sanitized data, read-only fields included.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.data.clone())
    }
}

impl Serialize for UrlMetric {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.data.serialize(serializer)
    }
}

/// Runs after structural validation, so `viewport` holds two non-negative integers.
fn check_viewport_aspect_ratio(raw: &Value, bounds: &dyn AspectRatioBounds) -> Result<(), DomainViolation> {
    let dimension = |name: &str| {
        raw.get("viewport")
            .and_then(|viewport| viewport.get(name))
            .and_then(od_schema::as_integer)
            .unwrap_or(0)
    };
    let viewport = Viewport {
        width: u64::try_from(dimension("width")).unwrap_or(0),
        height: u64::try_from(dimension("height")).unwrap_or(0),
    };
    let ratio = viewport
        .aspect_ratio()
        .ok_or(DomainViolation::ZeroViewportHeight)?;

    let min = bounds.minimum_viewport_aspect_ratio();
    let max = bounds.maximum_viewport_aspect_ratio();
    // NaN bounds from a custom provider reject every ratio.
    if !(min..=max).contains(&ratio) {
        return Err(DomainViolation::AspectRatioOutOfRange { ratio, min, max });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FixedUuid(Uuid);

    impl UuidGenerator for FixedUuid {
        fn generate(&self) -> Uuid {
            self.0
        }
    }

    fn rect() -> Value {
        json!({"width": 300, "height": 200, "x": 0, "y": 0, "top": 0, "right": 300, "bottom": 200, "left": 0})
    }

    fn input() -> Value {
        json!({
            "url": "https://example.com/page",
            "timestamp": 1700000000.123,
            "viewport": {"width": 1280, "height": 800},
            "elements": [{
                "isLCP": true,
                "isLCPCandidate": true,
                "xpath": "/HTML/BODY/DIV[1]/IMG[1]",
                "intersectionRatio": 1.0,
                "intersectionRect": rect(),
                "boundingClientRect": rect()
            }]
        })
    }

    #[test]
    fn injects_generated_uuid() {
        let id = Uuid::parse_str("3fa85f64-5717-4562-b3fc-2c963f66afa6").unwrap();
        let context = MetricContext::new().with_uuid_generator(FixedUuid(id));
        let metric = UrlMetric::new(input(), &context).unwrap();
        assert_eq!(metric.uuid(), id);
        assert_eq!(metric.get("uuid"), Some(&json!(id.to_string())));
    }

    #[test]
    fn accessors_read_canonical_data() {
        let metric = UrlMetric::new(input(), &MetricContext::new()).unwrap();
        assert_eq!(metric.url(), "https://example.com/page");
        assert_eq!(metric.timestamp(), 1700000000.123);
        assert_eq!(metric.viewport(), Viewport { width: 1280, height: 800 });
        assert_eq!(metric.viewport_width(), 1280);
        assert_eq!(metric.elements().len(), 1);
        assert_eq!(metric.lcp_element().map(ElementData::xpath), Some("/HTML/BODY/DIV[1]/IMG[1]"));
        assert_eq!(metric.get("missing"), None);
    }

    #[test]
    fn numeric_strings_are_stored_as_numbers() {
        let mut raw = input();
        raw["viewport"] = json!({"width": "1280", "height": "800"});
        raw["elements"][0]["intersectionRatio"] = json!("0.5");
        raw["elements"][0]["isLCP"] = json!("false");
        let metric = UrlMetric::new(raw, &MetricContext::new()).unwrap();
        assert_eq!(metric.get("viewport"), Some(&json!({"width": 1280, "height": 800})));
        assert_eq!(metric.elements()[0].intersection_ratio(), 0.5);
        assert!(!metric.elements()[0].is_lcp());
        assert!(metric.lcp_element().is_none());
    }

    #[test]
    fn non_object_input_is_structural_error() {
        let err = UrlMetric::new(json!([1, 2]), &MetricContext::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Structural);
        assert_eq!(err.to_string(), "value is not of type object.");
    }

    #[test]
    fn zero_height_is_rejected_before_dividing() {
        let mut raw = input();
        raw["viewport"]["height"] = json!(0);
        let err = UrlMetric::new(raw, &MetricContext::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DomainInvariant);
        assert!(matches!(
            err,
            UrlMetricError::DomainInvariant(DomainViolation::ZeroViewportHeight)
        ));
    }

    #[test]
    fn out_of_range_message_names_ratio_and_bounds() {
        let mut raw = input();
        raw["viewport"] = json!({"width": 1920, "height": 1080});
        let context = MetricContext::new().with_bounds(ViewportAspectRatioBounds::new(2.0, 3.0).unwrap());
        let err = UrlMetric::new(raw, &context).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Viewport aspect ratio (1.778) is not in the accepted range of 2.0 to 3.0."
        );
    }

    #[test]
    fn malformed_json_text_is_reported() {
        let err = UrlMetric::from_json_str("{", &MetricContext::new()).unwrap_err();
        assert!(matches!(err, UrlMetricError::Decode(_)));
    }

    #[test]
    fn serializes_as_canonical_map() {
        let metric = UrlMetric::new(input(), &MetricContext::new()).unwrap();
        let text = serde_json::to_string(&metric).unwrap();
        let reparsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(reparsed, metric.to_json());
    }

    #[test]
    fn context_schema_is_memoized() {
        let context = MetricContext::new();
        assert!(std::ptr::eq(context.schema(), context.schema()));
    }
}
