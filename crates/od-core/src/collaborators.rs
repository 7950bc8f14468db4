//! Services the URL metric depends on but does not own.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

/// Default XPath grammar for element locators. Accepts the indexed form
/// emitted by the tag walker (`/*[1][self::HTML]/*[2][self::BODY]`) as well as
/// plain tag steps (`/HTML/BODY/DIV[1]`).
pub const DEFAULT_XPATH_PATTERN: &str =
    r"^(/(\*\[\d+\]\[self::[A-Za-z][A-Za-z0-9:_-]*\]|[A-Za-z][A-Za-z0-9:_-]*(\[\d+\])?))+$";

pub const DEFAULT_MIN_VIEWPORT_ASPECT_RATIO: f64 = 0.4;
pub const DEFAULT_MAX_VIEWPORT_ASPECT_RATIO: f64 = 2.5;

/// Inclusive bounds for `viewport.width / viewport.height`.
pub trait AspectRatioBounds: Send + Sync {
    fn minimum_viewport_aspect_ratio(&self) -> f64;
    fn maximum_viewport_aspect_ratio(&self) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum BoundsError {
    #[error("viewport aspect ratio bounds must be finite and positive (got {min} and {max})")]
    NotPositive { min: f64, max: f64 },
    #[error("minimum viewport aspect ratio {min} exceeds maximum {max}")]
    Inverted { min: f64, max: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportAspectRatioBounds {
    min: f64,
    max: f64,
}

impl ViewportAspectRatioBounds {
    pub fn new(min: f64, max: f64) -> Result<Self, BoundsError> {
        let usable = |v: f64| v.is_finite() && v > 0.0;
        if !usable(min) || !usable(max) {
            return Err(BoundsError::NotPositive { min, max });
        }
        if min > max {
            return Err(BoundsError::Inverted { min, max });
        }
        Ok(Self { min, max })
    }
}

impl Default for ViewportAspectRatioBounds {
    fn default() -> Self {
        Self {
            min: DEFAULT_MIN_VIEWPORT_ASPECT_RATIO,
            max: DEFAULT_MAX_VIEWPORT_ASPECT_RATIO,
        }
    }
}

impl AspectRatioBounds for ViewportAspectRatioBounds {
    fn minimum_viewport_aspect_ratio(&self) -> f64 {
        self.min
    }

    fn maximum_viewport_aspect_ratio(&self) -> f64 {
        self.max
    }
}

pub trait UuidGenerator: Send + Sync {
    fn generate(&self) -> Uuid;
}

/// Random (v4) UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomUuid;

impl UuidGenerator for RandomUuid {
    fn generate(&self) -> Uuid {
        Uuid::new_v4()
    }
}

/// A contributor of optional schema properties.
///
/// Root and element contributions are queried separately; a property offered
/// for one level never applies to the other.
pub trait SchemaExtension: Send + Sync {
    fn name(&self) -> &str;

    /// Extra properties for the URL metric object.
    fn root_properties(&self) -> Map<String, Value> {
        Map::new()
    }

    /// Extra properties for each entry of `elements`.
    fn element_properties(&self) -> Map<String, Value> {
        Map::new()
    }
}

/// An extension whose fragments are fixed at construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticSchemaExtension {
    name: String,
    root: Map<String, Value>,
    element: Map<String, Value>,
}

impl StaticSchemaExtension {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_root_property(mut self, name: impl Into<String>, fragment: Value) -> Self {
        self.root.insert(name.into(), fragment);
        self
    }

    pub fn with_element_property(mut self, name: impl Into<String>, fragment: Value) -> Self {
        self.element.insert(name.into(), fragment);
        self
    }

    pub fn with_root_properties(mut self, properties: Map<String, Value>) -> Self {
        self.root.extend(properties);
        self
    }

    pub fn with_element_properties(mut self, properties: Map<String, Value>) -> Self {
        self.element.extend(properties);
        self
    }
}

impl SchemaExtension for StaticSchemaExtension {
    fn name(&self) -> &str {
        &self.name
    }

    fn root_properties(&self) -> Map<String, Value> {
        self.root.clone()
    }

    fn element_properties(&self) -> Map<String, Value> {
        self.element.clone()
    }
}

/// Ordered set of registered extensions. Earlier registrations win name clashes.
#[derive(Clone, Default)]
pub struct ExtensionRegistry {
    extensions: Vec<Arc<dyn SchemaExtension>>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, extension: impl SchemaExtension + 'static) -> &mut Self {
        self.extensions.push(Arc::new(extension));
        self
    }

    pub fn with(mut self, extension: impl SchemaExtension + 'static) -> Self {
        self.register(extension);
        self
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn SchemaExtension> {
        self.extensions.iter().map(|extension| extension.as_ref())
    }
}

impl fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.extensions.iter().map(|extension| extension.name()))
            .finish()
    }
}
