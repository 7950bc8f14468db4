//! URL metric domain model: validated, immutable layout measurements from a
//! single page visit.

mod collaborators;
mod metric;
mod model;
mod schema;

pub use collaborators::{
    AspectRatioBounds, BoundsError, ExtensionRegistry, RandomUuid, SchemaExtension,
    StaticSchemaExtension, UuidGenerator, ViewportAspectRatioBounds, DEFAULT_MAX_VIEWPORT_ASPECT_RATIO,
    DEFAULT_MIN_VIEWPORT_ASPECT_RATIO, DEFAULT_XPATH_PATTERN,
};
pub use metric::{DomainViolation, ErrorKind, MetricContext, UrlMetric, UrlMetricError};
pub use model::{DomRect, ElementData, Viewport};
pub use schema::{ExtensionScope, SchemaDiagnostic, Strictness, UrlMetricSchema};

pub use od_schema::{Pattern, SchemaNode, SchemaViolation};

pub const CRATE_NAME: &str = "od-core";
