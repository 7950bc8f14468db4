//! Typed JSON Schema subset used to validate and sanitize URL metrics.
//!
//! Schemas are trees of [`SchemaNode`]s built either in code or from JSON
//! Schema fragments contributed by extensions. A node validates a value
//! (first violation wins), sanitizes it into canonical form, and renders
//! itself back to JSON Schema.

mod coerce;
mod fragment;
mod merge;
mod node;
mod sanitize;
mod validate;

pub use coerce::{as_boolean, as_integer, as_number, loosely_equal};
pub use fragment::{has_type_declaration, FragmentError};
pub use merge::{merge_properties, MergeDiagnostic, MergeIssue, MergeOutcome};
pub use node::{
    AdditionalProperties, ArraySchema, NumberSchema, ObjectSchema, Pattern, SchemaKind, SchemaNode,
    SchemaType, StringFormat, StringSchema,
};
pub use validate::{child_param, SchemaViolation};

pub const CRATE_NAME: &str = "od-schema";
