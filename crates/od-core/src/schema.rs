//! The URL metric schema: a fixed base plus extension-contributed properties.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use od_schema::{
    merge_properties, AdditionalProperties, MergeDiagnostic, Pattern, SchemaNode, StringFormat,
};
use serde_json::Value;
use tracing::warn;

use crate::collaborators::ExtensionRegistry;

static HTTP_URL: LazyLock<Pattern> =
    LazyLock::new(|| Pattern::new("^https?://").expect("literal URL pattern compiles"));

/// How undeclared properties at the root and element levels are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strictness {
    /// Rejected. Used for client submissions.
    #[default]
    Strict,
    /// Accepted and stripped during sanitization. Used for re-reading stored
    /// metrics that may carry fields of a since-removed extension.
    Lenient,
}

impl Strictness {
    fn additional_properties(self) -> AdditionalProperties {
        match self {
            Self::Strict => AdditionalProperties::Forbidden,
            Self::Lenient => AdditionalProperties::Discarded,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionScope {
    Root,
    Element,
}

impl fmt::Display for ExtensionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Root => "root",
            Self::Element => "element",
        })
    }
}

/// A non-fatal problem with an extension's contribution.
#[derive(Debug)]
pub struct SchemaDiagnostic {
    pub extension: String,
    pub scope: ExtensionScope,
    pub detail: MergeDiagnostic,
}

impl SchemaDiagnostic {
    pub fn property(&self) -> &str {
        &self.detail.property
    }
}

impl fmt::Display for SchemaDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "extension `{}` ({} properties): {}",
            self.extension, self.scope, self.detail
        )
    }
}

/// The effective schema for one extension registry and strictness.
#[derive(Debug)]
pub struct UrlMetricSchema {
    root: SchemaNode,
    writable: SchemaNode,
    diagnostics: Vec<SchemaDiagnostic>,
}

impl UrlMetricSchema {
    /// Build the base schema and merge in every registered extension. Never
    /// fails; rejected contributions are logged and kept in [`Self::diagnostics`].
    pub fn build(extensions: &ExtensionRegistry, xpath_pattern: &Pattern, strictness: Strictness) -> Self {
        let mut diagnostics = Vec::new();

        let mut element_properties = base_element_properties(xpath_pattern);
        for extension in extensions.iter() {
            let outcome = merge_properties(element_properties, &extension.element_properties());
            element_properties = outcome.properties;
            diagnostics.extend(outcome.diagnostics.into_iter().map(|detail| SchemaDiagnostic {
                extension: extension.name().to_string(),
                scope: ExtensionScope::Element,
                detail,
            }));
        }
        let element = SchemaNode::object(element_properties)
            .additional_properties(strictness.additional_properties());

        let mut root_properties = base_root_properties();
        root_properties.insert("elements".to_string(), SchemaNode::array(element).required());
        for extension in extensions.iter() {
            let outcome = merge_properties(root_properties, &extension.root_properties());
            root_properties = outcome.properties;
            diagnostics.extend(outcome.diagnostics.into_iter().map(|detail| SchemaDiagnostic {
                extension: extension.name().to_string(),
                scope: ExtensionScope::Root,
                detail,
            }));
        }

        for diagnostic in &diagnostics {
            warn!(
                extension = %diagnostic.extension,
                scope = %diagnostic.scope,
                property = %diagnostic.property(),
                "{}",
                diagnostic.detail
            );
        }

        let root = SchemaNode::object(root_properties)
            .additional_properties(strictness.additional_properties())
            .describe("URL metric");
        let writable = root.without_readonly_properties();

        Self {
            root,
            writable,
            diagnostics,
        }
    }

    pub fn root(&self) -> &SchemaNode {
        &self.root
    }

    /// The schema clients submit against: read-only fields (`uuid`,
    /// `timestamp`) are not part of it.
    pub fn writable(&self) -> &SchemaNode {
        &self.writable
    }

    pub fn element(&self) -> Option<&SchemaNode> {
        self.root.property("elements").and_then(SchemaNode::items)
    }

    pub fn diagnostics(&self) -> &[SchemaDiagnostic] {
        &self.diagnostics
    }

    pub fn to_json(&self) -> Value {
        self.root.to_json()
    }
}

fn dom_rect() -> SchemaNode {
    let size = || SchemaNode::number().minimum(0.0).required();
    let coordinate = || SchemaNode::number().required();
    SchemaNode::object([
        ("width", size()),
        ("height", size()),
        ("x", coordinate()),
        ("y", coordinate()),
        ("top", coordinate()),
        ("right", coordinate()),
        ("bottom", coordinate()),
        ("left", coordinate()),
    ])
}

fn base_root_properties() -> BTreeMap<String, SchemaNode> {
    let dimension = || SchemaNode::integer().minimum(0.0).required();
    BTreeMap::from([
        (
            "uuid".to_string(),
            SchemaNode::string()
                .format(StringFormat::Uuid)
                .required()
                .readonly()
                .describe("UUID for the URL metric"),
        ),
        (
            "url".to_string(),
            SchemaNode::string()
                .format(StringFormat::Uri)
                .pattern(HTTP_URL.clone())
                .required()
                .describe("The URL for which the metric was obtained"),
        ),
        (
            "viewport".to_string(),
            SchemaNode::object([("width", dimension()), ("height", dimension())])
                .required()
                .describe("Viewport dimensions"),
        ),
        (
            "timestamp".to_string(),
            SchemaNode::number()
                .minimum(0.0)
                .required()
                .readonly()
                .describe("Timestamp at which the URL metric was captured"),
        ),
    ])
}

fn base_element_properties(xpath_pattern: &Pattern) -> BTreeMap<String, SchemaNode> {
    BTreeMap::from([
        ("isLCP".to_string(), SchemaNode::boolean().required()),
        ("isLCPCandidate".to_string(), SchemaNode::boolean().required()),
        (
            "xpath".to_string(),
            SchemaNode::string().pattern(xpath_pattern.clone()).required(),
        ),
        (
            "intersectionRatio".to_string(),
            SchemaNode::number().minimum(0.0).maximum(1.0).required(),
        ),
        ("intersectionRect".to_string(), dom_rect().required()),
        ("boundingClientRect".to_string(), dom_rect().required()),
    ])
}
