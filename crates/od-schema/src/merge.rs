//! Merging third-party property contributions into a base property set.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value};

use crate::fragment::{has_type_declaration, FragmentError};
use crate::node::SchemaNode;

/// Why a contributed property was rejected or altered.
#[derive(Debug)]
pub enum MergeIssue {
    /// The name is already declared; the existing declaration is kept.
    Conflict,
    /// The fragment has no `type` string or array of type strings.
    MissingType,
    /// The fragment declared `required: true` and was made optional.
    RequiredCoerced,
    /// The fragment could not be parsed.
    Invalid(FragmentError),
}

impl MergeIssue {
    /// Whether the contribution was dropped rather than corrected.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, Self::RequiredCoerced)
    }
}

#[derive(Debug)]
pub struct MergeDiagnostic {
    pub property: String,
    pub issue: MergeIssue,
}

impl fmt::Display for MergeDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let property = &self.property;
        match &self.issue {
            MergeIssue::Conflict => write!(
                f,
                "disallowing attempt to override existing schema property `{property}`"
            ),
            MergeIssue::MissingType => write!(
                f,
                "disallowing schema property `{property}` because it lacks a type (string or array of strings)"
            ),
            MergeIssue::RequiredCoerced => write!(
                f,
                "schema property `{property}` was marked required; extension properties must be optional, \
                 so it was made optional"
            ),
            MergeIssue::Invalid(err) => write!(f, "disallowing schema property `{property}`: {err}"),
        }
    }
}

#[derive(Debug)]
pub struct MergeOutcome {
    pub properties: BTreeMap<String, SchemaNode>,
    pub diagnostics: Vec<MergeDiagnostic>,
}

/// Merge `additions` into `base`.
///
/// Never fails: each problematic contribution is dropped or corrected and
/// recorded in the returned diagnostics. Non-object fragments are skipped
/// without a diagnostic.
pub fn merge_properties(
    mut base: BTreeMap<String, SchemaNode>,
    additions: &Map<String, Value>,
) -> MergeOutcome {
    let mut diagnostics = Vec::new();
    for (name, fragment) in additions {
        let Value::Object(fragment_map) = fragment else {
            continue;
        };
        if base.contains_key(name) {
            diagnostics.push(MergeDiagnostic {
                property: name.clone(),
                issue: MergeIssue::Conflict,
            });
            continue;
        }
        if !has_type_declaration(fragment_map) {
            diagnostics.push(MergeDiagnostic {
                property: name.clone(),
                issue: MergeIssue::MissingType,
            });
            continue;
        }
        let mut node = match SchemaNode::from_fragment(fragment) {
            Ok(node) => node,
            Err(err) => {
                diagnostics.push(MergeDiagnostic {
                    property: name.clone(),
                    issue: MergeIssue::Invalid(err),
                });
                continue;
            }
        };
        if node.required {
            diagnostics.push(MergeDiagnostic {
                property: name.clone(),
                issue: MergeIssue::RequiredCoerced,
            });
            node.required = false;
        }
        base.insert(name.clone(), node);
    }
    MergeOutcome {
        properties: base,
        diagnostics,
    }
}
