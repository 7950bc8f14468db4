//! Typed views of the parts of a URL metric.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u64,
    pub height: u64,
}

impl Viewport {
    /// `width / height`, or `None` for a zero-height viewport.
    pub fn aspect_ratio(&self) -> Option<f64> {
        (self.height > 0).then(|| self.width as f64 / self.height as f64)
    }
}

/// Geometry as reported by `Element.getBoundingClientRect()` and
/// `IntersectionObserverEntry.intersectionRect`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DomRect {
    pub width: f64,
    pub height: f64,
    pub x: f64,
    pub y: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

/// One observed element, in DOM encounter order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementData {
    #[serde(rename = "isLCP")]
    is_lcp: bool,
    #[serde(rename = "isLCPCandidate")]
    is_lcp_candidate: bool,
    xpath: String,
    #[serde(rename = "intersectionRatio")]
    intersection_ratio: f64,
    #[serde(rename = "intersectionRect")]
    intersection_rect: DomRect,
    #[serde(rename = "boundingClientRect")]
    bounding_client_rect: DomRect,
    #[serde(flatten)]
    extensions: Map<String, Value>,
}

impl ElementData {
    pub fn is_lcp(&self) -> bool {
        self.is_lcp
    }

    pub fn is_lcp_candidate(&self) -> bool {
        self.is_lcp_candidate
    }

    pub fn xpath(&self) -> &str {
        &self.xpath
    }

    pub fn intersection_ratio(&self) -> f64 {
        self.intersection_ratio
    }

    pub fn intersection_rect(&self) -> &DomRect {
        &self.intersection_rect
    }

    pub fn bounding_client_rect(&self) -> &DomRect {
        &self.bounding_client_rect
    }

    /// An extension-contributed field of this element.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extensions.get(key)
    }

    pub fn extension_fields(&self) -> &Map<String, Value> {
        &self.extensions
    }
}
