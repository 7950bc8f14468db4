//! Runtime configuration for URL metric construction: aspect-ratio bounds from
//! the environment and schema extensions declared in YAML files.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use od_core::{
    ExtensionRegistry, MetricContext, StaticSchemaExtension, ViewportAspectRatioBounds,
    DEFAULT_MAX_VIEWPORT_ASPECT_RATIO, DEFAULT_MIN_VIEWPORT_ASPECT_RATIO,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

pub const CRATE_NAME: &str = "od-extensions";

#[derive(Debug, Clone)]
pub struct MetricConfig {
    pub min_viewport_aspect_ratio: f64,
    pub max_viewport_aspect_ratio: f64,
    pub extensions_dir: PathBuf,
    pub web_port: u16,
}

impl MetricConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`] with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            min_viewport_aspect_ratio: lookup("OD_MIN_VIEWPORT_ASPECT_RATIO")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(DEFAULT_MIN_VIEWPORT_ASPECT_RATIO),
            max_viewport_aspect_ratio: lookup("OD_MAX_VIEWPORT_ASPECT_RATIO")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(DEFAULT_MAX_VIEWPORT_ASPECT_RATIO),
            extensions_dir: lookup("OD_EXTENSIONS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./extensions")),
            web_port: lookup("OD_WEB_PORT")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(8000),
        }
    }

    /// Configured bounds, or the defaults when the pair is unusable.
    pub fn bounds(&self) -> ViewportAspectRatioBounds {
        ViewportAspectRatioBounds::new(self.min_viewport_aspect_ratio, self.max_viewport_aspect_ratio)
            .unwrap_or_else(|err| {
                warn!(error = %err, "ignoring configured viewport aspect ratio bounds");
                ViewportAspectRatioBounds::default()
            })
    }
}

impl Default for MetricConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

/// One extension declared on disk.
///
/// ```yaml
/// name: embed-optimizer
/// root_properties: {}
/// element_properties:
///   resizedBoundingClientRect:
///     type: object
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtensionFile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub root_properties: Map<String, Value>,
    #[serde(default)]
    pub element_properties: Map<String, Value>,
}

impl ExtensionFile {
    fn into_extension(self, fallback_name: &str) -> StaticSchemaExtension {
        let name = self.name.unwrap_or_else(|| fallback_name.to_string());
        StaticSchemaExtension::new(name)
            .with_root_properties(self.root_properties)
            .with_element_properties(self.element_properties)
    }
}

pub fn load_extension_file(path: &Path) -> Result<StaticSchemaExtension> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let file: ExtensionFile =
        serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("extension");
    Ok(file.into_extension(stem))
}

/// Registry of every `*.yaml` / `*.yml` file in `dir`, in file-name order.
/// A missing directory yields an empty registry.
pub fn load_extension_registry(dir: &Path) -> Result<ExtensionRegistry> {
    let mut registry = ExtensionRegistry::new();
    if !dir.exists() {
        debug!(dir = %dir.display(), "extensions directory not found");
        return Ok(registry);
    }

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let path = entry
            .with_context(|| format!("listing {}", dir.display()))?
            .path();
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml" | "yml")
        );
        if path.is_file() && is_yaml {
            paths.push(path);
        }
    }
    paths.sort();

    for path in paths {
        let extension = load_extension_file(&path)?;
        debug!(path = %path.display(), "loaded schema extension");
        registry.register(extension);
    }
    info!(dir = %dir.display(), extensions = registry.len(), "loaded schema extensions");
    Ok(registry)
}

/// Context with the configured bounds and the extensions found on disk.
pub fn metric_context_from_config(config: &MetricConfig) -> Result<MetricContext> {
    let registry = load_extension_registry(&config.extensions_dir)?;
    Ok(MetricContext::new()
        .with_bounds(config.bounds())
        .with_extensions(registry))
}
