//! Configuration types for figure composition and catalog processing.
//!
//! Composition is controlled through [`CompositionConfig`], catalog
//! retrieval and parsing through [`CatalogConfig`]. Both are plain values
//! built with a builder whose `build()` validates the result, and both are
//! passed explicitly to the entry points; the library keeps no global
//! settings.
//!
//! `CatalogConfig` can also be read from a JSON settings file
//! ([`CatalogConfig::from_settings_file`]); every field has a default so a
//! settings file only needs the keys it changes:
//!
//! ```json
//! {
//!   "web": { "vak_list_url": "https://vak.example/list?name=vak_2024" },
//!   "directories": { "data_dir": "data" },
//!   "retrieval": { "max_attempts": 5 }
//! }
//! ```

use crate::error::ScienceHelperError;
use crate::figure::decorate::{AxisSpec, LabelStyle};
use crate::figure::font::FontSpec;
use crate::figure::layout::{LayoutMode, LayoutPolicy};
use crate::progress::RetrievalProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// ── Composition ──────────────────────────────────────────────────────────

/// Configuration for one figure composition.
///
/// # Example
/// ```rust
/// use science_helper::{CompositionConfig, LayoutMode, LabelStyle};
///
/// let config = CompositionConfig::builder()
///     .mode(LayoutMode::Grid)
///     .padding(8)
///     .labels(LabelStyle::default())
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositionConfig {
    /// Placement policy. Default: single row, 10 px padding, white canvas.
    pub layout: LayoutPolicy,

    /// Per-image label box. `None` disables numbering. Default: `None`.
    pub labels: Option<LabelStyle>,

    /// Axis decoration applied to every image. Default: `None`.
    pub axes: Option<AxisSpec>,

    /// Font used for labels and axis text.
    pub font: FontSpec,
}

impl CompositionConfig {
    pub fn builder() -> CompositionConfigBuilder {
        CompositionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`CompositionConfig`].
#[derive(Debug)]
pub struct CompositionConfigBuilder {
    config: CompositionConfig,
}

impl CompositionConfigBuilder {
    pub fn layout(mut self, layout: LayoutPolicy) -> Self {
        self.config.layout = layout;
        self
    }

    pub fn mode(mut self, mode: LayoutMode) -> Self {
        self.config.layout.mode = mode;
        self
    }

    pub fn rows(mut self, rows: usize) -> Self {
        self.config.layout.rows = Some(rows);
        self
    }

    pub fn columns(mut self, columns: usize) -> Self {
        self.config.layout.columns = Some(columns);
        self
    }

    pub fn padding(mut self, px: u32) -> Self {
        self.config.layout.padding = px;
        self
    }

    pub fn border(mut self, px: u32) -> Self {
        self.config.layout.border = px;
        self
    }

    pub fn labels(mut self, style: LabelStyle) -> Self {
        self.config.labels = Some(style);
        self
    }

    pub fn axes(mut self, spec: AxisSpec) -> Self {
        self.config.axes = Some(spec);
        self
    }

    pub fn font(mut self, font: FontSpec) -> Self {
        self.config.font = font;
        self
    }

    /// Validate and return the config.
    pub fn build(self) -> Result<CompositionConfig, ScienceHelperError> {
        let c = &self.config;
        if c.layout.mode == LayoutMode::Grid
            && (c.layout.rows == Some(0) || c.layout.columns == Some(0))
        {
            return Err(ScienceHelperError::InvalidConfig(
                "grid rows and columns must be at least 1".into(),
            ));
        }
        if let Some(labels) = &c.labels {
            if labels.box_width == 0 || labels.box_height == 0 {
                return Err(ScienceHelperError::InvalidConfig(
                    "label box must be at least 1x1".into(),
                ));
            }
            if labels.font_px.is_nan() || labels.font_px <= 0.0 {
                return Err(ScienceHelperError::InvalidConfig(
                    "label font size must be positive".into(),
                ));
            }
        }
        if let Some(axes) = &c.axes {
            if axes.font_px.is_nan() || axes.font_px <= 0.0 {
                return Err(ScienceHelperError::InvalidConfig(
                    "axis font size must be positive".into(),
                ));
            }
        }
        Ok(self.config)
    }
}

// ── Catalog ──────────────────────────────────────────────────────────────

/// The three remote documents the catalog pipeline works with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    /// The VAK journal list (PDF).
    Catalog,
    /// The accredited-journal whitelist (JSON).
    Whitelist,
    /// The specialty nomenclature page (HTML).
    Nomenclature,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Resource::Catalog => "catalog",
            Resource::Whitelist => "whitelist",
            Resource::Nomenclature => "nomenclature",
        })
    }
}

/// Regular expressions driving catalog segmentation.
///
/// Stored as source strings so they can live in a settings file; compiled
/// once per parse by [`crate::vak::parser::CompiledPatterns`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogPatterns {
    /// Start of a catalog row; group 1 captures the row number.
    #[serde(rename = "re_row_start")]
    pub row_start: String,
    /// ISSN in any of the dash spellings found in the catalog.
    #[serde(rename = "re_issn_raw")]
    pub issn: String,
    /// Registration dates ("с 01.02.2022") stripped before code extraction.
    #[serde(rename = "re_date")]
    pub date: String,
    /// Specialty code, old ("05.13.01") or new ("2.3.1.") style.
    #[serde(rename = "re_spec_code")]
    pub spec_code: String,
    /// Runs of whitespace collapsed to a single space.
    #[serde(rename = "re_inner_space")]
    pub inner_space: String,
}

impl Default for CatalogPatterns {
    fn default() -> Self {
        Self {
            row_start: r"(?m)^\s*(\d{1,5})\.\s+".into(),
            issn: r"\d{4}\s*[-‐‑‒–—−]\s*\d{3}[\dXxХх]".into(),
            date: r"(?i)(?:\b[сc]\s+)?\d{2}\.\d{2}\.\d{4}".into(),
            spec_code: r"\b\d{1,2}\.\d{1,2}\.\d{1,2}\b\.?".into(),
            inner_space: r"\s{2,}".into(),
        }
    }
}

/// Remote locations of the catalog resources.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    #[serde(rename = "vak_list_url")]
    pub catalog_url: Option<String>,
    #[serde(rename = "white_list_url")]
    pub whitelist_url: Option<String>,
    #[serde(rename = "spec_url")]
    pub nomenclature_url: Option<String>,
}

impl Endpoints {
    pub fn url(&self, resource: Resource) -> Option<&str> {
        match resource {
            Resource::Catalog => self.catalog_url.as_deref(),
            Resource::Whitelist => self.whitelist_url.as_deref(),
            Resource::Nomenclature => self.nomenclature_url.as_deref(),
        }
    }
}

/// On-disk cache locations. Each resource keeps exactly one cached copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheLayout {
    /// Base directory. Default: current directory.
    #[serde(rename = "main_dir")]
    pub main_dir: PathBuf,
    /// Data directory, relative to `main_dir`. Default: `data`.
    pub data_dir: PathBuf,
    /// Catalog file name. Default: `vak_list.pdf`.
    ///
    /// When the catalog URL carries a `name` query parameter, the file is
    /// stored as `{name}.pdf` instead.
    #[serde(rename = "file_name")]
    pub catalog_file: String,
    pub whitelist_file: String,
    #[serde(rename = "spec_file")]
    pub nomenclature_file: String,
    /// Parsed records written by `parse`. Default: `vak_records.json`.
    pub records_file: String,
}

impl Default for CacheLayout {
    fn default() -> Self {
        Self {
            main_dir: PathBuf::from("."),
            data_dir: PathBuf::from("data"),
            catalog_file: "vak_list.pdf".into(),
            whitelist_file: "whitelist_articles.json".into(),
            nomenclature_file: "specialties.html".into(),
            records_file: "vak_records.json".into(),
        }
    }
}

impl CacheLayout {
    pub fn data_path(&self) -> PathBuf {
        self.main_dir.join(&self.data_dir)
    }

    /// Cache path of `resource`, given the URL it is fetched from (if any).
    pub fn path_for(&self, resource: Resource, url: Option<&str>) -> PathBuf {
        let file = match resource {
            Resource::Catalog => url
                .and_then(name_query_param)
                .map(|name| format!("{name}.pdf"))
                .unwrap_or_else(|| self.catalog_file.clone()),
            Resource::Whitelist => self.whitelist_file.clone(),
            Resource::Nomenclature => self.nomenclature_file.clone(),
        };
        self.data_path().join(file)
    }

    pub fn records_path(&self) -> PathBuf {
        self.data_path().join(&self.records_file)
    }
}

/// The `name` query parameter of `url`, if present and non-empty.
fn name_query_param(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let name = parsed
        .query_pairs()
        .find(|(k, _)| k == "name")
        .map(|(_, v)| v.into_owned())?;
    let name = name.trim();
    (!name.is_empty() && !name.contains(['/', '\\'])).then(|| name.to_string())
}

/// Retry and timeout policy for catalog downloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalPolicy {
    /// Attempts per resource, including the first. Default: 3.
    pub max_attempts: u32,

    /// Initial retry delay in milliseconds. Default: 500.
    ///
    /// Doubles after each attempt: 500 ms → 1 s → 2 s.
    pub retry_backoff_ms: u64,

    /// Per-request timeout in seconds. Default: 60.
    pub download_timeout_secs: u64,
}

impl Default for RetrievalPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_backoff_ms: 500,
            download_timeout_secs: 60,
        }
    }
}

/// Configuration for catalog retrieval, parsing and filtering.
///
/// Built via [`CatalogConfig::builder()`], loaded with
/// [`CatalogConfig::from_settings_file`], or [`CatalogConfig::default()`].
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    #[serde(rename = "regex")]
    pub patterns: CatalogPatterns,

    #[serde(rename = "web")]
    pub endpoints: Endpoints,

    #[serde(rename = "directories")]
    pub cache: CacheLayout,

    pub retrieval: RetrievalPolicy,

    /// Explicit pdfium shared library. `None` binds the system library.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Optional download progress events.
    #[serde(skip)]
    pub progress_callback: Option<Arc<dyn RetrievalProgressCallback>>,
}

impl fmt::Debug for CatalogConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogConfig")
            .field("patterns", &self.patterns)
            .field("endpoints", &self.endpoints)
            .field("cache", &self.cache)
            .field("retrieval", &self.retrieval)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn RetrievalProgressCallback>"),
            )
            .finish()
    }
}

impl CatalogConfig {
    pub fn builder() -> CatalogConfigBuilder {
        CatalogConfigBuilder {
            config: Self::default(),
        }
    }

    /// Read a JSON settings file. Missing keys keep their defaults.
    pub fn from_settings_file(path: impl AsRef<Path>) -> Result<Self, ScienceHelperError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ScienceHelperError::missing(path, e.to_string()))?;
        let config: CatalogConfig = serde_json::from_str(&raw).map_err(|e| {
            ScienceHelperError::InvalidConfig(format!("{}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the settings (without the callback) as pretty JSON.
    pub fn to_settings_json(&self) -> Result<String, ScienceHelperError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ScienceHelperError::Internal(format!("settings serialisation: {e}")))
    }

    /// Check attempt budget, timeout, URLs and patterns.
    pub fn validate(&self) -> Result<(), ScienceHelperError> {
        if self.retrieval.max_attempts == 0 {
            return Err(ScienceHelperError::InvalidConfig(
                "retrieval.max_attempts must be at least 1".into(),
            ));
        }
        if self.retrieval.download_timeout_secs == 0 {
            return Err(ScienceHelperError::InvalidConfig(
                "retrieval.download_timeout_secs must be at least 1".into(),
            ));
        }
        for (name, url) in [
            ("vak_list_url", &self.endpoints.catalog_url),
            ("white_list_url", &self.endpoints.whitelist_url),
            ("spec_url", &self.endpoints.nomenclature_url),
        ] {
            if let Some(url) = url {
                if reqwest::Url::parse(url).is_err() {
                    return Err(ScienceHelperError::InvalidConfig(format!(
                        "{name} is not a valid URL: '{url}'"
                    )));
                }
            }
        }
        crate::vak::parser::CompiledPatterns::compile(&self.patterns).map(|_| ())
    }
}

/// Builder for [`CatalogConfig`].
#[derive(Debug)]
pub struct CatalogConfigBuilder {
    config: CatalogConfig,
}

impl CatalogConfigBuilder {
    pub fn catalog_url(mut self, url: impl Into<String>) -> Self {
        self.config.endpoints.catalog_url = Some(url.into());
        self
    }

    pub fn whitelist_url(mut self, url: impl Into<String>) -> Self {
        self.config.endpoints.whitelist_url = Some(url.into());
        self
    }

    pub fn nomenclature_url(mut self, url: impl Into<String>) -> Self {
        self.config.endpoints.nomenclature_url = Some(url.into());
        self
    }

    pub fn patterns(mut self, patterns: CatalogPatterns) -> Self {
        self.config.patterns = patterns;
        self
    }

    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        self.config.cache.main_dir = PathBuf::from(".");
        self.config.cache.data_dir = dir;
        self
    }

    pub fn cache(mut self, cache: CacheLayout) -> Self {
        self.config.cache = cache;
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.retrieval.max_attempts = n.max(1);
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retrieval.retry_backoff_ms = ms;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.retrieval.download_timeout_secs = secs.max(1);
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn RetrievalProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Validate and return the config.
    pub fn build(self) -> Result<CatalogConfig, ScienceHelperError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
