//! # science-helper
//!
//! Two small research-support pipelines in one crate:
//!
//! * **Figure composition**: arrange images in a row, column or grid, number
//!   them (Latin, Cyrillic, Arabic, Roman or custom labels), optionally draw
//!   coordinate axes on each one, and export the result as a PNG or as an
//!   editable draw.io diagram.
//! * **VAK journal catalog**: download the official list of peer-reviewed
//!   journals (PDF), the accredited-journal whitelist (JSON) and the
//!   specialty nomenclature (HTML); turn the PDF into structured journal
//!   records; filter them by specialty codes and whitelist membership; and
//!   export the result as CSV.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Figures
//!  ├─ 1. Layout    padding/border aware placement (row, column, grid)
//!  ├─ 2. Labels    one label per image in input order
//!  ├─ 3. Decorate  label boxes and axes, clamped to each image
//!  └─ 4. Export    PNG (deterministic) or draw.io XML (one node per image)
//!
//! Catalog
//!  ├─ 1. Fetch     catalog + whitelist concurrently, retry with backoff
//!  ├─ 2. Extract   page text via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 3. Parse     numbered blocks → JournalRecord, bad blocks skipped
//!  ├─ 4. Filter    specialty codes AND whitelist membership
//!  └─ 5. Export    CSV with whitelist metadata
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use science_helper::{compose, export_to_file, CompositionConfig, ImageElement, LabelStyle, LayoutMode};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let images = ImageElement::load_dir("panels")?;
//!     let config = CompositionConfig::builder()
//!         .mode(LayoutMode::Grid)
//!         .labels(LabelStyle::default())
//!         .build()?;
//!     let doc = compose(images, &config)?;
//!     export_to_file(&doc, "figure.png", None)?;
//!     Ok(())
//! }
//! ```
//!
//! ```rust,no_run
//! use science_helper::{catalog, CatalogConfig, FilterOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CatalogConfig::from_settings_file("settings.json")?;
//!     catalog::refresh_all(&config).await?;
//!     let result = catalog::run_filter(&config, &["2.3.1", "2.3.5"], &FilterOptions::default()).await?;
//!     eprintln!("{} journals, {} blocks skipped", result.records.len(), result.skipped_blocks);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `science-helper` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! science-helper = { version = "0.1", default-features = false }
//! ```
//!
//! Catalog text extraction needs a pdfium shared library at runtime (system
//! install, `PDFIUM_LIB_PATH`, or `pdfium_lib_path` in the settings).

// ── Modules ──────────────────────────────────────────────────────────────

pub mod catalog;
pub mod color;
pub mod compose;
pub mod config;
pub mod error;
pub mod figure;
pub mod output;
pub mod progress;
pub mod vak;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use color::Color;
pub use compose::{compose, compose_to_file, export, export_to_file, render};
pub use config::{
    CacheLayout, CatalogConfig, CatalogConfigBuilder, CatalogPatterns, CompositionConfig,
    CompositionConfigBuilder, Endpoints, Resource, RetrievalPolicy,
};
pub use error::{BlockError, FetchFailure, ScienceHelperError};
pub use figure::decorate::{AxisSpec, Corner, LabelStyle};
pub use figure::element::ImageElement;
pub use figure::font::FontSpec;
pub use figure::labels::LabelScheme;
pub use figure::layout::{LayoutMode, LayoutPolicy, Placement};
pub use figure::{CompositeDocument, ExportFormat, PlacedImage};
pub use progress::{NoopProgressCallback, RetrievalProgressCallback};
pub use vak::{
    CodeMatch, FilterOptions, FilterResult, JournalRecord, Nomenclature, NomenclatureEntry,
    ParseReport, Specialty, Whitelist, WhitelistMode,
};
