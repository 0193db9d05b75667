//! Catalog pipeline entry points.
//!
//! ```text
//! refresh_all ──► cache/{catalog.pdf, whitelist.json, specialties.html}
//! load_catalog ──► ParseReport ──► save_records / load_records
//! run_filter ──► FilterResult ──► write_csv
//! ```
//!
//! Retrieval is async (network, `spawn_blocking` for pdfium); whitelist,
//! nomenclature and filtering are plain synchronous calls.

use crate::config::{CatalogConfig, Resource};
use crate::error::ScienceHelperError;
use crate::output::write_atomic;
use crate::vak::filter::{csv_bytes, export_rows, filter_records, FilterOptions, FilterResult, WhitelistMode};
use crate::vak::nomenclature::Nomenclature;
use crate::vak::parser::{self, CompiledPatterns, ParseReport};
use crate::vak::pdf;
use crate::vak::retrieve::{CatalogRetriever, FetchedResource, RefreshReport};
use crate::vak::whitelist::Whitelist;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Download every configured resource into the cache, concurrently.
pub async fn refresh_all(config: &CatalogConfig) -> Result<RefreshReport, ScienceHelperError> {
    CatalogRetriever::new(config)?.refresh_all().await
}

/// Download one resource into the cache.
pub async fn fetch(
    config: &CatalogConfig,
    resource: Resource,
) -> Result<FetchedResource, ScienceHelperError> {
    CatalogRetriever::new(config)?.fetch(resource).await
}

/// Parse the cached catalog PDF.
///
/// # Errors
/// [`ScienceHelperError::MissingResource`] when the catalog has not been
/// fetched yet, plus everything [`parse_catalog_file`] returns.
pub async fn load_catalog(config: &CatalogConfig) -> Result<ParseReport, ScienceHelperError> {
    let path = config
        .cache
        .path_for(Resource::Catalog, config.endpoints.url(Resource::Catalog));
    if !path.is_file() {
        return Err(ScienceHelperError::missing(
            &path,
            "catalog not cached; run `fetch` first",
        ));
    }
    parse_catalog_file(&path, config).await
}

/// Extract and parse a catalog PDF at `path`.
pub async fn parse_catalog_file(
    path: &Path,
    config: &CatalogConfig,
) -> Result<ParseReport, ScienceHelperError> {
    let start = Instant::now();
    info!("Parsing catalog {}", path.display());

    // ── Step 1: Compile patterns ─────────────────────────────────────────
    let patterns = CompiledPatterns::compile(&config.patterns)?;

    // ── Step 2: Extract text ─────────────────────────────────────────────
    let pages = pdf::extract_pages(path, config.pdfium_lib_path.as_deref()).await?;
    debug!("Extracted text of {} pages", pages.len());

    // ── Step 3: Segment blocks ───────────────────────────────────────────
    let report = parser::parse_pages(&pages, &patterns)?;
    info!(
        "Catalog parsed in {}ms: {} records, {} skipped",
        start.elapsed().as_millis(),
        report.records.len(),
        report.skipped_count()
    );
    Ok(report)
}

/// Write a parse report as pretty JSON (atomically).
pub fn save_records(report: &ParseReport, path: &Path) -> Result<(), ScienceHelperError> {
    let json = serde_json::to_vec_pretty(report)
        .map_err(|e| ScienceHelperError::Internal(format!("records serialisation: {e}")))?;
    write_atomic(path, &json)?;
    info!("Saved {} records to {}", report.records.len(), path.display());
    Ok(())
}

/// Read a parse report written by [`save_records`].
pub fn load_records(path: &Path) -> Result<ParseReport, ScienceHelperError> {
    let raw = std::fs::read(path).map_err(|e| ScienceHelperError::missing(path, e.to_string()))?;
    serde_json::from_slice(&raw)
        .map_err(|e| ScienceHelperError::ParseError(format!("{}: {e}", path.display())))
}

/// Saved records when they are at least as new as the cached catalog,
/// otherwise a fresh parse (which is then saved).
pub async fn load_or_parse_records(
    config: &CatalogConfig,
) -> Result<ParseReport, ScienceHelperError> {
    let records_path = config.cache.records_path();
    let catalog_path = config
        .cache
        .path_for(Resource::Catalog, config.endpoints.url(Resource::Catalog));

    let modified = |p: &Path| std::fs::metadata(p).and_then(|m| m.modified()).ok();
    let fresh = match (modified(&records_path), modified(&catalog_path)) {
        (Some(records), Some(catalog)) => records >= catalog,
        (Some(_), None) => true,
        _ => false,
    };
    if fresh {
        match load_records(&records_path) {
            Ok(report) => {
                debug!("Using saved records {}", records_path.display());
                return Ok(report);
            }
            Err(e) => warn!("Ignoring unreadable records file: {}", e),
        }
    }

    let report = load_catalog(config).await?;
    save_records(&report, &records_path)?;
    Ok(report)
}

/// Load the cached whitelist.
pub fn load_whitelist(config: &CatalogConfig) -> Result<Whitelist, ScienceHelperError> {
    Whitelist::load(&config.cache.path_for(Resource::Whitelist, None))
}

/// Load the cached nomenclature page.
pub fn load_nomenclature(config: &CatalogConfig) -> Result<Nomenclature, ScienceHelperError> {
    Nomenclature::load(&config.cache.path_for(Resource::Nomenclature, None))
}

/// Filter parsed records; the result carries the report's skipped-block count.
pub fn filter<S: AsRef<str>>(
    report: &ParseReport,
    codes: &[S],
    whitelist: &Whitelist,
    options: &FilterOptions,
) -> FilterResult {
    let mut result = filter_records(&report.records, codes, whitelist, options);
    result.skipped_blocks = report.skipped_count();
    result
}

/// Load records and whitelist from the cache and filter.
pub async fn run_filter<S: AsRef<str>>(
    config: &CatalogConfig,
    codes: &[S],
    options: &FilterOptions,
) -> Result<FilterResult, ScienceHelperError> {
    let (result, _) = filter_with_whitelist(config, codes, options).await?;
    Ok(result)
}

/// [`run_filter`], then export the table to `output` as CSV.
pub async fn run_filter_to_csv<S: AsRef<str>>(
    config: &CatalogConfig,
    codes: &[S],
    options: &FilterOptions,
    output: &Path,
) -> Result<FilterResult, ScienceHelperError> {
    let (result, whitelist) = filter_with_whitelist(config, codes, options).await?;
    write_csv(&result, &whitelist, output)?;
    Ok(result)
}

async fn filter_with_whitelist<S: AsRef<str>>(
    config: &CatalogConfig,
    codes: &[S],
    options: &FilterOptions,
) -> Result<(FilterResult, Whitelist), ScienceHelperError> {
    let report = load_or_parse_records(config).await?;
    let whitelist = match load_whitelist(config) {
        Ok(w) => w,
        // The whitelist only enriches the table when it is not required.
        Err(e) if options.whitelist_mode == WhitelistMode::Ignore => {
            warn!("Whitelist unavailable, export will lack metadata: {}", e);
            Whitelist::default()
        }
        Err(e) => return Err(e),
    };
    let result = filter(&report, codes, &whitelist, options);
    Ok((result, whitelist))
}

/// Write the filtered table as CSV (atomically). Returns the row count.
pub fn write_csv(
    result: &FilterResult,
    whitelist: &Whitelist,
    path: &Path,
) -> Result<usize, ScienceHelperError> {
    let rows = export_rows(result, whitelist);
    write_atomic(path, &csv_bytes(&rows)?)?;
    info!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(rows.len())
}
