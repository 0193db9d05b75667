//! Specialty nomenclature page.
//!
//! The nomenclature is an HTML table. Group rows carry a science category
//! and a subcategory; a data row holds a cell that starts with a specialty
//! code (`2.3.1. Системный анализ ...`). Category cells span several rows,
//! so the last seen category and subcategory carry forward to later rows.

use crate::error::ScienceHelperError;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

static RE_CODE_CELL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2}(?:\.\d{1,2}){2,3})\.?(?:\s+(.*))?$").unwrap());
static RE_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// One specialty of the nomenclature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NomenclatureEntry {
    pub code: String,
    pub title: String,
    pub category: Option<String>,
    pub subcategory: Option<String>,
}

/// Parsed nomenclature with code lookup.
#[derive(Debug, Clone, Default)]
pub struct Nomenclature {
    entries: Vec<NomenclatureEntry>,
    index: HashMap<String, usize>,
}

impl Nomenclature {
    pub fn entries(&self) -> &[NomenclatureEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry for `code`; a trailing dot is ignored.
    pub fn lookup(&self, code: &str) -> Option<&NomenclatureEntry> {
        self.index
            .get(code.trim().trim_end_matches('.'))
            .map(|&i| &self.entries[i])
    }

    /// Entries equal to `prefix` or nested under it (`2.3` → `2.3.1`, `2.3.5`).
    pub fn codes_for_group(&self, prefix: &str) -> Vec<&NomenclatureEntry> {
        let prefix = prefix.trim().trim_end_matches('.');
        self.entries
            .iter()
            .filter(|e| {
                e.code == prefix
                    || e.code
                        .strip_prefix(prefix)
                        .is_some_and(|rest| rest.starts_with('.'))
            })
            .collect()
    }

    /// Read and parse a cached nomenclature page.
    pub fn load(path: &Path) -> Result<Self, ScienceHelperError> {
        let html = std::fs::read_to_string(path)
            .map_err(|e| ScienceHelperError::missing(path, e.to_string()))?;
        let nomenclature = parse_nomenclature(&html)?;
        info!(
            "Loaded nomenclature from {} ({} specialties)",
            path.display(),
            nomenclature.len()
        );
        Ok(nomenclature)
    }
}

fn selector(css: &str) -> Result<Selector, ScienceHelperError> {
    Selector::parse(css)
        .map_err(|e| ScienceHelperError::Internal(format!("selector '{css}': {e:?}")))
}

fn cell_text(cell: ElementRef<'_>) -> String {
    let raw: String = cell.text().collect();
    RE_SPACES.replace_all(raw.trim(), " ").into_owned()
}

/// Parse the nomenclature page from the first `<table>` of the document.
///
/// # Errors
/// [`ScienceHelperError::ParseError`] when there is no table or the table
/// has no data rows.
pub fn parse_nomenclature(html: &str) -> Result<Nomenclature, ScienceHelperError> {
    let document = Html::parse_document(html);
    let table_sel = selector("table")?;
    let row_sel = selector("tr")?;
    let cell_sel = selector("td")?;

    let table = document
        .select(&table_sel)
        .next()
        .ok_or_else(|| ScienceHelperError::ParseError("nomenclature page has no table".into()))?;

    let mut data_rows = 0usize;
    let mut category: Option<String> = None;
    let mut subcategory: Option<String> = None;
    let mut entries: Vec<NomenclatureEntry> = Vec::new();

    for row in table.select(&row_sel) {
        let cells: Vec<String> = row.select(&cell_sel).map(cell_text).collect();
        if cells.is_empty() {
            continue;
        }
        data_rows += 1;

        let Some(k) = cells.iter().position(|c| RE_CODE_CELL.is_match(c)) else {
            // Group row: update whatever it names.
            match cells.iter().filter(|c| !c.is_empty()).count() {
                0 => {}
                1 => {
                    let text = cells.iter().find(|c| !c.is_empty()).cloned();
                    if category.is_none() {
                        category = text;
                    } else {
                        subcategory = text;
                    }
                }
                _ => {
                    category = Some(cells[0].clone()).filter(|c| !c.is_empty()).or(category);
                    subcategory = Some(cells[1].clone()).filter(|c| !c.is_empty());
                }
            }
            continue;
        };

        if k >= 2 && !cells[k - 2].is_empty() {
            category = Some(cells[k - 2].clone());
        }
        if k >= 1 && !cells[k - 1].is_empty() {
            subcategory = Some(cells[k - 1].clone());
        }

        let Some(caps) = RE_CODE_CELL.captures(&cells[k]) else {
            continue;
        };
        let code = caps[1].to_string();
        let title = caps
            .get(2)
            .map(|m| m.as_str().trim().to_string())
            .filter(|t| !t.is_empty())
            .or_else(|| cells.get(k + 1).cloned())
            .unwrap_or_default();

        entries.push(NomenclatureEntry {
            code,
            title,
            category: category.clone(),
            subcategory: subcategory.clone(),
        });
    }

    if data_rows == 0 {
        return Err(ScienceHelperError::ParseError(
            "nomenclature table has no data rows".into(),
        ));
    }

    let mut index = HashMap::with_capacity(entries.len());
    for (i, e) in entries.iter().enumerate() {
        index.entry(e.code.clone()).or_insert(i);
    }
    debug!("Nomenclature: {} rows, {} specialties", data_rows, entries.len());
    Ok(Nomenclature { entries, index })
}
