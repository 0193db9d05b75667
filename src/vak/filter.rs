//! Specialty filter and CSV export.
//!
//! A record passes when at least one of its specialty codes is requested
//! AND (unless the whitelist is ignored) its ISSN or name is whitelisted.
//! The specialty check runs first, so a record failing both is counted
//! once, as a specialty mismatch.
//!
//! The keyword [`ALL_CODES`] among the requested codes selects every
//! specialty; the whitelist rule still applies.

use crate::error::ScienceHelperError;
use crate::vak::parser::JournalRecord;
use crate::vak::whitelist::Whitelist;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// Requested-code keyword matching every specialty (case-insensitive).
pub const ALL_CODES: &str = "all";

/// Column headers of the exported table.
pub const CSV_HEADERS: [&str; 8] = ["N", "Name", "ISSN", "Specialties", "Level", "WoS", "Scopus", "RSCI"];

/// Whether whitelist membership is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WhitelistMode {
    #[default]
    Require,
    /// Specialty filter only.
    Ignore,
}

/// How requested codes are compared with record codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeMatch {
    /// `2.3.1` matches only `2.3.1`.
    #[default]
    Exact,
    /// `2.3` matches `2.3` and every code below it (`2.3.1`, `2.3.5`), but not `2.34`.
    Prefix,
}

impl FromStr for CodeMatch {
    type Err = ScienceHelperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(CodeMatch::Exact),
            "prefix" | "group" => Ok(CodeMatch::Prefix),
            other => Err(ScienceHelperError::InvalidConfig(format!(
                "unknown code match '{other}' (expected exact or prefix)"
            ))),
        }
    }
}

impl fmt::Display for CodeMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CodeMatch::Exact => "exact",
            CodeMatch::Prefix => "prefix",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOptions {
    pub whitelist_mode: WhitelistMode,
    pub code_match: CodeMatch,
}

/// Records that passed, in catalog order, and why the others did not.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterResult {
    pub records: Vec<JournalRecord>,
    pub specialty_mismatch: usize,
    pub not_in_whitelist: usize,
    /// Catalog blocks the parser could not read.
    pub skipped_blocks: usize,
}

impl FilterResult {
    pub fn excluded(&self) -> usize {
        self.specialty_mismatch + self.not_in_whitelist
    }
}

/// Trim whitespace and one trailing dot: `" 2.3.1. "` → `"2.3.1"`.
pub fn normalize_code(code: &str) -> String {
    let code = code.trim();
    code.strip_suffix('.').unwrap_or(code).trim().to_string()
}

/// Requested codes, normalised.
#[derive(Debug, Clone)]
struct CodeSet {
    codes: BTreeSet<String>,
    mode: CodeMatch,
    all: bool,
}

impl CodeSet {
    fn new<S: AsRef<str>>(requested: &[S], mode: CodeMatch) -> Self {
        let codes: BTreeSet<String> = requested
            .iter()
            .map(|c| normalize_code(c.as_ref()))
            .filter(|c| !c.is_empty())
            .collect();
        let all = codes.iter().any(|c| c.eq_ignore_ascii_case(ALL_CODES));
        Self { codes, mode, all }
    }

    fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    fn matches(&self, code: &str) -> bool {
        if self.all {
            return true;
        }
        let code = normalize_code(code);
        match self.mode {
            CodeMatch::Exact => self.codes.contains(&code),
            CodeMatch::Prefix => self.codes.iter().any(|want| {
                code == *want
                    || code
                        .strip_prefix(want.as_str())
                        .is_some_and(|rest| rest.starts_with('.'))
            }),
        }
    }
}

/// Filter `records` by requested specialty codes and whitelist membership.
///
/// `skipped_blocks` is left at zero; [`crate::catalog::filter`] fills it from
/// the parse report.
pub fn filter_records<S: AsRef<str>>(
    records: &[JournalRecord],
    requested: &[S],
    whitelist: &Whitelist,
    options: &FilterOptions,
) -> FilterResult {
    let codes = CodeSet::new(requested, options.code_match);
    let mut result = FilterResult::default();

    if codes.is_empty() {
        info!("No specialty codes requested; result is empty");
        result.specialty_mismatch = records.len();
        return result;
    }
    let require_whitelist = options.whitelist_mode == WhitelistMode::Require;
    if require_whitelist && whitelist.is_empty() {
        info!("Whitelist is empty; result is empty");
    }

    for record in records {
        if !record.codes().any(|c| codes.matches(c)) {
            result.specialty_mismatch += 1;
            continue;
        }
        if require_whitelist && whitelist.lookup(record).is_none() {
            debug!("#{} '{}' not in whitelist", record.number, record.name);
            result.not_in_whitelist += 1;
            continue;
        }
        result.records.push(record.clone());
    }

    info!(
        "Filter kept {} of {} records ({} specialty mismatch, {} not in whitelist)",
        result.records.len(),
        records.len(),
        result.specialty_mismatch,
        result.not_in_whitelist
    );
    result
}

// ── Export ───────────────────────────────────────────────────────────────

/// One row of the exported table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRow {
    #[serde(rename = "N")]
    pub number: u32,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "ISSN")]
    pub issn: String,
    #[serde(rename = "Specialties")]
    pub specialties: String,
    #[serde(rename = "Level")]
    pub level: String,
    #[serde(rename = "WoS")]
    pub wos: String,
    #[serde(rename = "Scopus")]
    pub scopus: String,
    #[serde(rename = "RSCI")]
    pub rsci: String,
}

/// Table rows for `result`, enriched with whitelist metadata.
pub fn export_rows(result: &FilterResult, whitelist: &Whitelist) -> Vec<ExportRow> {
    result
        .records
        .iter()
        .map(|r| {
            let meta = whitelist.lookup(r);
            ExportRow {
                number: r.number,
                name: r.name.clone(),
                issn: r.all_issns().collect::<Vec<_>>().join(", "),
                specialties: r
                    .specialties
                    .iter()
                    .map(|s| format!("{} {}", s.code, s.description).trim().to_string())
                    .collect::<Vec<_>>()
                    .join("; "),
                level: meta.and_then(|m| m.level.clone()).unwrap_or_default(),
                wos: meta.and_then(|m| m.wos.clone()).unwrap_or_default(),
                scopus: meta.and_then(|m| m.scopus.clone()).unwrap_or_default(),
                rsci: meta.and_then(|m| m.rsci.clone()).unwrap_or_default(),
            }
        })
        .collect()
}

/// Serialise rows as CSV, header included even when there are no rows.
pub fn csv_bytes(rows: &[ExportRow]) -> Result<Vec<u8>, ScienceHelperError> {
    let csv_err = |e: csv::Error| ScienceHelperError::Internal(format!("CSV encoding failed: {e}"));
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(CSV_HEADERS).map_err(csv_err)?;
    for row in rows {
        writer.serialize(row).map_err(csv_err)?;
    }
    writer
        .into_inner()
        .map_err(|e| ScienceHelperError::Internal(format!("CSV flush failed: {e}")))
}
