//! Segmentation of catalog text into journal records.
//!
//! The catalog's text layer is a sequence of numbered blocks:
//!
//! ```text
//! 12. Вестник компьютерных и информационных технологий 1810-7206
//!     2.3.1. Системный анализ, управление и обработка информации
//!     (технические науки), 2.3.5. Математическое и программное обеспечение
//!     вычислительных систем (технические науки) с 01.02.2022
//! ```
//!
//! Each block starts at a `row_start` match. Inside a block the journal
//! name runs up to the first ISSN (or the first specialty code when the
//! ISSN is missing); registration dates and further ISSNs are dropped; the
//! remainder is split at specialty codes, each code's description running
//! to the next code. A block that yields no name or no code is skipped and
//! reported as a [`BlockError`]; parsing carries on with the next block.

use crate::config::CatalogPatterns;
use crate::error::{BlockError, ScienceHelperError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

static RE_DASHES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*[-‐‑‒–—−]\s*").unwrap());

/// Separators trimmed from the end of a journal name.
const NAME_TRAILERS: &[char] = &['—', '–', '-', ':', ',', ';', ' '];
/// Separators trimmed from the start of a specialty description.
const DESC_LEADERS: &[char] = &[',', ';', ')', ' ', '.'];
/// Separators trimmed from the end of a specialty description.
const DESC_TRAILERS: &[char] = &[',', ';', ' '];

/// [`CatalogPatterns`] compiled into regular expressions.
#[derive(Debug, Clone)]
pub struct CompiledPatterns {
    pub row_start: Regex,
    pub issn: Regex,
    pub date: Regex,
    pub spec_code: Regex,
    pub inner_space: Regex,
}

impl CompiledPatterns {
    /// Compile every pattern, naming the offending one on failure.
    pub fn compile(patterns: &CatalogPatterns) -> Result<Self, ScienceHelperError> {
        let build = |name: &str, src: &str| {
            Regex::new(src).map_err(|e| {
                ScienceHelperError::InvalidConfig(format!("pattern {name} is invalid: {e}"))
            })
        };
        let row_start = build("re_row_start", &patterns.row_start)?;
        if row_start.captures_len() < 2 {
            return Err(ScienceHelperError::InvalidConfig(
                "pattern re_row_start must capture the row number in group 1".into(),
            ));
        }
        Ok(Self {
            row_start,
            issn: build("re_issn_raw", &patterns.issn)?,
            date: build("re_date", &patterns.date)?,
            spec_code: build("re_spec_code", &patterns.spec_code)?,
            inner_space: build("re_inner_space", &patterns.inner_space)?,
        })
    }
}

impl Default for CompiledPatterns {
    fn default() -> Self {
        // The built-in patterns are known to compile.
        Self::compile(&CatalogPatterns::default()).unwrap_or_else(|e| panic!("{e}"))
    }
}

/// Where a record starts in the source document (both 1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub page: usize,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Specialty {
    /// Code without a trailing dot, e.g. `2.3.1` or `05.13.01`.
    pub code: String,
    pub description: String,
}

/// One journal of the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalRecord {
    /// Row number printed in the catalog.
    pub number: u32,
    pub name: String,
    /// First ISSN of the block, normalised (`1234-567X`).
    pub issn: Option<String>,
    /// Every distinct ISSN of the block in order (print, then online).
    #[serde(default)]
    pub issns: Vec<String>,
    pub specialties: Vec<Specialty>,
    pub source: SourceRef,
}

impl JournalRecord {
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.specialties.iter().map(|s| s.code.as_str())
    }

    /// All ISSNs, falling back to `issn` for records saved without `issns`.
    pub fn all_issns(&self) -> impl Iterator<Item = &str> {
        let legacy = self.issn.as_deref().filter(|_| self.issns.is_empty());
        self.issns.iter().map(String::as_str).chain(legacy)
    }
}

/// Output of a catalog parse.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParseReport {
    /// Records in catalog order.
    pub records: Vec<JournalRecord>,
    /// Blocks that could not be turned into records.
    pub skipped: Vec<BlockError>,
}

impl ParseReport {
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

/// Normalise an ISSN: Cyrillic `Х` → `X`, any dash → `-`, no spaces, upper case.
pub fn normalize_issn(raw: &str) -> String {
    let unified = RE_DASHES.replace_all(raw.trim(), "-");
    unified
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match c {
            'Х' | 'х' => 'X',
            other => other.to_ascii_uppercase(),
        })
        .collect()
}

/// Parse the text of a catalog, one string per page.
///
/// # Errors
/// [`ScienceHelperError::ParseError`] when the pages carry no text at all
/// or no block start is found anywhere.
pub fn parse_pages(
    pages: &[String],
    patterns: &CompiledPatterns,
) -> Result<ParseReport, ScienceHelperError> {
    if pages.iter().all(|p| p.trim().is_empty()) {
        return Err(ScienceHelperError::ParseError(
            "catalog has no extractable text layer".into(),
        ));
    }

    // ── Join pages, remembering where each one starts ────────────────────
    let mut text = String::new();
    let mut page_starts = Vec::with_capacity(pages.len());
    for page in pages {
        page_starts.push(text.len());
        text.push_str(page);
        text.push('\n');
    }

    // ── Locate blocks ────────────────────────────────────────────────────
    let starts: Vec<(usize, usize, u32)> = patterns
        .row_start
        .captures_iter(&text)
        .filter_map(|cap| {
            let whole = cap.get(0)?;
            let num = cap.get(1)?;
            let number = num.as_str().parse().ok()?;
            Some((num.start(), whole.end(), number))
        })
        .collect();

    if starts.is_empty() {
        return Err(ScienceHelperError::ParseError(
            "no catalog rows found (re_row_start matched nothing)".into(),
        ));
    }
    debug!("Found {} candidate blocks", starts.len());

    let mut report = ParseReport::default();
    for (i, &(at, body_start, number)) in starts.iter().enumerate() {
        let body_end = starts.get(i + 1).map_or(text.len(), |next| next.0);
        let source = locate(&text, &page_starts, at);
        match parse_block(number, &text[body_start..body_end.max(body_start)], source, patterns) {
            Ok(record) => report.records.push(record),
            Err(skip) => {
                warn!("Skipping catalog block: {}", skip);
                report.skipped.push(skip);
            }
        }
    }

    info!(
        "Parsed {} journal records ({} blocks skipped)",
        report.records.len(),
        report.skipped.len()
    );
    Ok(report)
}

/// Parse the text of a single-string catalog (pages separated by form feeds).
pub fn parse_text(text: &str, patterns: &CompiledPatterns) -> Result<ParseReport, ScienceHelperError> {
    let pages: Vec<String> = text.split('\u{c}').map(str::to_string).collect();
    parse_pages(&pages, patterns)
}

fn locate(text: &str, page_starts: &[usize], at: usize) -> SourceRef {
    let page_idx = page_starts.partition_point(|&s| s <= at).saturating_sub(1);
    let page_start = page_starts.get(page_idx).copied().unwrap_or(0);
    let line = text[page_start..at].matches('\n').count() + 1;
    SourceRef {
        page: page_idx + 1,
        line,
    }
}

fn parse_block(
    number: u32,
    body: &str,
    source: SourceRef,
    patterns: &CompiledPatterns,
) -> Result<JournalRecord, BlockError> {
    let flat = body.replace(['\r', '\n', '\t'], " ");
    let flat = patterns.inner_space.replace_all(&flat, " ");
    let flat = flat.trim();

    let mut issns: Vec<String> = Vec::new();
    for m in patterns.issn.find_iter(flat) {
        let issn = normalize_issn(m.as_str());
        if !issns.contains(&issn) {
            issns.push(issn);
        }
    }

    let first_issn = patterns.issn.find(flat);
    let (name, tail) = match first_issn {
        Some(m) => {
            let tail = patterns.date.replace_all(&flat[m.end()..], " ");
            let tail = patterns.issn.replace_all(&tail, " ").into_owned();
            (&flat[..m.start()], tail)
        }
        None => {
            let split = patterns
                .spec_code
                .find(flat)
                .map_or(flat.len(), |m| m.start());
            let tail = patterns.date.replace_all(&flat[split..], " ").into_owned();
            (&flat[..split], tail)
        }
    };

    let name = name.trim().trim_end_matches(NAME_TRAILERS).trim().to_string();
    if name.is_empty() {
        return Err(BlockError::MissingName {
            number,
            page: source.page,
            line: source.line,
        });
    }

    let specialties = split_specialties(&tail, patterns);
    if specialties.is_empty() {
        return Err(BlockError::MissingSpecialties {
            number,
            page: source.page,
            line: source.line,
        });
    }

    Ok(JournalRecord {
        number,
        name,
        issn: issns.first().cloned(),
        issns,
        specialties,
        source,
    })
}

fn split_specialties(tail: &str, patterns: &CompiledPatterns) -> Vec<Specialty> {
    let codes: Vec<_> = patterns.spec_code.find_iter(tail).collect();
    codes
        .iter()
        .enumerate()
        .map(|(i, m)| {
            let end = codes.get(i + 1).map_or(tail.len(), |next| next.start());
            let description = tail[m.end()..end]
                .trim_start_matches(DESC_LEADERS)
                .trim_end_matches(DESC_TRAILERS);
            let description = patterns.inner_space.replace_all(description.trim(), " ");
            Specialty {
                code: m.as_str().trim().trim_end_matches('.').to_string(),
                description: description.into_owned(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns() -> CompiledPatterns {
        CompiledPatterns::default()
    }

    fn block(n: u32) -> String {
        format!(
            "{n}. Вестник номер {n} 1810-72{:02}\n2.3.1. Системный анализ, управление и обработка \
информации (технические науки), 2.3.5. Математическое и программное обеспечение (физико-математические науки) с 01.02.2022\n",
            n % 100
        )
    }

    #[test]
    fn parses_well_formed_block() {
        let report = parse_text(&block(7), &patterns()).unwrap();
        assert_eq!(report.records.len(), 1);
        let r = &report.records[0];
        assert_eq!(r.number, 7);
        assert_eq!(r.name, "Вестник номер 7");
        assert_eq!(r.issn.as_deref(), Some("1810-7207"));
        let codes: Vec<&str> = r.codes().collect();
        assert_eq!(codes, ["2.3.1", "2.3.5"]);
        assert_eq!(
            r.specialties[0].description,
            "Системный анализ, управление и обработка информации (технические науки)"
        );
        assert_eq!(
            r.specialties[1].description,
            "Математическое и программное обеспечение (физико-математические науки)"
        );
        assert_eq!(r.source, SourceRef { page: 1, line: 1 });
    }

    #[test]
    fn ten_good_two_malformed() {
        let mut text = String::from("ПЕРЕЧЕНЬ рецензируемых научных изданий\n");
        for n in 1..=10 {
            text.push_str(&block(n));
            if n == 4 {
                // no specialty codes
                text.push_str("11. Журнал без специальностей 1234-5678\n");
            }
            if n == 8 {
                // no name before the ISSN
                text.push_str("12. 2345-6789 2.3.1. Системный анализ\n");
            }
        }
        let report = parse_text(&text, &patterns()).unwrap();
        assert_eq!(report.records.len(), 10);
        assert_eq!(report.skipped_count(), 2);
        let numbers: Vec<u32> = report.records.iter().map(|r| r.number).collect();
        assert_eq!(numbers, (1..=10).collect::<Vec<_>>());
        assert!(matches!(report.skipped[0], BlockError::MissingSpecialties { number: 11, .. }));
        assert!(matches!(report.skipped[1], BlockError::MissingName { number: 12, .. }));
    }

    #[test]
    fn block_without_issn_uses_first_code() {
        let text = "3. Журнал без ISSN — 05.13.01 Системный анализ\n";
        let report = parse_text(text, &patterns()).unwrap();
        let r = &report.records[0];
        assert_eq!(r.name, "Журнал без ISSN");
        assert_eq!(r.issn, None);
        assert_eq!(r.specialties[0].code, "05.13.01");
        assert_eq!(r.specialties[0].description, "Системный анализ");
    }

    #[test]
    fn second_issn_and_dates_are_not_specialties() {
        let text = "5. Журнал 1234-5678 2345-678Х 2.3.1. Анализ с 12.03.2021 2.3.3. Автоматизация\n";
        let report = parse_text(text, &patterns()).unwrap();
        let r = &report.records[0];
        assert_eq!(r.issn.as_deref(), Some("1234-5678"));
        assert_eq!(r.issns, ["1234-5678", "2345-678X"]);
        assert_eq!(r.specialties.len(), 2);
        assert_eq!(r.specialties[0].description, "Анализ");
        assert_eq!(r.specialties[1].description, "Автоматизация");
    }

    #[test]
    fn records_without_issn_list_fall_back_to_issn() {
        let json = r#"{"number": 3, "name": "Журнал", "issn": "1234-5678",
            "specialties": [], "source": {"page": 1, "line": 1}}"#;
        let r: JournalRecord = serde_json::from_str(json).unwrap();
        assert!(r.issns.is_empty());
        assert_eq!(r.all_issns().collect::<Vec<_>>(), ["1234-5678"]);
    }

    #[test]
    fn source_references_track_pages_and_lines() {
        let pages = vec![
            format!("Header\n{}", block(1)),
            format!("{}{}", block(2), block(3)),
        ];
        let report = parse_pages(&pages, &patterns()).unwrap();
        let refs: Vec<SourceRef> = report.records.iter().map(|r| r.source).collect();
        assert_eq!(
            refs,
            [
                SourceRef { page: 1, line: 2 },
                SourceRef { page: 2, line: 1 },
                SourceRef { page: 2, line: 3 },
            ]
        );
    }

    #[test]
    fn no_rows_is_parse_error() {
        let err = parse_text("Just a title page\nwith nothing numbered", &patterns()).unwrap_err();
        assert!(matches!(err, ScienceHelperError::ParseError(_)));
    }

    #[test]
    fn empty_text_layer_is_parse_error() {
        let err = parse_pages(&["  ".into(), "\n".into()], &patterns()).unwrap_err();
        assert!(matches!(err, ScienceHelperError::ParseError(_)));
    }

    #[test]
    fn issn_normalisation() {
        assert_eq!(normalize_issn("1234 – 567х"), "1234-567X");
        assert_eq!(normalize_issn("2345—678Х"), "2345-678X");
        assert_eq!(normalize_issn(" 0001-0002 "), "0001-0002");
    }

    #[test]
    fn custom_pattern_without_group_is_rejected() {
        let p = CatalogPatterns {
            row_start: r"(?m)^\d+\.".into(),
            ..Default::default()
        };
        assert!(matches!(
            CompiledPatterns::compile(&p),
            Err(ScienceHelperError::InvalidConfig(_))
        ));
    }
}
