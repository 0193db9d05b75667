//! The accredited-journal whitelist.
//!
//! The whitelist JSON is an array whose entries are either a bare title or
//! ISSN string, or an object:
//!
//! ```json
//! {"title": ["Вестник ..."], "issns": ["1810-7206"],
//!  "level": "K1", "wos_cc": {"value": true}, "scopus": {"value": false},
//!  "rsci": {"value": "да"}}
//! ```
//!
//! `title` and `issns` may be a string or a list. An object wrapper
//! `{"data": [...]}` is accepted as well. Every title and ISSN is indexed
//! under its [`normalize_identifier`] form, so membership tests are case and
//! whitespace insensitive.

use crate::error::ScienceHelperError;
use crate::vak::parser::{normalize_issn, JournalRecord};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

static RE_ISSN_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}\s*[-‐‑‒–—−]\s*\d{3}[\dXxХх]$").unwrap());
static RE_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Normalise a journal title or ISSN for comparison.
///
/// ISSNs go through [`normalize_issn`]. Titles are lower-cased, quotes are
/// dropped, dash variants become `-`, and whitespace runs collapse to one
/// space.
pub fn normalize_identifier(raw: &str) -> String {
    let trimmed = raw.trim();
    if RE_ISSN_SHAPE.is_match(trimmed) {
        return normalize_issn(trimmed);
    }
    let unified: String = trimmed
        .chars()
        .filter(|c| !matches!(c, '«' | '»' | '"' | '“' | '”' | '„'))
        .map(|c| match c {
            '‐' | '‑' | '‒' | '–' | '—' | '−' => '-',
            other => other,
        })
        .flat_map(char::to_lowercase)
        .collect();
    RE_SPACES.replace_all(unified.trim(), " ").into_owned()
}

/// One whitelist entry with its indexing metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WhitelistEntry {
    pub titles: Vec<String>,
    pub issns: Vec<String>,
    /// Whitelist level (e.g. `K1`), as printed.
    pub level: Option<String>,
    pub wos: Option<String>,
    pub scopus: Option<String>,
    pub rsci: Option<String>,
}

impl WhitelistEntry {
    fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.titles.iter().chain(&self.issns).map(String::as_str)
    }
}

// ── Raw JSON shapes ──────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDocument {
    List(Vec<RawEntry>),
    Wrapped { data: Vec<RawEntry> },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawEntry {
    Identifier(String),
    Record(RawRecord),
}

#[derive(Deserialize)]
struct RawRecord {
    #[serde(default, alias = "titles", deserialize_with = "one_or_many")]
    title: Vec<String>,
    #[serde(default, alias = "issn", deserialize_with = "one_or_many")]
    issns: Vec<String>,
    #[serde(default)]
    level: Option<Value>,
    #[serde(default, alias = "wos")]
    wos_cc: Option<Value>,
    #[serde(default)]
    scopus: Option<Value>,
    #[serde(default)]
    rsci: Option<Value>,
}

fn one_or_many<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
        Null(()),
    }
    Ok(match OneOrMany::deserialize(de)? {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
        OneOrMany::Null(()) => Vec::new(),
    })
}

/// Render an indexing flag (`{"value": x}` or a bare value) as text.
fn flag_text(value: &Value) -> Option<String> {
    let inner = value.get("value").unwrap_or(value);
    match inner {
        Value::Null => None,
        Value::Bool(true) => Some("yes".into()),
        Value::Bool(false) => Some("no".into()),
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.trim().to_string()),
        other => Some(other.to_string()),
    }
}

impl From<RawEntry> for WhitelistEntry {
    fn from(raw: RawEntry) -> Self {
        match raw {
            RawEntry::Identifier(s) => {
                if RE_ISSN_SHAPE.is_match(s.trim()) {
                    WhitelistEntry {
                        issns: vec![s],
                        ..Default::default()
                    }
                } else {
                    WhitelistEntry {
                        titles: vec![s],
                        ..Default::default()
                    }
                }
            }
            RawEntry::Record(r) => WhitelistEntry {
                titles: r.title,
                issns: r.issns,
                level: r.level.as_ref().and_then(flag_text),
                wos: r.wos_cc.as_ref().and_then(flag_text),
                scopus: r.scopus.as_ref().and_then(flag_text),
                rsci: r.rsci.as_ref().and_then(flag_text),
            },
        }
    }
}

// ── Whitelist ────────────────────────────────────────────────────────────

/// Normalised identifier set with per-journal metadata.
#[derive(Debug, Clone, Default)]
pub struct Whitelist {
    entries: Vec<WhitelistEntry>,
    index: HashMap<String, usize>,
}

impl Whitelist {
    pub fn from_entries(entries: Vec<WhitelistEntry>) -> Self {
        let mut index = HashMap::new();
        for (i, entry) in entries.iter().enumerate() {
            for id in entry.identifiers() {
                let key = normalize_identifier(id);
                if !key.is_empty() {
                    // First entry wins on duplicates.
                    index.entry(key).or_insert(i);
                }
            }
        }
        Self { entries, index }
    }

    /// Parse the whitelist JSON document.
    ///
    /// # Errors
    /// [`ScienceHelperError::ParseError`] when the text is not JSON of a
    /// supported shape.
    pub fn from_json(text: &str) -> Result<Self, ScienceHelperError> {
        let doc: RawDocument = serde_json::from_str(text)
            .map_err(|e| ScienceHelperError::ParseError(format!("whitelist JSON: {e}")))?;
        let raw = match doc {
            RawDocument::List(v) | RawDocument::Wrapped { data: v } => v,
        };
        let list = Self::from_entries(raw.into_iter().map(WhitelistEntry::from).collect());
        debug!(
            "Whitelist: {} entries, {} identifiers",
            list.entries.len(),
            list.index.len()
        );
        Ok(list)
    }

    /// Read and parse a cached whitelist file.
    pub fn load(path: &Path) -> Result<Self, ScienceHelperError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ScienceHelperError::missing(path, e.to_string()))?;
        let list = Self::from_json(&text)?;
        info!("Loaded whitelist from {} ({} journals)", path.display(), list.len());
        Ok(list)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no identifier is indexed.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn entries(&self) -> &[WhitelistEntry] {
        &self.entries
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.index.contains_key(&normalize_identifier(identifier))
    }

    pub fn get(&self, identifier: &str) -> Option<&WhitelistEntry> {
        self.index
            .get(&normalize_identifier(identifier))
            .map(|&i| &self.entries[i])
    }

    /// The entry matching the record's ISSN, or failing that its name.
    pub fn lookup(&self, record: &JournalRecord) -> Option<&WhitelistEntry> {
        record
            .all_issns()
            .find_map(|issn| self.get(issn))
            .or_else(|| self.get(&record.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vak::parser::SourceRef;

    fn record(name: &str, issn: Option<&str>) -> JournalRecord {
        JournalRecord {
            number: 1,
            name: name.into(),
            issn: issn.map(str::to_string),
            issns: issn.map(str::to_string).into_iter().collect(),
            specialties: vec![],
            source: SourceRef { page: 1, line: 1 },
        }
    }

    #[test]
    fn normalisation() {
        assert_eq!(normalize_identifier("  «Вестник   МГУ» "), "вестник мгу");
        assert_eq!(normalize_identifier("Труды – ИСП"), "труды - исп");
        assert_eq!(normalize_identifier("1234 — 567х"), "1234-567X");
    }

    #[test]
    fn parses_mixed_entries() {
        let json = r#"[
            "Journal of Things",
            "2345-6789",
            {"title": ["Вестник МГУ", "Moscow University Bulletin"], "issns": "0201-7385",
             "level": "K1", "wos_cc": {"value": true}, "scopus": {"value": false}, "rsci": {"value": "да"}}
        ]"#;
        let wl = Whitelist::from_json(json).unwrap();
        assert_eq!(wl.len(), 3);
        assert!(wl.contains("JOURNAL OF THINGS"));
        assert!(wl.contains("2345 - 6789"));
        assert!(wl.contains("moscow university bulletin"));
        let e = wl.get("0201-7385").unwrap();
        assert_eq!(e.level.as_deref(), Some("K1"));
        assert_eq!(e.wos.as_deref(), Some("yes"));
        assert_eq!(e.scopus.as_deref(), Some("no"));
        assert_eq!(e.rsci.as_deref(), Some("да"));
    }

    #[test]
    fn wrapped_document_and_null_fields() {
        let json = r#"{"data": [{"title": null, "issns": ["1111-2222"], "level": null}]}"#;
        let wl = Whitelist::from_json(json).unwrap();
        assert!(wl.contains("1111-2222"));
        assert_eq!(wl.get("1111-2222").unwrap().level, None);
    }

    #[test]
    fn lookup_prefers_issn_then_name() {
        let wl = Whitelist::from_json(r#"["Вестник МГУ", "1810-7206"]"#).unwrap();
        assert!(wl.lookup(&record("Other", Some("1810-7206"))).is_some());
        assert!(wl.lookup(&record("вестник мгу", Some("9999-9999"))).is_some());
        assert!(wl.lookup(&record("Unknown", None)).is_none());
    }

    #[test]
    fn lookup_tries_every_issn_of_the_record() {
        let wl = Whitelist::from_json(r#"[{"issns": ["2345-6789"], "level": "K2"}]"#).unwrap();
        let mut r = record("Вестник науки", Some("1234-5678"));
        assert!(wl.lookup(&r).is_none());
        r.issns.push("2345-6789".into());
        assert_eq!(wl.lookup(&r).and_then(|e| e.level.as_deref()), Some("K2"));
    }

    #[test]
    fn invalid_json_is_parse_error() {
        assert!(matches!(
            Whitelist::from_json("<html>"),
            Err(ScienceHelperError::ParseError(_))
        ));
        assert!(matches!(
            Whitelist::from_json(r#"{"items": 3}"#),
            Err(ScienceHelperError::ParseError(_))
        ));
    }

    #[test]
    fn empty_list_is_empty() {
        assert!(Whitelist::from_json("[]").unwrap().is_empty());
    }
}
