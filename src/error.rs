//! Error types for the science-helper library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ScienceHelperError`]: **Fatal**: the request cannot proceed at all
//!   (bad layout policy, unreachable catalog, unsupported export format).
//!   Returned as `Err(ScienceHelperError)` from the `compose::*` and
//!   `catalog::*` entry points.
//!
//! * [`BlockError`]: **Non-fatal**: a single catalog block could not be
//!   turned into a journal record. Stored inside
//!   [`crate::vak::parser::ParseReport`] and counted, the rest of the
//!   catalog is still returned.
//!
//! [`FetchFailure`] is the underlying cause carried by
//! [`ScienceHelperError::RetrievalError`] once all attempts are exhausted.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the science-helper library.
#[derive(Debug, Error)]
pub enum ScienceHelperError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Builder or policy validation failed, or an input value is malformed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A required file (font, image, cached catalog) does not exist.
    #[error("Missing resource '{path}': {detail}")]
    MissingResource { path: PathBuf, detail: String },

    /// Requested label count is outside what the scheme can express.
    #[error("Label range error: {0}")]
    RangeError(String),

    /// Export target is neither a raster nor a diagram format.
    #[error("Unsupported export format '{0}'\nUse one of: png, drawio, xml.")]
    UnsupportedFormat(String),

    // ── Catalog errors ────────────────────────────────────────────────────
    /// A remote resource could not be fetched after all attempts.
    #[error("Failed to fetch '{url}' after {attempts} attempt(s): {source}")]
    RetrievalError {
        url: String,
        attempts: u32,
        #[source]
        source: FetchFailure,
    },

    /// A document was read but its structure is not what the parser expects.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// The catalog bytes do not start with the PDF magic.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Catalog text extraction needs a pdfium shared library.\n\
  • Install it system-wide, or\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium (or `pdfium_lib_path` in the settings file).\n"
    )]
    PdfiumBindingFailed(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output or cache file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScienceHelperError {
    /// Shorthand for a missing-file error.
    pub fn missing(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Self::MissingResource {
            path: path.into(),
            detail: detail.into(),
        }
    }
}

/// Why one fetch attempt failed.
#[derive(Debug, Error)]
pub enum FetchFailure {
    /// The server answered with a non-success status.
    #[error("HTTP {0}")]
    Status(u16),

    /// The request did not complete within the configured timeout.
    #[error("timed out after {0}s")]
    Timeout(u64),

    /// Connection, TLS or body transfer failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl FetchFailure {
    /// Whether another attempt could plausibly succeed.
    ///
    /// Timeouts, transport errors, HTTP 429 and 5xx are transient; every
    /// other status is returned to the caller immediately.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchFailure::Status(code) => *code == 429 || (500..600).contains(code),
            FetchFailure::Timeout(_) | FetchFailure::Transport(_) => true,
        }
    }
}

/// A non-fatal error for a single catalog block.
///
/// Stored in [`crate::vak::parser::ParseReport::skipped`]; parsing continues
/// with the next block.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum BlockError {
    /// No journal name could be found before the ISSN / first specialty code.
    #[error("Block {number} (page {page}, line {line}): journal name is missing")]
    MissingName {
        number: u32,
        page: usize,
        line: usize,
    },

    /// The block does not list a single specialty code.
    #[error("Block {number} (page {page}, line {line}): no specialty codes")]
    MissingSpecialties {
        number: u32,
        page: usize,
        line: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retrieval_error_display() {
        let e = ScienceHelperError::RetrievalError {
            url: "https://vak.example/list.pdf".into(),
            attempts: 3,
            source: FetchFailure::Status(503),
        };
        let msg = e.to_string();
        assert!(msg.contains("3 attempt"), "got: {msg}");
        assert!(msg.contains("HTTP 503"), "got: {msg}");
    }

    #[test]
    fn retrieval_error_exposes_source() {
        use std::error::Error as _;
        let e = ScienceHelperError::RetrievalError {
            url: "u".into(),
            attempts: 1,
            source: FetchFailure::Timeout(60),
        };
        let source = e.source().map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("timed out after 60s"));
    }

    #[test]
    fn transient_classification() {
        assert!(FetchFailure::Status(500).is_transient());
        assert!(FetchFailure::Status(503).is_transient());
        assert!(FetchFailure::Status(429).is_transient());
        assert!(FetchFailure::Timeout(5).is_transient());
        assert!(!FetchFailure::Status(404).is_transient());
        assert!(!FetchFailure::Status(403).is_transient());
    }

    #[test]
    fn unsupported_format_display() {
        let e = ScienceHelperError::UnsupportedFormat("bmp".into());
        assert!(e.to_string().contains("'bmp'"));
        assert!(e.to_string().contains("drawio"));
    }

    #[test]
    fn block_error_display_and_serde() {
        let e = BlockError::MissingSpecialties {
            number: 12,
            page: 2,
            line: 40,
        };
        assert!(e.to_string().contains("Block 12"));
        assert!(e.to_string().contains("page 2"));
        let json = serde_json::to_string(&e).unwrap();
        let back: BlockError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);
    }
}
