//! Catalog text extraction via pdfium.
//!
//! pdfium is a blocking C library with thread-local state, so extraction
//! runs inside `spawn_blocking`. The library is bound explicitly (configured
//! path, then `PDFIUM_LIB_PATH`, then the working directory, then the system
//! library) so a missing pdfium is reported as
//! [`ScienceHelperError::PdfiumBindingFailed`] instead of a panic.

use crate::error::ScienceHelperError;
use pdfium_render::prelude::*;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming a pdfium shared library or its directory.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Check that `path` exists and starts with `%PDF`.
pub fn check_pdf_magic(path: &Path) -> Result<(), ScienceHelperError> {
    let mut file = std::fs::File::open(path)
        .map_err(|e| ScienceHelperError::missing(path, e.to_string()))?;
    let mut magic = [0u8; 4];
    let read = file
        .read(&mut magic)
        .map_err(|e| ScienceHelperError::missing(path, e.to_string()))?;
    if read < 4 || &magic != b"%PDF" {
        return Err(ScienceHelperError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        });
    }
    Ok(())
}

/// Extract the text layer of every page, in page order.
///
/// # Errors
/// * [`ScienceHelperError::MissingResource`] / [`ScienceHelperError::NotAPdf`]
///   before pdfium is touched.
/// * [`ScienceHelperError::PdfiumBindingFailed`] when no library can be bound.
/// * [`ScienceHelperError::ParseError`] when the document cannot be opened or
///   carries no text layer.
pub async fn extract_pages(
    pdf_path: &Path,
    lib_path: Option<&Path>,
) -> Result<Vec<String>, ScienceHelperError> {
    check_pdf_magic(pdf_path)?;

    let path = pdf_path.to_path_buf();
    let lib = lib_path.map(Path::to_path_buf);
    tokio::task::spawn_blocking(move || extract_pages_blocking(&path, lib.as_deref()))
        .await
        .map_err(|e| ScienceHelperError::Internal(format!("Extraction task panicked: {}", e)))?
}

/// Blocking implementation of [`extract_pages`].
pub fn extract_pages_blocking(
    pdf_path: &Path,
    lib_path: Option<&Path>,
) -> Result<Vec<String>, ScienceHelperError> {
    let pdfium = bind_pdfium(lib_path)?;

    let document = pdfium.load_pdf_from_file(pdf_path, None).map_err(|e| {
        ScienceHelperError::ParseError(format!(
            "cannot open '{}': {:?}",
            pdf_path.display(),
            e
        ))
    })?;

    let pages = document.pages();
    info!("Catalog PDF loaded: {} pages", pages.len());

    let mut texts = Vec::with_capacity(pages.len() as usize);
    for (idx, page) in pages.iter().enumerate() {
        let text = page
            .text()
            .map_err(|e| {
                ScienceHelperError::ParseError(format!("page {}: no text layer: {:?}", idx + 1, e))
            })?
            .all();
        debug!("Page {}: {} chars", idx + 1, text.chars().count());
        texts.push(text);
    }

    if texts.iter().all(|t| t.trim().is_empty()) {
        return Err(ScienceHelperError::ParseError(format!(
            "'{}' has no extractable text layer",
            pdf_path.display()
        )));
    }
    Ok(texts)
}

fn bind_pdfium(lib_path: Option<&Path>) -> Result<Pdfium, ScienceHelperError> {
    let explicit: Option<PathBuf> = lib_path
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(PDFIUM_LIB_PATH_ENV).map(PathBuf::from));

    let bindings = match explicit {
        Some(path) => {
            let lib = if path.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(&path)
            } else {
                path
            };
            debug!("Binding pdfium at {}", lib.display());
            Pdfium::bind_to_library(&lib)
        }
        None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| ScienceHelperError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_check_rejects_html() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vak_list.pdf");
        std::fs::write(&path, b"<html>blocked</html>").unwrap();
        let err = check_pdf_magic(&path).unwrap_err();
        match err {
            ScienceHelperError::NotAPdf { magic, .. } => assert_eq!(&magic, b"<htm"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn magic_check_rejects_short_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.pdf");
        std::fs::write(&path, b"%P").unwrap();
        assert!(matches!(
            check_pdf_magic(&path),
            Err(ScienceHelperError::NotAPdf { .. })
        ));
    }

    #[tokio::test]
    async fn missing_file_is_reported_before_binding() {
        let err = extract_pages(Path::new("/nonexistent/vak.pdf"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ScienceHelperError::MissingResource { .. }));
    }

    #[test]
    fn bad_library_path_is_binding_failure() {
        let dir = tempfile::tempdir().unwrap();
        let lib = dir.path().join("libpdfium-missing.so");
        let pdf = dir.path().join("doc.pdf");
        std::fs::write(&pdf, b"%PDF-1.7\n").unwrap();
        let err = extract_pages_blocking(&pdf, Some(&lib)).unwrap_err();
        assert!(matches!(err, ScienceHelperError::PdfiumBindingFailed(_)));
    }
}
