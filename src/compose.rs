//! Figure composition entry points.
//!
//! [`compose`] turns images and a [`CompositionConfig`] into a
//! [`CompositeDocument`]; [`export`] and [`export_to_file`] serialise that
//! document as PNG or draw.io, and [`render`] paints it into an RGBA
//! buffer. Composition is synchronous and fails as a
//! whole: on any error no document (and no output file) is produced.

use crate::config::CompositionConfig;
use crate::error::ScienceHelperError;
use crate::figure::decorate::{label_box, AxisGeometry};
use crate::figure::element::ImageElement;
use crate::figure::{drawio, layout, raster, CompositeDocument, ExportFormat, PlacedImage};
use crate::output::write_atomic;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

pub use crate::figure::raster::render;

/// Lay out, number and decorate `images`.
///
/// # Errors
/// * [`ScienceHelperError::InvalidConfig`]: empty input, grid too small,
///   custom label list of the wrong length (the image count, or the
///   largest [`ImageElement::index`] + 1 when that is larger).
/// * [`ScienceHelperError::RangeError`]: Roman numbering past 3999.
pub fn compose(
    images: Vec<ImageElement>,
    config: &CompositionConfig,
) -> Result<CompositeDocument, ScienceHelperError> {
    let start = Instant::now();
    info!(
        "Composing {} images ({} layout)",
        images.len(),
        config.layout.mode
    );

    // ── Step 1: Placement ────────────────────────────────────────────────
    let sizes: Vec<(u32, u32)> = images.iter().map(ImageElement::size).collect();
    let placed = layout::place(&sizes, &config.layout)?;
    if let Some((rows, cols)) = placed.grid {
        debug!("Grid resolved to {}x{}", rows, cols);
    }

    // ── Step 2: Labels ───────────────────────────────────────────────────
    // An image's ordinal is its explicit index, else its input position.
    let ordinals: Vec<usize> = images
        .iter()
        .enumerate()
        .map(|(i, el)| el.index().unwrap_or(i))
        .collect();
    let labels = match &config.labels {
        Some(style) => {
            let span = ordinals
                .iter()
                .map(|&o| o.saturating_add(1))
                .max()
                .unwrap_or(0)
                .max(images.len());
            Some(style.scheme.sequence(span)?)
        }
        None => None,
    };

    // ── Step 3: Assemble ─────────────────────────────────────────────────
    let mut out = Vec::with_capacity(images.len());
    let slots = placed.placements.iter().copied().zip(ordinals);
    for (element, (placement, ordinal)) in images.into_iter().zip(slots) {
        let generated = labels.as_ref().and_then(|seq| seq.get(ordinal));
        let label = config
            .labels
            .as_ref()
            .and(element.label().map(str::to_string).or(generated));
        let label_box = config
            .labels
            .as_ref()
            .map(|style| label_box(placement.content(), style));
        let axes = config
            .axes
            .as_ref()
            .map(|spec| AxisGeometry::compute(placement.content(), spec))
            .transpose()?;

        out.push(PlacedImage {
            element,
            placement,
            label,
            label_box,
            axes,
        });
    }

    let doc = CompositeDocument::new(
        (placed.canvas_width, placed.canvas_height),
        config.layout.background,
        config.layout.border_color,
        out,
        config.labels.clone(),
        config.axes.clone(),
        config.font.clone(),
    );

    info!(
        "Composite ready: {}x{} px in {}ms",
        doc.width(),
        doc.height(),
        start.elapsed().as_millis()
    );
    Ok(doc)
}

/// Serialise `doc` in the given format.
pub fn export(doc: &CompositeDocument, format: ExportFormat) -> Result<Vec<u8>, ScienceHelperError> {
    match format {
        ExportFormat::Png => raster::encode_png(doc),
        ExportFormat::Drawio => drawio::to_xml(doc).map(String::into_bytes),
    }
}

/// Export `doc` to `path`, choosing the format from the extension unless
/// `format` is given.
///
/// Uses atomic write (temp file + rename) so a failed export never leaves
/// a partial file behind.
pub fn export_to_file(
    doc: &CompositeDocument,
    path: impl AsRef<Path>,
    format: Option<ExportFormat>,
) -> Result<ExportFormat, ScienceHelperError> {
    let path = path.as_ref();
    let format = match format {
        Some(f) => f,
        None => ExportFormat::from_path(path)?,
    };
    let bytes = export(doc, format)?;
    write_atomic(path, &bytes)?;
    info!("Wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(format)
}

/// Compose and write in one step.
pub fn compose_to_file(
    images: Vec<ImageElement>,
    config: &CompositionConfig,
    path: impl AsRef<Path>,
    format: Option<ExportFormat>,
) -> Result<CompositeDocument, ScienceHelperError> {
    let path = path.as_ref();
    // Resolve the format first so an unsupported target fails before any work.
    let format = match format {
        Some(f) => f,
        None => ExportFormat::from_path(path)?,
    };
    let doc = compose(images, config)?;
    export_to_file(&doc, path, Some(format))?;
    Ok(doc)
}
