//! Raster export: paint a [`CompositeDocument`] into an RGBA canvas and
//! encode it as PNG.
//!
//! Painting order per image: border, pixels (resized with Lanczos3 when the
//! layout scaled the image), label box, axes. The PNG encoder is fed the
//! same pixels for the same document, so output is byte-for-byte stable.

use crate::error::ScienceHelperError;
use crate::figure::decorate::{paint_axes, paint_label};
use crate::figure::font::LabelFont;
use crate::figure::CompositeDocument;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, RgbaImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect as PixelRect;
use std::borrow::Cow;
use std::io::Cursor;
use tracing::debug;

/// Paint the document onto a fresh canvas.
pub fn render(doc: &CompositeDocument) -> RgbaImage {
    let mut canvas = RgbaImage::from_pixel(doc.width(), doc.height(), doc.background().to_rgba());

    let needs_font = doc.label_style().is_some() || doc.axis_spec().is_some();
    let font = if needs_font {
        LabelFont::load_or_builtin(doc.font())
    } else {
        LabelFont::Builtin
    };

    for placed in doc.images() {
        let placement = placed.placement();
        let outer = placement.outer;
        if placement.border > 0 {
            draw_filled_rect_mut(
                &mut canvas,
                PixelRect::at(outer.x as i32, outer.y as i32).of_size(outer.width, outer.height),
                doc.border_color().to_rgba(),
            );
        }

        let content = placement.content();
        let pixels = fitted(placed.element().pixels(), content.width, content.height);
        imageops::overlay(&mut canvas, &*pixels, content.x as i64, content.y as i64);

        if let (Some(style), Some(rect), Some(text)) =
            (doc.label_style(), placed.label_box(), placed.label())
        {
            paint_label(&mut canvas, rect, text, style, &font);
        }
        if let (Some(spec), Some(geometry)) = (doc.axis_spec(), placed.axes()) {
            paint_axes(&mut canvas, geometry, spec, &font);
        }
    }

    debug!(
        "Rendered {} images onto {}x{} canvas",
        doc.images().len(),
        doc.width(),
        doc.height()
    );
    canvas
}

/// The image pixels at exactly `width × height`.
fn fitted(pixels: &RgbaImage, width: u32, height: u32) -> Cow<'_, RgbaImage> {
    if pixels.dimensions() == (width, height) {
        Cow::Borrowed(pixels)
    } else {
        Cow::Owned(imageops::resize(pixels, width, height, FilterType::Lanczos3))
    }
}

/// Encode an RGBA canvas as PNG bytes.
pub fn png_bytes(img: &RgbaImage) -> Result<Vec<u8>, ScienceHelperError> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(img.clone())
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| ScienceHelperError::Internal(format!("PNG encoding failed: {e}")))?;
    Ok(buf)
}

/// Render and encode the document as PNG.
pub fn encode_png(doc: &CompositeDocument) -> Result<Vec<u8>, ScienceHelperError> {
    let bytes = png_bytes(&render(doc))?;
    debug!("Encoded composite → {} bytes PNG", bytes.len());
    Ok(bytes)
}

/// Base64 PNG of a single image, as embedded in diagram documents.
pub fn png_base64(img: &RgbaImage) -> Result<String, ScienceHelperError> {
    Ok(STANDARD.encode(png_bytes(img)?))
}
