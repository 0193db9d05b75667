//! Font resolution and text drawing for labels and axes.
//!
//! A [`FontSpec`] names a TrueType font either by explicit path or by family
//! (`{family}.ttf` looked up in a list of directories). When nothing usable
//! is found, [`LabelFont::load_or_builtin`] falls back to a small built-in
//! 5×7 bitmap face so a missing font never aborts a composition.

use crate::error::ScienceHelperError;
use ab_glyph::{FontVec, PxScale};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect as PixelRect;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Where to look for the label font.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontSpec {
    /// Explicit font file. Takes precedence over `family`.
    pub path: Option<PathBuf>,
    /// Family name resolved as `{family}.ttf`. Default: `DejaVuSans`.
    pub family: String,
    /// Directories searched for `{family}.ttf`, in order.
    pub search_dirs: Vec<PathBuf>,
}

impl Default for FontSpec {
    fn default() -> Self {
        Self {
            path: None,
            family: "DejaVuSans".to_string(),
            search_dirs: vec![
                PathBuf::from("fonts"),
                PathBuf::from("/usr/share/fonts/truetype/dejavu"),
            ],
        }
    }
}

impl FontSpec {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Locate the font file on disk.
    pub fn resolve(&self) -> Result<PathBuf, ScienceHelperError> {
        if let Some(path) = &self.path {
            return if path.is_file() {
                Ok(path.clone())
            } else {
                Err(ScienceHelperError::missing(path, "font file not found"))
            };
        }

        let file_name = format!("{}.ttf", self.family);
        self.search_dirs
            .iter()
            .map(|dir| dir.join(&file_name))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| {
                ScienceHelperError::missing(
                    &file_name,
                    format!("not found in {:?}", self.search_dirs),
                )
            })
    }
}

/// A font ready to measure and draw text.
pub enum LabelFont {
    /// TrueType/OpenType font rasterised with ab_glyph.
    Outline(FontVec),
    /// Built-in 5×7 bitmap face.
    Builtin,
}

impl std::fmt::Debug for LabelFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LabelFont::Outline(_) => f.write_str("LabelFont::Outline"),
            LabelFont::Builtin => f.write_str("LabelFont::Builtin"),
        }
    }
}

/// Load the font described by `spec`.
///
/// # Errors
/// [`ScienceHelperError::MissingResource`] when the file cannot be found,
/// read, or parsed as a font.
pub fn load_font(spec: &FontSpec) -> Result<LabelFont, ScienceHelperError> {
    let path = spec.resolve()?;
    let bytes =
        std::fs::read(&path).map_err(|e| ScienceHelperError::missing(&path, e.to_string()))?;
    let font = FontVec::try_from_vec(bytes)
        .map_err(|e| ScienceHelperError::missing(&path, format!("unusable font: {e}")))?;
    debug!("Loaded font {}", path.display());
    Ok(LabelFont::Outline(font))
}

impl LabelFont {
    /// Load `spec`, or warn and use the built-in face.
    pub fn load_or_builtin(spec: &FontSpec) -> Self {
        match load_font(spec) {
            Ok(font) => font,
            Err(e) => {
                warn!("{e}; using built-in bitmap font");
                LabelFont::Builtin
            }
        }
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self, LabelFont::Builtin)
    }

    /// Rendered `(width, height)` of `text` at `px` pixels.
    pub fn measure(&self, text: &str, px: f32) -> (u32, u32) {
        match self {
            LabelFont::Outline(font) => text_size(PxScale::from(px), font, text),
            LabelFont::Builtin => {
                let s = builtin_scale(px);
                let n = text.chars().count() as u32;
                if n == 0 {
                    return (0, 0);
                }
                (n * ADVANCE * s - s, GLYPH_ROWS * s)
            }
        }
    }

    /// Draw `text` with its top-left corner at `(x, y)`.
    pub fn draw(&self, img: &mut RgbaImage, text: &str, x: i32, y: i32, px: f32, color: Rgba<u8>) {
        match self {
            LabelFont::Outline(font) => {
                draw_text_mut(img, color, x, y, PxScale::from(px), font, text);
            }
            LabelFont::Builtin => draw_builtin(img, text, x, y, builtin_scale(px), color),
        }
    }

    /// Draw `text` centered inside the rectangle `(x, y, w, h)`.
    pub fn draw_centered(
        &self,
        img: &mut RgbaImage,
        text: &str,
        (x, y, w, h): (i32, i32, u32, u32),
        px: f32,
        color: Rgba<u8>,
    ) {
        let (tw, th) = self.measure(text, px);
        let tx = x + (w as i32 - tw as i32) / 2;
        let ty = y + (h as i32 - th as i32) / 2;
        self.draw(img, text, tx, ty, px, color);
    }
}

// ── Built-in bitmap face ─────────────────────────────────────────────────

const GLYPH_ROWS: u32 = 7;
const GLYPH_COLS: u32 = 5;
/// Horizontal advance per character, in unscaled columns.
const ADVANCE: u32 = 6;

type Glyph = [u8; 7];

const TOFU: Glyph = [0x1F, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1F];
const BLANK: Glyph = [0; 7];

fn builtin_scale(px: f32) -> u32 {
    ((px / 8.0).round() as u32).max(1)
}

fn draw_builtin(img: &mut RgbaImage, text: &str, x: i32, y: i32, s: u32, color: Rgba<u8>) {
    for (i, ch) in text.chars().enumerate() {
        let glyph = glyph(ch);
        let gx = x + (i as u32 * ADVANCE * s) as i32;
        for (row, bits) in glyph.iter().enumerate() {
            for col in 0..GLYPH_COLS {
                if bits & (1 << (GLYPH_COLS - 1 - col)) != 0 {
                    let rect = PixelRect::at(gx + (col * s) as i32, y + (row as u32 * s) as i32)
                        .of_size(s, s);
                    draw_filled_rect_mut(img, rect, color);
                }
            }
        }
    }
}

fn glyph(ch: char) -> Glyph {
    let upper = ch.to_uppercase().next().unwrap_or(ch);
    match upper {
        ' ' => BLANK,
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        'A' | 'А' => [0x0E, 0x11, 0x11, 0x11, 0x1F, 0x11, 0x11],
        'B' | 'В' => [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        'C' | 'С' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => [0x1C, 0x12, 0x11, 0x11, 0x11, 0x12, 0x1C],
        'E' | 'Е' | 'Ё' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'F' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
        'H' | 'Н' => [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'I' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'J' => [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C],
        'K' | 'К' => [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        'M' | 'М' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => [0x11, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11],
        'O' | 'О' => [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'P' | 'Р' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        'Q' => [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D],
        'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'S' => [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
        'T' | 'Т' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
        'W' => [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A],
        'X' | 'Х' => [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11],
        'Y' => [0x11, 0x11, 0x11, 0x0A, 0x04, 0x04, 0x04],
        'Z' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F],
        'Б' => [0x1F, 0x10, 0x10, 0x1E, 0x11, 0x11, 0x1E],
        'Г' => [0x1F, 0x10, 0x10, 0x10, 0x10, 0x10, 0x10],
        'Д' => [0x06, 0x0A, 0x0A, 0x0A, 0x0A, 0x1F, 0x11],
        'Ж' => [0x15, 0x15, 0x15, 0x0E, 0x15, 0x15, 0x15],
        'З' => [0x0E, 0x11, 0x01, 0x06, 0x01, 0x11, 0x0E],
        'И' => [0x11, 0x11, 0x13, 0x15, 0x19, 0x11, 0x11],
        'Й' => [0x0A, 0x04, 0x11, 0x13, 0x15, 0x19, 0x11],
        'Л' => [0x07, 0x09, 0x09, 0x09, 0x09, 0x09, 0x19],
        'П' => [0x1F, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11],
        'У' => [0x11, 0x11, 0x11, 0x0F, 0x01, 0x11, 0x0E],
        'Ф' => [0x04, 0x0E, 0x15, 0x15, 0x15, 0x0E, 0x04],
        'Ц' => [0x12, 0x12, 0x12, 0x12, 0x12, 0x1F, 0x01],
        'Ч' => [0x11, 0x11, 0x11, 0x0F, 0x01, 0x01, 0x01],
        'Ш' => [0x15, 0x15, 0x15, 0x15, 0x15, 0x15, 0x1F],
        'Щ' => [0x15, 0x15, 0x15, 0x15, 0x15, 0x1F, 0x01],
        'Ъ' => [0x18, 0x08, 0x08, 0x0E, 0x09, 0x09, 0x0E],
        'Ы' => [0x11, 0x11, 0x11, 0x19, 0x15, 0x15, 0x19],
        'Ь' => [0x10, 0x10, 0x10, 0x1E, 0x11, 0x11, 0x1E],
        'Э' => [0x0E, 0x11, 0x01, 0x07, 0x01, 0x11, 0x0E],
        'Ю' => [0x12, 0x15, 0x15, 0x1D, 0x15, 0x15, 0x12],
        'Я' => [0x0F, 0x11, 0x11, 0x0F, 0x05, 0x09, 0x11],
        _ => TOFU,
    }
}

/// Whether `path` looks like a font file we can try to load.
pub fn is_font_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "ttf" | "otf"))
        .unwrap_or(false)
}
