//! Image elements: the validated pixel inputs of a composition request.
//!
//! Every way an image can enter the library (encoded bytes, a raw RGBA
//! buffer, a file on disk, a directory of files) ends in the same
//! [`ImageElement`] value, so the layout and export code never deals with
//! half-valid inputs.

use crate::error::ScienceHelperError;
use image::{DynamicImage, RgbaImage};
use std::path::{Path, PathBuf};
use tracing::debug;

/// File extensions picked up by [`ImageElement::load_dir`].
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// One input image with optional caller-assigned metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageElement {
    pixels: RgbaImage,
    label: Option<String>,
    index: Option<usize>,
    name: Option<String>,
}

impl ImageElement {
    /// Wrap an already-decoded RGBA image.
    pub fn new(pixels: RgbaImage) -> Result<Self, ScienceHelperError> {
        if pixels.width() == 0 || pixels.height() == 0 {
            return Err(ScienceHelperError::InvalidConfig(
                "image has a zero dimension".into(),
            ));
        }
        Ok(Self {
            pixels,
            label: None,
            index: None,
            name: None,
        })
    }

    /// Build from a raw RGBA8 buffer of `width * height * 4` bytes.
    pub fn from_rgba(width: u32, height: u32, buffer: Vec<u8>) -> Result<Self, ScienceHelperError> {
        let expected = width as usize * height as usize * 4;
        let got = buffer.len();
        let pixels = RgbaImage::from_raw(width, height, buffer).ok_or_else(|| {
            ScienceHelperError::InvalidConfig(format!(
                "RGBA buffer has {got} bytes, expected {expected} for {width}x{height}"
            ))
        })?;
        Self::new(pixels)
    }

    /// Decode PNG or JPEG bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ScienceHelperError> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| ScienceHelperError::InvalidConfig(format!("cannot decode image: {e}")))?;
        Self::new(img.to_rgba8())
    }

    /// Read and decode an image file. The file stem becomes the element name.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ScienceHelperError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| ScienceHelperError::missing(path, e.to_string()))?;
        let element = Self::from_bytes(&bytes).map_err(|e| match e {
            ScienceHelperError::InvalidConfig(msg) => {
                ScienceHelperError::InvalidConfig(format!("{}: {msg}", path.display()))
            }
            other => other,
        })?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned());
        debug!(
            "Loaded image {} ({}x{})",
            path.display(),
            element.width(),
            element.height()
        );
        Ok(element.with_name_opt(name))
    }

    /// Load every PNG/JPEG file in `dir`, sorted by file name.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Vec<Self>, ScienceHelperError> {
        let dir = dir.as_ref();
        let entries =
            std::fs::read_dir(dir).map_err(|e| ScienceHelperError::missing(dir, e.to_string()))?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && has_image_extension(p))
            .collect();
        paths.sort();

        paths.iter().map(Self::from_path).collect()
    }

    /// Override the generated label for this image.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Zero-based ordinal that picks this image's generated label, so a
    /// composition can continue the numbering of a larger figure. Defaults
    /// to the input position.
    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_name(self, name: impl Into<String>) -> Self {
        self.with_name_opt(Some(name.into()))
    }

    fn with_name_opt(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn size(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn to_dynamic(&self) -> DynamicImage {
        DynamicImage::ImageRgba8(self.pixels.clone())
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba};
    use std::io::Cursor;

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(w, h, Rgba([10, 20, 30, 255]));
        let mut buf = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn from_bytes_decodes_png() {
        let el = ImageElement::from_bytes(&png_bytes(3, 2)).unwrap();
        assert_eq!(el.size(), (3, 2));
        assert_eq!(el.pixels().get_pixel(0, 0), &Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn from_bytes_rejects_garbage() {
        let err = ImageElement::from_bytes(b"definitely not an image").unwrap_err();
        assert!(matches!(err, ScienceHelperError::InvalidConfig(_)));
    }

    #[test]
    fn from_rgba_checks_length() {
        assert!(ImageElement::from_rgba(2, 2, vec![0; 16]).is_ok());
        assert!(matches!(
            ImageElement::from_rgba(2, 2, vec![0; 15]),
            Err(ScienceHelperError::InvalidConfig(_))
        ));
        assert!(ImageElement::from_rgba(0, 2, vec![]).is_err());
    }

    #[test]
    fn from_path_missing_is_missing_resource() {
        let err = ImageElement::from_path("/no/such/figure.png").unwrap_err();
        assert!(matches!(err, ScienceHelperError::MissingResource { .. }));
    }

    #[test]
    fn load_dir_sorts_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.png"), png_bytes(2, 2)).unwrap();
        std::fs::write(dir.path().join("a.PNG"), png_bytes(1, 1)).unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"skip me").unwrap();

        let images = ImageElement::load_dir(dir.path()).unwrap();
        let names: Vec<_> = images.iter().map(|i| i.name().unwrap().to_string()).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(images[0].size(), (1, 1));
    }

    #[test]
    fn builder_metadata() {
        let el = ImageElement::from_rgba(1, 1, vec![0; 4])
            .unwrap()
            .with_label("Fig. 1")
            .with_index(7);
        assert_eq!(el.label(), Some("Fig. 1"));
        assert_eq!(el.index(), Some(7));
    }
}
