//! Figure composition: layout, numbering, decoration and export.
//!
//! ```text
//! ImageElement[] ──▶ layout::place ──▶ labels / axes ──▶ CompositeDocument
//!                                                          │
//!                                        ┌─────────────────┴─────────────┐
//!                                   raster::encode_png          drawio::to_xml
//! ```

pub mod decorate;
pub mod drawio;
pub mod element;
pub mod font;
pub mod labels;
pub mod layout;
pub mod raster;

use crate::color::Color;
use crate::error::ScienceHelperError;
use decorate::{AxisGeometry, AxisSpec, LabelStyle};
use font::FontSpec;
use element::ImageElement;
use layout::{Placement, Rect};
use std::path::Path;
use std::str::FromStr;

/// One image together with everything computed for it.
#[derive(Debug, Clone)]
pub struct PlacedImage {
    pub(crate) element: ImageElement,
    pub(crate) placement: Placement,
    pub(crate) label: Option<String>,
    pub(crate) label_box: Option<Rect>,
    pub(crate) axes: Option<AxisGeometry>,
}

impl PlacedImage {
    pub fn element(&self) -> &ImageElement {
        &self.element
    }

    pub fn placement(&self) -> Placement {
        self.placement
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn label_box(&self) -> Option<Rect> {
        self.label_box
    }

    pub fn axes(&self) -> Option<&AxisGeometry> {
        self.axes.as_ref()
    }
}

/// The in-memory result of a composition, consumed by the exporters.
///
/// Built by [`crate::compose::compose`]; read-only afterwards.
#[derive(Debug, Clone)]
pub struct CompositeDocument {
    width: u32,
    height: u32,
    background: Color,
    border_color: Color,
    images: Vec<PlacedImage>,
    label_style: Option<LabelStyle>,
    axis_spec: Option<AxisSpec>,
    font: FontSpec,
}

impl CompositeDocument {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        (width, height): (u32, u32),
        background: Color,
        border_color: Color,
        images: Vec<PlacedImage>,
        label_style: Option<LabelStyle>,
        axis_spec: Option<AxisSpec>,
        font: FontSpec,
    ) -> Self {
        Self {
            width,
            height,
            background,
            border_color,
            images,
            label_style,
            axis_spec,
            font,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn background(&self) -> Color {
        self.background
    }

    pub fn border_color(&self) -> Color {
        self.border_color
    }

    pub fn images(&self) -> &[PlacedImage] {
        &self.images
    }

    pub fn label_style(&self) -> Option<&LabelStyle> {
        self.label_style.as_ref()
    }

    pub fn axis_spec(&self) -> Option<&AxisSpec> {
        self.axis_spec.as_ref()
    }

    pub fn font(&self) -> &FontSpec {
        &self.font
    }

    /// Labels in placement order (`None` for unlabeled images).
    pub fn labels(&self) -> Vec<Option<&str>> {
        self.images.iter().map(|p| p.label()).collect()
    }
}

/// Output format of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// PNG raster.
    Png,
    /// draw.io (mxGraph) XML.
    Drawio,
}

impl ExportFormat {
    /// Pick the format from a file extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ScienceHelperError> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| ScienceHelperError::UnsupportedFormat(path.display().to_string()))?;
        ext.parse()
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Drawio => "drawio",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ScienceHelperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(ExportFormat::Png),
            "drawio" | "xml" => Ok(ExportFormat::Drawio),
            other => Err(ScienceHelperError::UnsupportedFormat(other.to_string())),
        }
    }
}
