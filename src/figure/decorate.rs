//! Image labels and coordinate axes.
//!
//! Geometry is computed once, in canvas coordinates, as plain bars, arrow
//! heads and text marks ([`AxisGeometry`], [`label_box`]). The raster
//! exporter paints those shapes with imageproc; the draw.io exporter turns
//! the very same shapes into mxGraph cells, so both outputs agree.

use crate::color::Color;
use crate::error::ScienceHelperError;
use crate::figure::font::LabelFont;
use crate::figure::labels::LabelScheme;
use crate::figure::layout::Rect;
use image::RgbaImage;
use imageproc::drawing::{draw_filled_rect_mut, draw_polygon_mut};
use imageproc::point::Point;
use imageproc::rect::Rect as PixelRect;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How far (in pixels) tick marks and tick-label anchors may reach outside
/// the image content box.
pub const AXIS_MARGIN: u32 = 24;

// ── Image labels ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Corner {
    #[default]
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl FromStr for Corner {
    type Err = ScienceHelperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "top-left" => Ok(Corner::TopLeft),
            "top-right" => Ok(Corner::TopRight),
            "bottom-left" => Ok(Corner::BottomLeft),
            "bottom-right" => Ok(Corner::BottomRight),
            other => Err(ScienceHelperError::InvalidConfig(format!(
                "unknown corner '{other}'"
            ))),
        }
    }
}

impl fmt::Display for Corner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Corner::TopLeft => "top-left",
            Corner::TopRight => "top-right",
            Corner::BottomLeft => "bottom-left",
            Corner::BottomRight => "bottom-right",
        })
    }
}

/// Appearance of the per-image label ("signature") box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelStyle {
    pub scheme: LabelScheme,
    pub corner: Corner,
    /// Gap between the content edge and the box. Default: 0.
    pub offset: u32,
    /// Box size in pixels. Default: 40×40.
    pub box_width: u32,
    pub box_height: u32,
    /// Default: white.
    pub box_color: Color,
    /// Default: black.
    pub text_color: Color,
    /// Default: 24.
    pub font_px: f32,
}

impl Default for LabelStyle {
    fn default() -> Self {
        Self {
            scheme: LabelScheme::LatinUpper,
            corner: Corner::TopLeft,
            offset: 0,
            box_width: 40,
            box_height: 40,
            box_color: Color::WHITE,
            text_color: Color::BLACK,
            font_px: 24.0,
        }
    }
}

/// The label box for an image whose content occupies `content`.
///
/// The box is clamped to the content size so it never spills onto a
/// neighbouring image.
pub fn label_box(content: Rect, style: &LabelStyle) -> Rect {
    let w = style.box_width.min(content.width);
    let h = style.box_height.min(content.height);
    let off_x = style.offset.min(content.width - w);
    let off_y = style.offset.min(content.height - h);
    let (x, y) = match style.corner {
        Corner::TopLeft => (content.x + off_x, content.y + off_y),
        Corner::TopRight => (content.right() - off_x - w, content.y + off_y),
        Corner::BottomLeft => (content.x + off_x, content.bottom() - off_y - h),
        Corner::BottomRight => (content.right() - off_x - w, content.bottom() - off_y - h),
    };
    Rect::new(x, y, w, h)
}

// ── Axes ─────────────────────────────────────────────────────────────────

/// Axis decoration drawn over an image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisSpec {
    /// Ticks per axis. Default: 5.
    pub ticks: usize,
    /// Inset of the origin from the bottom-left content corner. Default: 20.
    pub origin_offset: u32,
    /// Gap between a tick and its label. Default: 4.
    pub label_offset: u32,
    /// Tick mark length, drawn outward. Default: 6.
    pub tick_length: u32,
    /// Axis length; `None` spans the content box. Default: `None`.
    pub length: Option<u32>,
    /// Scheme for tick labels. Default: Arabic numerals.
    pub tick_labels: LabelScheme,
    pub x_title: String,
    pub y_title: String,
    /// Stroke width. Default: 3.
    pub width: u32,
    /// Default: 14.
    pub font_px: f32,
    /// Default: black.
    pub color: Color,
}

impl Default for AxisSpec {
    fn default() -> Self {
        Self {
            ticks: 5,
            origin_offset: 20,
            label_offset: 4,
            tick_length: 6,
            length: None,
            tick_labels: LabelScheme::Arabic,
            x_title: "X".into(),
            y_title: "Y".into(),
            width: 3,
            font_px: 14.0,
            color: Color::BLACK,
        }
    }
}

/// A filled axis-aligned rectangle (axis line or tick mark).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bar {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    East,
    North,
}

/// Triangular arrow head with its tip at `tip`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arrow {
    pub tip: (i32, i32),
    pub direction: Direction,
    pub size: u32,
}

impl Arrow {
    /// Bounding box `(x, y, w, h)` of the triangle.
    pub fn bounds(&self) -> (i32, i32, u32, u32) {
        let s = self.size as i32;
        let (tx, ty) = self.tip;
        match self.direction {
            Direction::East => (tx - s, ty - s / 2, self.size, self.size),
            Direction::North => (tx - s / 2, ty, self.size, self.size),
        }
    }

    fn polygon(&self) -> [Point<i32>; 3] {
        let (x, y, w, h) = self.bounds();
        let (w, h) = (w as i32, h as i32);
        match self.direction {
            Direction::East => [
                Point::new(x, y),
                Point::new(x + w, y + h / 2),
                Point::new(x, y + h),
            ],
            Direction::North => [
                Point::new(x, y + h),
                Point::new(x + w / 2, y),
                Point::new(x + w, y + h),
            ],
        }
    }
}

/// Which point of a text's bounding box sits at the mark position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    TopLeft,
    TopCenter,
    MiddleRight,
    BottomRight,
}

/// A piece of text positioned relative to an anchor point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextMark {
    pub x: i32,
    pub y: i32,
    pub anchor: Anchor,
    pub text: String,
}

impl TextMark {
    /// Top-left corner of a `(w, h)` text box anchored at this mark.
    pub fn top_left(&self, (w, h): (u32, u32)) -> (i32, i32) {
        let (w, h) = (w as i32, h as i32);
        match self.anchor {
            Anchor::TopLeft => (self.x, self.y),
            Anchor::TopCenter => (self.x - w / 2, self.y),
            Anchor::MiddleRight => (self.x - w, self.y - h / 2),
            Anchor::BottomRight => (self.x - w, self.y - h),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// Coordinate along the axis (x for the X axis, y for the Y axis).
    pub at: i32,
}

/// Concrete axis geometry for one image.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisGeometry {
    pub origin: (i32, i32),
    pub x_end: i32,
    pub y_end: i32,
    pub width: u32,
    pub tick_length: u32,
    pub label_offset: u32,
    pub x_ticks: Vec<(Tick, String)>,
    pub y_ticks: Vec<(Tick, String)>,
    pub x_title: String,
    pub y_title: String,
}

impl AxisGeometry {
    /// Lay out axes over the image content box `content`.
    ///
    /// The origin offset is clamped to half the smaller content side, the
    /// tick length and label offset to half of [`AXIS_MARGIN`] each, so every
    /// tick and tick-label anchor stays within `content` grown by
    /// [`AXIS_MARGIN`].
    ///
    /// # Errors
    /// Propagates label-sequence errors (Roman range, custom length).
    pub fn compute(content: Rect, spec: &AxisSpec) -> Result<Self, ScienceHelperError> {
        let off = spec.origin_offset.min(content.width.min(content.height) / 2);
        let tick_length = spec.tick_length.min(AXIS_MARGIN / 2);
        let label_offset = spec.label_offset.min(AXIS_MARGIN / 2);

        let ox = (content.x + off) as i32;
        let oy = (content.bottom() - off) as i32;
        let span_x = content.width - 2 * off;
        let span_y = content.height - 2 * off;
        let len_x = spec.length.map_or(span_x, |l| l.min(span_x)) as i32;
        let len_y = spec.length.map_or(span_y, |l| l.min(span_y)) as i32;

        let n = spec.ticks;
        let x_labels = spec.tick_labels.sequence(n)?;
        let y_labels = spec.tick_labels.sequence(n)?;
        let step = |len: i32, i: usize| (len as i64 * i as i64 / n as i64) as i32;

        let x_ticks = x_labels
            .enumerate()
            .map(|(i, label)| (Tick { at: ox + step(len_x, i + 1) }, label))
            .collect();
        let y_ticks = y_labels
            .enumerate()
            .map(|(i, label)| (Tick { at: oy - step(len_y, i + 1) }, label))
            .collect();

        Ok(Self {
            origin: (ox, oy),
            x_end: ox + len_x,
            y_end: oy - len_y,
            width: spec.width.max(1),
            tick_length,
            label_offset,
            x_ticks,
            y_ticks,
            x_title: spec.x_title.clone(),
            y_title: spec.y_title.clone(),
        })
    }

    /// Axis lines followed by tick marks.
    pub fn bars(&self) -> Vec<Bar> {
        let (ox, oy) = self.origin;
        let w = self.width;
        let half = (w / 2) as i32;
        let mut bars = vec![
            Bar {
                x: ox - half,
                y: oy - half,
                width: (self.x_end - ox) as u32 + w,
                height: w,
            },
            Bar {
                x: ox - half,
                y: self.y_end,
                width: w,
                height: (oy - self.y_end) as u32 + w - half as u32,
            },
        ];
        if self.tick_length > 0 {
            let tw = (w / 2).max(1);
            let th = (tw / 2) as i32;
            bars.extend(self.x_ticks.iter().map(|(t, _)| Bar {
                x: t.at - th,
                y: oy,
                width: tw,
                height: self.tick_length,
            }));
            bars.extend(self.y_ticks.iter().map(|(t, _)| Bar {
                x: ox - self.tick_length as i32,
                y: t.at - th,
                width: self.tick_length,
                height: tw,
            }));
        }
        bars
    }

    /// Arrow heads at the far end of both axes.
    pub fn arrows(&self) -> [Arrow; 2] {
        let size = self.width * 3 + 3;
        [
            Arrow {
                tip: (self.x_end + size as i32 / 2, self.origin.1),
                direction: Direction::East,
                size,
            },
            Arrow {
                tip: (self.origin.0, self.y_end - size as i32 / 2),
                direction: Direction::North,
                size,
            },
        ]
    }

    /// Tick labels followed by the two axis titles.
    pub fn texts(&self) -> Vec<TextMark> {
        let (ox, oy) = self.origin;
        let reach = (self.tick_length + self.label_offset) as i32;
        let mut marks: Vec<TextMark> = self
            .x_ticks
            .iter()
            .map(|(t, label)| TextMark {
                x: t.at,
                y: oy + reach,
                anchor: Anchor::TopCenter,
                text: label.clone(),
            })
            .collect();
        marks.extend(self.y_ticks.iter().map(|(t, label)| TextMark {
            x: ox - reach,
            y: t.at,
            anchor: Anchor::MiddleRight,
            text: label.clone(),
        }));

        let gap = self.label_offset as i32 + self.width as i32;
        if !self.x_title.is_empty() {
            marks.push(TextMark {
                x: self.x_end,
                y: oy - gap,
                anchor: Anchor::BottomRight,
                text: self.x_title.clone(),
            });
        }
        if !self.y_title.is_empty() {
            marks.push(TextMark {
                x: ox + gap,
                y: self.y_end,
                anchor: Anchor::TopLeft,
                text: self.y_title.clone(),
            });
        }
        marks
    }
}

// ── Raster painting ──────────────────────────────────────────────────────

/// Paint a label box and its centered text.
pub fn paint_label(img: &mut RgbaImage, rect: Rect, text: &str, style: &LabelStyle, font: &LabelFont) {
    if rect.width == 0 || rect.height == 0 {
        return;
    }
    let pixel_rect = PixelRect::at(rect.x as i32, rect.y as i32).of_size(rect.width, rect.height);
    draw_filled_rect_mut(img, pixel_rect, style.box_color.to_rgba());
    font.draw_centered(
        img,
        text,
        (rect.x as i32, rect.y as i32, rect.width, rect.height),
        style.font_px,
        style.text_color.to_rgba(),
    );
}

/// Paint axes, ticks, arrow heads and all axis text.
pub fn paint_axes(img: &mut RgbaImage, geometry: &AxisGeometry, spec: &AxisSpec, font: &LabelFont) {
    let color = spec.color.to_rgba();
    for bar in geometry.bars() {
        if bar.width > 0 && bar.height > 0 {
            draw_filled_rect_mut(img, PixelRect::at(bar.x, bar.y).of_size(bar.width, bar.height), color);
        }
    }
    for arrow in geometry.arrows() {
        draw_polygon_mut(img, &arrow.polygon(), color);
    }
    for mark in geometry.texts() {
        let (x, y) = mark.top_left(font.measure(&mark.text, spec.font_px));
        font.draw(img, &mark.text, x, y, spec.font_px, color);
    }
}
