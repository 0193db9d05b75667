//! Placement of images on a canvas under a [`LayoutPolicy`].
//!
//! The engine only looks at image *sizes*, never at pixels, so it is a pure
//! function of `(sizes, policy)` and trivially deterministic.
//!
//! ```text
//!  row     ┌pad┬────┬pad┬──────┬pad┐      grid   ┌────┬────┐
//!          │   │ A  │   │  B   │   │             │ A  │ B  │
//!          └───┴────┴───┴──────┴───┘             ├────┼────┤
//!   common height, widths follow aspect           │ C  │    │
//!                                                 └────┴────┘
//! ```
//!
//! * **Row**: every image is scaled to the smallest input height.
//! * **Column**: every image is scaled to the smallest input width.
//! * **Grid**: images keep their native size; cells are as large as the
//!   largest image and each image sits in the top-left corner of its cell.
//!
//! Padding is applied between neighbours *and* on every outer side. The
//! per-image border is part of the placement rectangle.

use crate::color::Color;
use crate::error::ScienceHelperError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An axis-aligned rectangle in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Shrink by `by` pixels on every side (saturating).
    pub fn inset(&self, by: u32) -> Rect {
        let w = self.width.saturating_sub(2 * by);
        let h = self.height.saturating_sub(2 * by);
        Rect::new(self.x + by.min(self.width / 2), self.y + by.min(self.height / 2), w, h)
    }
}

/// Where one image ends up on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    /// Outer rectangle, border included.
    pub outer: Rect,
    /// Border width drawn inside `outer`.
    pub border: u32,
}

impl Placement {
    /// The rectangle the image pixels are drawn into.
    pub fn content(&self) -> Rect {
        self.outer.inset(self.border)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutMode {
    #[default]
    Row,
    Column,
    Grid,
}

impl fmt::Display for LayoutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LayoutMode::Row => "row",
            LayoutMode::Column => "column",
            LayoutMode::Grid => "grid",
        })
    }
}

impl FromStr for LayoutMode {
    type Err = ScienceHelperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "row" | "horizontal" => Ok(LayoutMode::Row),
            "column" | "col" | "vertical" => Ok(LayoutMode::Column),
            "grid" => Ok(LayoutMode::Grid),
            other => Err(ScienceHelperError::InvalidConfig(format!(
                "unknown layout mode '{other}'"
            ))),
        }
    }
}

/// Declarative description of how images are arranged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutPolicy {
    pub mode: LayoutMode,
    /// Grid rows. Derived from the image count when `None`.
    pub rows: Option<usize>,
    /// Grid columns. Derived from the image count when `None`.
    pub columns: Option<usize>,
    /// Gap between images and around the outer edge, in pixels. Default: 10.
    pub padding: u32,
    /// Canvas fill color. Default: white.
    pub background: Color,
    /// Border width drawn around every image. Default: 0.
    pub border: u32,
    /// Border color. Default: black.
    pub border_color: Color,
}

impl Default for LayoutPolicy {
    fn default() -> Self {
        Self {
            mode: LayoutMode::Row,
            rows: None,
            columns: None,
            padding: 10,
            background: Color::WHITE,
            border: 0,
            border_color: Color::BLACK,
        }
    }
}

impl LayoutPolicy {
    /// Resolve `(rows, columns)` for `n` images in grid mode.
    ///
    /// Neither given: `columns = ceil(sqrt(n))`, `rows = ceil(n / columns)`.
    /// One given: the other is `ceil(n / given)`.
    pub fn grid_dimensions(&self, n: usize) -> Result<(usize, usize), ScienceHelperError> {
        if self.rows == Some(0) || self.columns == Some(0) {
            return Err(ScienceHelperError::InvalidConfig(
                "grid rows and columns must be at least 1".into(),
            ));
        }
        let dims = match (self.rows, self.columns) {
            (Some(r), Some(c)) => (r, c),
            (Some(r), None) => (r, n.div_ceil(r).max(1)),
            (None, Some(c)) => (n.div_ceil(c).max(1), c),
            (None, None) => {
                let c = ceil_sqrt(n).max(1);
                (n.div_ceil(c).max(1), c)
            }
        };
        // An overflowing product holds any `n`.
        if dims.0.checked_mul(dims.1).is_some_and(|capacity| capacity < n) {
            return Err(ScienceHelperError::InvalidConfig(format!(
                "a {}x{} grid cannot hold {n} images",
                dims.0, dims.1
            )));
        }
        Ok(dims)
    }
}

/// Output of [`place`]: canvas size and one placement per input, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub placements: Vec<Placement>,
    /// Resolved `(rows, columns)` when the mode is grid.
    pub grid: Option<(usize, usize)>,
}

impl Layout {
    pub fn canvas(&self) -> Rect {
        Rect::new(0, 0, self.canvas_width, self.canvas_height)
    }
}

/// Compute placements for images of the given `(width, height)` sizes.
///
/// # Errors
/// [`ScienceHelperError::InvalidConfig`] for an empty input, a zero-sized
/// image, or grid dimensions that cannot hold every image.
pub fn place(sizes: &[(u32, u32)], policy: &LayoutPolicy) -> Result<Layout, ScienceHelperError> {
    if sizes.is_empty() {
        return Err(ScienceHelperError::InvalidConfig(
            "at least one image is required".into(),
        ));
    }
    if let Some(i) = sizes.iter().position(|&(w, h)| w == 0 || h == 0) {
        return Err(ScienceHelperError::InvalidConfig(format!(
            "image {} has a zero dimension",
            i + 1
        )));
    }

    match policy.mode {
        LayoutMode::Row => place_strip(sizes, policy, true),
        LayoutMode::Column => place_strip(sizes, policy, false),
        LayoutMode::Grid => place_grid(sizes, policy),
    }
}

/// Pixel arithmetic that fails with `InvalidConfig` instead of wrapping.
fn px(value: Option<u32>) -> Result<u32, ScienceHelperError> {
    value.ok_or_else(|| {
        ScienceHelperError::InvalidConfig(
            "layout does not fit in the pixel range (padding, border or grid too large)".into(),
        )
    })
}

/// `extent + 2 * border`.
fn bordered(extent: u32, border: u32) -> Result<u32, ScienceHelperError> {
    px(border.checked_mul(2).and_then(|b2| extent.checked_add(b2)))
}

/// Row (`horizontal`) or column strip with a shared cross-axis extent.
fn place_strip(
    sizes: &[(u32, u32)],
    policy: &LayoutPolicy,
    horizontal: bool,
) -> Result<Layout, ScienceHelperError> {
    let pad = policy.padding;
    let b = policy.border;

    let common = sizes
        .iter()
        .map(|&(w, h)| if horizontal { h } else { w })
        .min()
        .unwrap_or(1);
    let common_outer = bordered(common, b)?;

    let mut cursor = pad;
    let mut placements = Vec::with_capacity(sizes.len());
    for &(w, h) in sizes {
        let (along, across) = if horizontal { (w, h) } else { (h, w) };
        let scaled = bordered(scale_extent(along, across, common), b)?;
        let outer = if horizontal {
            Rect::new(cursor, pad, scaled, common_outer)
        } else {
            Rect::new(pad, cursor, common_outer, scaled)
        };
        cursor = px(cursor.checked_add(scaled).and_then(|c| c.checked_add(pad)))?;
        placements.push(Placement { outer, border: b });
    }

    let cross = px(pad.checked_mul(2).and_then(|p2| common_outer.checked_add(p2)))?;
    let (canvas_width, canvas_height) = if horizontal {
        (cursor, cross)
    } else {
        (cross, cursor)
    };

    Ok(Layout {
        canvas_width,
        canvas_height,
        placements,
        grid: None,
    })
}

fn place_grid(sizes: &[(u32, u32)], policy: &LayoutPolicy) -> Result<Layout, ScienceHelperError> {
    let (rows, cols) = policy.grid_dimensions(sizes.len())?;
    let pad = policy.padding;
    let b = policy.border;

    let cell_w = bordered(sizes.iter().map(|s| s.0).max().unwrap_or(1), b)?;
    let cell_h = bordered(sizes.iter().map(|s| s.1).max().unwrap_or(1), b)?;

    // `count * (cell + pad) + pad`; every placement lies below these bounds.
    let extent = |count: usize, cell: u32| -> Result<u32, ScienceHelperError> {
        let count = px(u32::try_from(count).ok())?;
        px(cell
            .checked_add(pad)
            .and_then(|stride| stride.checked_mul(count))
            .and_then(|v| v.checked_add(pad)))
    };
    let canvas_width = extent(cols, cell_w)?;
    let canvas_height = extent(rows, cell_h)?;

    let placements = sizes
        .iter()
        .enumerate()
        .map(|(i, &(w, h))| {
            let (r, c) = ((i / cols) as u32, (i % cols) as u32);
            let x = pad + c * (cell_w + pad);
            let y = pad + r * (cell_h + pad);
            Placement {
                outer: Rect::new(x, y, w + 2 * b, h + 2 * b),
                border: b,
            }
        })
        .collect();

    Ok(Layout {
        canvas_width,
        canvas_height,
        placements,
        grid: Some((rows, cols)),
    })
}

/// `along` scaled by `target / across`, rounded, never below 1.
fn scale_extent(along: u32, across: u32, target: u32) -> u32 {
    if across == target {
        return along;
    }
    let scaled = (along as f64 * target as f64 / across as f64).round() as u32;
    scaled.max(1)
}

fn ceil_sqrt(n: usize) -> usize {
    let mut c = (n as f64).sqrt() as usize;
    while c * c < n {
        c += 1;
    }
    c
}
