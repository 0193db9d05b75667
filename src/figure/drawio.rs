//! draw.io (mxGraph) export.
//!
//! Document skeleton:
//!
//! ```text
//! mxfile
//! └─ diagram
//!    └─ mxGraphModel
//!       └─ root
//!          ├─ mxCell id=0
//!          ├─ mxCell id=1 parent=0           (default layer)
//!          ├─ mxCell id=img-1  shape=image   (one per placement, PNG embedded)
//!          │  ├─ mxCell id=img-1-label       (label box, relative geometry)
//!          │  ├─ mxCell id=img-1-axis-1 …    (axis lines and ticks)
//!          │  ├─ mxCell id=img-1-arrow-1 …
//!          │  └─ mxCell id=img-1-text-1 …    (tick labels, axis titles)
//!          └─ …
//! ```
//!
//! Only vertices are emitted; the diagram has no edges. Ids are derived from
//! the placement ordinal, so the same document always serialises to the same
//! XML.

use crate::error::ScienceHelperError;
use crate::figure::decorate::{Arrow, Direction, TextMark};
use crate::figure::layout::Rect;
use crate::figure::raster::png_base64;
use crate::figure::{CompositeDocument, PlacedImage};
use image::imageops::{self, FilterType};
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use tracing::debug;

const HOST: &str = "science-helper";
const IMAGE_STYLE: &str = "shape=image;verticalLabelPosition=bottom;labelBackgroundColor=default;\
verticalAlign=top;aspect=fixed;imageAspect=0;";
const TEXT_STYLE: &str = "text;html=1;align=left;verticalAlign=middle;resizable=0;points=[];\
autosize=1;strokeColor=none;fillColor=none;";

fn xml_err(e: impl std::fmt::Display) -> ScienceHelperError {
    ScienceHelperError::Internal(format!("draw.io serialisation failed: {e}"))
}

/// Geometry of a cell, relative to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellGeometry {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

struct DiagramWriter {
    writer: Writer<Vec<u8>>,
}

impl DiagramWriter {
    fn new() -> Self {
        Self {
            writer: Writer::new_with_indent(Vec::new(), b' ', 2),
        }
    }

    fn open(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), ScienceHelperError> {
        let start = BytesStart::new(name).with_attributes(attrs.iter().copied());
        self.writer.write_event(Event::Start(start)).map_err(xml_err)
    }

    fn close(&mut self, name: &str) -> Result<(), ScienceHelperError> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_err)
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), ScienceHelperError> {
        let start = BytesStart::new(name).with_attributes(attrs.iter().copied());
        self.writer.write_event(Event::Empty(start)).map_err(xml_err)
    }

    /// A vertex cell with its geometry.
    fn vertex(
        &mut self,
        id: &str,
        parent: &str,
        value: &str,
        style: &str,
        g: CellGeometry,
    ) -> Result<(), ScienceHelperError> {
        self.open(
            "mxCell",
            &[
                ("id", id),
                ("value", value),
                ("style", style),
                ("vertex", "1"),
                ("parent", parent),
            ],
        )?;
        let (x, y, w, h) = (g.x.to_string(), g.y.to_string(), g.width.to_string(), g.height.to_string());
        self.empty(
            "mxGeometry",
            &[("x", &x), ("y", &y), ("width", &w), ("height", &h), ("as", "geometry")],
        )?;
        self.close("mxCell")
    }

    fn finish(self) -> String {
        String::from_utf8_lossy(&self.writer.into_inner()).into_owned()
    }
}

/// Serialise the document as a draw.io file.
pub fn to_xml(doc: &CompositeDocument) -> Result<String, ScienceHelperError> {
    let mut w = DiagramWriter::new();
    let (width, height) = (doc.width().to_string(), doc.height().to_string());
    let background = doc.background().hex_rgb();
    let agent = format!("{HOST} {}", env!("CARGO_PKG_VERSION"));

    w.open("mxfile", &[("host", HOST), ("agent", &agent)])?;
    w.open("diagram", &[("name", "Figure"), ("id", "figure-1")])?;
    w.open(
        "mxGraphModel",
        &[
            ("dx", &width),
            ("dy", &height),
            ("grid", "1"),
            ("gridSize", "10"),
            ("guides", "1"),
            ("tooltips", "1"),
            ("connect", "1"),
            ("arrows", "1"),
            ("fold", "1"),
            ("page", "1"),
            ("pageScale", "1"),
            ("pageWidth", &width),
            ("pageHeight", &height),
            ("background", &background),
            ("math", "0"),
            ("shadow", "0"),
        ],
    )?;
    w.open("root", &[])?;
    w.empty("mxCell", &[("id", "0")])?;
    w.empty("mxCell", &[("id", "1"), ("parent", "0")])?;

    for (i, placed) in doc.images().iter().enumerate() {
        write_image(&mut w, doc, placed, i + 1)?;
    }

    w.close("root")?;
    w.close("mxGraphModel")?;
    w.close("diagram")?;
    w.close("mxfile")?;

    let xml = w.finish();
    debug!("Serialised draw.io document → {} bytes", xml.len());
    Ok(xml)
}

fn write_image(
    w: &mut DiagramWriter,
    doc: &CompositeDocument,
    placed: &PlacedImage,
    ordinal: usize,
) -> Result<(), ScienceHelperError> {
    let placement = placed.placement();
    let outer = placement.outer;
    let content = placement.content();

    let pixels = placed.element().pixels();
    let b64 = if pixels.dimensions() == (content.width, content.height) {
        png_base64(pixels)?
    } else {
        png_base64(&imageops::resize(
            pixels,
            content.width,
            content.height,
            FilterType::Lanczos3,
        ))?
    };

    let mut style = format!("{IMAGE_STYLE}image=data:image/png,{b64};");
    if placement.border > 0 {
        style.push_str(&format!(
            "imageBorder={};strokeWidth={};",
            doc.border_color().hex_rgb(),
            placement.border
        ));
    }

    let id = format!("img-{ordinal}");
    w.vertex(&id, "1", "", &style, absolute(outer))?;

    let font_family = font_family(doc);

    if let (Some(label_style), Some(rect), Some(text)) =
        (doc.label_style(), placed.label_box(), placed.label())
    {
        let value = format!(
            "<font face=\"{}\" style=\"color: {};\">{}</font>",
            font_family,
            label_style.text_color.hex_rgb(),
            html_escape(text)
        );
        let style = format!(
            "rounded=0;whiteSpace=wrap;html=1;strokeColor=none;fillColor={};fontSize={};",
            label_style.box_color.hex_rgb(),
            label_style.font_px.round() as u32
        );
        w.vertex(&format!("{id}-label"), &id, &value, &style, relative(rect, outer))?;
    }

    if let (Some(spec), Some(geometry)) = (doc.axis_spec(), placed.axes()) {
        let fill = spec.color.hex_rgb();
        let bar_style = format!("rounded=0;html=1;strokeColor=none;fillColor={fill};");
        for (k, bar) in geometry.bars().iter().enumerate() {
            let g = CellGeometry {
                x: bar.x as i64 - outer.x as i64,
                y: bar.y as i64 - outer.y as i64,
                width: bar.width,
                height: bar.height,
            };
            w.vertex(&format!("{id}-axis-{}", k + 1), &id, "", &bar_style, g)?;
        }
        for (k, arrow) in geometry.arrows().iter().enumerate() {
            let style = arrow_style(arrow, &fill);
            let (x, y, aw, ah) = arrow.bounds();
            let g = CellGeometry {
                x: x as i64 - outer.x as i64,
                y: y as i64 - outer.y as i64,
                width: aw,
                height: ah,
            };
            w.vertex(&format!("{id}-arrow-{}", k + 1), &id, "", &style, g)?;
        }
        let text_style = format!(
            "{TEXT_STYLE}fontFamily={font_family};fontColor={fill};fontSize={};",
            spec.font_px.round() as u32
        );
        for (k, mark) in geometry.texts().iter().enumerate() {
            let g = text_geometry(mark, spec.font_px, outer);
            w.vertex(
                &format!("{id}-text-{}", k + 1),
                &id,
                &html_escape(&mark.text),
                &text_style,
                g,
            )?;
        }
    }
    Ok(())
}

fn arrow_style(arrow: &Arrow, fill: &str) -> String {
    let direction = match arrow.direction {
        Direction::East => "east",
        Direction::North => "north",
    };
    format!("triangle;whiteSpace=wrap;html=1;strokeColor=none;fillColor={fill};direction={direction};")
}

/// draw.io autosizes text cells; this only needs to be a sensible start.
fn text_geometry(mark: &TextMark, font_px: f32, parent: Rect) -> CellGeometry {
    let w = (mark.text.chars().count() as f32 * font_px * 0.6).ceil() as u32 + 4;
    let h = (font_px * 1.4).ceil() as u32;
    let (x, y) = mark.top_left((w, h));
    CellGeometry {
        x: x as i64 - parent.x as i64,
        y: y as i64 - parent.y as i64,
        width: w,
        height: h,
    }
}

fn absolute(r: Rect) -> CellGeometry {
    CellGeometry {
        x: r.x as i64,
        y: r.y as i64,
        width: r.width,
        height: r.height,
    }
}

fn relative(r: Rect, parent: Rect) -> CellGeometry {
    CellGeometry {
        x: r.x as i64 - parent.x as i64,
        y: r.y as i64 - parent.y as i64,
        width: r.width,
        height: r.height,
    }
}

fn font_family(doc: &CompositeDocument) -> String {
    let spec = doc.font();
    spec.path
        .as_ref()
        .and_then(|p| p.file_stem())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| spec.family.clone())
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

// ── Reading ──────────────────────────────────────────────────────────────

/// An image vertex found in a draw.io document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageCell {
    pub id: String,
    pub geometry: CellGeometry,
}

/// Collect every `shape=image` vertex of a draw.io document, in order.
pub fn image_cells(xml: &str) -> Result<Vec<ImageCell>, ScienceHelperError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let parse_err = |e: quick_xml::Error| ScienceHelperError::ParseError(format!("draw.io XML: {e}"));
    let mut cells = Vec::new();
    let mut current: Option<String> = None;

    loop {
        match reader.read_event().map_err(parse_err)? {
            Event::Start(e) if e.name().as_ref() == b"mxCell" => {
                let mut id = None;
                let mut is_image = false;
                for attr in e.attributes().flatten() {
                    let value = attr.unescape_value().map_err(parse_err)?;
                    match attr.key.as_ref() {
                        b"id" => id = Some(value.into_owned()),
                        b"style" => is_image = value.starts_with("shape=image;"),
                        _ => {}
                    }
                }
                current = if is_image { id } else { None };
            }
            Event::Empty(e) if e.name().as_ref() == b"mxGeometry" => {
                if let Some(id) = current.take() {
                    let mut g = CellGeometry {
                        x: 0,
                        y: 0,
                        width: 0,
                        height: 0,
                    };
                    for attr in e.attributes().flatten() {
                        let value = attr.unescape_value().map_err(parse_err)?;
                        let num = || value.parse::<i64>().unwrap_or(0);
                        match attr.key.as_ref() {
                            b"x" => g.x = num(),
                            b"y" => g.y = num(),
                            b"width" => g.width = num().max(0) as u32,
                            b"height" => g.height = num().max(0) as u32,
                            _ => {}
                        }
                    }
                    cells.push(ImageCell { id, geometry: g });
                }
            }
            Event::End(e) if e.name().as_ref() == b"mxCell" => current = None,
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(cells)
}
