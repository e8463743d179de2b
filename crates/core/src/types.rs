//! Domain types describing the content of a source page.
//!
//! All coordinates are in PDF points (1/72 inch) with a top-left origin,
//! which is what [`DocumentSource`](crate::source::DocumentSource)
//! implementations must produce.

use serde::{Deserialize, Serialize};

/// Width and height of a source page, in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub width: f64,
    pub height: f64,
}

impl PageGeometry {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// US Letter, portrait.
    pub fn letter() -> Self {
        Self::new(612.0, 792.0)
    }
}

/// An axis-aligned rectangle in page space.
///
/// Produced by the document source as-is, so it may be degenerate
/// (zero or negative extent, non-finite coordinates). Consumers decide
/// whether to reject or repair it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

/// Where one instance of an embedded image is drawn on a page.
pub type PlacementRect = Rect;

impl Rect {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Build a rectangle from its top-left corner and size.
    pub fn from_origin_size(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    /// True when every coordinate is a finite number.
    pub fn is_finite(&self) -> bool {
        self.x0.is_finite() && self.y0.is_finite() && self.x1.is_finite() && self.y1.is_finite()
    }

    /// Smallest rectangle containing both.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

/// Opaque handle to an embedded raster asset.
///
/// `id` identifies the asset within the document; the same id may be drawn
/// several times on a page. `page` records where the reference was
/// enumerated so the source can resolve it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageReference {
    pub page: usize,
    pub id: u64,
}

impl ImageReference {
    pub fn new(page: usize, id: u64) -> Self {
        Self { page, id }
    }
}

/// Whether a block carries text or an inline image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockKind {
    Text,
    Image,
}

/// A positioned group of text lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub kind: BlockKind,
    pub bbox: Rect,
    pub lines: Vec<TextLine>,
}

impl TextBlock {
    /// Create an empty text block with the given bounding box.
    pub fn new(bbox: Rect) -> Self {
        Self {
            kind: BlockKind::Text,
            bbox,
            lines: Vec::new(),
        }
    }

    /// Builder: append a line.
    pub fn with_line(mut self, line: TextLine) -> Self {
        self.lines.push(line);
        self
    }

    pub fn is_text(&self) -> bool {
        self.kind == BlockKind::Text
    }

    /// Concatenated text of the block, one line per row.
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(TextLine::text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A row of spans inside a block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextLine {
    pub bbox: Option<Rect>,
    pub spans: Vec<TextSpan>,
}

impl TextLine {
    pub fn new(spans: Vec<TextSpan>) -> Self {
        Self { bbox: None, spans }
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }
}

/// A run of text sharing one set of formatting attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSpan {
    pub text: String,
    /// Font size in points; `None` when the source did not report one.
    pub size: Option<f64>,
    /// Packed 24-bit sRGB color (`0xRRGGBB`).
    pub color: u32,
    pub flags: SpanFlags,
    /// Font family reported by the source. Informational only.
    pub font: String,
    pub bbox: Option<Rect>,
}

impl TextSpan {
    /// Create a span with default styling: 12pt, black, no flags.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            size: Some(12.0),
            color: 0x000000,
            flags: SpanFlags::default(),
            font: String::new(),
            bbox: None,
        }
    }

    pub fn with_size(mut self, size: f64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_color(mut self, color: u32) -> Self {
        self.color = color;
        self
    }

    pub fn with_flags(mut self, flags: SpanFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_font(mut self, font: impl Into<String>) -> Self {
        self.font = font.into();
        self
    }
}

/// Style bit field attached to a span.
///
/// Only bit 0 (superscript), bit 1 (italic) and bit 4 (bold) carry meaning;
/// every other bit is preserved but ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpanFlags(pub u32);

impl SpanFlags {
    pub const SUPERSCRIPT: u32 = 1 << 0;
    pub const ITALIC: u32 = 1 << 1;
    pub const BOLD: u32 = 1 << 4;

    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Compose flags from decoded font attributes.
    pub fn from_style(bold: bool, italic: bool, superscript: bool) -> Self {
        let mut bits = 0;
        if bold {
            bits |= Self::BOLD;
        }
        if italic {
            bits |= Self::ITALIC;
        }
        if superscript {
            bits |= Self::SUPERSCRIPT;
        }
        Self(bits)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn is_bold(self) -> bool {
        self.0 & Self::BOLD != 0
    }

    pub fn is_italic(self) -> bool {
        self.0 & Self::ITALIC != 0
    }

    pub fn is_superscript(self) -> bool {
        self.0 & Self::SUPERSCRIPT != 0
    }
}
