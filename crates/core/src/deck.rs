//! In-memory model of the destination slide deck.
//!
//! The deck is a strict tree: a [`Deck`] owns its [`Slide`]s, a slide owns
//! its [`Shape`]s. Collections are append-only and insertion order is
//! z-order. All lengths are EMUs.

use serde::Serialize;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::normalize::NormalizedImage;

/// Smallest font size a run may carry, in points.
pub const MIN_FONT_SIZE: f64 = 1.0;

/// Largest font size a run may carry, in points.
pub const MAX_FONT_SIZE: f64 = 4000.0;

/// A slide deck being assembled.
#[derive(Debug, Clone)]
pub struct Deck {
    width: i64,
    height: i64,
    canvas_fixed: bool,
    slides: Vec<Slide>,
}

impl Deck {
    /// Canvas width used when no page sets one (10 in).
    pub const DEFAULT_WIDTH: i64 = 9_144_000;
    /// Canvas height used when no page sets one (7.5 in).
    pub const DEFAULT_HEIGHT: i64 = 6_858_000;

    /// Create an empty deck with the default 4:3 canvas.
    pub fn new() -> Self {
        Self {
            width: Self::DEFAULT_WIDTH,
            height: Self::DEFAULT_HEIGHT,
            canvas_fixed: false,
            slides: Vec::new(),
        }
    }

    /// Fix the canvas size. Allowed once, and only before the first slide.
    pub fn set_canvas(&mut self, width: i64, height: i64) -> Result<()> {
        if self.canvas_fixed {
            return Err(Error::Deck("canvas size already set".to_string()));
        }
        if !self.slides.is_empty() {
            return Err(Error::Deck(
                "canvas size must be set before adding slides".to_string(),
            ));
        }
        if width <= 0 || height <= 0 {
            return Err(Error::Deck(format!(
                "canvas size must be positive, got {}x{}",
                width, height
            )));
        }

        self.width = width;
        self.height = height;
        self.canvas_fixed = true;
        Ok(())
    }

    pub fn width(&self) -> i64 {
        self.width
    }

    pub fn height(&self) -> i64 {
        self.height
    }

    /// Append a blank slide and return it.
    pub fn add_slide(&mut self) -> &mut Slide {
        let index = self.slides.len();
        self.slides.push(Slide::default());
        &mut self.slides[index]
    }

    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }

    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }
}

impl Default for Deck {
    fn default() -> Self {
        Self::new()
    }
}

/// Position and size of a shape. Width and height are always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Frame {
    x: i64,
    y: i64,
    cx: i64,
    cy: i64,
}

impl Frame {
    /// Returns `None` when `cx` or `cy` is not strictly positive.
    pub fn new(x: i64, y: i64, cx: i64, cy: i64) -> Option<Self> {
        (cx > 0 && cy > 0).then_some(Self { x, y, cx, cy })
    }

    pub fn x(&self) -> i64 {
        self.x
    }

    pub fn y(&self) -> i64 {
        self.y
    }

    pub fn cx(&self) -> i64 {
        self.cx
    }

    pub fn cy(&self) -> i64 {
        self.cy
    }
}

/// A slide: shapes in z-order.
#[derive(Debug, Clone, Default)]
pub struct Slide {
    shapes: Vec<Shape>,
}

impl Slide {
    /// Place an image. Several pictures may share one payload.
    pub fn add_picture(&mut self, image: Arc<NormalizedImage>, frame: Frame) -> &mut Picture {
        let index = self.shapes.len();
        self.shapes.push(Shape::Picture(Picture { image, frame }));
        match &mut self.shapes[index] {
            Shape::Picture(picture) => picture,
            Shape::TextBox(_) => unreachable!("just pushed a picture"),
        }
    }

    /// Add an empty, word-wrapped text box.
    pub fn add_text_box(&mut self, frame: Frame) -> &mut TextBox {
        let index = self.shapes.len();
        self.shapes.push(Shape::TextBox(TextBox::new(frame)));
        match &mut self.shapes[index] {
            Shape::TextBox(text_box) => text_box,
            Shape::Picture(_) => unreachable!("just pushed a text box"),
        }
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn pictures(&self) -> impl Iterator<Item = &Picture> {
        self.shapes.iter().filter_map(|s| match s {
            Shape::Picture(p) => Some(p),
            Shape::TextBox(_) => None,
        })
    }

    pub fn text_boxes(&self) -> impl Iterator<Item = &TextBox> {
        self.shapes.iter().filter_map(|s| match s {
            Shape::TextBox(t) => Some(t),
            Shape::Picture(_) => None,
        })
    }
}

/// Anything that can be drawn on a slide.
#[derive(Debug, Clone)]
pub enum Shape {
    Picture(Picture),
    TextBox(TextBox),
}

impl Shape {
    pub fn frame(&self) -> Frame {
        match self {
            Shape::Picture(p) => p.frame,
            Shape::TextBox(t) => t.frame,
        }
    }
}

/// A placed image.
#[derive(Debug, Clone)]
pub struct Picture {
    pub image: Arc<NormalizedImage>,
    pub frame: Frame,
}

/// A text box holding paragraphs of styled runs.
#[derive(Debug, Clone)]
pub struct TextBox {
    pub frame: Frame,
    pub word_wrap: bool,
    paragraphs: Vec<Paragraph>,
}

impl TextBox {
    fn new(frame: Frame) -> Self {
        Self {
            frame,
            word_wrap: true,
            paragraphs: Vec::new(),
        }
    }

    pub fn add_paragraph(&mut self) -> &mut Paragraph {
        let index = self.paragraphs.len();
        self.paragraphs.push(Paragraph::default());
        &mut self.paragraphs[index]
    }

    pub fn paragraphs(&self) -> &[Paragraph] {
        &self.paragraphs
    }

    /// Text of all paragraphs joined with newlines.
    pub fn text(&self) -> String {
        self.paragraphs
            .iter()
            .map(Paragraph::text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// One line of a text box.
#[derive(Debug, Clone, Default)]
pub struct Paragraph {
    runs: Vec<Run>,
}

impl Paragraph {
    /// Append an unstyled run.
    pub fn add_run(&mut self, text: impl Into<String>) -> &mut Run {
        let index = self.runs.len();
        self.runs.push(Run {
            text: text.into(),
            style: None,
        });
        &mut self.runs[index]
    }

    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

/// A run of text. Unstyled runs inherit the theme defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    pub text: String,
    pub style: Option<RunStyle>,
}

/// Character formatting of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunStyle {
    /// Font size in hundredths of a point.
    pub size: u32,
    pub color: Rgb,
    pub bold: bool,
    pub italic: bool,
}

impl RunStyle {
    /// Validate a point size and build the style.
    pub fn new(size_pt: f64, color: Rgb, bold: bool, italic: bool) -> std::result::Result<Self, String> {
        if !size_pt.is_finite() {
            return Err(format!("font size {} is not a number", size_pt));
        }
        if !(MIN_FONT_SIZE..=MAX_FONT_SIZE).contains(&size_pt) {
            return Err(format!(
                "font size {}pt outside {}..={}pt",
                size_pt, MIN_FONT_SIZE, MAX_FONT_SIZE
            ));
        }

        Ok(Self {
            size: (size_pt * 100.0).round() as u32,
            color,
            bold,
            italic,
        })
    }

    /// Font size in points.
    pub fn size_pt(&self) -> f64 {
        self.size as f64 / 100.0
    }
}

/// An sRGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Split a packed `0xRRGGBB` integer. Bits above 23 are ignored.
    pub fn from_packed(packed: u32) -> Self {
        Self {
            r: ((packed >> 16) & 0xFF) as u8,
            g: ((packed >> 8) & 0xFF) as u8,
            b: (packed & 0xFF) as u8,
        }
    }

    /// Upper-case hex string as used by `a:srgbClr`.
    pub fn to_hex(self) -> String {
        format!("{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}
