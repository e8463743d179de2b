//! Tunable parameters for a conversion run.

use serde::{Deserialize, Serialize};

/// Default rendering resolution for image mode.
pub const DEFAULT_DPI: u32 = 200;

/// Default bound on either side of a re-encoded embedded image, in pixels.
pub const DEFAULT_MAX_IMAGE_DIMENSION: u32 = 2000;

/// Default font size applied to spans that report none, in points.
pub const DEFAULT_FONT_SIZE: f64 = 12.0;

/// Default minimum side of a text box whose bounding box collapsed, in inches.
pub const DEFAULT_MIN_TEXT_BOX_INCHES: f64 = 0.25;

/// Grid used to place images whose on-page position is unknown.
///
/// Slot `i` sits at column `i % columns`, row `i / columns`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackGrid {
    pub columns: usize,
    pub origin_x: f64,
    pub origin_y: f64,
    pub column_step: f64,
    pub row_step: f64,
    /// Height of every placed image; width follows the aspect ratio.
    pub image_height: f64,
}

impl Default for FallbackGrid {
    fn default() -> Self {
        Self {
            columns: 2,
            origin_x: 0.5,
            origin_y: 0.5,
            column_step: 3.0,
            row_step: 3.5,
            image_height: 3.0,
        }
    }
}

impl FallbackGrid {
    /// Top-left corner, in inches, of fallback slot `index`.
    pub fn slot(&self, index: usize) -> (f64, f64) {
        let columns = self.columns.max(1);
        let column = index % columns;
        let row = index / columns;
        (
            self.origin_x + column as f64 * self.column_step,
            self.origin_y + row as f64 * self.row_step,
        )
    }
}

/// Options shared by every conversion mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionOptions {
    /// Rendering resolution for image mode.
    pub dpi: u32,
    /// Longest allowed side of an embedded image after normalization.
    pub max_image_dimension: u32,
    /// Size used for spans without one, in points.
    pub default_font_size: f64,
    /// Floor applied to collapsed text box sides, in inches.
    pub min_text_box: f64,
    pub fallback_grid: FallbackGrid,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_DPI,
            max_image_dimension: DEFAULT_MAX_IMAGE_DIMENSION,
            default_font_size: DEFAULT_FONT_SIZE,
            min_text_box: DEFAULT_MIN_TEXT_BOX_INCHES,
            fallback_grid: FallbackGrid::default(),
        }
    }
}

impl ConversionOptions {
    /// Create options with the documented defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the image mode resolution.
    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi.max(1);
        self
    }

    /// Set the bound on embedded image dimensions.
    pub fn with_max_image_dimension(mut self, max: u32) -> Self {
        self.max_image_dimension = max.max(1);
        self
    }

    pub fn with_default_font_size(mut self, size: f64) -> Self {
        self.default_font_size = size;
        self
    }

    pub fn with_min_text_box(mut self, inches: f64) -> Self {
        self.min_text_box = inches;
        self
    }

    pub fn with_fallback_grid(mut self, grid: FallbackGrid) -> Self {
        self.fallback_grid = grid;
        self
    }

    /// Render scale for image mode (`dpi / 72`).
    pub fn zoom(&self) -> f32 {
        self.dpi as f32 / 72.0
    }
}
