//! Conversion from PDF points to OOXML English Metric Units.
//!
//! Every length that crosses from the source page into the deck goes
//! through this module.

use crate::types::{PageGeometry, Rect};

/// EMUs per inch.
pub const EMU_PER_INCH: i64 = 914_400;

/// Points per inch.
pub const POINTS_PER_INCH: f64 = 72.0;

/// EMUs per point (914400 / 72).
pub const EMU_PER_POINT: i64 = 12_700;

/// Map a length or coordinate in points to EMUs.
pub fn to_emu(points: f64) -> i64 {
    (points * EMU_PER_POINT as f64).round() as i64
}

/// Map a length in inches to EMUs.
pub fn inches_to_emu(inches: f64) -> i64 {
    (inches * EMU_PER_INCH as f64).round() as i64
}

/// Map a length in EMUs back to points.
pub fn emu_to_points(emu: i64) -> f64 {
    emu as f64 / EMU_PER_POINT as f64
}

/// Destination canvas size for a deck whose first page has this geometry.
pub fn canvas_size(first_page: &PageGeometry) -> (i64, i64) {
    (to_emu(first_page.width), to_emu(first_page.height))
}

/// A rectangle mapped into EMUs, not yet validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmuRect {
    pub x: i64,
    pub y: i64,
    pub cx: i64,
    pub cy: i64,
}

/// Map a page-space rectangle to EMU offset and extent.
pub fn map_rect(rect: &Rect) -> EmuRect {
    EmuRect {
        x: to_emu(rect.x0),
        y: to_emu(rect.y0),
        cx: to_emu(rect.width()),
        cy: to_emu(rect.height()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_to_emu() {
        assert_eq!(to_emu(1.0), 12_700);
        assert_eq!(to_emu(72.0), EMU_PER_INCH);
        assert_eq!(to_emu(0.0), 0);
        assert_eq!(to_emu(-5.0), -63_500);
    }

    #[test]
    fn test_inches_to_emu() {
        assert_eq!(inches_to_emu(0.5), 457_200);
        assert_eq!(inches_to_emu(0.25), 228_600);
        assert_eq!(inches_to_emu(3.5), 3_200_400);
    }

    #[test]
    fn test_emu_to_points() {
        assert_eq!(emu_to_points(12_700), 1.0);
        assert_eq!(emu_to_points(to_emu(612.0)), 612.0);
    }

    #[test]
    fn test_canvas_size_letter() {
        assert_eq!(
            canvas_size(&PageGeometry::letter()),
            (7_772_400, 10_058_400)
        );
    }

    #[test]
    fn test_map_rect() {
        let mapped = map_rect(&Rect::from_origin_size(5.0, 5.0, 10.0, 20.0));
        assert_eq!(
            mapped,
            EmuRect {
                x: 63_500,
                y: 63_500,
                cx: 127_000,
                cy: 254_000
            }
        );
    }

    #[test]
    fn test_map_rect_keeps_negative_extent() {
        let mapped = map_rect(&Rect::new(10.0, 10.0, 5.0, 20.0));
        assert_eq!(mapped.cx, -63_500);
    }
}
