//! Page decomposition: mapping one source page onto one slide.
//!
//! Images are placed first and text second so text draws above pictures.
//! Every image, placement, block and run is handled on its own: a failure is
//! recorded in the [`PageReport`] and the next element is processed.

use std::sync::Arc;

use crate::deck::{Frame, Rgb, RunStyle, Slide};
use crate::error::ElementError;
use crate::normalize::{ImageNormalizer, NormalizedImage};
use crate::options::ConversionOptions;
use crate::report::PageReport;
use crate::source::DocumentSource;
use crate::types::{ImageReference, PlacementRect, Rect, TextBlock, TextSpan};
use crate::units::{inches_to_emu, map_rect};

/// Populates slides from source pages.
#[derive(Debug, Clone)]
pub struct PageDecomposer {
    normalizer: ImageNormalizer,
    options: ConversionOptions,
}

impl PageDecomposer {
    pub fn new(options: &ConversionOptions) -> Self {
        Self {
            normalizer: ImageNormalizer::new().with_max_dimension(options.max_image_dimension),
            options: options.clone(),
        }
    }

    /// Fill `slide` with the pictures and text boxes of `page`.
    ///
    /// Never fails; everything that went wrong is listed in the report.
    pub fn decompose<S: DocumentSource + ?Sized>(
        &self,
        source: &S,
        page: usize,
        slide: &mut Slide,
    ) -> PageReport {
        let mut report = PageReport::new(page);
        self.place_images(source, page, slide, &mut report);
        self.place_text(source, page, slide, &mut report);

        log::debug!(
            "Page {}: {} pictures, {} text boxes, {} issues",
            page + 1,
            report.pictures,
            report.text_boxes,
            report.issues.len()
        );
        report
    }

    fn place_images<S: DocumentSource + ?Sized>(
        &self,
        source: &S,
        page: usize,
        slide: &mut Slide,
        report: &mut PageReport,
    ) {
        let references = match source.page_image_references(page) {
            Ok(references) => references,
            Err(e) => {
                report.record(ElementError::PageContent {
                    page,
                    what: "images".to_string(),
                    message: e.to_string(),
                });
                return;
            }
        };

        let mut fallback_index = 0;
        for reference in &references {
            let image = match self.load_image(source, reference) {
                Ok(image) => Arc::new(image),
                Err(message) => {
                    report.record(ElementError::AssetDecode {
                        page,
                        reference: reference.id,
                        message,
                    });
                    continue;
                }
            };

            let rects = match source.placement_rects(page, reference) {
                Ok(rects) => rects,
                Err(e) => {
                    report.record(ElementError::AssetPlacement {
                        page,
                        reference: reference.id,
                        message: format!("location unknown, using fallback grid: {}", e),
                    });
                    Vec::new()
                }
            };

            if rects.is_empty() {
                match self.fallback_frame(fallback_index, &image) {
                    Some(frame) => {
                        slide.add_picture(Arc::clone(&image), frame);
                        report.pictures += 1;
                    }
                    None => report.record(ElementError::AssetPlacement {
                        page,
                        reference: reference.id,
                        message: "fallback grid slot has no area".to_string(),
                    }),
                }
                fallback_index += 1;
                continue;
            }

            for rect in &rects {
                match placement_frame(rect) {
                    Ok(frame) => {
                        slide.add_picture(Arc::clone(&image), frame);
                        report.pictures += 1;
                    }
                    Err(message) => report.record(ElementError::AssetPlacement {
                        page,
                        reference: reference.id,
                        message,
                    }),
                }
            }
        }
    }

    fn load_image<S: DocumentSource + ?Sized>(
        &self,
        source: &S,
        reference: &ImageReference,
    ) -> Result<NormalizedImage, String> {
        let raw = source
            .fetch_image_bytes(reference)
            .map_err(|e| e.to_string())?;
        self.normalizer.normalize(&raw).map_err(|e| e.to_string())
    }

    /// Frame for the `index`-th image on the page whose location is unknown.
    fn fallback_frame(&self, index: usize, image: &NormalizedImage) -> Option<Frame> {
        let grid = &self.options.fallback_grid;
        let (x, y) = grid.slot(index);
        let height = inches_to_emu(grid.image_height);
        let width = ((height as f64 * image.aspect_ratio()).round() as i64).max(1);
        Frame::new(inches_to_emu(x), inches_to_emu(y), width, height)
    }

    fn place_text<S: DocumentSource + ?Sized>(
        &self,
        source: &S,
        page: usize,
        slide: &mut Slide,
        report: &mut PageReport,
    ) {
        let blocks = match source.page_text_blocks(page) {
            Ok(blocks) => blocks,
            Err(e) => {
                report.record(ElementError::PageContent {
                    page,
                    what: "text blocks".to_string(),
                    message: e.to_string(),
                });
                return;
            }
        };

        for (block_index, block) in blocks.iter().enumerate() {
            if !block.is_text() {
                continue;
            }
            self.place_block(page, block_index, block, slide, report);
        }
    }

    fn place_block(
        &self,
        page: usize,
        block_index: usize,
        block: &TextBlock,
        slide: &mut Slide,
        report: &mut PageReport,
    ) {
        let frame = match self.text_frame(&block.bbox) {
            Ok(frame) => frame,
            Err(message) => {
                report.record(ElementError::TextBlock {
                    page,
                    block: block_index,
                    message,
                });
                return;
            }
        };

        let text_box = slide.add_text_box(frame);
        report.text_boxes += 1;

        for (line_index, line) in block.lines.iter().enumerate() {
            if line.is_empty() {
                continue;
            }

            let paragraph = text_box.add_paragraph();
            for (span_index, span) in line.spans.iter().enumerate() {
                let run = paragraph.add_run(span.text.clone());
                match self.span_style(span) {
                    Ok(style) => run.style = Some(style),
                    Err(message) => report.record(ElementError::SpanStyle {
                        page,
                        block: block_index,
                        line: line_index,
                        span: span_index,
                        message,
                    }),
                }
            }
        }
    }

    /// Text box frame for a block, with collapsed sides grown to the minimum.
    fn text_frame(&self, bbox: &Rect) -> Result<Frame, String> {
        if !bbox.is_finite() {
            return Err(format!("bounding box {:?} is not finite", bbox));
        }

        let mapped = map_rect(bbox);
        let min_side = inches_to_emu(self.options.min_text_box);
        let cx = if mapped.cx <= 0 { min_side } else { mapped.cx };
        let cy = if mapped.cy <= 0 { min_side } else { mapped.cy };

        Frame::new(mapped.x, mapped.y, cx, cy)
            .ok_or_else(|| format!("minimum text box size {} EMU has no area", min_side))
    }

    fn span_style(&self, span: &TextSpan) -> Result<RunStyle, String> {
        RunStyle::new(
            span.size.unwrap_or(self.options.default_font_size),
            Rgb::from_packed(span.color),
            span.flags.is_bold(),
            span.flags.is_italic(),
        )
    }
}

/// Frame for one placement, rejecting rectangles without area.
fn placement_frame(rect: &PlacementRect) -> Result<Frame, String> {
    if !rect.is_finite() {
        return Err(format!("rectangle {:?} is not finite", rect));
    }

    let mapped = map_rect(rect);
    Frame::new(mapped.x, mapped.y, mapped.cx, mapped.cy).ok_or_else(|| {
        format!(
            "degenerate rectangle {}x{} EMU at ({}, {})",
            mapped.cx, mapped.cy, mapped.x, mapped.y
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deck::{Deck, Shape};
    use crate::source::{MemoryPage, MemorySource};
    use crate::types::{BlockKind, PageGeometry, SpanFlags, TextLine};
    use image::{DynamicImage, ImageFormat, Rgb as Pixel, RgbImage};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Pixel([9, 9, 9])))
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn block(rect: Rect, lines: Vec<TextLine>) -> TextBlock {
        TextBlock {
            kind: BlockKind::Text,
            bbox: rect,
            lines,
        }
    }

    fn run(page: MemoryPage, source: MemorySource) -> (Slide, PageReport) {
        let source = source.with_page(page);
        let mut deck = Deck::new();
        let slide = deck.add_slide();
        let report = PageDecomposer::new(&ConversionOptions::default()).decompose(&source, 0, slide);
        (slide.clone(), report)
    }

    fn frames(slide: &Slide) -> Vec<(i64, i64, i64, i64)> {
        slide
            .pictures()
            .map(|p| (p.frame.x(), p.frame.y(), p.frame.cx(), p.frame.cy()))
            .collect()
    }

    #[test]
    fn test_single_placement_mapped() {
        let page = MemoryPage::new(PageGeometry::letter())
            .with_image(1, vec![Rect::from_origin_size(5.0, 5.0, 10.0, 20.0)]);
        let (slide, report) = run(page, MemorySource::new().with_asset(1, png(10, 20)));

        assert_eq!(frames(&slide), vec![(63_500, 63_500, 127_000, 254_000)]);
        assert!(report.is_clean());
        assert_eq!(report.pictures, 1);
    }

    #[test]
    fn test_multiple_placements_share_payload() {
        let page = MemoryPage::new(PageGeometry::letter()).with_image(
            1,
            vec![
                Rect::new(0.0, 0.0, 10.0, 10.0),
                Rect::new(20.0, 0.0, 30.0, 10.0),
                Rect::new(40.0, 0.0, 50.0, 10.0),
            ],
        );
        let (slide, _) = run(page, MemorySource::new().with_asset(1, png(4, 4)));

        let pictures: Vec<_> = slide.pictures().collect();
        assert_eq!(pictures.len(), 3);
        assert!(Arc::ptr_eq(&pictures[0].image, &pictures[2].image));
    }

    #[test]
    fn test_fallback_grid_slots() {
        let page = MemoryPage::new(PageGeometry::letter())
            .with_image(1, vec![])
            .with_image(2, vec![])
            .with_image(3, vec![]);
        let source = MemorySource::new()
            .with_asset(1, png(40, 20))
            .with_asset(2, png(40, 20))
            .with_asset(3, png(40, 20));
        let (slide, report) = run(page, source);

        assert_eq!(
            frames(&slide),
            vec![
                (457_200, 457_200, 5_486_400, 2_743_200),
                (3_200_400, 457_200, 5_486_400, 2_743_200),
                (457_200, 3_657_600, 5_486_400, 2_743_200),
            ]
        );
        assert!(report.is_clean());
    }

    #[test]
    fn test_fallback_index_counts_only_unplaced_assets() {
        let page = MemoryPage::new(PageGeometry::letter())
            .with_image(1, vec![Rect::new(0.0, 0.0, 72.0, 72.0)])
            .with_image(2, vec![])
            .with_image(3, vec![]);
        let source = MemorySource::new()
            .with_asset(1, png(10, 10))
            .with_asset(2, png(10, 10))
            .with_asset(3, png(10, 10));
        let (slide, _) = run(page, source);

        let positions: Vec<_> = frames(&slide).into_iter().map(|f| (f.0, f.1)).collect();
        assert_eq!(
            positions,
            vec![(0, 0), (457_200, 457_200), (3_200_400, 457_200)]
        );
    }

    #[test]
    fn test_unresolvable_placement_falls_back() {
        let page = MemoryPage::new(PageGeometry::letter()).with_unresolvable_image(1);
        let (slide, report) = run(page, MemorySource::new().with_asset(1, png(10, 10)));

        assert_eq!(frames(&slide), vec![(457_200, 457_200, 2_743_200, 2_743_200)]);
        assert!(matches!(
            report.issues.as_slice(),
            [ElementError::AssetPlacement { reference: 1, .. }]
        ));
    }

    #[test]
    fn test_degenerate_rects_rejected() {
        let page = MemoryPage::new(PageGeometry::letter()).with_image(
            1,
            vec![
                Rect::new(10.0, 10.0, 10.0, 30.0),
                Rect::new(10.0, 10.0, 30.0, 5.0),
                Rect::new(f64::NAN, 0.0, 1.0, 1.0),
                Rect::new(0.0, 0.0, 1.0, 1.0),
            ],
        );
        let (slide, report) = run(page, MemorySource::new().with_asset(1, png(2, 2)));

        assert_eq!(frames(&slide), vec![(0, 0, 12_700, 12_700)]);
        assert_eq!(report.issues.len(), 3);
        assert!(report
            .issues
            .iter()
            .all(|i| matches!(i, ElementError::AssetPlacement { .. })));
    }

    #[test]
    fn test_corrupt_image_isolated() {
        let page = MemoryPage::new(PageGeometry::letter())
            .with_image(1, vec![Rect::new(0.0, 0.0, 10.0, 10.0)])
            .with_image(2, vec![Rect::new(20.0, 0.0, 30.0, 10.0)])
            .with_image(3, vec![Rect::new(40.0, 0.0, 50.0, 10.0)])
            .with_block(block(
                Rect::new(0.0, 100.0, 200.0, 120.0),
                vec![TextLine::new(vec![TextSpan::new("first")])],
            ))
            .with_block(block(
                Rect::new(0.0, 200.0, 200.0, 220.0),
                vec![TextLine::new(vec![TextSpan::new("second")])],
            ));
        let source = MemorySource::new()
            .with_asset(1, png(5, 5))
            .with_asset(2, b"\x89PNG but not really".to_vec())
            .with_asset(3, png(5, 5));
        let (slide, report) = run(page, source);

        assert_eq!(slide.pictures().count(), 2);
        let texts: Vec<String> = slide.text_boxes().map(|t| t.text()).collect();
        assert_eq!(texts, vec!["first", "second"]);
        assert!(matches!(
            report.issues.as_slice(),
            [ElementError::AssetDecode { reference: 2, .. }]
        ));
    }

    #[test]
    fn test_missing_asset_isolated() {
        let page = MemoryPage::new(PageGeometry::letter())
            .with_image(99, vec![Rect::new(0.0, 0.0, 10.0, 10.0)]);
        let (slide, report) = run(page, MemorySource::new());

        assert_eq!(slide.shapes().len(), 0);
        assert!(matches!(
            report.issues.as_slice(),
            [ElementError::AssetDecode { reference: 99, .. }]
        ));
    }

    #[test]
    fn test_text_drawn_above_images() {
        let page = MemoryPage::new(PageGeometry::letter())
            .with_block(block(
                Rect::new(0.0, 0.0, 100.0, 20.0),
                vec![TextLine::new(vec![TextSpan::new("caption")])],
            ))
            .with_image(1, vec![Rect::new(0.0, 0.0, 100.0, 100.0)]);
        let (slide, _) = run(page, MemorySource::new().with_asset(1, png(3, 3)));

        assert!(matches!(slide.shapes()[0], Shape::Picture(_)));
        assert!(matches!(slide.shapes()[1], Shape::TextBox(_)));
    }

    #[test]
    fn test_span_flags_bold_not_italic() {
        let span = TextSpan::new("Bold").with_flags(SpanFlags::from_bits(0x11));
        let page = MemoryPage::new(PageGeometry::letter()).with_block(block(
            Rect::new(0.0, 0.0, 100.0, 20.0),
            vec![TextLine::new(vec![span])],
        ));
        let (slide, _) = run(page, MemorySource::new());

        let text_box = slide.text_boxes().next().unwrap();
        let style = text_box.paragraphs()[0].runs()[0].style.unwrap();
        assert!(style.bold);
        assert!(!style.italic);
    }

    #[test]
    fn test_span_size_and_color() {
        let mut unsized_span = TextSpan::new("b").with_color(0x00FF00);
        unsized_span.size = None;
        let page = MemoryPage::new(PageGeometry::letter()).with_block(block(
            Rect::new(0.0, 0.0, 100.0, 20.0),
            vec![TextLine::new(vec![
                TextSpan::new("a")
                    .with_size(18.5)
                    .with_color(0x336699)
                    .with_flags(SpanFlags::from_bits(SpanFlags::ITALIC)),
                unsized_span,
            ])],
        ));
        let (slide, _) = run(page, MemorySource::new());

        let runs = slide.text_boxes().next().unwrap().paragraphs()[0].runs().to_vec();
        let first = runs[0].style.unwrap();
        assert_eq!(first.size, 1850);
        assert_eq!(first.color, Rgb::new(0x33, 0x66, 0x99));
        assert!(first.italic && !first.bold);

        let second = runs[1].style.unwrap();
        assert_eq!(second.size, 1200);
        assert_eq!(second.color, Rgb::new(0, 0xFF, 0));
    }

    #[test]
    fn test_bad_span_size_keeps_plain_text() {
        let page = MemoryPage::new(PageGeometry::letter()).with_block(block(
            Rect::new(0.0, 0.0, 100.0, 20.0),
            vec![TextLine::new(vec![
                TextSpan::new("tiny").with_size(0.0),
                TextSpan::new(" fine"),
            ])],
        ));
        let (slide, report) = run(page, MemorySource::new());

        let paragraph = &slide.text_boxes().next().unwrap().paragraphs()[0];
        assert_eq!(paragraph.text(), "tiny fine");
        assert_eq!(paragraph.runs()[0].style, None);
        assert!(paragraph.runs()[1].style.is_some());
        assert!(matches!(
            report.issues.as_slice(),
            [ElementError::SpanStyle { span: 0, line: 0, .. }]
        ));
    }

    #[test]
    fn test_empty_lines_skipped_and_empty_spans_kept() {
        let page = MemoryPage::new(PageGeometry::letter()).with_block(block(
            Rect::new(0.0, 0.0, 100.0, 40.0),
            vec![
                TextLine::new(vec![TextSpan::new("one"), TextSpan::new("")]),
                TextLine::default(),
                TextLine::new(vec![TextSpan::new("two")]),
            ],
        ));
        let (slide, _) = run(page, MemorySource::new());

        let text_box = slide.text_boxes().next().unwrap();
        assert_eq!(text_box.paragraphs().len(), 2);
        assert_eq!(text_box.paragraphs()[0].runs().len(), 2);
        assert_eq!(text_box.text(), "one\ntwo");
    }

    #[test]
    fn test_block_without_lines_gives_empty_box() {
        let page = MemoryPage::new(PageGeometry::letter())
            .with_block(block(Rect::new(0.0, 0.0, 50.0, 50.0), vec![TextLine::default()]));
        let (slide, report) = run(page, MemorySource::new());

        let text_box = slide.text_boxes().next().unwrap();
        assert!(text_box.paragraphs().is_empty());
        assert_eq!(report.text_boxes, 1);
        assert!(report.is_clean());
    }

    #[test]
    fn test_collapsed_block_clamped() {
        let page = MemoryPage::new(PageGeometry::letter()).with_block(block(
            Rect::new(10.0, 20.0, 10.0, 20.0),
            vec![TextLine::new(vec![TextSpan::new("x")])],
        ));
        let (slide, _) = run(page, MemorySource::new());

        let frame = slide.text_boxes().next().unwrap().frame;
        assert_eq!(
            (frame.x(), frame.y(), frame.cx(), frame.cy()),
            (127_000, 254_000, 228_600, 228_600)
        );
    }

    #[test]
    fn test_non_finite_block_skipped() {
        let page = MemoryPage::new(PageGeometry::letter())
            .with_block(block(
                Rect::new(f64::INFINITY, 0.0, 10.0, 10.0),
                vec![TextLine::new(vec![TextSpan::new("lost")])],
            ))
            .with_block(block(
                Rect::new(0.0, 0.0, 10.0, 10.0),
                vec![TextLine::new(vec![TextSpan::new("kept")])],
            ));
        let (slide, report) = run(page, MemorySource::new());

        let texts: Vec<String> = slide.text_boxes().map(|t| t.text()).collect();
        assert_eq!(texts, vec!["kept"]);
        assert!(matches!(
            report.issues.as_slice(),
            [ElementError::TextBlock { block: 0, .. }]
        ));
    }

    #[test]
    fn test_image_blocks_ignored() {
        let mut image_block = block(
            Rect::new(0.0, 0.0, 10.0, 10.0),
            vec![TextLine::new(vec![TextSpan::new("alt")])],
        );
        image_block.kind = BlockKind::Image;
        let page = MemoryPage::new(PageGeometry::letter()).with_block(image_block);
        let (slide, _) = run(page, MemorySource::new());

        assert_eq!(slide.shapes().len(), 0);
    }

    #[test]
    fn test_large_asset_downscaled_before_embedding() {
        let page = MemoryPage::new(PageGeometry::letter())
            .with_image(1, vec![Rect::new(0.0, 0.0, 100.0, 100.0)]);
        let source = MemorySource::new().with_asset(1, png(60, 30)).with_page(page);
        let options = ConversionOptions::default().with_max_image_dimension(20);

        let mut slide = Slide::default();
        PageDecomposer::new(&options).decompose(&source, 0, &mut slide);

        let picture = slide.pictures().next().unwrap();
        assert_eq!((picture.image.width, picture.image.height), (20, 10));
        // the frame still follows the page geometry, not the pixel size
        assert_eq!(picture.frame.cx(), 1_270_000);
    }
}
