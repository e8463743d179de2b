//! End-to-end conversions from any [`DocumentSource`] to PPTX bytes.

use pdfdeck_core::{ConversionOptions, ConversionReport, DeckAssembler, DocumentSource, Result};

use crate::writer::PptxWriter;

/// A serialized deck and the report of how it was built.
#[derive(Debug, Clone)]
pub struct ConvertedDeck {
    pub bytes: Vec<u8>,
    pub report: ConversionReport,
}

/// Decompose every page into positioned pictures and text boxes.
pub fn convert_separated<S: DocumentSource + ?Sized>(
    source: &S,
    options: &ConversionOptions,
) -> Result<ConvertedDeck> {
    let conversion = DeckAssembler::new()
        .with_options(options.clone())
        .separated(source)?;
    Ok(ConvertedDeck {
        bytes: PptxWriter::new().write(&conversion.deck)?,
        report: conversion.report,
    })
}

/// Rasterize every page into one full-slide picture.
pub fn convert_images<S: DocumentSource + ?Sized>(
    source: &S,
    options: &ConversionOptions,
) -> Result<ConvertedDeck> {
    let conversion = DeckAssembler::new()
        .with_options(options.clone())
        .images(source)?;
    Ok(ConvertedDeck {
        bytes: PptxWriter::new().write(&conversion.deck)?,
        report: conversion.report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspect::{PackageSummary, PptxInspector, ShapeKind};
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use pdfdeck_core::{
        MemoryPage, MemorySource, PageGeometry, Rect, SpanFlags, TextBlock, TextLine, TextSpan,
    };
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([40, 80, 120])))
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn inspect(bytes: &[u8]) -> PackageSummary {
        PptxInspector::new().inspect(Cursor::new(bytes)).unwrap()
    }

    fn sample() -> MemorySource {
        let heading = TextBlock::new(Rect::new(72.0, 36.0, 540.0, 72.0)).with_line(TextLine::new(vec![
            TextSpan::new("Quarterly ").with_size(24.0),
            TextSpan::new("Results")
                .with_size(24.0)
                .with_color(0xC00000)
                .with_flags(SpanFlags::from_bits(0x11)),
        ]));
        let body = TextBlock::new(Rect::new(72.0, 400.0, 540.0, 440.0))
            .with_line(TextLine::new(vec![TextSpan::new("first line")]))
            .with_line(TextLine::new(vec![TextSpan::new("second line")
                .with_flags(SpanFlags::from_bits(SpanFlags::ITALIC))]));

        MemorySource::new()
            .with_asset(10, png(30, 20))
            .with_asset(11, png(10, 10))
            .with_asset(12, vec![0xFF, 0xD8, 0x00])
            .with_page(
                MemoryPage::new(PageGeometry::letter())
                    .with_image(10, vec![Rect::from_origin_size(5.0, 5.0, 10.0, 20.0)])
                    .with_image(12, vec![Rect::new(0.0, 0.0, 50.0, 50.0)])
                    .with_image(11, vec![])
                    .with_block(heading)
                    .with_block(body),
            )
            .with_page(
                MemoryPage::new(PageGeometry::new(300.0, 200.0))
                    .with_image(10, vec![])
                    .with_image(11, vec![]),
            )
    }

    #[test]
    fn test_separated_round_trip() {
        let converted = convert_separated(&sample(), &ConversionOptions::default()).unwrap();
        let package = inspect(&converted.bytes);

        assert_eq!(package.slide_count(), 2);
        assert_eq!((package.slide_width, package.slide_height), (7_772_400, 10_058_400));

        let first = &package.slides[0];
        let pictures: Vec<_> = first.pictures().collect();
        assert_eq!(pictures.len(), 2);
        assert_eq!(
            (pictures[0].x, pictures[0].y, pictures[0].cx, pictures[0].cy),
            (63_500, 63_500, 127_000, 254_000)
        );
        assert_eq!((pictures[1].x, pictures[1].y), (457_200, 457_200));
        assert!(pictures.iter().all(|p| p.media.is_some()));

        let text_boxes: Vec<_> = first.text_boxes().collect();
        assert_eq!(text_boxes.len(), 2);
        assert_eq!(text_boxes[0].text, "Quarterly Results");
        assert_eq!(text_boxes[1].text, "first line\nsecond line");

        let results = &text_boxes[0].runs[1];
        assert_eq!(results.size, Some(2400));
        assert_eq!(results.bold, Some(true));
        assert_eq!(results.italic, Some(false));
        assert_eq!(results.color.as_deref(), Some("C00000"));
        assert_eq!(text_boxes[1].runs[1].italic, Some(true));

        // pictures come before text in z-order
        let kinds: Vec<ShapeKind> = first.shapes.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ShapeKind::Picture,
                ShapeKind::Picture,
                ShapeKind::TextBox,
                ShapeKind::TextBox
            ]
        );

        assert_eq!(converted.report.issues().count(), 1);
    }

    #[test]
    fn test_fallback_grid_round_trip() {
        let converted = convert_separated(&sample(), &ConversionOptions::default()).unwrap();
        let package = inspect(&converted.bytes);

        let positions: Vec<(i64, i64)> = package.slides[1]
            .pictures()
            .map(|p| (p.x, p.y))
            .collect();
        assert_eq!(positions, vec![(457_200, 457_200), (3_200_400, 457_200)]);

        let widths: Vec<i64> = package.slides[1].pictures().map(|p| p.cx).collect();
        assert_eq!(widths, vec![4_114_800, 2_743_200]);
    }

    #[test]
    fn test_images_round_trip() {
        let options = ConversionOptions::default().with_dpi(72);
        let converted = convert_images(&sample(), &options).unwrap();
        let package = inspect(&converted.bytes);

        assert_eq!(package.slide_count(), 2);
        for slide in &package.slides {
            assert_eq!(slide.shapes.len(), 1);
            let picture = &slide.shapes[0];
            assert_eq!(picture.kind, ShapeKind::Picture);
            assert_eq!((picture.x, picture.y), (0, 0));
            assert_eq!((picture.cx, picture.cy), (7_772_400, 10_058_400));
        }
        assert_ne!(package.slides[0].shapes[0].media, package.slides[1].shapes[0].media);
        assert!(converted.report.issues().next().is_none());
    }

    #[test]
    fn test_empty_document() {
        let source = MemorySource::new();
        for converted in [
            convert_separated(&source, &ConversionOptions::default()).unwrap(),
            convert_images(&source, &ConversionOptions::default()).unwrap(),
        ] {
            let package = inspect(&converted.bytes);
            assert_eq!(package.slide_count(), 0);
            assert_eq!((package.slide_width, package.slide_height), (9_144_000, 6_858_000));
        }
    }

    #[test]
    fn test_identical_input_identical_bytes() {
        let source = sample();
        let options = ConversionOptions::default();

        assert_eq!(
            convert_separated(&source, &options).unwrap().bytes,
            convert_separated(&source, &options).unwrap().bytes
        );
        assert_eq!(
            convert_images(&source, &options).unwrap().bytes,
            convert_images(&source, &options).unwrap().bytes
        );
    }
}
