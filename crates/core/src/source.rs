//! The document source interface and an in-memory implementation.
//!
//! A [`DocumentSource`] is an opened paginated document. Converters only
//! ever talk to the document through this trait, so a PDF backend, a test
//! fixture or any other producer of page geometry can be plugged in.

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::collections::BTreeMap;
use std::io::Cursor;

use crate::error::{Error, Result};
use crate::types::{ImageReference, PageGeometry, PlacementRect, TextBlock};

/// Read access to an opened paginated document.
///
/// Page indices are 0-based. Geometry is in points with a top-left origin.
pub trait DocumentSource {
    /// Number of pages in the document.
    fn page_count(&self) -> usize;

    /// Page size in points.
    fn page_geometry(&self, page: usize) -> Result<PageGeometry>;

    /// Distinct embedded raster assets used on the page, in page order.
    fn page_image_references(&self, page: usize) -> Result<Vec<ImageReference>>;

    /// Raw encoded bytes of an asset.
    fn fetch_image_bytes(&self, reference: &ImageReference) -> Result<Vec<u8>>;

    /// Every rectangle where the asset is drawn on the page. May be empty
    /// when the source cannot tell where the asset was painted.
    fn placement_rects(&self, page: usize, reference: &ImageReference)
        -> Result<Vec<PlacementRect>>;

    /// Structured text of the page, in document order.
    fn page_text_blocks(&self, page: usize) -> Result<Vec<TextBlock>>;

    /// Render the whole page at `scale` (1.0 = 72 dpi) and return encoded image bytes.
    fn render_page(&self, page: usize, scale: f32) -> Result<Vec<u8>>;

    /// Plain text of the page.
    fn extract_plain_text(&self, page: usize) -> Result<String>;
}

/// One image asset used on an in-memory page.
#[derive(Debug, Clone)]
struct MemoryImage {
    id: u64,
    /// `None` makes the placement query fail.
    rects: Option<Vec<PlacementRect>>,
}

/// A page of a [`MemorySource`].
#[derive(Debug, Clone)]
pub struct MemoryPage {
    geometry: PageGeometry,
    images: Vec<MemoryImage>,
    blocks: Vec<TextBlock>,
    text: Option<String>,
}

impl MemoryPage {
    /// Create an empty page of the given size.
    pub fn new(geometry: PageGeometry) -> Self {
        Self {
            geometry,
            images: Vec::new(),
            blocks: Vec::new(),
            text: None,
        }
    }

    /// Use asset `id` on this page at the given rectangles (possibly none).
    pub fn with_image(mut self, id: u64, rects: Vec<PlacementRect>) -> Self {
        self.images.push(MemoryImage {
            id,
            rects: Some(rects),
        });
        self
    }

    /// Use asset `id` on this page with a placement query that fails.
    pub fn with_unresolvable_image(mut self, id: u64) -> Self {
        self.images.push(MemoryImage { id, rects: None });
        self
    }

    pub fn with_block(mut self, block: TextBlock) -> Self {
        self.blocks.push(block);
        self
    }

    /// Override the plain text; defaults to the text of the page's blocks.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

/// A document assembled in memory.
///
/// Assets are shared document-wide by id, like image XObjects in a PDF.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    pages: Vec<MemoryPage>,
    assets: BTreeMap<u64, Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the raw bytes of asset `id`.
    pub fn with_asset(mut self, id: u64, bytes: Vec<u8>) -> Self {
        self.assets.insert(id, bytes);
        self
    }

    pub fn with_page(mut self, page: MemoryPage) -> Self {
        self.pages.push(page);
        self
    }

    fn page(&self, page: usize) -> Result<&MemoryPage> {
        self.pages
            .get(page)
            .ok_or_else(|| Error::on_page(page, "page index out of range"))
    }
}

impl DocumentSource for MemorySource {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_geometry(&self, page: usize) -> Result<PageGeometry> {
        Ok(self.page(page)?.geometry)
    }

    fn page_image_references(&self, page: usize) -> Result<Vec<ImageReference>> {
        let mut references: Vec<ImageReference> = Vec::new();
        for image in &self.page(page)?.images {
            if !references.iter().any(|r| r.id == image.id) {
                references.push(ImageReference::new(page, image.id));
            }
        }
        Ok(references)
    }

    fn fetch_image_bytes(&self, reference: &ImageReference) -> Result<Vec<u8>> {
        self.assets.get(&reference.id).cloned().ok_or_else(|| {
            Error::on_page(
                reference.page,
                format!("unknown image reference {}", reference.id),
            )
        })
    }

    fn placement_rects(
        &self,
        page: usize,
        reference: &ImageReference,
    ) -> Result<Vec<PlacementRect>> {
        let mut rects = Vec::new();
        for image in self.page(page)?.images.iter().filter(|i| i.id == reference.id) {
            match &image.rects {
                Some(found) => rects.extend_from_slice(found),
                None => {
                    return Err(Error::on_page(
                        page,
                        format!("cannot resolve placement of image {}", reference.id),
                    ))
                }
            }
        }
        Ok(rects)
    }

    fn page_text_blocks(&self, page: usize) -> Result<Vec<TextBlock>> {
        Ok(self.page(page)?.blocks.clone())
    }

    fn render_page(&self, page: usize, scale: f32) -> Result<Vec<u8>> {
        let geometry = self.page(page)?.geometry;
        let width = ((geometry.width * scale as f64).round() as u32).max(1);
        let height = ((geometry.height * scale as f64).round() as u32).max(1);

        let canvas = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
        let mut output = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(canvas)
            .write_to(&mut output, ImageFormat::Png)
            .map_err(|e| Error::on_page(page, e.to_string()))?;
        Ok(output.into_inner())
    }

    fn extract_plain_text(&self, page: usize) -> Result<String> {
        let page_data = self.page(page)?;
        if let Some(text) = &page_data.text {
            return Ok(text.clone());
        }

        let mut text = String::new();
        for block in page_data.blocks.iter().filter(|b| b.is_text()) {
            text.push_str(&block.text());
            text.push('\n');
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Rect, TextLine, TextSpan};

    fn sample() -> MemorySource {
        MemorySource::new().with_asset(7, vec![1, 2, 3]).with_page(
            MemoryPage::new(PageGeometry::new(100.0, 50.0))
                .with_image(7, vec![Rect::new(0.0, 0.0, 10.0, 10.0)])
                .with_image(7, vec![Rect::new(20.0, 0.0, 30.0, 10.0)])
                .with_image(9, vec![])
                .with_block(
                    TextBlock::new(Rect::new(0.0, 20.0, 50.0, 30.0))
                        .with_line(TextLine::new(vec![TextSpan::new("hi")])),
                ),
        )
    }

    #[test]
    fn test_references_are_distinct() {
        let source = sample();
        let refs = source.page_image_references(0).unwrap();
        assert_eq!(
            refs,
            vec![ImageReference::new(0, 7), ImageReference::new(0, 9)]
        );
    }

    #[test]
    fn test_placements_collected_per_reference() {
        let source = sample();
        let rects = source
            .placement_rects(0, &ImageReference::new(0, 7))
            .unwrap();
        assert_eq!(rects.len(), 2);
        assert!(source
            .placement_rects(0, &ImageReference::new(0, 9))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_unknown_asset_fails() {
        let source = sample();
        assert!(source.fetch_image_bytes(&ImageReference::new(0, 9)).is_err());
        assert_eq!(
            source.fetch_image_bytes(&ImageReference::new(0, 7)).unwrap(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_unresolvable_placement_fails() {
        let source = MemorySource::new()
            .with_page(MemoryPage::new(PageGeometry::letter()).with_unresolvable_image(3));
        assert!(source
            .placement_rects(0, &ImageReference::new(0, 3))
            .is_err());
    }

    #[test]
    fn test_out_of_range_page() {
        assert!(sample().page_geometry(3).is_err());
    }

    #[test]
    fn test_plain_text_from_blocks() {
        assert_eq!(sample().extract_plain_text(0).unwrap(), "hi\n");
    }

    #[test]
    fn test_render_scales_page() {
        let png = sample().render_page(0, 2.0).unwrap();
        let rendered = image::load_from_memory(&png).unwrap();
        assert_eq!((rendered.width(), rendered.height()), (200, 100));
    }
}
