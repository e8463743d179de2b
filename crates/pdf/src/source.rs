//! [`DocumentSource`] over a PDF opened with PDFium.
//!
//! PDFium exposes the objects painted on each page rather than the
//! document's shared image resources. Every image object on a page is
//! therefore its own reference with exactly one placement: the object's
//! bounds. Objects nested in form XObjects are visited too; a reference id
//! packs the object's index path from the page down through its forms.

use image::{DynamicImage, ImageFormat};
use pdfdeck_core::{
    DocumentSource, Error, ImageReference, PageGeometry, PlacementRect, Rect, Result, SpanFlags,
    TextBlock, TextSpan,
};
use pdfium_render::prelude::*;
use std::cell::RefCell;
use std::io::Cursor;
use std::rc::Rc;

use crate::layout::{group_spans, LayoutOptions};

/// Deepest form nesting whose objects are still visited.
const MAX_FORM_DEPTH: usize = 4;

/// Bits per level of an object path packed into a reference id.
const PATH_BITS: u32 = 16;

/// An opened PDF document.
pub struct PdfiumSource<'a> {
    // Declared before `document` so the cached page is closed first.
    current: RefCell<Option<(usize, Rc<PdfPage<'a>>)>>,
    document: PdfDocument<'a>,
    layout: LayoutOptions,
}

impl<'a> PdfiumSource<'a> {
    pub fn new(document: PdfDocument<'a>) -> Self {
        Self {
            current: RefCell::new(None),
            document,
            layout: LayoutOptions::default(),
        }
    }

    /// Set the tolerances used to group text objects into blocks.
    pub fn with_layout(mut self, layout: LayoutOptions) -> Self {
        self.layout = layout;
        self
    }

    /// Load a page, reusing the last one loaded when the index matches.
    fn page(&self, index: usize) -> Result<Rc<PdfPage<'a>>> {
        if index >= self.page_count() {
            return Err(Error::on_page(index, "page index out of range"));
        }
        if let Some((cached, page)) = self.current.borrow().as_ref() {
            if *cached == index {
                return Ok(Rc::clone(page));
            }
        }

        let page = self
            .document
            .pages()
            .get(index as PdfPageIndex)
            .map(Rc::new)
            .map_err(|e| Error::on_page(index, e.to_string()))?;
        *self.current.borrow_mut() = Some((index, Rc::clone(&page)));
        Ok(page)
    }

    /// Find the object a reference id points at, with the forms enclosing it.
    fn resolve(
        &self,
        page_index: usize,
        page: &PdfPage<'a>,
        id: u64,
    ) -> Result<(PdfPageObject<'a>, Vec<FormSpace>)> {
        let path = decode_path(id)
            .ok_or_else(|| Error::on_page(page_index, format!("invalid object reference {}", id)))?;
        let not_found =
            |e: PdfiumError| Error::on_page(page_index, format!("object {:?}: {}", path, e));

        let mut object = page
            .objects()
            .get(path[0] as PdfPageObjectIndex)
            .map_err(not_found)?;
        let mut spaces = Vec::new();
        for &index in &path[1..] {
            let child = match object.as_x_object_form_object_mut() {
                Some(form) => form.get(index as PdfPageObjectIndex).map_err(not_found)?,
                None => {
                    return Err(Error::on_page(
                        page_index,
                        format!("object {:?} does not descend through a form", path),
                    ))
                }
            };
            if let Some(space) = form_space(&object) {
                spaces.push(space);
            }
            object = child;
        }
        Ok((object, spaces))
    }
}

/// A non-form object on a page, with the forms it is nested in.
struct Leaf<'a> {
    path: Vec<usize>,
    spaces: Vec<FormSpace>,
    object: PdfPageObject<'a>,
}

impl Leaf<'_> {
    /// Bounds in page space, flipped to a top-left origin.
    fn rect(&self, page_height: f64) -> std::result::Result<Rect, PdfiumError> {
        let bounds = to_page_space(raw_bounds(&self.object)?, &self.spaces);
        Ok(flip(&bounds, page_height))
    }

    /// Vertical scale from the object's own space to page space.
    fn vertical_scale(&self) -> f64 {
        self.spaces.iter().map(FormSpace::vertical_scale).product()
    }
}

/// Every non-form object of the page, descending into form XObjects.
fn page_leaves<'a>(page: &PdfPage<'a>) -> Vec<Leaf<'a>> {
    let mut leaves = Vec::new();
    let objects = page.objects();
    for index in 0..objects.len() as usize {
        match objects.get(index as PdfPageObjectIndex) {
            Ok(object) => collect_leaves(object, &mut vec![index], &mut Vec::new(), &mut leaves),
            Err(e) => log::debug!("Skipping page object {}: {}", index, e),
        }
    }
    leaves
}

fn collect_leaves<'a>(
    mut object: PdfPageObject<'a>,
    path: &mut Vec<usize>,
    spaces: &mut Vec<FormSpace>,
    leaves: &mut Vec<Leaf<'a>>,
) {
    let children = match object.as_x_object_form_object() {
        Some(form) => form.len() as usize,
        None => {
            leaves.push(Leaf {
                path: path.clone(),
                spaces: spaces.clone(),
                object,
            });
            return;
        }
    };

    if path.len() >= MAX_FORM_DEPTH {
        log::warn!("Form {:?} nested too deeply, its content is skipped", path);
        return;
    }

    let space = form_space(&object);
    if let Some(space) = space {
        spaces.push(space);
    }
    for index in 0..children {
        let child = match object.as_x_object_form_object_mut() {
            Some(form) => form.get(index as PdfPageObjectIndex),
            None => break,
        };
        match child {
            Ok(child) => {
                path.push(index);
                collect_leaves(child, path, spaces, leaves);
                path.pop();
            }
            Err(e) => log::debug!("Skipping form object {:?}/{}: {}", path, index, e),
        }
    }
    if space.is_some() {
        spaces.pop();
    }
}

/// Pack an object path into a reference id, 16 bits per level.
fn encode_path(path: &[usize]) -> Option<u64> {
    if path.is_empty() || path.len() > MAX_FORM_DEPTH {
        return None;
    }
    path.iter().try_fold(0u64, |id, &index| {
        let slot = u64::try_from(index).ok()?.checked_add(1)?;
        (slot < 1u64 << PATH_BITS).then_some(id << PATH_BITS | slot)
    })
}

fn decode_path(id: u64) -> Option<Vec<usize>> {
    let mask = (1u64 << PATH_BITS) - 1;
    let mut path = Vec::new();
    let mut rest = id;
    while rest != 0 {
        let slot = rest & mask;
        if slot == 0 {
            return None;
        }
        path.push(slot as usize - 1);
        rest >>= PATH_BITS;
    }
    path.reverse();
    (!path.is_empty() && path.len() <= MAX_FORM_DEPTH).then_some(path)
}

/// Axis-aligned map from a form's content space into its parent's space.
///
/// Derived from the form's bounds in the parent and the union of its
/// children's bounds, so it is exact for scaled and translated forms.
#[derive(Debug, Clone, Copy, PartialEq)]
struct FormSpace {
    from: Rect,
    to: Rect,
}

impl FormSpace {
    fn scale(from: f64, to: f64) -> f64 {
        if from > 0.0 {
            to / from
        } else {
            1.0
        }
    }

    fn vertical_scale(&self) -> f64 {
        Self::scale(self.from.height(), self.to.height())
    }

    fn apply(&self, rect: &Rect) -> Rect {
        let sx = Self::scale(self.from.width(), self.to.width());
        let sy = self.vertical_scale();
        Rect::new(
            self.to.x0 + (rect.x0 - self.from.x0) * sx,
            self.to.y0 + (rect.y0 - self.from.y0) * sy,
            self.to.x0 + (rect.x1 - self.from.x0) * sx,
            self.to.y0 + (rect.y1 - self.from.y0) * sy,
        )
    }
}

fn form_space(form_object: &PdfPageObject) -> Option<FormSpace> {
    let to = raw_bounds(form_object).ok()?;
    let form = form_object.as_x_object_form_object()?;
    let from = (0..form.len() as usize)
        .filter_map(|index| form.get(index as PdfPageObjectIndex).ok())
        .filter_map(|child| raw_bounds(&child).ok())
        .reduce(|a, b| a.union(&b))?;
    Some(FormSpace { from, to })
}

/// Map bounds through the enclosing forms, innermost first.
fn to_page_space(rect: Rect, spaces: &[FormSpace]) -> Rect {
    spaces.iter().rev().fold(rect, |rect, space| space.apply(&rect))
}

/// Object bounds in PDF user space (y grows upwards).
fn raw_bounds(object: &PdfPageObject) -> std::result::Result<Rect, PdfiumError> {
    let bounds = object.bounds()?;
    Ok(Rect::new(
        bounds.left().value as f64,
        bounds.bottom().value as f64,
        bounds.right().value as f64,
        bounds.top().value as f64,
    ))
}

/// Flip user-space bounds to a top-left origin.
fn flip(bounds: &Rect, page_height: f64) -> Rect {
    Rect::new(
        bounds.x0,
        page_height - bounds.y1,
        bounds.x1,
        page_height - bounds.y0,
    )
}

/// Style bits from the font descriptor, falling back on names such as
/// `Helvetica-BoldOblique` for fonts that do not declare them.
fn style_flags(font_name: &str, weight: Option<u32>, force_bold: bool, italic: bool) -> SpanFlags {
    let lower = font_name.to_lowercase();
    let bold_name = lower.contains("bold")
        || lower.contains("black")
        || lower.contains("heavy")
        || lower.contains(",b");
    let italic_name = lower.contains("italic") || lower.contains("oblique") || lower.contains(",i");

    let bold = bold_name || force_bold || weight.is_some_and(|w| w >= 700);
    SpanFlags::from_style(bold, italic_name || italic, false)
}

fn weight_value(weight: PdfFontWeight) -> u32 {
    match weight {
        PdfFontWeight::Weight100 => 100,
        PdfFontWeight::Weight200 => 200,
        PdfFontWeight::Weight300 => 300,
        PdfFontWeight::Weight400Normal => 400,
        PdfFontWeight::Weight500 => 500,
        PdfFontWeight::Weight600 => 600,
        PdfFontWeight::Weight700Bold => 700,
        PdfFontWeight::Weight800 => 800,
        PdfFontWeight::Weight900 => 900,
        PdfFontWeight::Custom(value) => value,
    }
}

fn font_style(font: &PdfFont, font_name: &str) -> SpanFlags {
    style_flags(
        font_name,
        font.weight().ok().map(weight_value),
        font.is_bold_reenforced(),
        font.is_italic(),
    )
}

fn pack_rgb(red: u8, green: u8, blue: u8) -> u32 {
    (red as u32) << 16 | (green as u32) << 8 | blue as u32
}

fn encode_png(image: &DynamicImage) -> image::ImageResult<Vec<u8>> {
    let mut output = Cursor::new(Vec::new());
    image.write_to(&mut output, ImageFormat::Png)?;
    Ok(output.into_inner())
}

impl DocumentSource for PdfiumSource<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn page_geometry(&self, page: usize) -> Result<PageGeometry> {
        let pdf_page = self.page(page)?;
        Ok(PageGeometry::new(
            pdf_page.width().value as f64,
            pdf_page.height().value as f64,
        ))
    }

    fn page_image_references(&self, page: usize) -> Result<Vec<ImageReference>> {
        let pdf_page = self.page(page)?;
        let mut references = Vec::new();
        for leaf in page_leaves(&pdf_page) {
            if leaf.object.as_image_object().is_none() {
                continue;
            }
            match encode_path(&leaf.path) {
                Some(id) => references.push(ImageReference::new(page, id)),
                None => log::warn!(
                    "Page {}: image object {:?} cannot be referenced, skipped",
                    page + 1,
                    leaf.path
                ),
            }
        }
        Ok(references)
    }

    fn fetch_image_bytes(&self, reference: &ImageReference) -> Result<Vec<u8>> {
        let page = reference.page;
        let pdf_page = self.page(page)?;
        let (object, _) = self.resolve(page, &pdf_page, reference.id)?;
        let image_object = object
            .as_image_object()
            .ok_or_else(|| Error::on_page(page, format!("object {} is not an image", reference.id)))?;

        let raw = image_object
            .get_raw_image()
            .map_err(|e| Error::on_page(page, e.to_string()))?;
        encode_png(&raw).map_err(|e| Error::on_page(page, e.to_string()))
    }

    fn placement_rects(
        &self,
        page: usize,
        reference: &ImageReference,
    ) -> Result<Vec<PlacementRect>> {
        let pdf_page = self.page(page)?;
        let page_height = pdf_page.height().value as f64;
        let (object, spaces) = self.resolve(page, &pdf_page, reference.id)?;

        let bounds = raw_bounds(&object)
            .map_err(|e| Error::on_page(page, format!("no bounds for image: {}", e)))?;
        Ok(vec![flip(&to_page_space(bounds, &spaces), page_height)])
    }

    fn page_text_blocks(&self, page: usize) -> Result<Vec<TextBlock>> {
        let pdf_page = self.page(page)?;
        let page_height = pdf_page.height().value as f64;

        let mut spans = Vec::new();
        for leaf in page_leaves(&pdf_page) {
            let Some(text_object) = leaf.object.as_text_object() else {
                continue;
            };

            let text = text_object.text();
            if text.is_empty() {
                continue;
            }

            let font_size = text_object.scaled_font_size().value as f64 * leaf.vertical_scale();
            let font = text_object.font();
            let font_name = font.name();
            let color = leaf
                .object
                .fill_color()
                .map(|c| pack_rgb(c.red(), c.green(), c.blue()))
                .unwrap_or(0);

            let mut span = TextSpan::new(text)
                .with_color(color)
                .with_flags(font_style(&font, &font_name))
                .with_font(font_name);
            span.size = (font_size > 0.0).then_some(font_size);
            span.bbox = leaf.rect(page_height).ok();
            spans.push(span);
        }

        log::debug!("Page {}: {} text objects", page + 1, spans.len());
        Ok(group_spans(spans, &self.layout))
    }

    fn render_page(&self, page: usize, scale: f32) -> Result<Vec<u8>> {
        let pdf_page = self.page(page)?;
        let config = PdfRenderConfig::new().scale_page_by_factor(scale);
        let image = pdf_page
            .render_with_config(&config)
            .map_err(|e| Error::on_page(page, e.to_string()))?
            .as_image();
        encode_png(&image).map_err(|e| Error::on_page(page, e.to_string()))
    }

    fn extract_plain_text(&self, page: usize) -> Result<String> {
        let pdf_page = self.page(page)?;
        let text = pdf_page
            .text()
            .map_err(|e| Error::on_page(page, e.to_string()))?;
        Ok(text.all())
    }
}
