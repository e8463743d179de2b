//! Building a whole deck from a document source.

use std::sync::Arc;

use crate::deck::{Deck, Frame};
use crate::decompose::PageDecomposer;
use crate::error::{Error, Result};
use crate::normalize::NormalizedImage;
use crate::options::ConversionOptions;
use crate::report::{ConversionMode, ConversionReport, PageReport};
use crate::source::DocumentSource;
use crate::units::canvas_size;

/// A finished deck together with what happened while building it.
#[derive(Debug, Clone)]
pub struct Conversion {
    pub deck: Deck,
    pub report: ConversionReport,
}

/// Drives a [`DocumentSource`] page by page into a [`Deck`].
#[derive(Debug, Clone, Default)]
pub struct DeckAssembler {
    options: ConversionOptions,
}

impl DeckAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(mut self, options: ConversionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ConversionOptions {
        &self.options
    }

    /// One slide per page, each page decomposed into pictures and text boxes.
    ///
    /// Only a failure to size the canvas is fatal; element failures end up
    /// in the report.
    pub fn separated<S: DocumentSource + ?Sized>(&self, source: &S) -> Result<Conversion> {
        let mut deck = new_deck(source)?;
        let mut report = ConversionReport::new(ConversionMode::Separated);
        let decomposer = PageDecomposer::new(&self.options);

        for page in 0..source.page_count() {
            let slide = deck.add_slide();
            report.push(decomposer.decompose(source, page, slide));
        }

        log::info!("{}", report.summary());
        Ok(Conversion { deck, report })
    }

    /// One slide per page, each holding a single full-slide render of the page.
    ///
    /// A page that fails to render fails the whole conversion.
    pub fn images<S: DocumentSource + ?Sized>(&self, source: &S) -> Result<Conversion> {
        let mut deck = new_deck(source)?;
        let mut report = ConversionReport::new(ConversionMode::Images);
        let zoom = self.options.zoom();

        let frame = Frame::new(0, 0, deck.width(), deck.height())
            .ok_or_else(|| Error::Deck("canvas has no area".to_string()))?;

        for page in 0..source.page_count() {
            log::debug!("Rendering page {} at zoom {:.3}", page + 1, zoom);
            let encoded = source.render_page(page, zoom)?;
            let image = NormalizedImage::from_encoded(encoded)
                .map_err(|e| Error::on_page(page, format!("rendered page unusable: {}", e)))?;

            deck.add_slide().add_picture(Arc::new(image), frame);

            let mut page_report = PageReport::new(page);
            page_report.pictures = 1;
            report.push(page_report);
        }

        log::info!("{}", report.summary());
        Ok(Conversion { deck, report })
    }
}

/// A deck sized after the first page, or the default canvas when there is none.
fn new_deck<S: DocumentSource + ?Sized>(source: &S) -> Result<Deck> {
    let mut deck = Deck::new();
    if source.page_count() == 0 {
        log::debug!("Empty document, keeping default canvas");
        return Ok(deck);
    }

    let (width, height) = canvas_size(&source.page_geometry(0)?);
    deck.set_canvas(width, height)?;
    Ok(deck)
}
