//! The three conversions offered to callers, over raw PDF bytes.

use pdfdeck_core::{ConversionOptions, Error};
use pdfdeck_pptx::{convert_images, convert_separated, ConvertedDeck};
use pdfium_render::prelude::*;
use std::path::Path;

use crate::error::{PdfError, Result};
use crate::source::PdfiumSource;

/// True when the bytes carry a PDF header within the first kilobyte.
pub fn is_pdf(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(1024)];
    head.windows(5).any(|window| window == b"%PDF-")
}

/// Converts PDF documents to slide decks and plain text.
pub struct PdfConverter {
    pdfium: Pdfium,
    options: ConversionOptions,
}

impl PdfConverter {
    /// Bind PDFium from `./`, `./lib`, or the system library, in that order.
    pub fn new() -> Result<Self> {
        let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./lib"))
            })
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(PdfError::LibraryUnavailable)?;

        Ok(Self::from_pdfium(Pdfium::new(bindings)))
    }

    /// Bind the PDFium library found in `dir`.
    pub fn with_library_dir(dir: &Path) -> Result<Self> {
        let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
            .map_err(PdfError::LibraryUnavailable)?;
        Ok(Self::from_pdfium(Pdfium::new(bindings)))
    }

    pub fn from_pdfium(pdfium: Pdfium) -> Self {
        Self {
            pdfium,
            options: ConversionOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ConversionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ConversionOptions {
        &self.options
    }

    /// Open PDF bytes as a document source.
    pub fn open(&self, bytes: Vec<u8>) -> Result<PdfiumSource<'_>> {
        if !is_pdf(&bytes) {
            return Err(Error::DocumentOpen("input is not a PDF".to_string()).into());
        }

        let document = self
            .pdfium
            .load_pdf_from_byte_vec(bytes, None)
            .map_err(|e| Error::DocumentOpen(e.to_string()))?;
        log::debug!("Opened PDF with {} pages", document.pages().len());
        Ok(PdfiumSource::new(document))
    }

    /// Render every page at `dpi` into a full-slide picture.
    pub fn image_mode_deck(&self, bytes: Vec<u8>, dpi: u32) -> Result<ConvertedDeck> {
        let source = self.open(bytes)?;
        let options = self.options.clone().with_dpi(dpi);
        Ok(convert_images(&source, &options)?)
    }

    /// Decompose every page into positioned pictures and text boxes.
    pub fn separated_mode_deck(&self, bytes: Vec<u8>) -> Result<ConvertedDeck> {
        let source = self.open(bytes)?;
        Ok(convert_separated(&source, &self.options)?)
    }

    /// PPTX bytes with one rendered picture per page.
    pub fn convert_image_mode(&self, bytes: Vec<u8>, dpi: u32) -> Result<Vec<u8>> {
        Ok(self.image_mode_deck(bytes, dpi)?.bytes)
    }

    /// PPTX bytes with each page decomposed into pictures and text boxes.
    pub fn convert_separated_mode(&self, bytes: Vec<u8>) -> Result<Vec<u8>> {
        Ok(self.separated_mode_deck(bytes)?.bytes)
    }

    /// UTF-8 text of every page, each preceded by a page delimiter.
    pub fn extract_text(&self, bytes: Vec<u8>) -> Result<Vec<u8>> {
        let source = self.open(bytes)?;
        Ok(pdfdeck_core::extract_text(&source)?.into_bytes())
    }
}
