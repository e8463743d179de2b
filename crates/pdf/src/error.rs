//! Error types for the PDFium backend.

use pdfium_render::prelude::PdfiumError;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, PdfError>;

#[derive(Error, Debug)]
pub enum PdfError {
    /// No PDFium shared library could be bound.
    #[error("PDFium library not available: {0}")]
    LibraryUnavailable(PdfiumError),

    #[error(transparent)]
    Conversion(#[from] pdfdeck_core::Error),
}
