//! Error types for PDF to slide-deck conversion.
//!
//! [`Error`] is fatal to a conversion request. [`ElementError`] describes a
//! failure confined to one page element; those are collected into a
//! [`PageReport`](crate::report::PageReport) and never abort the document.

use serde::Serialize;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a conversion request.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to read or write a file.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// The input bytes could not be opened as a paginated document.
    #[error("Failed to open document: {0}")]
    DocumentOpen(String),

    /// The document source failed to answer a page-level query.
    #[error("Document source error on page {page}: {message}")]
    Source { page: usize, message: String },

    /// The destination deck rejected an operation (e.g. resizing the canvas twice).
    #[error("Deck error: {0}")]
    Deck(String),

    /// Failed to serialize the destination container.
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// ZIP archive error (for PPTX).
    #[error("ZIP error: {0}")]
    ZipError(String),

    /// XML error (for PPTX).
    #[error("XML error: {0}")]
    XmlError(String),
}

impl Error {
    /// Build a [`Error::Source`] for the given page.
    pub fn on_page(page: usize, message: impl Into<String>) -> Self {
        Self::Source {
            page,
            message: message.into(),
        }
    }
}

/// A failure confined to a single page element.
///
/// The conversion continues after any of these; the element is skipped or
/// simplified as described on each variant.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ElementError {
    /// An embedded image could not be fetched or decoded. The asset is skipped.
    #[error("page {page}: image {reference} could not be decoded: {message}")]
    AssetDecode {
        page: usize,
        reference: u64,
        message: String,
    },

    /// One placement of an image was rejected. Only that instance is skipped.
    #[error("page {page}: image {reference} placement rejected: {message}")]
    AssetPlacement {
        page: usize,
        reference: u64,
        message: String,
    },

    /// The source could not list the page's images or text blocks.
    /// That half of the page is left empty; the other half still converts.
    #[error("page {page}: could not list {what}: {message}")]
    PageContent {
        page: usize,
        what: String,
        message: String,
    },

    /// A text block could not be turned into a text box. The block is skipped.
    #[error("page {page}: text block {block} skipped: {message}")]
    TextBlock {
        page: usize,
        block: usize,
        message: String,
    },

    /// Styling could not be applied to a run. The run keeps its plain text.
    #[error("page {page}: text block {block} line {line} span {span} left unstyled: {message}")]
    SpanStyle {
        page: usize,
        block: usize,
        line: usize,
        span: usize,
        message: String,
    },
}

impl ElementError {
    /// Page index (0-based) the failure occurred on.
    pub fn page(&self) -> usize {
        match self {
            Self::AssetDecode { page, .. }
            | Self::AssetPlacement { page, .. }
            | Self::PageContent { page, .. }
            | Self::TextBlock { page, .. }
            | Self::SpanStyle { page, .. } => *page,
        }
    }
}
