//! PDFium backend for PDF to slide-deck conversion.
//!
//! Opens PDF bytes with PDFium, exposes them as a
//! [`pdfdeck_core::DocumentSource`], and drives the image, separated
//! and text conversions.

pub mod converter;
pub mod error;
pub mod layout;
pub mod source;

pub use converter::{is_pdf, PdfConverter};
pub use error::{PdfError, Result};
pub use layout::{group_spans, LayoutOptions};
pub use source::PdfiumSource;
