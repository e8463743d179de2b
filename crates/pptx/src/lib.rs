//! PPTX (Office Open XML) backend for PDF to slide-deck conversion.
//!
//! Writes assembled decks as .pptx packages and reads packages back
//! for inspection.

pub mod convert;
pub mod inspect;
pub mod template;
pub mod writer;

pub use convert::{convert_images, convert_separated, ConvertedDeck};
pub use inspect::{PackageSummary, PptxInspector, RunSummary, ShapeKind, ShapeSummary, SlideSummary};
pub use writer::PptxWriter;
