//! Core domain types, page decomposition and layout mapping
//! for PDF to slide-deck conversion.

pub mod assemble;
pub mod deck;
pub mod decompose;
pub mod error;
pub mod normalize;
pub mod options;
pub mod report;
pub mod source;
pub mod text;
pub mod types;
pub mod units;

pub use assemble::{Conversion, DeckAssembler};
pub use deck::{Deck, Frame, Paragraph, Picture, Rgb, Run, RunStyle, Shape, Slide, TextBox};
pub use decompose::PageDecomposer;
pub use error::{ElementError, Error, Result};
pub use normalize::{ImageNormalizer, NormalizeError, NormalizedImage};
pub use options::{ConversionOptions, FallbackGrid};
pub use report::{ConversionMode, ConversionReport, PageReport};
pub use source::{DocumentSource, MemoryPage, MemorySource};
pub use text::extract_text;
pub use types::{
    BlockKind, ImageReference, PageGeometry, PlacementRect, Rect, SpanFlags, TextBlock, TextLine,
    TextSpan,
};
