//! Per-page and per-document outcome of a conversion.

use serde::Serialize;
use std::fmt;

use crate::error::ElementError;

/// What happened while converting one page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageReport {
    /// 0-based page index.
    pub page: usize,
    pub pictures: usize,
    pub text_boxes: usize,
    pub issues: Vec<ElementError>,
}

impl PageReport {
    pub fn new(page: usize) -> Self {
        Self {
            page,
            pictures: 0,
            text_boxes: 0,
            issues: Vec::new(),
        }
    }

    /// Log and keep a non-fatal failure.
    pub fn record(&mut self, issue: ElementError) {
        log::warn!("{}", issue);
        self.issues.push(issue);
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Which conversion produced a deck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionMode {
    /// Each page rasterized to one full-slide picture.
    Images,
    /// Each page decomposed into pictures and text boxes.
    Separated,
}

impl fmt::Display for ConversionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionMode::Images => write!(f, "images"),
            ConversionMode::Separated => write!(f, "separated"),
        }
    }
}

/// Reports for every page of a document, in page order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionReport {
    pub mode: ConversionMode,
    pub pages: Vec<PageReport>,
}

impl ConversionReport {
    pub fn new(mode: ConversionMode) -> Self {
        Self {
            mode,
            pages: Vec::new(),
        }
    }

    pub fn push(&mut self, page: PageReport) {
        self.pages.push(page);
    }

    pub fn total_pictures(&self) -> usize {
        self.pages.iter().map(|p| p.pictures).sum()
    }

    pub fn total_text_boxes(&self) -> usize {
        self.pages.iter().map(|p| p.text_boxes).sum()
    }

    /// Every non-fatal issue, in page order.
    pub fn issues(&self) -> impl Iterator<Item = &ElementError> {
        self.pages.iter().flat_map(|p| p.issues.iter())
    }

    /// One-line human-readable summary.
    pub fn summary(&self) -> String {
        format!(
            "{} mode: {} slides, {} pictures, {} text boxes, {} issues",
            self.mode,
            self.pages.len(),
            self.total_pictures(),
            self.total_text_boxes(),
            self.issues().count()
        )
    }
}
