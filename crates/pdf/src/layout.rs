//! Grouping positioned text spans into lines and blocks.
//!
//! PDF content streams carry no paragraph structure; each text object
//! becomes a span, spans sharing a baseline band form a line, and lines
//! stacked closely with overlapping columns form a block.

use pdfdeck_core::{Rect, TextBlock, TextLine, TextSpan};

/// Tolerances used when grouping spans, in points.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutOptions {
    /// Horizontal gap between neighbouring spans above which a word space is inserted.
    pub x_tolerance: f64,
    /// Largest difference between vertical midpoints of spans on one line.
    pub y_tolerance: f64,
    /// Largest vertical gap between consecutive lines of one block.
    pub y_density: f64,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            x_tolerance: 3.0,
            y_tolerance: 3.0,
            y_density: 10.0,
        }
    }
}

struct Line {
    bbox: Rect,
    spans: Vec<(Rect, TextSpan)>,
}

/// Group spans into text blocks in top-to-bottom order.
///
/// Spans without a finite bounding box cannot be placed and are dropped.
pub fn group_spans(spans: Vec<TextSpan>, options: &LayoutOptions) -> Vec<TextBlock> {
    let mut placed: Vec<(Rect, TextSpan)> = spans
        .into_iter()
        .filter_map(|span| match span.bbox {
            Some(bbox) if bbox.is_finite() => Some((bbox, span)),
            _ => {
                log::debug!("Dropping text span without position: {:?}", span.text);
                None
            }
        })
        .collect();

    placed.sort_by(|a, b| a.0.y0.total_cmp(&b.0.y0).then(a.0.x0.total_cmp(&b.0.x0)));

    let lines = cluster_into_lines(placed, options);
    cluster_into_blocks(lines, options.y_density)
}

fn mid_y(rect: &Rect) -> f64 {
    (rect.y0 + rect.y1) / 2.0
}

fn cluster_into_lines(spans: Vec<(Rect, TextSpan)>, options: &LayoutOptions) -> Vec<Line> {
    let y_tolerance = options.y_tolerance;
    let mut lines: Vec<Line> = Vec::new();

    for (bbox, span) in spans {
        let span_mid = mid_y(&bbox);
        match lines
            .iter_mut()
            .find(|line| (span_mid - mid_y(&line.bbox)).abs() <= y_tolerance)
        {
            Some(line) => {
                line.bbox = line.bbox.union(&bbox);
                line.spans.push((bbox, span));
            }
            None => lines.push(Line {
                bbox,
                spans: vec![(bbox, span)],
            }),
        }
    }

    for line in &mut lines {
        line.spans.sort_by(|a, b| a.0.x0.total_cmp(&b.0.x0));
        insert_word_spaces(&mut line.spans, options.x_tolerance);
    }
    lines.sort_by(|a, b| a.bbox.y0.total_cmp(&b.bbox.y0));
    lines
}

/// Append a space to a span followed by a visible gap, unless either side
/// already carries whitespace at that edge.
fn insert_word_spaces(spans: &mut [(Rect, TextSpan)], x_tolerance: f64) {
    for index in 1..spans.len() {
        let gap = spans[index].0.x0 - spans[index - 1].0.x1;
        if gap <= x_tolerance {
            continue;
        }

        let next_starts_blank = spans[index].1.text.starts_with(char::is_whitespace);
        let previous = &mut spans[index - 1].1.text;
        if !next_starts_blank && !previous.ends_with(char::is_whitespace) {
            previous.push(' ');
        }
    }
}

fn has_x_overlap(a: &Rect, b: &Rect) -> bool {
    a.x0 < b.x1 && b.x0 < a.x1
}

fn cluster_into_blocks(lines: Vec<Line>, y_density: f64) -> Vec<TextBlock> {
    let mut blocks: Vec<(Rect, Vec<Line>)> = Vec::new();

    for line in lines {
        let mut best: Option<(usize, f64)> = None;
        for (index, (bbox, _)) in blocks.iter().enumerate() {
            let gap = line.bbox.y0 - bbox.y1;
            let closer = best.map_or(true, |(_, best_gap)| gap < best_gap);
            if gap >= 0.0 && gap <= y_density && has_x_overlap(&line.bbox, bbox) && closer {
                best = Some((index, gap));
            }
        }

        match best {
            Some((index, _)) => {
                let (bbox, members) = &mut blocks[index];
                *bbox = bbox.union(&line.bbox);
                members.push(line);
            }
            None => blocks.push((line.bbox, vec![line])),
        }
    }

    blocks
        .into_iter()
        .map(|(bbox, mut members)| {
            members.sort_by(|a, b| a.bbox.y0.total_cmp(&b.bbox.y0));
            members.into_iter().fold(TextBlock::new(bbox), |block, line| {
                let mut text_line =
                    TextLine::new(line.spans.into_iter().map(|(_, span)| span).collect());
                text_line.bbox = Some(line.bbox);
                block.with_line(text_line)
            })
        })
        .collect()
}
