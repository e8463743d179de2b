//! Reading a PPTX package back into a summary of its slides and shapes.

use pdfdeck_core::{Error, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Serialize;
use std::collections::HashMap;
use std::io::{Read, Seek};
use zip::ZipArchive;

use crate::template::REL_SLIDE;

/// What a package contains, in slide order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageSummary {
    pub slide_width: i64,
    pub slide_height: i64,
    pub slides: Vec<SlideSummary>,
}

impl PackageSummary {
    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlideSummary {
    /// 1-based position in the deck.
    pub number: usize,
    /// Part name inside the package.
    pub path: String,
    pub shapes: Vec<ShapeSummary>,
}

impl SlideSummary {
    pub fn pictures(&self) -> impl Iterator<Item = &ShapeSummary> {
        self.shapes.iter().filter(|s| s.kind == ShapeKind::Picture)
    }

    pub fn text_boxes(&self) -> impl Iterator<Item = &ShapeSummary> {
        self.shapes.iter().filter(|s| s.kind == ShapeKind::TextBox)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    Picture,
    TextBox,
}

/// One shape with its position, size and text, all in EMU.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShapeSummary {
    pub kind: ShapeKind,
    pub x: i64,
    pub y: i64,
    pub cx: i64,
    pub cy: i64,
    /// Paragraphs joined with newlines.
    pub text: String,
    pub runs: Vec<RunSummary>,
    /// Media part a picture points at.
    pub media: Option<String>,
}

impl ShapeSummary {
    fn new(kind: ShapeKind) -> Self {
        Self {
            kind,
            x: 0,
            y: 0,
            cx: 0,
            cy: 0,
            text: String::new(),
            runs: Vec::new(),
            media: None,
        }
    }
}

/// Character formatting found on a run; `None` where the run has no such attribute.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub text: String,
    /// Hundredths of a point.
    pub size: Option<u32>,
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    /// Upper-case hex sRGB.
    pub color: Option<String>,
}

/// Reads PPTX packages.
pub struct PptxInspector;

impl PptxInspector {
    pub fn new() -> Self {
        Self
    }

    /// Summarize a package from a reader.
    pub fn inspect<R: Read + Seek>(&self, reader: R) -> Result<PackageSummary> {
        let mut archive = ZipArchive::new(reader)
            .map_err(|e| Error::ZipError(format!("Failed to open ZIP: {}", e)))?;

        let presentation = self.read_file_from_archive(&mut archive, "ppt/presentation.xml")?;
        let (slide_width, slide_height, slide_rel_ids) = parse_presentation(&presentation)?;

        let slide_order = self.get_slide_order(&mut archive, &slide_rel_ids)?;
        log::debug!("Package lists {} slides", slide_order.len());

        let mut slides = Vec::with_capacity(slide_order.len());
        for (idx, slide_path) in slide_order.iter().enumerate() {
            slides.push(self.parse_slide(&mut archive, slide_path, idx + 1)?);
        }

        Ok(PackageSummary {
            slide_width,
            slide_height,
            slides,
        })
    }

    /// Slide part names in presentation order.
    ///
    /// Follows `p:sldIdLst` when present; otherwise orders slide relationships
    /// by the number in their id or target.
    fn get_slide_order<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        listed: &[String],
    ) -> Result<Vec<String>> {
        let rels_content =
            self.read_file_from_archive(archive, "ppt/_rels/presentation.xml.rels")?;
        let slide_rels: Vec<Relationship> = parse_relationships(&rels_content)?
            .into_iter()
            .filter(|rel| rel.rel_type == REL_SLIDE)
            .collect();

        if !listed.is_empty() {
            return listed
                .iter()
                .map(|id| {
                    slide_rels
                        .iter()
                        .find(|rel| &rel.id == id)
                        .map(|rel| resolve_target("ppt", &rel.target))
                        .ok_or_else(|| {
                            Error::XmlError(format!("slide relationship '{}' not found", id))
                        })
                })
                .collect();
        }

        let mut slides: Vec<(String, Option<usize>)> = slide_rels
            .iter()
            .map(|rel| {
                let order = extract_slide_number(&rel.id).or_else(|| extract_slide_number(&rel.target));
                (resolve_target("ppt", &rel.target), order)
            })
            .collect();

        slides.sort_by(|a, b| match (a.1, b.1) {
            (Some(na), Some(nb)) => na.cmp(&nb),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.0.cmp(&b.0),
        });

        Ok(slides.into_iter().map(|(path, _)| path).collect())
    }

    fn parse_slide<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        slide_path: &str,
        slide_number: usize,
    ) -> Result<SlideSummary> {
        let content = self.read_file_from_archive(archive, slide_path)?;

        let rels_path = slide_rels_path(slide_path);
        let media: HashMap<String, String> = match self.read_file_from_archive(archive, &rels_path) {
            Ok(rels) => {
                let base = parent_dir(slide_path);
                parse_relationships(&rels)?
                    .into_iter()
                    .map(|rel| (rel.id, resolve_target(base, &rel.target)))
                    .collect()
            }
            Err(_) => HashMap::new(),
        };

        Ok(SlideSummary {
            number: slide_number,
            path: slide_path.to_string(),
            shapes: extract_shapes_from_xml(&content, &media)?,
        })
    }

    fn read_file_from_archive<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        path: &str,
    ) -> Result<String> {
        let mut file = archive
            .by_name(path)
            .map_err(|e| Error::ZipError(format!("File not found in archive '{}': {}", path, e)))?;

        let mut content = String::new();
        file.read_to_string(&mut content)
            .map_err(|e| Error::ZipError(format!("Failed to read '{}': {}", path, e)))?;

        Ok(content)
    }
}

impl Default for PptxInspector {
    fn default() -> Self {
        Self::new()
    }
}

struct Relationship {
    id: String,
    rel_type: String,
    target: String,
}

fn parse_relationships(xml: &str) -> Result<Vec<Relationship>> {
    let mut relationships = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if local_name(e.name().as_ref()) == b"Relationship" =>
            {
                relationships.push(Relationship {
                    id: attribute(e, b"Id").unwrap_or_default(),
                    rel_type: attribute(e, b"Type").unwrap_or_default(),
                    target: attribute(e, b"Target").unwrap_or_default(),
                });
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!(
                    "Error parsing relationships: {}",
                    e
                )))
            }
            _ => {}
        }
    }

    Ok(relationships)
}

/// Slide size and the relationship ids of `p:sldIdLst`, in order.
fn parse_presentation(xml: &str) -> Result<(i64, i64, Vec<String>)> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut size = (0, 0);
    let mut slide_ids = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => {
                match local_name(e.name().as_ref()) {
                    b"sldSz" => {
                        size = (
                            int_attribute(e, b"cx").unwrap_or(0),
                            int_attribute(e, b"cy").unwrap_or(0),
                        );
                    }
                    b"sldId" => {
                        if let Some(id) = relationship_id(e) {
                            slide_ids.push(id);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!(
                    "Error parsing presentation: {}",
                    e
                )))
            }
            _ => {}
        }
    }

    Ok((size.0, size.1, slide_ids))
}

/// Shapes of one slide, in document order.
fn extract_shapes_from_xml(xml: &str, media: &HashMap<String, String>) -> Result<Vec<ShapeSummary>> {
    let mut shapes = Vec::new();
    let mut reader = Reader::from_str(xml);

    let mut current_shape: Option<ShapeSummary> = None;
    let mut current_run: Option<RunSummary> = None;
    let mut paragraphs: Vec<String> = Vec::new();
    let mut in_run_properties = false;
    let mut in_text = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| Error::XmlError(format!("Error parsing slide: {}", e)))?;

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                let Some(shape) = current_shape.as_mut() else {
                    match local_name(e.name().as_ref()) {
                        b"sp" if !is_empty => current_shape = Some(ShapeSummary::new(ShapeKind::TextBox)),
                        b"pic" if !is_empty => current_shape = Some(ShapeSummary::new(ShapeKind::Picture)),
                        _ => {}
                    }
                    continue;
                };

                match local_name(e.name().as_ref()) {
                    b"off" => {
                        if let (Some(x), Some(y)) = (int_attribute(e, b"x"), int_attribute(e, b"y")) {
                            shape.x = x;
                            shape.y = y;
                        }
                    }
                    b"ext" => {
                        if let (Some(cx), Some(cy)) = (int_attribute(e, b"cx"), int_attribute(e, b"cy")) {
                            shape.cx = cx;
                            shape.cy = cy;
                        }
                    }
                    b"blip" => {
                        shape.media = relationship_id_named(e, b"embed")
                            .and_then(|id| media.get(&id).cloned());
                    }
                    b"p" => paragraphs.push(String::new()),
                    b"r" if !is_empty => current_run = Some(RunSummary::default()),
                    b"rPr" => {
                        if let Some(run) = current_run.as_mut() {
                            run.size = attribute(e, b"sz").and_then(|v| v.parse().ok());
                            run.bold = attribute(e, b"b").map(|v| v == "1" || v == "true");
                            run.italic = attribute(e, b"i").map(|v| v == "1" || v == "true");
                            in_run_properties = !is_empty;
                        }
                    }
                    b"srgbClr" if in_run_properties => {
                        if let Some(run) = current_run.as_mut() {
                            run.color = attribute(e, b"val");
                        }
                    }
                    b"t" if !is_empty => in_text = true,
                    _ => {}
                }
            }
            Event::Text(ref e) if in_text => {
                let text = e.unescape().unwrap_or_default();
                if let Some(run) = current_run.as_mut() {
                    run.text.push_str(&text);
                }
                if let Some(paragraph) = paragraphs.last_mut() {
                    paragraph.push_str(&text);
                }
            }
            Event::End(ref e) => match local_name(e.name().as_ref()) {
                b"sp" | b"pic" => {
                    if let Some(mut shape) = current_shape.take() {
                        shape.text = paragraphs.join("\n");
                        shapes.push(shape);
                    }
                    paragraphs.clear();
                    current_run = None;
                }
                b"r" => {
                    if let (Some(shape), Some(run)) = (current_shape.as_mut(), current_run.take()) {
                        shape.runs.push(run);
                    }
                }
                b"rPr" => in_run_properties = false,
                b"t" => in_text = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(shapes)
}

fn attribute(element: &BytesStart, name: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == name)
        .map(|attr| String::from_utf8_lossy(&attr.value).to_string())
}

fn int_attribute(element: &BytesStart, name: &[u8]) -> Option<i64> {
    attribute(element, name).and_then(|v| v.parse().ok())
}

/// Value of a namespaced attribute such as `r:embed`, matched by local name.
fn relationship_id_named(element: &BytesStart, local: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() != local && local_name(attr.key.as_ref()) == local)
        .map(|attr| String::from_utf8_lossy(&attr.value).to_string())
}

fn relationship_id(element: &BytesStart) -> Option<String> {
    relationship_id_named(element, b"id")
}

/// `ppt/slides/slide1.xml` -> `ppt/slides/_rels/slide1.xml.rels`
fn slide_rels_path(part: &str) -> String {
    let (dir, file) = part.rsplit_once('/').unwrap_or(("", part));
    format!("{}/_rels/{}.rels", dir, file)
}

fn parent_dir(part: &str) -> &str {
    part.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Resolve a relationship target against the directory of its source part.
fn resolve_target(base: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut segments: Vec<&str> = base.split('/').filter(|s| !s.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            ".." => {
                segments.pop();
            }
            "." | "" => {}
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Extract the local name from a potentially namespaced XML element name.
fn local_name(name: &[u8]) -> &[u8] {
    if let Some(pos) = name.iter().position(|&b| b == b':') {
        &name[pos + 1..]
    } else {
        name
    }
}

/// Extract a slide number from a string like "rId2" or "slide3.xml".
fn extract_slide_number(s: &str) -> Option<usize> {
    let s = s.trim_end_matches(".xml").trim_end_matches(".rels");

    let digits: String = s.chars().rev().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let digits: String = digits.chars().rev().collect();
    digits.parse().ok()
}
