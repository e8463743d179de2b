//! Serialization of a [`Deck`] into a PPTX package.
//!
//! Output is a pure function of the deck: media names, shape ids and
//! relationship ids follow insertion order, and every ZIP entry carries the
//! same fixed timestamp.

use pdfdeck_core::{
    Deck, Error, Frame, NormalizedImage, Paragraph, Picture, Result, Run, Shape, Slide, TextBox,
};
use std::borrow::Cow;
use std::fmt::Write as _;
use std::io::{Cursor, Write};
use std::sync::Arc;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::template::*;

/// Relationship id of the layout in every slide's part.
const SLIDE_LAYOUT_RID: &str = "rId1";

/// First `p:sldId` value; lower ids are reserved.
const FIRST_SLIDE_ID: usize = 256;

/// Smallest slide side PresentationML accepts (1 in).
pub const MIN_SLIDE_SIDE: i64 = 914_400;

/// Largest slide side PresentationML accepts (56 in).
pub const MAX_SLIDE_SIDE: i64 = 51_206_400;

/// Writes decks as `.pptx` bytes.
#[derive(Debug, Clone)]
pub struct PptxWriter {
    compression: CompressionMethod,
}

impl Default for PptxWriter {
    fn default() -> Self {
        Self {
            compression: CompressionMethod::Deflated,
        }
    }
}

impl PptxWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store entries uncompressed instead of deflating them.
    pub fn stored(mut self) -> Self {
        self.compression = CompressionMethod::Stored;
        self
    }

    /// Serialize the whole deck into an in-memory package.
    pub fn write(&self, deck: &Deck) -> Result<Vec<u8>> {
        let media = MediaTable::collect(deck);
        let mut package = Package::new(self.compression);

        package.add("[Content_Types].xml", content_types_xml(deck, &media)?.as_bytes())?;
        package.add("_rels/.rels", ROOT_RELS.as_bytes())?;
        package.add("ppt/presentation.xml", presentation_xml(deck)?.as_bytes())?;
        package.add(
            "ppt/_rels/presentation.xml.rels",
            presentation_rels(deck)?.as_bytes(),
        )?;
        package.add("ppt/presProps.xml", PRES_PROPS_XML.as_bytes())?;
        package.add("ppt/slideMasters/slideMaster1.xml", SLIDE_MASTER_XML.as_bytes())?;
        package.add(
            "ppt/slideMasters/_rels/slideMaster1.xml.rels",
            SLIDE_MASTER_RELS.as_bytes(),
        )?;
        package.add("ppt/slideLayouts/slideLayout1.xml", SLIDE_LAYOUT_XML.as_bytes())?;
        package.add(
            "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
            SLIDE_LAYOUT_RELS.as_bytes(),
        )?;
        package.add("ppt/theme/theme1.xml", THEME_XML.as_bytes())?;

        for (index, slide) in deck.slides().iter().enumerate() {
            let number = index + 1;
            let images = SlideImages::collect(slide, &media);
            package.add(
                &format!("ppt/slides/slide{}.xml", number),
                slide_xml(slide, &images, &media)?.as_bytes(),
            )?;
            package.add(
                &format!("ppt/slides/_rels/slide{}.xml.rels", number),
                slide_rels(&images, &media)?.as_bytes(),
            )?;
        }

        for (index, image) in media.images.iter().enumerate() {
            package.add(&format!("ppt/media/{}", media.file_name(index)), &image.data)?;
            log::debug!(
                "Embedded {} ({}x{}, {} bytes)",
                media.file_name(index),
                image.width,
                image.height,
                image.data.len()
            );
        }

        let bytes = package.finish()?;
        log::debug!(
            "Wrote {} slides and {} media parts ({} bytes)",
            deck.slide_count(),
            media.images.len(),
            bytes.len()
        );
        Ok(bytes)
    }
}

/// ZIP container with a fixed timestamp on every entry.
struct Package {
    zip: ZipWriter<Cursor<Vec<u8>>>,
    options: FileOptions,
}

impl Package {
    fn new(compression: CompressionMethod) -> Self {
        Self {
            zip: ZipWriter::new(Cursor::new(Vec::new())),
            options: FileOptions::default()
                .compression_method(compression)
                .last_modified_time(zip::DateTime::default()),
        }
    }

    fn add(&mut self, path: &str, data: &[u8]) -> Result<()> {
        self.zip
            .start_file(path, self.options)
            .map_err(|e| Error::ZipError(format!("Failed to start '{}': {}", path, e)))?;
        self.zip.write_all(data)?;
        Ok(())
    }

    fn finish(mut self) -> Result<Vec<u8>> {
        let cursor = self
            .zip
            .finish()
            .map_err(|e| Error::ZipError(format!("Failed to finish archive: {}", e)))?;
        Ok(cursor.into_inner())
    }
}

/// Every distinct image payload in the deck, in first-use order.
struct MediaTable {
    images: Vec<Arc<NormalizedImage>>,
}

impl MediaTable {
    fn collect(deck: &Deck) -> Self {
        let mut images: Vec<Arc<NormalizedImage>> = Vec::new();
        for picture in deck.slides().iter().flat_map(Slide::pictures) {
            if !images.iter().any(|known| Arc::ptr_eq(known, &picture.image)) {
                images.push(Arc::clone(&picture.image));
            }
        }
        Self { images }
    }

    fn index_of(&self, image: &Arc<NormalizedImage>) -> Option<usize> {
        self.images.iter().position(|known| Arc::ptr_eq(known, image))
    }

    fn file_name(&self, index: usize) -> String {
        format!("image{}.{}", index + 1, self.images[index].extension())
    }
}

/// Media used by one slide, in first-use order. Relationship ids start after the layout.
struct SlideImages {
    media_indices: Vec<usize>,
}

impl SlideImages {
    fn collect(slide: &Slide, media: &MediaTable) -> Self {
        let mut media_indices = Vec::new();
        for picture in slide.pictures() {
            if let Some(index) = media.index_of(&picture.image) {
                if !media_indices.contains(&index) {
                    media_indices.push(index);
                }
            }
        }
        Self { media_indices }
    }

    fn rel_id(&self, media: &MediaTable, picture: &Picture) -> Result<String> {
        media
            .index_of(&picture.image)
            .and_then(|index| self.media_indices.iter().position(|&i| i == index))
            .map(|position| format!("rId{}", position + 2))
            .ok_or_else(|| Error::Serialize("picture payload missing from media table".to_string()))
    }
}

fn xml_err(e: std::fmt::Error) -> Error {
    Error::XmlError(e.to_string())
}

/// Escape text for XML, dropping characters XML 1.0 cannot carry.
fn escape_text(text: &str) -> Cow<'_, str> {
    let valid = |c: char| {
        matches!(c, '\t' | '\n' | '\r')
            || (c >= ' ' && c != '\u{FFFE}' && c != '\u{FFFF}')
    };

    if text.chars().all(valid) {
        quick_xml::escape::escape(text)
    } else {
        let cleaned: String = text.chars().filter(|&c| valid(c)).collect();
        Cow::Owned(quick_xml::escape::escape(cleaned.as_str()).into_owned())
    }
}

fn content_types_xml(deck: &Deck, media: &MediaTable) -> Result<String> {
    let mut xml = String::with_capacity(2048);
    xml.push_str(XML_DECLARATION);
    xml.push_str(
        r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    );
    write!(xml, r#"<Default Extension="rels" ContentType="{}"/>"#, CT_RELS).map_err(xml_err)?;
    xml.push_str(r#"<Default Extension="xml" ContentType="application/xml"/>"#);

    let mut extensions: Vec<(&str, &str)> = Vec::new();
    for image in &media.images {
        let entry = (image.extension(), image.content_type());
        if !extensions.contains(&entry) {
            extensions.push(entry);
        }
    }
    for (extension, content_type) in extensions {
        write!(
            xml,
            r#"<Default Extension="{}" ContentType="{}"/>"#,
            extension, content_type
        )
        .map_err(xml_err)?;
    }

    let overrides = [
        ("/ppt/presentation.xml", CT_PRESENTATION),
        ("/ppt/presProps.xml", CT_PRES_PROPS),
        ("/ppt/slideMasters/slideMaster1.xml", CT_SLIDE_MASTER),
        ("/ppt/slideLayouts/slideLayout1.xml", CT_SLIDE_LAYOUT),
        ("/ppt/theme/theme1.xml", CT_THEME),
    ];
    for (part, content_type) in overrides {
        write!(
            xml,
            r#"<Override PartName="{}" ContentType="{}"/>"#,
            part, content_type
        )
        .map_err(xml_err)?;
    }
    for number in 1..=deck.slide_count() {
        write!(
            xml,
            r#"<Override PartName="/ppt/slides/slide{}.xml" ContentType="{}"/>"#,
            number, CT_SLIDE
        )
        .map_err(xml_err)?;
    }

    xml.push_str("</Types>");
    Ok(xml)
}

/// Master is `rId1`, theme `rId2`, properties `rId3`, slides from `rId4`.
fn presentation_rels(deck: &Deck) -> Result<String> {
    let mut xml = String::with_capacity(1024);
    xml.push_str(XML_DECLARATION);
    write!(xml, r#"<Relationships xmlns="{}">"#, NS_RELS).map_err(xml_err)?;
    write!(
        xml,
        r#"<Relationship Id="rId1" Type="{}" Target="slideMasters/slideMaster1.xml"/>"#,
        REL_SLIDE_MASTER
    )
    .map_err(xml_err)?;
    write!(
        xml,
        r#"<Relationship Id="rId2" Type="{}" Target="theme/theme1.xml"/>"#,
        REL_THEME
    )
    .map_err(xml_err)?;
    write!(
        xml,
        r#"<Relationship Id="rId3" Type="{}" Target="presProps.xml"/>"#,
        REL_PRES_PROPS
    )
    .map_err(xml_err)?;
    for number in 1..=deck.slide_count() {
        write!(
            xml,
            r#"<Relationship Id="rId{}" Type="{}" Target="slides/slide{}.xml"/>"#,
            number + 3,
            REL_SLIDE,
            number
        )
        .map_err(xml_err)?;
    }
    xml.push_str("</Relationships>");
    Ok(xml)
}

/// Declared slide size, clamped into the range PresentationML allows.
///
/// Shapes keep the deck's own coordinates; only the declaration changes.
fn slide_size(deck: &Deck) -> (i64, i64) {
    let cx = deck.width().clamp(MIN_SLIDE_SIDE, MAX_SLIDE_SIDE);
    let cy = deck.height().clamp(MIN_SLIDE_SIDE, MAX_SLIDE_SIDE);
    if (cx, cy) != (deck.width(), deck.height()) {
        log::warn!(
            "Slide size {}x{} EMU is outside {}..={} EMU, declaring {}x{}",
            deck.width(),
            deck.height(),
            MIN_SLIDE_SIDE,
            MAX_SLIDE_SIDE,
            cx,
            cy
        );
    }
    (cx, cy)
}

fn presentation_xml(deck: &Deck) -> Result<String> {
    let mut xml = String::with_capacity(1024);
    xml.push_str(XML_DECLARATION);
    write!(
        xml,
        r#"<p:presentation xmlns:a="{}" xmlns:r="{}" xmlns:p="{}" saveSubsetFonts="1">"#,
        NS_A, NS_R, NS_P
    )
    .map_err(xml_err)?;

    xml.push_str(r#"<p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst>"#);

    if deck.slide_count() > 0 {
        xml.push_str("<p:sldIdLst>");
        for index in 0..deck.slide_count() {
            write!(
                xml,
                r#"<p:sldId id="{}" r:id="rId{}"/>"#,
                FIRST_SLIDE_ID + index,
                index + 4
            )
            .map_err(xml_err)?;
        }
        xml.push_str("</p:sldIdLst>");
    }

    let (cx, cy) = slide_size(deck);
    write!(xml, r#"<p:sldSz cx="{}" cy="{}"/>"#, cx, cy).map_err(xml_err)?;
    xml.push_str(r#"<p:notesSz cx="6858000" cy="9144000"/>"#);
    xml.push_str("</p:presentation>");
    Ok(xml)
}

fn slide_rels(images: &SlideImages, media: &MediaTable) -> Result<String> {
    let mut xml = String::with_capacity(512);
    xml.push_str(XML_DECLARATION);
    write!(xml, r#"<Relationships xmlns="{}">"#, NS_RELS).map_err(xml_err)?;
    write!(
        xml,
        r#"<Relationship Id="{}" Type="{}" Target="../slideLayouts/slideLayout1.xml"/>"#,
        SLIDE_LAYOUT_RID, REL_SLIDE_LAYOUT
    )
    .map_err(xml_err)?;
    for (position, &index) in images.media_indices.iter().enumerate() {
        write!(
            xml,
            r#"<Relationship Id="rId{}" Type="{}" Target="../media/{}"/>"#,
            position + 2,
            REL_IMAGE,
            media.file_name(index)
        )
        .map_err(xml_err)?;
    }
    xml.push_str("</Relationships>");
    Ok(xml)
}

fn slide_xml(slide: &Slide, images: &SlideImages, media: &MediaTable) -> Result<String> {
    let mut xml = String::with_capacity(4096);
    xml.push_str(XML_DECLARATION);
    write!(
        xml,
        r#"<p:sld xmlns:a="{}" xmlns:r="{}" xmlns:p="{}">"#,
        NS_A, NS_R, NS_P
    )
    .map_err(xml_err)?;
    xml.push_str("<p:cSld><p:spTree>");
    xml.push_str(SP_TREE_HEADER);

    // id 1 is the tree itself
    let mut pictures_seen = 0;
    for (index, shape) in slide.shapes().iter().enumerate() {
        let shape_id = index + 2;
        match shape {
            Shape::Picture(picture) => {
                pictures_seen += 1;
                let rel_id = images.rel_id(media, picture)?;
                write_picture(&mut xml, shape_id, pictures_seen, picture, &rel_id)?;
            }
            Shape::TextBox(text_box) => {
                write_text_box(&mut xml, shape_id, text_box)?;
            }
        }
    }

    xml.push_str("</p:spTree></p:cSld>");
    xml.push_str("<p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr>");
    xml.push_str("</p:sld>");
    Ok(xml)
}

fn write_xfrm(xml: &mut String, frame: &Frame) -> Result<()> {
    xml.push_str("<a:xfrm>");
    write!(xml, r#"<a:off x="{}" y="{}"/>"#, frame.x(), frame.y()).map_err(xml_err)?;
    write!(xml, r#"<a:ext cx="{}" cy="{}"/>"#, frame.cx(), frame.cy()).map_err(xml_err)?;
    xml.push_str("</a:xfrm>");
    Ok(())
}

fn write_picture(
    xml: &mut String,
    shape_id: usize,
    number: usize,
    picture: &Picture,
    rel_id: &str,
) -> Result<()> {
    xml.push_str("<p:pic>");
    xml.push_str("<p:nvPicPr>");
    write!(
        xml,
        r#"<p:cNvPr id="{}" name="Picture {}" descr=""/>"#,
        shape_id, number
    )
    .map_err(xml_err)?;
    xml.push_str(r#"<p:cNvPicPr><a:picLocks noChangeAspect="1"/></p:cNvPicPr>"#);
    xml.push_str("<p:nvPr/>");
    xml.push_str("</p:nvPicPr>");

    xml.push_str("<p:blipFill>");
    write!(xml, r#"<a:blip r:embed="{}"/>"#, rel_id).map_err(xml_err)?;
    xml.push_str("<a:stretch><a:fillRect/></a:stretch>");
    xml.push_str("</p:blipFill>");

    xml.push_str("<p:spPr>");
    write_xfrm(xml, &picture.frame)?;
    xml.push_str(r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom>"#);
    xml.push_str("</p:spPr>");
    xml.push_str("</p:pic>");
    Ok(())
}

fn write_text_box(xml: &mut String, shape_id: usize, text_box: &TextBox) -> Result<()> {
    xml.push_str("<p:sp>");
    xml.push_str("<p:nvSpPr>");
    write!(
        xml,
        r#"<p:cNvPr id="{}" name="TextBox {}"/>"#,
        shape_id,
        shape_id - 1
    )
    .map_err(xml_err)?;
    xml.push_str(r#"<p:cNvSpPr txBox="1"/>"#);
    xml.push_str("<p:nvPr/>");
    xml.push_str("</p:nvSpPr>");

    xml.push_str("<p:spPr>");
    write_xfrm(xml, &text_box.frame)?;
    xml.push_str(r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom>"#);
    xml.push_str("<a:noFill/>");
    xml.push_str("</p:spPr>");

    xml.push_str("<p:txBody>");
    let wrap = if text_box.word_wrap { "square" } else { "none" };
    write!(xml, r#"<a:bodyPr wrap="{}" rtlCol="0"><a:noAutofit/></a:bodyPr>"#, wrap)
        .map_err(xml_err)?;
    xml.push_str("<a:lstStyle/>");

    if text_box.paragraphs().is_empty() {
        xml.push_str("<a:p/>");
    }
    for paragraph in text_box.paragraphs() {
        write_paragraph(xml, paragraph)?;
    }

    xml.push_str("</p:txBody>");
    xml.push_str("</p:sp>");
    Ok(())
}

fn write_paragraph(xml: &mut String, paragraph: &Paragraph) -> Result<()> {
    xml.push_str("<a:p>");
    for run in paragraph.runs() {
        write_run(xml, run)?;
    }
    xml.push_str("</a:p>");
    Ok(())
}

fn write_run(xml: &mut String, run: &Run) -> Result<()> {
    xml.push_str("<a:r>");
    match &run.style {
        Some(style) => {
            write!(
                xml,
                r#"<a:rPr lang="en-US" sz="{}" b="{}" i="{}" dirty="0">"#,
                style.size,
                u8::from(style.bold),
                u8::from(style.italic)
            )
            .map_err(xml_err)?;
            write!(
                xml,
                r#"<a:solidFill><a:srgbClr val="{}"/></a:solidFill>"#,
                style.color.to_hex()
            )
            .map_err(xml_err)?;
            xml.push_str("</a:rPr>");
        }
        None => xml.push_str(r#"<a:rPr lang="en-US" dirty="0"/>"#),
    }
    write!(xml, "<a:t>{}</a:t>", escape_text(&run.text)).map_err(xml_err)?;
    xml.push_str("</a:r>");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageFormat;
    use pdfdeck_core::{Rgb, RunStyle};
    use std::io::Read;
    use zip::ZipArchive;

    fn payload(format: ImageFormat) -> Arc<NormalizedImage> {
        Arc::new(NormalizedImage {
            data: vec![1, 2, 3, 4],
            width: 2,
            height: 1,
            format,
        })
    }

    fn entries(bytes: &[u8]) -> Vec<String> {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect()
    }

    fn read_part(bytes: &[u8], name: &str) -> String {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut content = String::new();
        archive
            .by_name(name)
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        content
    }

    fn frame() -> Frame {
        Frame::new(10, 20, 30, 40).unwrap()
    }

    #[test]
    fn test_escape_text() {
        assert_eq!(escape_text("a < b & c"), "a &lt; b &amp; c");
        assert_eq!(escape_text("bell\u{7}tab\t"), "belltab\t");
        assert!(matches!(escape_text("plain"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_empty_deck_has_fixed_parts() {
        let bytes = PptxWriter::new().write(&Deck::new()).unwrap();
        let names = entries(&bytes);

        for part in [
            "[Content_Types].xml",
            "_rels/.rels",
            "ppt/presentation.xml",
            "ppt/slideMasters/slideMaster1.xml",
            "ppt/slideLayouts/slideLayout1.xml",
            "ppt/theme/theme1.xml",
        ] {
            assert!(names.iter().any(|n| n == part), "missing {}", part);
        }
        let presentation = read_part(&bytes, "ppt/presentation.xml");
        assert!(presentation.contains(r#"<p:sldSz cx="9144000" cy="6858000"/>"#));
        assert!(!presentation.contains("sldIdLst"));
    }

    #[test]
    fn test_slide_size_clamped_to_allowed_range() {
        let mut banner = Deck::new();
        banner.set_canvas(457_200, 60_000_000).unwrap();
        let bytes = PptxWriter::new().write(&banner).unwrap();
        let presentation = read_part(&bytes, "ppt/presentation.xml");
        assert!(presentation.contains(r#"<p:sldSz cx="914400" cy="51206400"/>"#));
        assert_eq!(banner.height(), 60_000_000);

        let mut letter = Deck::new();
        letter.set_canvas(7_772_400, 10_058_400).unwrap();
        assert_eq!(slide_size(&letter), (7_772_400, 10_058_400));
    }

    #[test]
    fn test_shared_payload_written_once() {
        let mut deck = Deck::new();
        let shared = payload(ImageFormat::Png);
        let slide = deck.add_slide();
        slide.add_picture(Arc::clone(&shared), frame());
        slide.add_picture(Arc::clone(&shared), frame());
        deck.add_slide()
            .add_picture(payload(ImageFormat::Jpeg), frame());

        let bytes = PptxWriter::new().write(&deck).unwrap();
        let media: Vec<String> = entries(&bytes)
            .into_iter()
            .filter(|n| n.starts_with("ppt/media/"))
            .collect();
        assert_eq!(media, vec!["ppt/media/image1.png", "ppt/media/image2.jpeg"]);

        let first = read_part(&bytes, "ppt/slides/slide1.xml");
        assert_eq!(first.matches(r#"r:embed="rId2""#).count(), 2);
        let second_rels = read_part(&bytes, "ppt/slides/_rels/slide2.xml.rels");
        assert!(second_rels.contains(r#"Id="rId2""#));
        assert!(second_rels.contains("../media/image2.jpeg"));

        let types = read_part(&bytes, "[Content_Types].xml");
        assert!(types.contains(r#"Extension="jpeg" ContentType="image/jpeg""#));
    }

    #[test]
    fn test_run_markup() {
        let mut deck = Deck::new();
        let text_box = deck.add_slide().add_text_box(frame());
        let paragraph = text_box.add_paragraph();
        paragraph.add_run("Bold & red").style =
            Some(RunStyle::new(14.0, Rgb::new(0xFF, 0, 0), true, false).unwrap());
        paragraph.add_run("plain");
        text_box.add_paragraph().add_run("");

        let bytes = PptxWriter::new().write(&deck).unwrap();
        let slide = read_part(&bytes, "ppt/slides/slide1.xml");

        assert!(slide.contains(r#"<a:rPr lang="en-US" sz="1400" b="1" i="0" dirty="0">"#));
        assert!(slide.contains(r#"<a:srgbClr val="FF0000"/>"#));
        assert!(slide.contains("<a:t>Bold &amp; red</a:t>"));
        assert!(slide.contains(r#"<a:rPr lang="en-US" dirty="0"/><a:t>plain</a:t>"#));
        assert!(slide.contains("<a:t></a:t>"));
        assert!(slide.contains(r#"wrap="square""#));
    }

    #[test]
    fn test_empty_text_box_gets_empty_paragraph() {
        let mut deck = Deck::new();
        deck.add_slide().add_text_box(frame());

        let bytes = PptxWriter::new().write(&deck).unwrap();
        let slide = read_part(&bytes, "ppt/slides/slide1.xml");
        assert!(slide.contains("<a:lstStyle/><a:p/></p:txBody>"));
    }

    #[test]
    fn test_output_is_deterministic() {
        let build = || {
            let mut deck = Deck::new();
            deck.set_canvas(7_772_400, 10_058_400).unwrap();
            let slide = deck.add_slide();
            slide.add_picture(payload(ImageFormat::Png), frame());
            slide.add_text_box(frame()).add_paragraph().add_run("same");
            deck
        };

        let writer = PptxWriter::new();
        assert_eq!(
            writer.write(&build()).unwrap(),
            writer.write(&build()).unwrap()
        );
    }
}
