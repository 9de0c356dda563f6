//! Output-document seam and the DOCX (OOXML) writer behind it.
//!
//! The conversion pipeline hands a [`DocumentBuilder`] an ordered list of
//! [`OutputUnit`]s and gets serialized bytes back. [`DocxBuilder`] writes a
//! minimal WordprocessingML package, each XML part streamed through
//! `quick_xml::Writer`: a zip with five kinds of parts.
//!
//! ```text
//! [Content_Types].xml            part → MIME type map
//! _rels/.rels                    package → word/document.xml
//! word/document.xml              one block per unit (see below)
//! word/_rels/document.xml.rels   rIdN → media/imageN.jpeg
//! word/media/imageN.jpeg         page rasters, stored uncompressed
//! ```
//!
//! Each unit becomes a centred paragraph holding the page image as an inline
//! drawing scaled to fit the page, followed by the page's text in a 1-point
//! white run (invisible on screen, still found by search and copy), followed
//! by a page break unless it is the last unit.

use crate::config::PaperSize;
use crate::error::Pdf2DocxError;
use crate::pipeline::encode::EncodedImage;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::{Cursor, Write};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// One page's worth of output.
#[derive(Debug, Clone)]
pub struct OutputUnit {
    /// Source page number (1-indexed), used for naming media parts.
    pub page: usize,
    pub image: EncodedImage,
    /// Searchable text, rendered invisible.
    pub hidden_text: String,
    pub page_break_after: bool,
}

/// Serializes output units into a document file.
pub trait DocumentBuilder: Send + Sync {
    /// File extension without the dot, e.g. `docx`.
    fn extension(&self) -> &'static str;

    /// Serialize `units`, in order, onto pages of `paper` size.
    fn build(&self, units: &[OutputUnit], paper: PaperSize) -> Result<Vec<u8>, Pdf2DocxError>;
}

/// Writes Office Open XML word-processing documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocxBuilder;

impl DocxBuilder {
    pub fn new() -> Self {
        Self
    }
}

const EMU_PER_TWIP: u64 = 635;
/// Space kept free under each image for the hidden text line.
const TEXT_RESERVE_TWIPS: u32 = 360;
/// Half-points; 2 = 1 pt.
const HIDDEN_TEXT_SIZE: u32 = 2;

const NS_CONTENT_TYPES: &str = "http://schemas.openxmlformats.org/package/2006/content-types";
const NS_RELATIONSHIPS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const REL_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
const REL_IMAGE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
const URI_PICTURE: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";

const DOCUMENT_NAMESPACES: [(&str, &str); 5] = [
    (
        "xmlns:w",
        "http://schemas.openxmlformats.org/wordprocessingml/2006/main",
    ),
    (
        "xmlns:r",
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships",
    ),
    (
        "xmlns:wp",
        "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing",
    ),
    (
        "xmlns:a",
        "http://schemas.openxmlformats.org/drawingml/2006/main",
    ),
    ("xmlns:pic", URI_PICTURE),
];

impl DocumentBuilder for DocxBuilder {
    fn extension(&self) -> &'static str {
        "docx"
    }

    fn build(&self, units: &[OutputUnit], paper: PaperSize) -> Result<Vec<u8>, Pdf2DocxError> {
        let zip_err = |e: zip::result::ZipError| Pdf2DocxError::ConversionFailed(format!("zip: {e}"));
        let io_err = |e: std::io::Error| Pdf2DocxError::ConversionFailed(format!("zip write: {e}"));

        let xml = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let media = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

        let parts = [
            ("[Content_Types].xml", content_types()?),
            ("_rels/.rels", package_rels()?),
            ("word/document.xml", document_xml(units, paper)?),
            ("word/_rels/document.xml.rels", document_rels(units)?),
        ];
        for (name, body) in parts {
            zip.start_file(name, xml).map_err(zip_err)?;
            zip.write_all(&body).map_err(io_err)?;
        }

        for (i, unit) in units.iter().enumerate() {
            zip.start_file(media_name(i, &unit.image), media)
                .map_err(zip_err)?;
            zip.write_all(&unit.image.data).map_err(io_err)?;
        }

        let bytes = zip.finish().map_err(zip_err)?.into_inner();
        debug!("DOCX assembled: {} units, {} bytes", units.len(), bytes.len());
        Ok(bytes)
    }
}

fn media_name(index: usize, image: &EncodedImage) -> String {
    format!("word/media/image{}.{}", index + 1, image.encoding.extension())
}

/// One XML part being written.
struct Part {
    writer: Writer<Cursor<Vec<u8>>>,
}

fn xml_err(e: quick_xml::Error) -> Pdf2DocxError {
    Pdf2DocxError::ConversionFailed(format!("xml: {e}"))
}

impl Part {
    fn new() -> Result<Self, Pdf2DocxError> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))
            .map_err(xml_err)?;
        Ok(Self { writer })
    }

    fn open(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), Pdf2DocxError> {
        let mut elem = BytesStart::new(name);
        elem.extend_attributes(attrs.iter().copied());
        self.writer.write_event(Event::Start(elem)).map_err(xml_err)
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), Pdf2DocxError> {
        let mut elem = BytesStart::new(name);
        elem.extend_attributes(attrs.iter().copied());
        self.writer.write_event(Event::Empty(elem)).map_err(xml_err)
    }

    fn close(&mut self, name: &str) -> Result<(), Pdf2DocxError> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_err)
    }

    fn text(&mut self, text: &str) -> Result<(), Pdf2DocxError> {
        self.writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(xml_err)
    }

    fn finish(self) -> Vec<u8> {
        self.writer.into_inner().into_inner()
    }
}

fn content_types() -> Result<Vec<u8>, Pdf2DocxError> {
    let mut part = Part::new()?;
    part.open("Types", &[("xmlns", NS_CONTENT_TYPES)])?;
    for (extension, content_type) in [
        ("rels", "application/vnd.openxmlformats-package.relationships+xml"),
        ("xml", "application/xml"),
        ("jpeg", "image/jpeg"),
        ("png", "image/png"),
    ] {
        part.empty(
            "Default",
            &[("Extension", extension), ("ContentType", content_type)],
        )?;
    }
    part.empty(
        "Override",
        &[
            ("PartName", "/word/document.xml"),
            (
                "ContentType",
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml",
            ),
        ],
    )?;
    part.close("Types")?;
    Ok(part.finish())
}

fn package_rels() -> Result<Vec<u8>, Pdf2DocxError> {
    let mut part = Part::new()?;
    part.open("Relationships", &[("xmlns", NS_RELATIONSHIPS)])?;
    part.empty(
        "Relationship",
        &[
            ("Id", "rId1"),
            ("Type", REL_OFFICE_DOCUMENT),
            ("Target", "word/document.xml"),
        ],
    )?;
    part.close("Relationships")?;
    Ok(part.finish())
}

fn document_rels(units: &[OutputUnit]) -> Result<Vec<u8>, Pdf2DocxError> {
    let mut part = Part::new()?;
    part.open("Relationships", &[("xmlns", NS_RELATIONSHIPS)])?;
    for (i, unit) in units.iter().enumerate() {
        let id = format!("rId{}", i + 1);
        let target = format!("media/image{}.{}", i + 1, unit.image.encoding.extension());
        part.empty(
            "Relationship",
            &[("Id", id.as_str()), ("Type", REL_IMAGE), ("Target", target.as_str())],
        )?;
    }
    part.close("Relationships")?;
    Ok(part.finish())
}

/// Largest `(cx, cy)` in EMU that fits `image` inside the page box.
fn fit_extent(image: &EncodedImage, paper: PaperSize) -> (u64, u64) {
    let (page_w, page_h) = paper.twips();
    let box_w = page_w as u64 * EMU_PER_TWIP;
    let box_h = page_h.saturating_sub(TEXT_RESERVE_TWIPS) as u64 * EMU_PER_TWIP;
    let (w, h) = (image.width.max(1) as u64, image.height.max(1) as u64);

    // Compare box_w / w against box_h / h without floats.
    if box_w * h <= box_h * w {
        (box_w, (box_w * h / w).max(1))
    } else {
        ((box_h * w / h).max(1), box_h)
    }
}

fn document_xml(units: &[OutputUnit], paper: PaperSize) -> Result<Vec<u8>, Pdf2DocxError> {
    let mut part = Part::new()?;
    part.open("w:document", &DOCUMENT_NAMESPACES)?;
    part.open("w:body", &[])?;

    for (i, unit) in units.iter().enumerate() {
        page_image_paragraph(&mut part, i + 1, unit, paper)?;

        if !unit.hidden_text.is_empty() {
            hidden_text_paragraph(&mut part, &unit.hidden_text)?;
        }

        if unit.page_break_after {
            part.open("w:p", &[])?;
            part.open("w:r", &[])?;
            part.empty("w:br", &[("w:type", "page")])?;
            part.close("w:r")?;
            part.close("w:p")?;
        }
    }

    let (page_w, page_h) = paper.twips();
    let (page_w, page_h) = (page_w.to_string(), page_h.to_string());
    part.open("w:sectPr", &[])?;
    part.empty("w:pgSz", &[("w:w", page_w.as_str()), ("w:h", page_h.as_str())])?;
    part.empty(
        "w:pgMar",
        &[
            ("w:top", "0"),
            ("w:right", "0"),
            ("w:bottom", "0"),
            ("w:left", "0"),
            ("w:header", "0"),
            ("w:footer", "0"),
            ("w:gutter", "0"),
        ],
    )?;
    part.close("w:sectPr")?;

    part.close("w:body")?;
    part.close("w:document")?;
    Ok(part.finish())
}

/// A centred paragraph holding the page image as an inline drawing.
fn page_image_paragraph(
    part: &mut Part,
    n: usize,
    unit: &OutputUnit,
    paper: PaperSize,
) -> Result<(), Pdf2DocxError> {
    let (cx, cy) = fit_extent(&unit.image, paper);
    let (cx, cy) = (cx.to_string(), cy.to_string());
    let id = n.to_string();
    let rel = format!("rId{n}");
    let title = format!("Page {}", unit.page);
    let file = format!("page-{}.{}", unit.page, unit.image.encoding.extension());
    let zero = [("distT", "0"), ("distB", "0"), ("distL", "0"), ("distR", "0")];

    part.open("w:p", &[])?;
    part.open("w:pPr", &[])?;
    part.empty("w:spacing", &[("w:before", "0"), ("w:after", "0")])?;
    part.empty("w:jc", &[("w:val", "center")])?;
    part.close("w:pPr")?;
    part.open("w:r", &[])?;
    part.open("w:drawing", &[])?;
    part.open("wp:inline", &zero)?;
    part.empty("wp:extent", &[("cx", cx.as_str()), ("cy", cy.as_str())])?;
    part.empty("wp:docPr", &[("id", id.as_str()), ("name", title.as_str())])?;
    part.open("a:graphic", &[])?;
    part.open("a:graphicData", &[("uri", URI_PICTURE)])?;
    part.open("pic:pic", &[])?;

    part.open("pic:nvPicPr", &[])?;
    part.empty("pic:cNvPr", &[("id", id.as_str()), ("name", file.as_str())])?;
    part.empty("pic:cNvPicPr", &[])?;
    part.close("pic:nvPicPr")?;

    part.open("pic:blipFill", &[])?;
    part.empty("a:blip", &[("r:embed", rel.as_str())])?;
    part.open("a:stretch", &[])?;
    part.empty("a:fillRect", &[])?;
    part.close("a:stretch")?;
    part.close("pic:blipFill")?;

    part.open("pic:spPr", &[])?;
    part.open("a:xfrm", &[])?;
    part.empty("a:off", &[("x", "0"), ("y", "0")])?;
    part.empty("a:ext", &[("cx", cx.as_str()), ("cy", cy.as_str())])?;
    part.close("a:xfrm")?;
    part.open("a:prstGeom", &[("prst", "rect")])?;
    part.empty("a:avLst", &[])?;
    part.close("a:prstGeom")?;
    part.close("pic:spPr")?;

    part.close("pic:pic")?;
    part.close("a:graphicData")?;
    part.close("a:graphic")?;
    part.close("wp:inline")?;
    part.close("w:drawing")?;
    part.close("w:r")?;
    part.close("w:p")
}

/// The page's text as a 1-point white run, one `w:t` per line.
fn hidden_text_paragraph(part: &mut Part, text: &str) -> Result<(), Pdf2DocxError> {
    let size = HIDDEN_TEXT_SIZE.to_string();

    part.open("w:p", &[])?;
    part.open("w:pPr", &[])?;
    part.empty(
        "w:spacing",
        &[
            ("w:before", "0"),
            ("w:after", "0"),
            ("w:line", "20"),
            ("w:lineRule", "exact"),
        ],
    )?;
    part.close("w:pPr")?;
    part.open("w:r", &[])?;
    part.open("w:rPr", &[])?;
    part.empty("w:color", &[("w:val", "FFFFFF")])?;
    part.empty("w:sz", &[("w:val", size.as_str())])?;
    part.empty("w:szCs", &[("w:val", size.as_str())])?;
    part.close("w:rPr")?;
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            part.empty("w:br", &[])?;
        }
        part.open("w:t", &[("xml:space", "preserve")])?;
        part.text(line)?;
        part.close("w:t")?;
    }
    part.close("w:r")?;
    part.close("w:p")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::encode::ImageEncoding;
    use std::io::Read;

    fn unit(page: usize, text: &str, page_break_after: bool) -> OutputUnit {
        OutputUnit {
            page,
            image: EncodedImage {
                data: vec![0xFF, 0xD8, 0xFF, 0xD9],
                encoding: ImageEncoding::Jpeg,
                width: 850,
                height: 1100,
            },
            hidden_text: text.to_string(),
            page_break_after,
        }
    }

    fn read_part(bytes: &[u8], name: &str) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut file = archive.by_name(name).unwrap();
        let mut s = String::new();
        file.read_to_string(&mut s).unwrap();
        s
    }

    #[test]
    fn package_contains_all_parts() {
        let units = vec![unit(1, "one", true), unit(2, "two", false)];
        let bytes = DocxBuilder::new().build(&units, PaperSize::Letter).unwrap();

        let archive = zip::ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        let names: Vec<&str> = archive.file_names().collect();
        for part in [
            "[Content_Types].xml",
            "_rels/.rels",
            "word/document.xml",
            "word/_rels/document.xml.rels",
            "word/media/image1.jpeg",
            "word/media/image2.jpeg",
        ] {
            assert!(names.contains(&part), "missing {part}: {names:?}");
        }
    }

    #[test]
    fn one_drawing_per_unit_and_breaks_between() {
        let units = vec![
            unit(1, "a", true),
            unit(2, "b", true),
            unit(3, "c", false),
        ];
        let bytes = DocxBuilder::new().build(&units, PaperSize::A4).unwrap();
        let doc = read_part(&bytes, "word/document.xml");

        assert_eq!(doc.matches("<w:drawing>").count(), 3);
        assert_eq!(doc.matches(r#"w:type="page""#).count(), 2);
        assert!(doc.find("rId1").unwrap() < doc.find("rId2").unwrap());
        assert!(doc.contains(r#"<w:pgSz w:w="11906" w:h="16838"/>"#));
    }

    #[test]
    fn hidden_text_is_tiny_white_and_escaped() {
        let units = vec![unit(1, "Q&A <b>\nline two", false)];
        let bytes = DocxBuilder::new().build(&units, PaperSize::Letter).unwrap();
        let doc = read_part(&bytes, "word/document.xml");

        assert!(doc.contains(r#"<w:color w:val="FFFFFF"/>"#));
        assert!(doc.contains(r#"<w:sz w:val="2"/>"#));
        assert!(doc.contains("Q&amp;A &lt;b&gt;"));
        assert!(doc.contains("<w:br/>"));
    }

    #[test]
    fn empty_text_emits_no_text_run() {
        let bytes = DocxBuilder::new()
            .build(&[unit(1, "", false)], PaperSize::Letter)
            .unwrap();
        let doc = read_part(&bytes, "word/document.xml");
        assert!(!doc.contains("<w:t "));
    }

    #[test]
    fn extent_fits_page_and_keeps_aspect() {
        let img = unit(1, "", false).image;
        let (cx, cy) = fit_extent(&img, PaperSize::Letter);
        assert!(cx <= 12240 * EMU_PER_TWIP);
        assert!(cy <= (15840 - TEXT_RESERVE_TWIPS) as u64 * EMU_PER_TWIP);
        let ratio = cx as f64 / cy as f64;
        assert!((ratio - 850.0 / 1100.0).abs() < 0.001);

        let wide = EncodedImage {
            width: 2000,
            height: 500,
            ..img
        };
        let (cx, _) = fit_extent(&wide, PaperSize::Letter);
        assert_eq!(cx, 12240 * EMU_PER_TWIP);
    }

    #[test]
    fn markup_in_text_is_escaped_and_parts_stay_well_formed() {
        let units = vec![unit(1, r#"if a < b && c > "d" then 'e'"#, false)];
        let bytes = DocxBuilder::new().build(&units, PaperSize::Letter).unwrap();

        for name in [
            "[Content_Types].xml",
            "_rels/.rels",
            "word/document.xml",
            "word/_rels/document.xml.rels",
        ] {
            let xml = read_part(&bytes, name);
            assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#));
            let mut reader = quick_xml::Reader::from_str(&xml);
            loop {
                match reader.read_event() {
                    Ok(quick_xml::events::Event::Eof) => break,
                    Ok(_) => {}
                    Err(e) => panic!("{name} is not well-formed: {e}"),
                }
            }
        }

        let doc = read_part(&bytes, "word/document.xml");
        assert!(doc.contains("&lt; b &amp;&amp; c &gt;"));
        assert!(!doc.contains("a < b"));
    }

    #[test]
    fn relationships_point_at_media_in_order() {
        let units = vec![unit(1, "", true), unit(2, "", false)];
        let bytes = DocxBuilder::new().build(&units, PaperSize::Letter).unwrap();
        let rels = read_part(&bytes, "word/_rels/document.xml.rels");

        let first = rels.find(r#"Id="rId1""#).unwrap();
        let second = rels.find(r#"Id="rId2""#).unwrap();
        assert!(first < second);
        assert!(rels.contains(r#"Target="media/image2.jpeg""#));
    }
}
