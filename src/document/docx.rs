//! Minimal WordprocessingML packaging for `PlanDocument`.
//!
//! Writes only the three parts Word needs to open a document: the content
//! types, the package relationships and `word/document.xml`.

use std::io::{Cursor, Write};

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::{Alignment, Paragraph, PlanDocument};
use crate::error::RenderError;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

/// Column width in twentieths of a point; six columns fill an A4 text area.
const COLUMN_WIDTH: u32 = 1600;

impl PlanDocument {
    /// Package the document as `.docx` bytes.
    pub fn to_docx(&self) -> Result<Vec<u8>, RenderError> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        for (name, body) in [
            ("[Content_Types].xml", CONTENT_TYPES.to_string()),
            ("_rels/.rels", PACKAGE_RELS.to_string()),
            ("word/document.xml", self.document_xml()),
        ] {
            writer.start_file(name, options)?;
            writer.write_all(body.as_bytes())?;
        }

        Ok(writer.finish()?.into_inner())
    }

    /// The `word/document.xml` part.
    pub fn document_xml(&self) -> String {
        let mut xml = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#,
        );
        for paragraph in &self.paragraphs {
            paragraph_xml(&mut xml, paragraph);
        }
        self.table_xml(&mut xml);
        xml.push_str("<w:sectPr/></w:body></w:document>");
        xml
    }

    fn table_xml(&self, xml: &mut String) {
        let columns = self.table.first().map_or(0, Vec::len);

        xml.push_str(r#"<w:tbl><w:tblPr><w:tblW w:w="0" w:type="auto"/><w:tblBorders>"#);
        for edge in ["top", "left", "bottom", "right", "insideH", "insideV"] {
            xml.push_str(&format!(
                r#"<w:{edge} w:val="single" w:sz="4" w:space="0" w:color="000000"/>"#
            ));
        }
        xml.push_str("</w:tblBorders></w:tblPr><w:tblGrid>");
        for _ in 0..columns {
            xml.push_str(&format!(r#"<w:gridCol w:w="{COLUMN_WIDTH}"/>"#));
        }
        xml.push_str("</w:tblGrid>");

        for row in &self.table {
            xml.push_str("<w:tr>");
            for cell in row {
                xml.push_str(&format!(
                    r#"<w:tc><w:tcPr><w:tcW w:w="{COLUMN_WIDTH}" w:type="dxa"/></w:tcPr><w:p>"#
                ));
                run_xml(xml, cell, false);
                xml.push_str("</w:p></w:tc>");
            }
            xml.push_str("</w:tr>");
        }
        xml.push_str("</w:tbl>");
    }
}

fn paragraph_xml(xml: &mut String, paragraph: &Paragraph) {
    xml.push_str("<w:p>");
    if paragraph.alignment == Alignment::Center {
        xml.push_str(r#"<w:pPr><w:jc w:val="center"/></w:pPr>"#);
    }
    run_xml(xml, &paragraph.text, paragraph.bold);
    xml.push_str("</w:p>");
}

fn run_xml(xml: &mut String, text: &str, bold: bool) {
    xml.push_str("<w:r>");
    if bold {
        xml.push_str("<w:rPr><w:b/></w:rPr>");
    }
    xml.push_str(r#"<w:t xml:space="preserve">"#);
    xml.push_str(&escape_xml_text(text));
    xml.push_str("</w:t></w:r>");
}

/// Escape markup and drop characters XML 1.0 does not allow, which would
/// make Word reject the whole document.
fn escape_xml_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if is_xml_char(c) => out.push(c),
            _ => {}
        }
    }
    out
}

fn is_xml_char(c: char) -> bool {
    matches!(
        c,
        '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..
    )
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use zip::ZipArchive;

    use super::*;
    use crate::plan::PlanRow;
    use crate::session::CompletedSession;

    fn doc(rows: &[PlanRow]) -> PlanDocument {
        PlanDocument::render(
            &CompletedSession {
                name: "Иванов Иван".into(),
                birthdate: "01.01.2015".into(),
                goal: "Снижение <тревожности> & страхов".into(),
            },
            rows,
        )
    }

    fn read_part(bytes: &[u8], name: &str) -> String {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut entry = archive.by_name(name).unwrap();
        let mut out = String::new();
        entry.read_to_string(&mut out).unwrap();
        out
    }

    #[test]
    fn package_has_required_parts() {
        let bytes = doc(&[]).to_docx().unwrap();
        let archive = ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        let mut names: Vec<&str> = archive.file_names().collect();
        names.sort();
        assert_eq!(names, ["[Content_Types].xml", "_rels/.rels", "word/document.xml"]);
    }

    #[test]
    fn table_rows_in_xml() {
        let rows = vec![PlanRow::new("A", "B", "C"), PlanRow::new("D", "E", "F")];
        let bytes = doc(&rows).to_docx().unwrap();
        let xml = read_part(&bytes, "word/document.xml");
        assert_eq!(xml.matches("<w:tr>").count(), 3);
        assert_eq!(xml.matches("<w:tc>").count(), 18);
        assert_eq!(xml.matches("<w:gridCol ").count(), 6);
        assert!(xml.contains("Коррекционные задачи"));
        assert!(xml.contains(r#"<w:t xml:space="preserve"> </w:t>"#));
    }

    #[test]
    fn text_is_escaped() {
        let xml = doc(&[]).document_xml();
        assert!(xml.contains("Снижение &lt;тревожности&gt; &amp; страхов"));
        assert!(!xml.contains("<тревожности>"));
    }

    #[test]
    fn headings_are_centered_and_bold() {
        let xml = doc(&[]).document_xml();
        assert_eq!(xml.matches(r#"<w:jc w:val="center"/>"#).count(), 3);
        assert_eq!(xml.matches("<w:b/>").count(), 3);
    }

    #[test]
    fn escape_covers_all_entities() {
        assert_eq!(
            escape_xml_text(r#"<a href="x">'&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&apos;&amp;&apos;&lt;/a&gt;"
        );
    }

    #[test]
    fn control_characters_are_dropped() {
        let doc = PlanDocument::render(
            &CompletedSession {
                name: "Иванов\u{1}Иван".into(),
                birthdate: "01.01.2015".into(),
                goal: "цель\u{fffe}".into(),
            },
            &[PlanRow::new("a\u{b}", "b\tc", "d\u{0}")],
        );
        let xml = read_part(&doc.to_docx().unwrap(), "word/document.xml");

        let illegal: Vec<u32> = xml
            .chars()
            .filter(|c| !is_xml_char(*c))
            .map(u32::from)
            .collect();
        assert!(illegal.is_empty(), "illegal XML characters: {illegal:?}");
        assert!(xml.contains("Ф.И.О.: ИвановИван"));
        assert!(xml.contains(">a</w:t>"));
        assert!(xml.contains("b\tc"));
        assert!(xml.contains(">d</w:t>"));
    }
}
