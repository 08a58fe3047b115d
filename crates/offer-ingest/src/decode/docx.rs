use std::io::{Cursor, Read, Seek};

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::decode::{Decoded, DocumentDecoder, DocumentFormat};
use crate::error::DecodeError;

pub struct DocxDecoder;

impl DocxDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DocxDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentDecoder for DocxDecoder {
    fn decode(&self, bytes: &[u8], _mime: &str) -> Result<Decoded, DecodeError> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| DecodeError::DocxProcessing(format!("Failed to open DOCX: {}", e)))?;

        let text = extract_docx_text(&mut archive)?;
        if text.trim().is_empty() {
            return Err(DecodeError::Empty);
        }
        Ok(Decoded::Text(text.trim_end().to_string()))
    }

    fn supports(&self, format: DocumentFormat) -> bool {
        matches!(format, DocumentFormat::Docx)
    }
}

fn extract_docx_text<R: Read + Seek>(archive: &mut zip::ZipArchive<R>) -> Result<String, DecodeError> {
    let mut document_xml = archive
        .by_name("word/document.xml")
        .map_err(|e| DecodeError::DocxProcessing(format!("Failed to find document.xml: {}", e)))?;

    let mut xml_content = String::new();
    document_xml
        .read_to_string(&mut xml_content)
        .map_err(|e| DecodeError::DocxProcessing(format!("Failed to read document.xml: {}", e)))?;

    parse_docx_xml(&xml_content)
}

/// One line per paragraph; table cells are separated by tabs so rows of an
/// offer table stay on one line.
fn parse_docx_xml(xml: &str) -> Result<String, DecodeError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut text = String::new();
    let mut line = String::new();
    let mut in_text_element = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text_element = true;
                }
            }
            Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"tab" => line.push('\t'),
                b"br" => line.push(' '),
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text_element = false,
                b"p" => {
                    if !line.trim().is_empty() {
                        if !text.is_empty() && !text.ends_with('\n') && !text.ends_with('\t') {
                            text.push('\n');
                        }
                        text.push_str(line.trim());
                    }
                    line.clear();
                }
                b"tc" => {
                    if !text.is_empty() && !text.ends_with('\n') {
                        text.push('\t');
                    }
                }
                b"tr" => {
                    let trimmed = text.trim_end_matches('\t').len();
                    text.truncate(trimmed);
                    text.push('\n');
                }
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if in_text_element {
                    let decoded = e.unescape().unwrap_or_default();
                    line.push_str(&decoded);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(DecodeError::DocxProcessing(format!(
                    "XML parsing error: {}",
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

    fn docx_with(body: &str) -> Vec<u8> {
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="{}"><w:body>{}</w:body></w:document>"#,
            W_NS, body
        );
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("word/document.xml", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(xml.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_supports_docx_format() {
        let decoder = DocxDecoder::new();
        assert!(decoder.supports(DocumentFormat::Docx));
        assert!(!decoder.supports(DocumentFormat::Pdf));
        assert!(!decoder.supports(DocumentFormat::Text));
    }

    #[test]
    fn test_parse_paragraphs() {
        let xml = format!(
            r#"<w:document xmlns:w="{}"><w:body>
                <w:p><w:r><w:t>Dear buyer,</w:t></w:r></w:p>
                <w:p><w:r><w:t>Baileys Original</w:t></w:r><w:r><w:t xml:space="preserve"> 12x1000ml</w:t></w:r></w:p>
            </w:body></w:document>"#,
            W_NS
        );
        let text = parse_docx_xml(&xml).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Dear buyer,");
        assert!(lines[1].starts_with("Baileys Original"));
        assert!(lines[1].contains("12x1000ml"));
    }

    #[test]
    fn test_table_rows_become_tab_separated_lines() {
        let body = r#"<w:tbl>
            <w:tr><w:tc><w:p><w:r><w:t>Product</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>Price</w:t></w:r></w:p></w:tc></w:tr>
            <w:tr><w:tc><w:p><w:r><w:t>Aperol 6x70cl</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>60.00</w:t></w:r></w:p></w:tc></w:tr>
        </w:tbl>"#;
        let decoded = DocxDecoder::new().decode(&docx_with(body), "").unwrap();
        assert_eq!(
            decoded,
            Decoded::Text("Product\tPrice\nAperol 6x70cl\t60.00".to_string())
        );
    }

    #[test]
    fn test_not_a_zip_is_an_error() {
        assert!(matches!(
            DocxDecoder::new().decode(b"plain text", ""),
            Err(DecodeError::DocxProcessing(_))
        ));
    }
}
