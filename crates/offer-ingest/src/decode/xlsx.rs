//! XLSX → tab-separated text, one line per non-empty row.

use std::io::{Cursor, Read, Seek};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::decode::{Decoded, DocumentDecoder, DocumentFormat};
use crate::error::DecodeError;

const SHARED_STRINGS: &str = "xl/sharedStrings.xml";
const SHEET_PREFIX: &str = "xl/worksheets/sheet";

pub struct XlsxDecoder;

impl XlsxDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for XlsxDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentDecoder for XlsxDecoder {
    fn decode(&self, bytes: &[u8], _mime: &str) -> Result<Decoded, DecodeError> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| {
            DecodeError::SpreadsheetProcessing(format!("Failed to open XLSX: {}", e))
        })?;

        let shared = match read_entry(&mut archive, SHARED_STRINGS)? {
            Some(xml) => parse_shared_strings(&xml)?,
            None => Vec::new(),
        };

        let mut sheets: Vec<String> = archive
            .file_names()
            .filter(|name| name.starts_with(SHEET_PREFIX) && name.ends_with(".xml"))
            .map(str::to_string)
            .collect();
        sheets.sort_by_key(|name| sheet_number(name));

        if sheets.is_empty() {
            return Err(DecodeError::SpreadsheetProcessing(
                "workbook has no worksheets".to_string(),
            ));
        }

        let mut blocks = Vec::new();
        for name in &sheets {
            if let Some(xml) = read_entry(&mut archive, name)? {
                let rows = parse_sheet(&xml, &shared)?;
                if !rows.is_empty() {
                    blocks.push(rows.join("\n"));
                }
            }
        }

        if blocks.is_empty() {
            return Err(DecodeError::Empty);
        }
        Ok(Decoded::Text(blocks.join("\n\n")))
    }

    fn supports(&self, format: DocumentFormat) -> bool {
        matches!(format, DocumentFormat::Spreadsheet)
    }
}

fn read_entry<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    name: &str,
) -> Result<Option<String>, DecodeError> {
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => {
            return Err(DecodeError::SpreadsheetProcessing(format!(
                "Failed to open {}: {}",
                name, e
            )))
        }
    };

    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .map_err(|e| DecodeError::SpreadsheetProcessing(format!("Failed to read {}: {}", name, e)))?;
    Ok(Some(xml))
}

/// `xl/worksheets/sheet12.xml` → 12, so sheets keep workbook order.
fn sheet_number(name: &str) -> u32 {
    name.trim_start_matches(SHEET_PREFIX)
        .trim_end_matches(".xml")
        .parse()
        .unwrap_or(u32::MAX)
}

fn xml_error(e: quick_xml::Error) -> DecodeError {
    DecodeError::SpreadsheetProcessing(format!("XML parsing error: {}", e))
}

fn parse_shared_strings(xml: &str) -> Result<Vec<String>, DecodeError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"si" => current.clear(),
                b"t" => in_text = true,
                _ => {}
            },
            Ok(Event::Empty(ref e)) => {
                if e.local_name().as_ref() == b"si" {
                    strings.push(String::new());
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"si" => strings.push(current.trim().to_string()),
                b"t" => in_text = false,
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if in_text {
                    current.push_str(&e.unescape().unwrap_or_default());
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
    }

    Ok(strings)
}

/// Zero-based column of a cell reference such as `C7` or `AA12`.
fn column_index(reference: &str) -> Option<usize> {
    let letters: Vec<u8> = reference
        .bytes()
        .take_while(u8::is_ascii_alphabetic)
        .map(|b| b.to_ascii_uppercase())
        .collect();
    if letters.is_empty() {
        return None;
    }
    let n = letters
        .iter()
        .fold(0usize, |acc, b| acc * 26 + usize::from(b - b'A' + 1));
    Some(n - 1)
}

#[derive(Default)]
struct Cell {
    column: Option<usize>,
    kind: Option<String>,
    value: String,
}

impl Cell {
    fn start(e: &BytesStart<'_>) -> Self {
        let mut cell = Cell::default();
        for attr in e.attributes().flatten() {
            let value = String::from_utf8_lossy(&attr.value).to_string();
            match attr.key.local_name().as_ref() {
                b"r" => cell.column = column_index(&value),
                b"t" => cell.kind = Some(value),
                _ => {}
            }
        }
        cell
    }

    fn resolve(self, shared: &[String]) -> String {
        let raw = self.value.trim();
        match self.kind.as_deref() {
            Some("s") => raw
                .parse::<usize>()
                .ok()
                .and_then(|i| shared.get(i))
                .cloned()
                .unwrap_or_default(),
            Some("b") => match raw {
                "1" => "TRUE".to_string(),
                "0" => "FALSE".to_string(),
                other => other.to_string(),
            },
            _ => raw.to_string(),
        }
    }
}

fn parse_sheet(xml: &str, shared: &[String]) -> Result<Vec<String>, DecodeError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut cell: Option<Cell> = None;
    let mut in_value = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"row" => row.clear(),
                b"c" => cell = Some(Cell::start(e)),
                b"v" | b"t" => in_value = cell.is_some(),
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => {
                    if let Some(done) = cell.take() {
                        let column = done.column.unwrap_or(row.len());
                        let value = done.resolve(shared);
                        if row.len() <= column {
                            row.resize(column + 1, String::new());
                        }
                        row[column] = value;
                    }
                }
                b"row" => {
                    while row.last().is_some_and(|c| c.is_empty()) {
                        row.pop();
                    }
                    if !row.is_empty() {
                        rows.push(row.join("\t"));
                    }
                    row.clear();
                }
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if in_value {
                    if let Some(current) = cell.as_mut() {
                        current.value.push_str(&e.unescape().unwrap_or_default());
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
    }

    Ok(rows)
}
