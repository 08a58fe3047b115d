use crate::decode::{Decoded, DocumentDecoder, DocumentFormat};
use crate::error::DecodeError;

/// Marker lopdf emits for text in CID fonts it cannot map.
const IDENTITY_H_PATTERN: &str = "?Identity-H Unimplemented?";

/// Below this many characters the alphanumeric ratio is not checked.
const MIN_TOTAL_CHARS: usize = 50;

const MIN_ALPHANUMERIC_PERCENT: usize = 10;

pub struct PdfDecoder;

impl PdfDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PdfDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentDecoder for PdfDecoder {
    fn decode(&self, bytes: &[u8], _mime: &str) -> Result<Decoded, DecodeError> {
        let doc = lopdf::Document::load_mem(bytes)
            .map_err(|e| DecodeError::PdfProcessing(format!("Failed to load PDF: {}", e)))?;

        let text = extract_text_from_pdf(&doc);
        if lacks_text_layer(&text) {
            tracing::debug!(
                pages = doc.get_pages().len(),
                "PDF has no usable text layer, passing document through"
            );
            return Ok(Decoded::Pdf {
                bytes: bytes.to_vec(),
            });
        }

        Ok(Decoded::Text(text.trim().to_string()))
    }

    fn supports(&self, format: DocumentFormat) -> bool {
        matches!(format, DocumentFormat::Pdf)
    }
}

fn extract_text_from_pdf(doc: &lopdf::Document) -> String {
    let mut text = String::new();

    for (page_num, _) in doc.get_pages() {
        if let Ok(page_text) = doc.extract_text(&[page_num]) {
            text.push_str(&page_text);
            text.push('\n');
        }
    }

    text
}

/// True for scans and for text that is mostly font-encoding noise; such
/// documents are better read by the oracle from the PDF itself.
fn lacks_text_layer(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return true;
    }

    let cleaned = trimmed
        .replace(IDENTITY_H_PATTERN, "")
        .replace(['\n', ' '], "");
    if cleaned.is_empty() {
        return true;
    }

    let total_chars = trimmed.chars().count();
    let alphanumeric_chars = trimmed.chars().filter(|c| c.is_alphanumeric()).count();

    total_chars > MIN_TOTAL_CHARS
        && alphanumeric_chars * 100 < total_chars * MIN_ALPHANUMERIC_PERCENT
}
