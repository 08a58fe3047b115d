use crate::decode::{Decoded, DocumentDecoder, DocumentFormat};
use crate::error::DecodeError;

/// Plain text, CSV and JSON attachments.
pub struct TextDecoder;

impl TextDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TextDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentDecoder for TextDecoder {
    fn decode(&self, bytes: &[u8], _mime: &str) -> Result<Decoded, DecodeError> {
        let text = String::from_utf8_lossy(bytes);
        let text = text.trim_start_matches('\u{feff}').trim();
        if text.is_empty() {
            return Err(DecodeError::Empty);
        }
        Ok(Decoded::Text(text.to_string()))
    }

    fn supports(&self, format: DocumentFormat) -> bool {
        matches!(format, DocumentFormat::Text)
    }
}
