use crate::decode::{Decoded, DocumentDecoder, DocumentFormat};
use crate::error::DecodeError;

/// Images are read by the oracle itself; only the mime type is attached.
pub struct ImageDecoder;

impl ImageDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ImageDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentDecoder for ImageDecoder {
    fn decode(&self, bytes: &[u8], mime: &str) -> Result<Decoded, DecodeError> {
        Ok(Decoded::Image {
            mime: mime.to_string(),
            bytes: bytes.to_vec(),
        })
    }

    fn supports(&self, format: DocumentFormat) -> bool {
        matches!(format, DocumentFormat::Image)
    }
}
