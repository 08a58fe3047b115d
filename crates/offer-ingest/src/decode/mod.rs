//! Attachment bytes → something the extraction oracle can read.
//!
//! Decoding is deliberately shallow: spreadsheets and documents become plain
//! text, images and text-less PDFs are passed through for the oracle to read
//! directly.

pub mod docx;
pub mod image;
pub mod pdf;
pub mod text;
pub mod xlsx;

use crate::error::DecodeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Text,
    Spreadsheet,
    Docx,
    Pdf,
    Image,
}

impl DocumentFormat {
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();

        match essence.as_str() {
            "application/pdf" => Some(DocumentFormat::Pdf),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => {
                Some(DocumentFormat::Spreadsheet)
            }
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Some(DocumentFormat::Docx)
            }
            "application/json" | "application/csv" => Some(DocumentFormat::Text),
            m if m.starts_with("text/") => Some(DocumentFormat::Text),
            m if m.starts_with("image/") => Some(DocumentFormat::Image),
            _ => None,
        }
    }

    /// Declared content type first, then the filename extension.
    pub fn detect(filename: &str, content_type: Option<&str>) -> Option<Self> {
        content_type
            .and_then(Self::from_mime)
            .or_else(|| Self::from_mime(mime_guess::from_path(filename).first()?.essence_str()))
    }
}

/// Effective mime type of an attachment: the declared one unless it is
/// missing or generic, otherwise guessed from the filename.
pub fn effective_mime(filename: &str, content_type: Option<&str>) -> String {
    match content_type.map(str::trim) {
        Some(ct) if !ct.is_empty() && !ct.starts_with("application/octet-stream") => {
            ct.to_string()
        }
        _ => mime_guess::from_path(filename)
            .first_or_octet_stream()
            .essence_str()
            .to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Text(String),
    Image { mime: String, bytes: Vec<u8> },
    /// PDF without a usable text layer.
    Pdf { bytes: Vec<u8> },
}

pub trait DocumentDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8], mime: &str) -> Result<Decoded, DecodeError>;
    fn supports(&self, format: DocumentFormat) -> bool;
}

pub struct DecoderRegistry {
    decoders: Vec<Box<dyn DocumentDecoder>>,
}

impl DecoderRegistry {
    pub fn new() -> Self {
        let decoders: Vec<Box<dyn DocumentDecoder>> = vec![
            Box::new(text::TextDecoder::new()),
            Box::new(xlsx::XlsxDecoder::new()),
            Box::new(docx::DocxDecoder::new()),
            Box::new(pdf::PdfDecoder::new()),
            Box::new(image::ImageDecoder::new()),
        ];
        Self { decoders }
    }

    pub fn decode(
        &self,
        filename: &str,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> Result<Decoded, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::Empty);
        }

        let mime = effective_mime(filename, content_type);
        let format = DocumentFormat::detect(filename, Some(&mime))
            .ok_or_else(|| DecodeError::UnsupportedFormat(mime.clone()))?;

        for decoder in &self.decoders {
            if decoder.supports(format) {
                return decoder.decode(bytes, &mime);
            }
        }

        Err(DecodeError::UnsupportedFormat(mime))
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
