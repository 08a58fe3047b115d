use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::IngestError;

fn default_channel() -> String {
    "email".to_string()
}

/// A submitted offer message: optional inline text plus attachments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestRequest {
    #[serde(default = "default_channel")]
    pub source_channel: String,
    #[serde(default)]
    pub source_message_id: Option<String>,
    #[serde(default)]
    pub source_filename: Option<String>,
    #[serde(default)]
    pub supplier_email: Option<String>,
    #[serde(default)]
    pub supplier_name: Option<String>,
    #[serde(default)]
    pub text_body: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl IngestRequest {
    /// The text body if it contains anything besides whitespace.
    pub fn text(&self) -> Option<&str> {
        self.text_body
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// Rejects submissions with nothing to extract from. A malformed
    /// attachment fails later as its own source.
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.text().is_none() && self.attachments.is_empty() {
            return Err(IngestError::EmptySubmission);
        }
        Ok(())
    }
}

/// Inline attachment payload as sent by upstream automations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttachmentData {
    /// Base64 text, optionally as a `data:` URI.
    Base64(String),
    /// Node.js `Buffer` JSON: `{"type": "Buffer", "data": [..]}`.
    Buffer {
        #[serde(rename = "type")]
        kind: String,
        data: Vec<u8>,
    },
    /// `{"url": ".."}` nested under `data`.
    Url { url: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<AttachmentData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Where an attachment's bytes come from.
#[derive(Debug, Clone, PartialEq)]
pub enum AttachmentSource<'a> {
    Inline(Vec<u8>),
    Remote(&'a str),
}

impl Attachment {
    pub fn inline(filename: impl Into<String>, content_type: Option<String>, bytes: &[u8]) -> Self {
        Self {
            filename: filename.into(),
            content_type,
            data: Some(AttachmentData::Base64(
                base64::engine::general_purpose::STANDARD.encode(bytes),
            )),
            url: None,
        }
    }

    pub fn remote(filename: impl Into<String>, content_type: Option<String>, url: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            content_type,
            data: None,
            url: Some(url.into()),
        }
    }

    /// Resolves the payload. Inline data is decoded here; remote URLs are
    /// fetched later by the extraction layer.
    pub fn source(&self) -> Result<AttachmentSource<'_>, IngestError> {
        let invalid = |reason: String| IngestError::InvalidAttachment {
            filename: self.filename.clone(),
            reason,
        };

        match (&self.data, self.url.as_deref()) {
            (Some(_), Some(_)) => Err(invalid("both data and url are set".to_string())),
            (None, None) => Err(invalid("neither data nor url is set".to_string())),
            (None, Some(url)) => Ok(AttachmentSource::Remote(url)),
            (Some(AttachmentData::Url { url }), None) => Ok(AttachmentSource::Remote(url)),
            (Some(AttachmentData::Buffer { kind, data }), None) => {
                if kind != "Buffer" {
                    return Err(invalid(format!("unsupported data type '{}'", kind)));
                }
                Ok(AttachmentSource::Inline(data.clone()))
            }
            (Some(AttachmentData::Base64(text)), None) => decode_base64(text)
                .map(AttachmentSource::Inline)
                .map_err(|e| invalid(format!("invalid base64: {}", e))),
        }
    }
}

fn decode_base64(text: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let payload = match text.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => text,
    };
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD.decode(compact)
}
