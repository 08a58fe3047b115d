//! Builders for test submissions.

#![allow(dead_code)]

use offer_ingest::model::{Attachment, AttachmentData, IngestRequest};

/// Builder for `IngestRequest` values.
pub struct RequestBuilder {
    request: IngestRequest,
}

impl RequestBuilder {
    pub fn new(channel: &str) -> Self {
        Self {
            request: IngestRequest {
                source_channel: channel.to_string(),
                ..Default::default()
            },
        }
    }

    pub fn email() -> Self {
        Self::new("email")
    }

    pub fn text(mut self, body: &str) -> Self {
        self.request.text_body = Some(body.to_string());
        self
    }

    pub fn supplier(mut self, email: &str, name: &str) -> Self {
        self.request.supplier_email = Some(email.to_string());
        self.request.supplier_name = Some(name.to_string());
        self
    }

    pub fn message_id(mut self, id: &str) -> Self {
        self.request.source_message_id = Some(id.to_string());
        self
    }

    /// Plain-text attachment; decodes to its own contents.
    pub fn text_attachment(self, filename: &str, contents: &str) -> Self {
        self.attachment(filename, "text/plain", contents.as_bytes())
    }

    pub fn attachment(mut self, filename: &str, mime: &str, bytes: &[u8]) -> Self {
        self.request
            .attachments
            .push(Attachment::inline(filename, Some(mime.to_string()), bytes));
        self
    }

    /// Inline attachment whose payload is sent as given, valid or not.
    pub fn base64_attachment(mut self, filename: &str, mime: &str, payload: &str) -> Self {
        self.request.attachments.push(Attachment {
            filename: filename.to_string(),
            content_type: Some(mime.to_string()),
            data: Some(AttachmentData::Base64(payload.to_string())),
            url: None,
        });
        self
    }

    pub fn remote_attachment(mut self, filename: &str, mime: &str, url: &str) -> Self {
        self.request
            .attachments
            .push(Attachment::remote(filename, Some(mime.to_string()), url));
        self
    }

    pub fn build(self) -> IngestRequest {
        self.request
    }
}
