//! Raw RFC 822 email → [`IngestRequest`].

use mail_parser::{MessageParser, MessagePart, MimeHeaders};
use tracing::debug;

use crate::error::IngestError;
use crate::model::{Attachment, IngestRequest};

const FALLBACK_MIME: &str = "application/octet-stream";
const MAX_FILENAME_LEN: usize = 255;

fn part_mime(part: &MessagePart<'_>) -> String {
    part.content_type()
        .map(|ct| match ct.subtype() {
            Some(subtype) => format!("{}/{}", ct.ctype(), subtype),
            None => ct.ctype().to_string(),
        })
        .unwrap_or_else(|| FALLBACK_MIME.to_string())
        .to_lowercase()
}

fn part_filename(part: &MessagePart<'_>, mime: &str, position: usize) -> String {
    let declared = part
        .attachment_name()
        .or_else(|| part.content_type().and_then(|ct| ct.attribute("name")))
        .map(sanitize_filename)
        .filter(|name| !name.is_empty());

    declared.unwrap_or_else(|| {
        let extension = mime_guess::get_mime_extensions_str(mime)
            .and_then(|extensions| extensions.first())
            .copied()
            .unwrap_or("bin");
        format!("attachment-{}.{}", position + 1, extension)
    })
}

/// Replaces path separators and control characters, trims dots and spaces.
fn sanitize_filename(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_' | ' ' | '(' | ')') {
                c
            } else {
                '_'
            }
        })
        .collect();
    cleaned
        .trim_matches(|c| c == '.' || c == ' ')
        .chars()
        .take(MAX_FILENAME_LEN)
        .collect()
}

/// Parses a raw message into a submission. The first text body becomes the
/// text source (HTML-only mail is converted to text), every attachment is
/// carried inline, the sender becomes the supplier and the Message-ID the
/// source message id.
pub fn parse_raw_email(raw: &[u8], channel: &str) -> Result<IngestRequest, IngestError> {
    let message = MessageParser::default()
        .parse(raw)
        .ok_or_else(|| IngestError::EmailParse("not an RFC 822 message".to_string()))?;

    let sender = message.from().and_then(|from| from.first());

    let attachments: Vec<Attachment> = message
        .attachments()
        .enumerate()
        .filter(|(_, part)| !part.contents().is_empty())
        .map(|(position, part)| {
            let mime = part_mime(part);
            let filename = part_filename(part, &mime, position);
            debug!(filename = %filename, mime = %mime, bytes = part.contents().len(), "Email attachment");
            Attachment::inline(filename, Some(mime), part.contents())
        })
        .collect();

    Ok(IngestRequest {
        source_channel: channel.to_string(),
        source_message_id: message.message_id().map(str::to_string),
        source_filename: None,
        supplier_email: sender.and_then(|addr| addr.address()).map(str::to_string),
        supplier_name: sender.and_then(|addr| addr.name()).map(str::to_string),
        text_body: message
            .body_text(0)
            .map(|body| body.trim().to_string())
            .filter(|body| !body.is_empty()),
        attachments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AttachmentSource;

    const MULTIPART: &str = "From: Anna Berzina <anna@baltic-spirits.lv>\r\n\
To: offers@example.com\r\n\
Subject: Weekly offer\r\n\
Message-ID: <offer-42@baltic-spirits.lv>\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"XYZ\"\r\n\
\r\n\
--XYZ\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Prices DAP Riga, valid until end of month.\r\n\
--XYZ\r\n\
Content-Type: text/tab-separated-values\r\n\
Content-Disposition: attachment; filename=\"offer.tsv\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
UHJvZHVjdAlQcmljZSBwZXIgY2FzZQpBcGVyb2wJNjAK\r\n\
--XYZ--\r\n";

    #[test]
    fn test_multipart_email_becomes_request() {
        let request = parse_raw_email(MULTIPART.as_bytes(), "email").unwrap();

        assert_eq!(request.source_channel, "email");
        assert_eq!(request.source_message_id.as_deref(), Some("offer-42@baltic-spirits.lv"));
        assert_eq!(request.supplier_email.as_deref(), Some("anna@baltic-spirits.lv"));
        assert_eq!(request.supplier_name.as_deref(), Some("Anna Berzina"));
        assert_eq!(
            request.text(),
            Some("Prices DAP Riga, valid until end of month.")
        );

        assert_eq!(request.attachments.len(), 1);
        let attachment = &request.attachments[0];
        assert_eq!(attachment.filename, "offer.tsv");
        assert_eq!(
            attachment.content_type.as_deref(),
            Some("text/tab-separated-values")
        );
        assert_eq!(
            attachment.source().unwrap(),
            AttachmentSource::Inline(b"Product\tPrice per case\nAperol\t60\n".to_vec())
        );
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_plain_email_has_no_attachments() {
        let raw = "From: sales@example.com\r\n\
Subject: Jameson\r\n\
\r\n\
Jameson 12y 6x70cl 40% EUR 150 per case\r\n";
        let request = parse_raw_email(raw.as_bytes(), "whatsapp").unwrap();

        assert_eq!(request.source_channel, "whatsapp");
        assert!(request.attachments.is_empty());
        assert_eq!(request.supplier_email.as_deref(), Some("sales@example.com"));
        assert_eq!(request.supplier_name, None);
        assert_eq!(request.source_message_id, None);
        assert!(request.text().unwrap().starts_with("Jameson 12y"));
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(sanitize_filename("price list (May).xlsx"), "price list (May).xlsx");
        assert_eq!(sanitize_filename("..."), "");
    }
}
