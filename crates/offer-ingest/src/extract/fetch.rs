//! Resolves attachment payloads to bytes, downloading remote media.

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::debug;

use crate::config::AttachmentsConfig;
use crate::error::ExtractError;
use crate::model::{Attachment, AttachmentSource};
use crate::sanitize::redact_url;

/// WhatsApp media links must be fetched through the 360dialog proxy.
const MEDIA_HOST: &str = "https://lookaside.fbsbx.com";
const MEDIA_PROXY_HOST: &str = "https://waba-v2.360dialog.io";

/// The media proxy rejects unknown clients.
const USER_AGENT: &str = "curl/7.64.1";

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub fn rewrite_media_url(url: &str) -> String {
    match url.strip_prefix(MEDIA_HOST) {
        Some(rest) => format!("{}{}", MEDIA_PROXY_HOST, rest),
        None => url.to_string(),
    }
}

#[derive(Clone)]
pub struct AttachmentFetcher {
    client: Client,
    auth_token: Option<SecretString>,
    max_bytes: u64,
}

impl AttachmentFetcher {
    pub fn new(
        timeout: Duration,
        auth_token: Option<SecretString>,
        max_bytes: u64,
    ) -> Result<Self, ExtractError> {
        let client = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT.min(timeout))
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ExtractError::Client(e.to_string()))?;
        Ok(Self {
            client,
            auth_token,
            max_bytes,
        })
    }

    pub fn from_config(
        config: &AttachmentsConfig,
        auth_token: Option<SecretString>,
    ) -> Result<Self, ExtractError> {
        Self::new(
            Duration::from_secs(config.download_timeout_secs),
            auth_token,
            config.max_bytes,
        )
    }

    pub async fn fetch(&self, attachment: &Attachment) -> Result<Vec<u8>, ExtractError> {
        let source = attachment
            .source()
            .map_err(|e| ExtractError::Fetch(e.to_string()))?;

        let bytes = match source {
            AttachmentSource::Inline(bytes) => bytes,
            AttachmentSource::Remote(url) => self.download(url).await?,
        };

        self.check_size(bytes.len() as u64)?;
        Ok(bytes)
    }

    fn check_size(&self, len: u64) -> Result<(), ExtractError> {
        if len > self.max_bytes {
            return Err(ExtractError::Fetch(format!(
                "attachment is {} bytes, limit is {}",
                len, self.max_bytes
            )));
        }
        Ok(())
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, ExtractError> {
        let url = rewrite_media_url(url);
        debug!(url = %redact_url(&url), "Downloading attachment");

        let mut request = self.client.get(&url);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|e| ExtractError::Fetch(format!("download failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExtractError::Fetch(format!(
                "download returned HTTP {}",
                status.as_u16()
            )));
        }
        if let Some(len) = response.content_length() {
            self.check_size(len)?;
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ExtractError::Fetch(format!("download interrupted: {}", e)))?;
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher(max_bytes: u64) -> AttachmentFetcher {
        AttachmentFetcher::new(Duration::from_millis(500), None, max_bytes).unwrap()
    }

    #[test]
    fn test_rewrite_media_url() {
        assert_eq!(
            rewrite_media_url("https://lookaside.fbsbx.com/whatsapp_business/attachments/?mid=1"),
            "https://waba-v2.360dialog.io/whatsapp_business/attachments/?mid=1"
        );
        assert_eq!(
            rewrite_media_url("https://files.example.com/offer.pdf"),
            "https://files.example.com/offer.pdf"
        );
    }

    #[tokio::test]
    async fn test_inline_bytes_returned() {
        let attachment = Attachment::inline("offer.txt", None, b"Aperol 6x70cl");
        assert_eq!(fetcher(1024).fetch(&attachment).await.unwrap(), b"Aperol 6x70cl");
    }

    #[tokio::test]
    async fn test_size_limit_enforced() {
        let attachment = Attachment::inline("offer.txt", None, &[b'x'; 64]);
        let err = fetcher(16).fetch(&attachment).await.unwrap_err();
        assert!(matches!(err, ExtractError::Fetch(msg) if msg.contains("limit is 16")));
    }

    #[tokio::test]
    async fn test_unreachable_url_is_a_fetch_error() {
        let attachment = Attachment::remote("offer.pdf", None, "http://127.0.0.1:9/offer.pdf");
        assert!(matches!(
            fetcher(1024).fetch(&attachment).await,
            Err(ExtractError::Fetch(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_attachment_is_a_fetch_error() {
        let attachment = Attachment {
            filename: "nothing.pdf".to_string(),
            content_type: None,
            data: None,
            url: None,
        };
        assert!(matches!(
            fetcher(1024).fetch(&attachment).await,
            Err(ExtractError::Fetch(_))
        ));
    }
}
