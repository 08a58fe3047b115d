use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

use super::{DeliveryEnvelope, DeliveryTransport};
use crate::error::DeliveryError;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// POSTs each envelope as JSON, with an optional bearer token.
#[derive(Clone)]
pub struct WebhookTransport {
    client: Client,
    url: String,
    token: Option<SecretString>,
}

impl WebhookTransport {
    pub fn new(
        url: impl Into<String>,
        token: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, DeliveryError> {
        let client = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            token,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl DeliveryTransport for WebhookTransport {
    async fn send(&self, envelope: &DeliveryEnvelope<'_>) -> Result<(), DeliveryError> {
        let mut request = self
            .client
            .post(&self.url)
            .header("X-Delivery-Id", envelope.delivery_id)
            .json(envelope);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Status {
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Offer;

    #[tokio::test]
    async fn test_unreachable_webhook_is_an_error() {
        let transport =
            WebhookTransport::new("http://127.0.0.1:9/hook", None, Duration::from_millis(500))
                .unwrap();
        let offer = Offer::default();
        let envelope = DeliveryEnvelope {
            job_id: "job-1",
            payload_type: "offer",
            data: &offer,
            delivery_id: "job-1_1",
        };
        assert!(matches!(
            transport.send(&envelope).await,
            Err(DeliveryError::Http(_))
        ));
        assert_eq!(transport.url(), "http://127.0.0.1:9/hook");
    }
}
