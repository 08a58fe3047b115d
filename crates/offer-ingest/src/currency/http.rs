//! Rate lookups against a Frankfurter-compatible HTTP API.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use super::{validate_rate, RateOracle, BASE_CURRENCY};
use crate::error::RateError;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct LatestResponse {
    #[serde(default)]
    rates: HashMap<String, f64>,
}

/// `GET {base}/latest?from=XXX&to=EUR`.
#[derive(Debug, Clone)]
pub struct HttpRateOracle {
    client: Client,
    api_base: String,
}

impl HttpRateOracle {
    pub fn new(api_base: impl Into<String>, timeout: Duration) -> Result<Self, RateError> {
        let client = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn latest_url(&self) -> String {
        format!("{}/latest", self.api_base)
    }
}

#[async_trait]
impl RateOracle for HttpRateOracle {
    async fn rate_to_eur(&self, code: &str) -> Result<f64, RateError> {
        let response = self
            .client
            .get(self.latest_url())
            .query(&[("from", code), ("to", BASE_CURRENCY)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RateError::Status(status.as_u16()));
        }

        let body: LatestResponse = response.json().await?;
        let rate = body
            .rates
            .get(BASE_CURRENCY)
            .copied()
            .ok_or_else(|| RateError::Missing(code.to_string()))?;
        validate_rate(code, rate)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_url_trims_slash() {
        let oracle =
            HttpRateOracle::new("https://api.frankfurter.app/", Duration::from_secs(5)).unwrap();
        assert_eq!(oracle.latest_url(), "https://api.frankfurter.app/latest");
    }

    #[test]
    fn test_response_shape() {
        let body: LatestResponse = serde_json::from_str(
            r#"{"amount":1.0,"base":"USD","date":"2025-12-19","rates":{"EUR":0.9213}}"#,
        )
        .unwrap();
        assert_eq!(body.rates.get("EUR"), Some(&0.9213));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_an_error() {
        let oracle =
            HttpRateOracle::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        assert!(oracle.rate_to_eur("USD").await.is_err());
    }
}
