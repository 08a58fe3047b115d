//! Extraction through an OpenAI-compatible chat-completions endpoint.

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::{DocumentInput, ExtractionOracle, OracleResponse};
use crate::config::ExtractionConfig;
use crate::decode::Decoded;
use crate::error::ExtractError;
use crate::model::RawCandidate;
use crate::sanitize::truncate_for_log;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on error bodies kept in `ExtractError::Status`.
const ERROR_BODY_CHARS: usize = 500;

const PROMPT: &str = "You are extracting a commercial alcohol offer.
Return JSON ONLY, no explanation.

Fields must match the provided schema. Use null for anything the offer does not state.
Copy numbers, units and percentages as written; do not convert them.
If the offer lists several products, return {\"products\": [ ... ]} with one object per product.
If the document cannot be read, return {\"error\": \"<reason>\"}.";

fn schema_line() -> String {
    format!("Schema fields: {}", RawCandidate::FIELD_NAMES.join(", "))
}

fn instructions() -> String {
    format!("{}\n\n{}", PROMPT, schema_line())
}

fn data_uri(mime: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime,
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// User message content for one source.
fn user_content(document: &DocumentInput) -> Value {
    match &document.content {
        Decoded::Text(text) => Value::String(format!(
            "{}\n\nFile: {}\n\n{}",
            instructions(),
            document.filename,
            text
        )),
        Decoded::Image { mime, bytes } => json!([
            {"type": "text", "text": format!("{}\n\nFile: {}", instructions(), document.filename)},
            {"type": "image_url", "image_url": {"url": data_uri(mime, bytes)}},
        ]),
        Decoded::Pdf { bytes } => json!([
            {"type": "text", "text": format!("{}\n\nFile: {}", instructions(), document.filename)},
            {"type": "file", "file": {
                "filename": document.filename,
                "file_data": data_uri("application/pdf", bytes),
            }},
        ]),
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Clone)]
pub struct OpenAiExtractor {
    client: Client,
    api_base: String,
    model: String,
    temperature: f32,
    api_key: SecretString,
}

impl OpenAiExtractor {
    pub fn new(config: &ExtractionConfig, api_key: SecretString) -> Result<Self, ExtractError> {
        let client = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .timeout(config.timeout())
            .build()
            .map_err(|e| ExtractError::Client(e.to_string()))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            api_key,
        })
    }

    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }

    fn request_body(&self, content: Value) -> Value {
        json!({
            "model": self.model,
            "temperature": self.temperature,
            "response_format": {"type": "json_object"},
            "messages": [{"role": "user", "content": content}],
        })
    }

    async fn complete(&self, content: Value) -> Result<OracleResponse, ExtractError> {
        let start = Instant::now();

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(self.api_key.expose_secret())
            .json(&self.request_body(content))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "Extraction API error");
            return Err(ExtractError::Status {
                status: status.as_u16(),
                body: truncate_for_log(&body, ERROR_BODY_CHARS),
            });
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| ExtractError::ResponseParse(e.to_string()))?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ExtractError::ResponseParse("no message in response".to_string()))?;

        debug!(
            model = %self.model,
            duration_ms = start.elapsed().as_millis() as u64,
            "Extraction completed"
        );

        OracleResponse::parse(&content)
    }
}

#[async_trait]
impl ExtractionOracle for OpenAiExtractor {
    async fn extract_text(&self, text: &str) -> Result<OracleResponse, ExtractError> {
        let prompt = format!("{}\n\nText:\n{}", instructions(), text);
        self.complete(Value::String(prompt)).await
    }

    async fn extract_file(&self, document: &DocumentInput) -> Result<OracleResponse, ExtractError> {
        self.complete(user_content(document)).await
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor(api_base: &str) -> OpenAiExtractor {
        let config = ExtractionConfig {
            api_base: api_base.to_string(),
            timeout_secs: 1,
            ..Default::default()
        };
        OpenAiExtractor::new(&config, SecretString::from("sk-test")).unwrap()
    }

    #[test]
    fn test_completions_url() {
        assert_eq!(
            extractor("https://api.openai.com/v1/").completions_url(),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_request_body_shape() {
        let body = extractor("https://api.openai.com/v1").request_body(json!("hi"));
        assert_eq!(body["model"], "gpt-4.1-mini");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "hi");
    }

    #[test]
    fn test_prompt_lists_schema_fields() {
        let prompt = instructions();
        assert!(prompt.starts_with("You are extracting a commercial alcohol offer."));
        assert!(prompt.contains("unit_volume_ml"));
        assert!(prompt.contains("\"products\""));
    }

    #[test]
    fn test_image_becomes_data_uri_part() {
        let document = DocumentInput {
            filename: "scan.png".to_string(),
            content: Decoded::Image {
                mime: "image/png".to_string(),
                bytes: vec![1, 2, 3],
            },
        };
        let content = user_content(&document);
        assert_eq!(content[1]["type"], "image_url");
        assert_eq!(content[1]["image_url"]["url"], "data:image/png;base64,AQID");
    }

    #[test]
    fn test_scanned_pdf_becomes_file_part() {
        let document = DocumentInput {
            filename: "offer.pdf".to_string(),
            content: Decoded::Pdf { bytes: vec![1, 2, 3] },
        };
        let content = user_content(&document);
        assert_eq!(content[1]["type"], "file");
        assert_eq!(content[1]["file"]["filename"], "offer.pdf");
        assert_eq!(
            content[1]["file"]["file_data"],
            "data:application/pdf;base64,AQID"
        );
    }

    #[test]
    fn test_decoded_text_is_inlined() {
        let document = DocumentInput {
            filename: "stock.xlsx".to_string(),
            content: Decoded::Text("Aperol\t60".to_string()),
        };
        let content = user_content(&document);
        let text = content.as_str().unwrap();
        assert!(text.contains("File: stock.xlsx"));
        assert!(text.ends_with("Aperol\t60"));
    }

    #[test]
    fn test_chat_response_shape() {
        let chat: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"{\"products\":[]}"}}]}"#,
        )
        .unwrap();
        assert_eq!(
            chat.choices[0].message.content.as_deref(),
            Some("{\"products\":[]}")
        );
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_an_error() {
        let oracle = extractor("http://127.0.0.1:9/v1");
        assert!(matches!(
            oracle.extract_text("Aperol 6x70cl").await,
            Err(ExtractError::Http(_))
        ));
    }
}
