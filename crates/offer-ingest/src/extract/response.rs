//! Oracle reply → candidate records.
//!
//! The oracle answers either with a single implicit record, an explicit
//! `{"products": [...]}` list, a bare JSON array, or `{"error": "..."}`.

use serde_json::Value;

use crate::error::ExtractError;
use crate::model::raw::json_kind;
use crate::model::RawCandidate;

const PRODUCTS_KEY: &str = "products";
const ERROR_KEY: &str = "error";

#[derive(Debug, Clone, PartialEq)]
pub enum OracleResponse {
    Records(Vec<Value>),
    /// The oracle declined, e.g. an unreadable document.
    Failed(String),
}

/// Candidates parsed from one source reply. Malformed entries are counted
/// and dropped; the rest survive.
#[derive(Debug, Default)]
pub struct ParsedRecords {
    pub candidates: Vec<RawCandidate>,
    pub failures: Vec<String>,
}

impl OracleResponse {
    pub fn from_value(value: Value) -> Result<Self, ExtractError> {
        match value {
            Value::Array(items) => Ok(OracleResponse::Records(items)),
            Value::Object(mut map) => {
                if let Some(products) = map.remove(PRODUCTS_KEY) {
                    return match products {
                        Value::Array(items) => Ok(OracleResponse::Records(items)),
                        Value::Null => Ok(OracleResponse::Records(Vec::new())),
                        single @ Value::Object(_) => Ok(OracleResponse::Records(vec![single])),
                        other => Err(ExtractError::ResponseParse(format!(
                            "'products' must be a list, got {}",
                            json_kind(&other)
                        ))),
                    };
                }

                // An error-only object; a record that happens to carry an
                // `error` field alongside product data is still a record.
                if map.len() == 1 {
                    if let Some(error) = map.get(ERROR_KEY) {
                        let message = match error {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        };
                        return Ok(OracleResponse::Failed(message));
                    }
                }

                if map.is_empty() {
                    return Ok(OracleResponse::Records(Vec::new()));
                }
                Ok(OracleResponse::Records(vec![Value::Object(map)]))
            }
            Value::Null => Ok(OracleResponse::Records(Vec::new())),
            other => Err(ExtractError::ResponseParse(format!(
                "expected a JSON object or list, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Parses the oracle's message text, tolerating Markdown code fences.
    pub fn parse(content: &str) -> Result<Self, ExtractError> {
        let body = strip_code_fence(content);
        if body.is_empty() {
            return Err(ExtractError::ResponseParse("empty response".to_string()));
        }
        let value: Value = serde_json::from_str(body)
            .map_err(|e| ExtractError::ResponseParse(e.to_string()))?;
        Self::from_value(value)
    }

    /// Turns the reply into candidates. A `Failed` reply is a source failure.
    pub fn into_records(self) -> Result<ParsedRecords, ExtractError> {
        let items = match self {
            OracleResponse::Records(items) => items,
            OracleResponse::Failed(message) => return Err(ExtractError::Oracle(message)),
        };

        let mut parsed = ParsedRecords::default();
        for (position, item) in items.into_iter().enumerate() {
            match RawCandidate::from_json(item) {
                Ok(candidate) if candidate.is_empty() => {
                    parsed.failures.push(format!("record {}: no recognised fields", position));
                }
                Ok(candidate) => parsed.candidates.push(candidate),
                Err(e) => parsed.failures.push(format!("record {}: {}", position, e)),
            }
        }
        Ok(parsed)
    }
}

/// Strips a surrounding ```` ```json ```` fence if present.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    rest.trim_end().trim_end_matches("```").trim()
}
