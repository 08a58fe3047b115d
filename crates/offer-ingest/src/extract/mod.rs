//! Extraction: turning sources into candidate records via the oracle.

pub mod aggregator;
pub mod fetch;
pub mod openai;
pub mod response;

use async_trait::async_trait;

use crate::decode::Decoded;
use crate::error::ExtractError;

pub use aggregator::{Source, SourceAggregator, SourceKind, SourceOutcome, SourceReport};
pub use fetch::AttachmentFetcher;
pub use openai::OpenAiExtractor;
pub use response::{OracleResponse, ParsedRecords};

/// A decoded attachment as handed to the oracle.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentInput {
    pub filename: String,
    pub content: Decoded,
}

/// Document-to-raw-fields service. Replies are either a list of records or
/// an explicit error; transport problems are `Err`.
#[async_trait]
pub trait ExtractionOracle: Send + Sync {
    async fn extract_text(&self, text: &str) -> Result<OracleResponse, ExtractError>;

    async fn extract_file(&self, document: &DocumentInput) -> Result<OracleResponse, ExtractError>;

    fn name(&self) -> &'static str;
}
