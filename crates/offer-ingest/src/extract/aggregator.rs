//! Per-source extraction with failure isolation.
//!
//! Every source yields a [`SourceReport`]; a failed download, decode, oracle
//! call or timeout becomes [`SourceOutcome::Failed`] and never affects the
//! other sources of the job.

use futures_util::stream::{self, StreamExt};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info_span, warn, Instrument};

use super::{AttachmentFetcher, DocumentInput, ExtractionOracle, ParsedRecords};
use crate::decode::DecoderRegistry;
use crate::error::ExtractError;
use crate::model::{Attachment, IngestRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Text,
    Attachment,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Text => f.write_str("text"),
            SourceKind::Attachment => f.write_str("attachment"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Source<'a> {
    Text(&'a str),
    Attachment(&'a Attachment),
}

impl Source<'_> {
    pub fn kind(&self) -> SourceKind {
        match self {
            Source::Text(_) => SourceKind::Text,
            Source::Attachment(_) => SourceKind::Attachment,
        }
    }

    pub fn filename(&self) -> Option<&str> {
        match self {
            Source::Text(_) => None,
            Source::Attachment(a) => Some(a.filename.as_str()),
        }
    }
}

/// Text first, then attachments in submission order.
pub fn sources_of(request: &IngestRequest) -> Vec<Source<'_>> {
    request
        .text()
        .map(Source::Text)
        .into_iter()
        .chain(request.attachments.iter().map(Source::Attachment))
        .collect()
}

#[derive(Debug)]
pub enum SourceOutcome {
    Extracted(ParsedRecords),
    Failed(String),
}

#[derive(Debug)]
pub struct SourceReport {
    pub kind: SourceKind,
    pub filename: Option<String>,
    pub outcome: SourceOutcome,
}

impl SourceReport {
    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, SourceOutcome::Failed(_))
    }

    pub fn candidate_count(&self) -> usize {
        match &self.outcome {
            SourceOutcome::Extracted(parsed) => parsed.candidates.len(),
            SourceOutcome::Failed(_) => 0,
        }
    }
}

pub struct SourceAggregator {
    oracle: Arc<dyn ExtractionOracle>,
    fetcher: AttachmentFetcher,
    decoders: DecoderRegistry,
    timeout: Duration,
    max_concurrent: usize,
}

impl SourceAggregator {
    pub fn new(
        oracle: Arc<dyn ExtractionOracle>,
        fetcher: AttachmentFetcher,
        timeout: Duration,
        max_concurrent: usize,
    ) -> Self {
        Self {
            oracle,
            fetcher,
            decoders: DecoderRegistry::new(),
            timeout,
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub fn oracle_name(&self) -> &'static str {
        self.oracle.name()
    }

    /// Extracts every source of the request. Sources run concurrently up to
    /// `max_concurrent`; reports come back in source order.
    pub async fn extract_all(&self, request: &IngestRequest) -> Vec<SourceReport> {
        let pending: Vec<_> = sources_of(request)
            .into_iter()
            .map(|source| self.extract(source))
            .collect();
        stream::iter(pending)
            .buffered(self.max_concurrent)
            .collect::<Vec<_>>()
            .await
    }

    /// Extracts one source. Never fails; failures are reported in the outcome.
    pub async fn extract(&self, source: Source<'_>) -> SourceReport {
        let kind = source.kind();
        let filename = source.filename().map(str::to_string);
        let span = info_span!(
            "source",
            kind = %kind,
            filename = filename.as_deref().unwrap_or("")
        );

        let outcome = async {
            match tokio::time::timeout(self.timeout, self.try_extract(source)).await {
                Ok(Ok(parsed)) => {
                    for failure in &parsed.failures {
                        warn!(reason = %failure, "Skipping malformed record");
                    }
                    debug!(
                        candidates = parsed.candidates.len(),
                        record_failures = parsed.failures.len(),
                        "Source extracted"
                    );
                    SourceOutcome::Extracted(parsed)
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "Source failed");
                    SourceOutcome::Failed(e.to_string())
                }
                Err(_) => {
                    let e = ExtractError::Timeout(self.timeout.as_secs());
                    warn!(error = %e, "Source failed");
                    SourceOutcome::Failed(e.to_string())
                }
            }
        }
        .instrument(span)
        .await;

        SourceReport {
            kind,
            filename,
            outcome,
        }
    }

    async fn try_extract(&self, source: Source<'_>) -> Result<ParsedRecords, ExtractError> {
        let response = match source {
            Source::Text(text) => self.oracle.extract_text(text).await?,
            Source::Attachment(attachment) => {
                let bytes = self.fetcher.fetch(attachment).await?;
                let content = self.decoders.decode(
                    &attachment.filename,
                    attachment.content_type.as_deref(),
                    &bytes,
                )?;
                let document = DocumentInput {
                    filename: attachment.filename.clone(),
                    content,
                };
                self.oracle.extract_file(&document).await?
            }
        };
        response.into_records()
    }
}
