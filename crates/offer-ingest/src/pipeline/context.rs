use chrono::{DateTime, Utc};

use crate::delivery::DeliveryOutcome;
use crate::extract::SourceKind;
use crate::gate::RejectReason;
use crate::jobs::JobStats;
use crate::model::{Offer, RawCandidate};

use super::error::PipelineWarning;

/// A candidate together with the source it came from.
#[derive(Debug, Clone)]
pub struct TaggedCandidate {
    pub raw: RawCandidate,
    pub kind: SourceKind,
    pub source_filename: Option<String>,
}

/// What happened to one candidate after normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Accepted {
        offer: Box<Offer>,
        delivery: DeliveryOutcome,
    },
    Rejected(RejectReason),
    Duplicate {
        product_key: String,
    },
}

/// Streamed from the pipeline task to the orchestrator as work completes.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    SourcesExtracted {
        candidates: usize,
        record_failures: usize,
        source_failures: usize,
    },
    Warning(PipelineWarning),
    Record(RecordOutcome),
}

/// Job-level fold of pipeline events: accepted offers in order, counters,
/// and warnings for the diagnostic trace.
#[derive(Debug, Default)]
pub struct OutcomeSummary {
    pub products: Vec<Offer>,
    pub stats: JobStats,
    pub warnings: Vec<PipelineWarning>,
}

impl OutcomeSummary {
    pub fn apply(&mut self, event: PipelineEvent) {
        match event {
            PipelineEvent::SourcesExtracted {
                candidates,
                record_failures,
                source_failures,
            } => {
                self.stats.candidates += candidates;
                self.stats.record_failures += record_failures;
                self.stats.source_failures += source_failures;
            }
            PipelineEvent::Warning(warning) => self.warnings.push(warning),
            PipelineEvent::Record(RecordOutcome::Accepted { offer, delivery }) => {
                self.stats.validated += 1;
                if delivery.is_delivered() {
                    self.stats.delivered += 1;
                } else {
                    self.stats.delivery_failures += 1;
                }
                self.products.push(*offer);
            }
            PipelineEvent::Record(RecordOutcome::Rejected(_)) => self.stats.rejected += 1,
            PipelineEvent::Record(RecordOutcome::Duplicate { .. }) => {
                self.stats.duplicate_count += 1
            }
        }
    }
}

/// Per-run facts shared by every stage.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub job_id: String,
    pub received_at: DateTime<Utc>,
}
