//! Submission, background execution and polling of ingestion jobs.
//!
//! The orchestrator is the only writer of job state. Each job runs its
//! pipeline in a dedicated task and folds the streamed events here, so a
//! fatal error or a panic in the pipeline still leaves every offer accepted
//! up to that point in the persisted result.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{IngestError, OfferIngestError, StoreError};
use crate::model::IngestRequest;
use crate::pipeline::{OutcomeSummary, Pipeline, PipelineError, RunContext};
use crate::sanitize::{hash_message_id, redact_email};
use crate::store::JobStore;

use super::job::{JobResult, JobStatus, JobView};

/// Pipeline events buffered between the pipeline task and the fold.
const EVENT_BUFFER: usize = 64;

#[derive(Clone)]
pub struct JobOrchestrator {
    store: Arc<dyn JobStore>,
    pipeline: Arc<Pipeline>,
}

impl JobOrchestrator {
    pub fn new(store: Arc<dyn JobStore>, pipeline: Arc<Pipeline>) -> Self {
        Self { store, pipeline }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Validates the request, records the job as `processing` and starts it
    /// in the background. Returns the new job id.
    pub async fn submit(&self, request: IngestRequest) -> Result<String, IngestError> {
        request.validate()?;

        let job_id = Uuid::new_v4().to_string();
        let received_at = Utc::now();
        self.store.set_status(&job_id, JobStatus::Processing).await?;

        info!(
            job_id = %job_id,
            channel = %request.source_channel,
            supplier = %request.supplier_email.as_deref().map(redact_email).unwrap_or_default(),
            message = %request.source_message_id.as_deref().map(hash_message_id).unwrap_or_default(),
            has_text = request.text().is_some(),
            attachments = request.attachments.len(),
            "Job accepted"
        );

        let this = self.clone();
        let id = job_id.clone();
        tokio::spawn(async move {
            if let Err(e) = this.run(&id, request, received_at).await {
                error!(job_id = %id, error = %e, "Job could not be recorded");
            }
        });

        Ok(job_id)
    }

    /// Runs a job to a terminal state.
    ///
    /// A job that is already `done` or `failed` is left untouched and its
    /// status returned. Otherwise the result is written before the terminal
    /// status, so a poll that sees `done` always finds the result.
    pub async fn run(
        &self,
        job_id: &str,
        request: IngestRequest,
        received_at: DateTime<Utc>,
    ) -> Result<JobStatus, OfferIngestError> {
        if let Some(current) = self.store.get_status(job_id).await? {
            if current.is_terminal() {
                info!(job_id, status = %current, "Job already finished, not reprocessing");
                return Ok(current);
            }
        }
        self.transition(job_id, JobStatus::Processing).await?;

        let ctx = RunContext {
            job_id: job_id.to_string(),
            received_at,
        };
        let (events, mut incoming) = mpsc::channel(EVENT_BUFFER);
        let pipeline = Arc::clone(&self.pipeline);
        let handle = tokio::spawn(async move { pipeline.run(&ctx, &request, events).await });

        let mut summary = OutcomeSummary::default();
        while let Some(event) = incoming.recv().await {
            summary.apply(event);
        }

        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(e) => Err(join_failure(e)),
        };

        let OutcomeSummary {
            products,
            stats,
            warnings,
        } = summary;

        let result = match outcome {
            Ok(()) => JobResult::done(products, stats, received_at),
            Err(e) => {
                let mut trace = error_chain(&e);
                trace.extend(warnings.iter().map(ToString::to_string));
                warn!(job_id, error = %e, accepted = products.len(), "Pipeline stopped early");
                JobResult::after_error(products, stats, e.to_string(), trace, received_at)
            }
        };

        let status = result.status;
        info!(
            job_id,
            status = %status,
            partial_success = result.partial_success,
            candidates = result.stats.candidates,
            validated = result.stats.validated,
            rejected = result.stats.rejected,
            duplicates = result.stats.duplicate_count,
            delivery_failures = result.stats.delivery_failures,
            "Job finished"
        );
        self.finish(job_id, &result).await?;
        Ok(status)
    }

    /// Status of a job, with the result once terminal.
    pub async fn poll(&self, job_id: &str) -> Result<JobView, IngestError> {
        let status = self
            .store
            .get_status(job_id)
            .await?
            .ok_or_else(|| IngestError::JobNotFound(job_id.to_string()))?;

        let result = if status.is_terminal() {
            self.store.get_result(job_id).await?
        } else {
            None
        };

        Ok(JobView {
            job_id: job_id.to_string(),
            status,
            result,
        })
    }

    async fn check_transition(&self, job_id: &str, next: JobStatus) -> Result<(), StoreError> {
        match self.store.get_status(job_id).await? {
            Some(current) if !current.can_transition_to(next) => {
                Err(StoreError::IllegalTransition {
                    job_id: job_id.to_string(),
                    from: current.to_string(),
                    to: next.to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    async fn transition(&self, job_id: &str, next: JobStatus) -> Result<(), StoreError> {
        self.check_transition(job_id, next).await?;
        self.store.set_status(job_id, next).await
    }

    async fn finish(&self, job_id: &str, result: &JobResult) -> Result<(), StoreError> {
        self.check_transition(job_id, result.status).await?;
        let written = match self.store.set_result(job_id, result).await {
            Ok(()) => self.store.set_status(job_id, result.status).await,
            Err(e) => Err(e),
        };
        if let Err(e) = &written {
            self.mark_failed(job_id, result, e).await;
        }
        written
    }

    /// Best effort after a failed final write, so the job does not stay
    /// `processing` until it expires.
    async fn mark_failed(&self, job_id: &str, result: &JobResult, cause: &StoreError) {
        let mut failed = result.clone();
        failed.status = JobStatus::Failed;
        failed.partial_success = false;
        failed.error = Some(format!("Job result could not be stored: {}", cause));
        failed.trace.push(cause.to_string());

        if let Err(e) = self.store.set_result(job_id, &failed).await {
            warn!(job_id, error = %e, "Could not store failed result");
        }
        if let Err(e) = self.store.set_status(job_id, JobStatus::Failed).await {
            error!(job_id, error = %e, "Could not mark job failed");
        }
    }
}

fn join_failure(e: JoinError) -> PipelineError {
    if !e.is_panic() {
        return PipelineError::Cancelled;
    }
    let payload = e.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    PipelineError::Panicked(message)
}

/// The error and its sources, outermost first.
fn error_chain(error: &dyn std::error::Error) -> Vec<String> {
    let mut chain = vec![error.to_string()];
    let mut source = error.source();
    while let Some(cause) = source {
        chain.push(cause.to_string());
        source = cause.source();
    }
    chain
}
