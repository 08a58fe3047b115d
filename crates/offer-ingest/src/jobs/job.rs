//! Job lifecycle types shared by the store, the orchestrator and the HTTP
//! surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::StoreError;
use crate::model::Offer;

/// Status of a job. Moves forward only: `pending → processing → done|failed`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Done,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }

    fn rank(&self) -> u8 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::Processing => 1,
            JobStatus::Done | JobStatus::Failed => 2,
        }
    }

    /// Terminal states accept nothing; otherwise a status may be rewritten
    /// or moved forward, never back.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        !self.is_terminal() && next.rank() >= self.rank()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "done" => Ok(JobStatus::Done),
            "failed" => Ok(JobStatus::Failed),
            other => Err(StoreError::UnknownStatus(other.to_string())),
        }
    }
}

/// Per-job counters reported with the result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStats {
    /// Candidates extracted across all sources.
    pub candidates: usize,
    pub validated: usize,
    pub rejected: usize,
    pub duplicate_count: usize,
    /// Oracle records that could not be read as candidates.
    pub record_failures: usize,
    pub source_failures: usize,
    pub delivered: usize,
    pub delivery_failures: usize,
}

/// Persisted outcome of a finished job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub status: JobStatus,
    #[serde(default)]
    pub products: Vec<Offer>,
    #[serde(default)]
    pub stats: JobStats,
    #[serde(default)]
    pub partial_success: bool,
    #[serde(default)]
    pub error: Option<String>,
    /// Error chain, outermost first, for failed and partial jobs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trace: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobResult {
    pub fn done(products: Vec<Offer>, stats: JobStats, created_at: DateTime<Utc>) -> Self {
        Self {
            status: JobStatus::Done,
            products,
            stats,
            partial_success: false,
            error: None,
            trace: Vec::new(),
            created_at,
            completed_at: Some(Utc::now()),
        }
    }

    /// Offers accepted before a fatal error are kept; without any the job
    /// failed.
    pub fn after_error(
        products: Vec<Offer>,
        stats: JobStats,
        error: String,
        trace: Vec<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let partial_success = !products.is_empty();
        Self {
            status: if partial_success {
                JobStatus::Done
            } else {
                JobStatus::Failed
            },
            products,
            stats,
            partial_success,
            error: Some(error),
            trace,
            created_at,
            completed_at: Some(Utc::now()),
        }
    }
}

/// What a poll returns: the status, plus the result once terminal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobView {
    pub job_id: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Processing).unwrap(),
            "\"processing\""
        );
        let parsed: JobStatus = serde_json::from_str("\"done\"").unwrap();
        assert_eq!(parsed, JobStatus::Done);
    }

    #[test]
    fn test_from_str_round_trips_display() {
        for status in [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Done,
            JobStatus::Failed,
        ] {
            assert_eq!(status.to_string().parse::<JobStatus>().unwrap(), status);
        }
        assert!(matches!(
            "queued".parse::<JobStatus>(),
            Err(StoreError::UnknownStatus(s)) if s == "queued"
        ));
    }

    #[test]
    fn test_transitions_are_monotonic() {
        use JobStatus::*;

        assert!(Pending.can_transition_to(Processing));
        assert!(Pending.can_transition_to(Failed));
        assert!(Processing.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Done));
        assert!(Processing.can_transition_to(Failed));
        assert!(!Processing.can_transition_to(Pending));

        for terminal in [Done, Failed] {
            for next in [Pending, Processing, Done, Failed] {
                assert!(!terminal.can_transition_to(next), "{} -> {}", terminal, next);
            }
        }
    }

    #[test]
    fn test_after_error_without_offers_fails() {
        let result = JobResult::after_error(
            Vec::new(),
            JobStats::default(),
            "all sources failed".to_string(),
            vec!["all sources failed".to_string()],
            Utc::now(),
        );
        assert_eq!(result.status, JobStatus::Failed);
        assert!(!result.partial_success);
    }

    #[test]
    fn test_after_error_with_offers_is_partial_success() {
        let offer = Offer {
            product_name: Some("Aperol".to_string()),
            ..Default::default()
        };
        let result = JobResult::after_error(
            vec![offer],
            JobStats::default(),
            "pipeline task panicked".to_string(),
            Vec::new(),
            Utc::now(),
        );
        assert_eq!(result.status, JobStatus::Done);
        assert!(result.partial_success);
        assert_eq!(result.error.as_deref(), Some("pipeline task panicked"));
    }
}
