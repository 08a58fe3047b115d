use thiserror::Error;

/// Fatal pipeline errors. Anything recoverable is a [`PipelineWarning`].
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("All {count} sources failed; first error: {first}")]
    AllSourcesFailed { count: usize, first: String },

    #[error("Pipeline task panicked: {0}")]
    Panicked(String),

    #[error("Pipeline task was cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineWarning {
    SourceFailed { source: String, error: String },
    RecordFailed { source: String, reason: String },
    DeliveryFailed { delivery_id: String, error: String },
}

impl std::fmt::Display for PipelineWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineWarning::SourceFailed { source, error } => {
                write!(f, "source {} failed: {}", source, error)
            }
            PipelineWarning::RecordFailed { source, reason } => {
                write!(f, "source {} skipped {}", source, reason)
            }
            PipelineWarning::DeliveryFailed { delivery_id, error } => {
                write!(f, "delivery {} failed: {}", delivery_id, error)
            }
        }
    }
}
