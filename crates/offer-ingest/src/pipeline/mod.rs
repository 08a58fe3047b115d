//! One job's run: sources → candidates → offers → deliveries.

pub mod context;
pub mod error;
pub mod runner;

pub use context::{OutcomeSummary, PipelineEvent, RecordOutcome, RunContext, TaggedCandidate};
pub use error::{PipelineError, PipelineWarning};
pub use runner::Pipeline;
