pub mod job;
pub mod orchestrator;

pub use job::{JobResult, JobStats, JobStatus, JobView};
pub use orchestrator::JobOrchestrator;
