pub mod config;
pub mod currency;
pub mod decode;
pub mod delivery;
pub mod email;
pub mod error;
pub mod extract;
pub mod gate;
pub mod jobs;
pub mod logging;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod sanitize;
pub mod secrets;
pub mod store;

pub use config::{load_config, load_config_from_str, Config};
pub use error::{
    ConfigError, DecodeError, DeliveryError, ExtractError, IngestError, OfferIngestError,
    RateError, Result, StoreError,
};
pub use jobs::{JobOrchestrator, JobResult, JobStats, JobStatus, JobView};
pub use model::{Attachment, IngestRequest, Offer, RawCandidate};
pub use pipeline::{Pipeline, PipelineError, PipelineWarning};
pub use secrets::{resolve_secret, resolve_secret_optional, SecretError};
pub use store::{open_store, JobStore, MemoryJobStore, RedisJobStore};
