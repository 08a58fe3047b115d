use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OfferIngestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] crate::pipeline::PipelineError),

    #[error("Extraction setup failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("Rate oracle setup failed: {0}")]
    Rate(#[from] RateError),

    #[error("Delivery setup failed: {0}")]
    Delivery(#[from] DeliveryError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Secret '{name}' could not be resolved: {source}")]
    Secret {
        name: String,
        #[source]
        source: crate::secrets::SecretError,
    },
}

/// Errors surfaced to callers of the job submission surface.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Submission has neither a text body nor attachments")]
    EmptySubmission,

    #[error("Unknown job '{0}'")]
    JobNotFound(String),

    #[error("Invalid attachment '{filename}': {reason}")]
    InvalidAttachment { filename: String, reason: String },

    #[error("Failed to parse email: {0}")]
    EmailParse(String),

    #[error("Job store unavailable: {0}")]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Failed to encode job payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Unknown job status '{0}'")]
    UnknownStatus(String),

    #[error("Illegal status transition for job {job_id}: {from} -> {to}")]
    IllegalTransition {
        job_id: String,
        from: String,
        to: String,
    },
}

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Unsupported attachment format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to process PDF: {0}")]
    PdfProcessing(String),

    #[error("Failed to process spreadsheet: {0}")]
    SpreadsheetProcessing(String),

    #[error("Failed to process DOCX: {0}")]
    DocxProcessing(String),

    #[error("Attachment is empty")]
    Empty,
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Extraction request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Extraction service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Extraction service reported an error: {0}")]
    Oracle(String),

    #[error("Failed to parse extraction response: {0}")]
    ResponseParse(String),

    #[error("Extraction timed out after {0}s")]
    Timeout(u64),

    #[error("Attachment could not be decoded: {0}")]
    Decode(#[from] DecodeError),

    #[error("Attachment could not be fetched: {0}")]
    Fetch(String),

    #[error("Extraction client misconfigured: {0}")]
    Client(String),
}

#[derive(Error, Debug)]
pub enum RateError {
    #[error("Rate request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Rate service returned HTTP {0}")]
    Status(u16),

    #[error("No EUR rate available for '{0}'")]
    Missing(String),

    #[error("Rate for '{code}' is not a positive number: {rate}")]
    Invalid { code: String, rate: f64 },
}

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Delivery request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Delivery endpoint returned HTTP {status}")]
    Status { status: u16 },

    #[error("Failed to encode delivery payload: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, OfferIngestError>;
