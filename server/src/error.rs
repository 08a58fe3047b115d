use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use offer_ingest::IngestError;
use serde_json::json;
use std::fmt;

pub type ApiResult<T> = Result<T, ApiError>;

/// Error reply: the status plus a `{"detail": ..}` body.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, detail)
    }

    pub fn unprocessable(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, detail)
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, detail)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.detail)
    }
}

impl std::error::Error for ApiError {}

impl From<IngestError> for ApiError {
    fn from(e: IngestError) -> Self {
        match e {
            IngestError::JobNotFound(_) => ApiError::not_found("Unknown job"),
            IngestError::EmptySubmission
            | IngestError::InvalidAttachment { .. }
            | IngestError::EmailParse(_) => ApiError::unprocessable(e.to_string()),
            IngestError::Store(store) => {
                tracing::error!(error = %store, "Job store failure");
                ApiError::internal("Job store unavailable")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}
