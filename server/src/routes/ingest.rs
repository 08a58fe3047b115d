use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use offer_ingest::email::parse_raw_email;
use offer_ingest::IngestRequest;
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::error::ApiResult;

#[derive(Debug, Serialize)]
pub struct JobAccepted {
    pub job_id: String,
}

/// Queues a structured submission; the job id is returned before any
/// extraction happens.
pub async fn ingest_handler(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> ApiResult<(StatusCode, Json<JobAccepted>)> {
    let job_id = state.jobs.submit(request).await?;
    Ok((StatusCode::ACCEPTED, Json(JobAccepted { job_id })))
}

#[derive(Debug, Deserialize)]
pub struct EmailParams {
    #[serde(default = "default_channel")]
    pub channel: String,
}

fn default_channel() -> String {
    "email".to_string()
}

/// Queues a raw RFC 822 message sent as the request body.
pub async fn ingest_email_handler(
    State(state): State<AppState>,
    Query(params): Query<EmailParams>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<JobAccepted>)> {
    let request = parse_raw_email(&body, &params.channel)?;
    let job_id = state.jobs.submit(request).await?;
    Ok((StatusCode::ACCEPTED, Json(JobAccepted { job_id })))
}
