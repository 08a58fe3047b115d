use axum::{
    extract::{Path, State},
    Json,
};
use offer_ingest::{JobResult, JobStatus, StoreError};
use serde::Serialize;

use crate::app::AppState;
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Serialize)]
pub struct DebugJobResponse {
    pub job_id: String,
    pub status: Option<JobStatus>,
    pub result: Option<JobResult>,
    pub exists: bool,
}

#[derive(Debug, Serialize)]
pub struct DebugJobsResponse {
    pub message: &'static str,
    pub storage_type: &'static str,
}

fn store_failure(e: StoreError) -> ApiError {
    ApiError::internal(e.to_string())
}

/// Raw store contents for one job, whatever its state.
pub async fn debug_job_handler(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<DebugJobResponse>> {
    let store = state.jobs.store();
    let status = store.get_status(&job_id).await.map_err(store_failure)?;
    let result = store.get_result(&job_id).await.map_err(store_failure)?;
    let exists = store.exists(&job_id).await.map_err(store_failure)?;

    Ok(Json(DebugJobResponse {
        job_id,
        status,
        result,
        exists,
    }))
}

pub async fn debug_jobs_handler(State(state): State<AppState>) -> Json<DebugJobsResponse> {
    Json(DebugJobsResponse {
        message: "Jobs are not enumerable; query /debug/job/{job_id} by id.",
        storage_type: state.jobs.store().backend_name(),
    })
}
