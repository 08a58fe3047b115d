use axum::{
    extract::{Path, State},
    Json,
};
use offer_ingest::{JobStats, JobStatus, JobView, Offer};
use serde::Serialize;

use crate::app::AppState;
use crate::error::ApiResult;

/// Poll reply. Only `status` is present until the job is terminal.
#[derive(Debug, Serialize)]
pub struct ResultResponse {
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub products: Option<Vec<Offer>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<JobStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial_success: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trace: Vec<String>,
}

impl From<JobView> for ResultResponse {
    fn from(view: JobView) -> Self {
        let mut response = ResultResponse {
            status: view.status,
            products: None,
            stats: None,
            partial_success: None,
            error: None,
            trace: Vec::new(),
        };

        if let Some(result) = view.result {
            match view.status {
                JobStatus::Done => {
                    response.products = Some(result.products);
                    response.partial_success = Some(result.partial_success);
                    response.error = result.error;
                }
                JobStatus::Failed => {
                    response.error = result.error;
                    response.trace = result.trace;
                }
                JobStatus::Pending | JobStatus::Processing => return response,
            }
            response.stats = Some(result.stats);
        }
        response
    }
}

pub async fn result_handler(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<ResultResponse>> {
    let view = state.jobs.poll(&job_id).await?;
    Ok(Json(view.into()))
}
