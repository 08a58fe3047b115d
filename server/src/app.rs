//! Router and shared state.

use axum::{
    routing::{get, post},
    Router,
};
use offer_ingest::JobOrchestrator;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::routes::{
    debug_job_handler, debug_jobs_handler, health_handler, ingest_email_handler, ingest_handler,
    result_handler,
};

#[derive(Clone)]
pub struct AppState {
    pub jobs: JobOrchestrator,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/ingest", post(ingest_handler))
        .route("/api/ingest/email", post(ingest_email_handler))
        .route("/api/result/{job_id}", get(result_handler))
        .route("/debug/job/{job_id}", get(debug_job_handler))
        .route("/debug/jobs", get(debug_jobs_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header::CONTENT_TYPE, Request, StatusCode};
    use offer_ingest::currency::StaticRateOracle;
    use offer_ingest::delivery::{DeliveryDispatcher, LogTransport};
    use offer_ingest::extract::{
        AttachmentFetcher, DocumentInput, ExtractionOracle, OracleResponse, SourceAggregator,
    };
    use offer_ingest::normalize::Normalizer;
    use offer_ingest::{ExtractError, MemoryJobStore, Pipeline};
    use serde_json::{json, Value};
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    /// One priced record per line of text.
    struct LineOracle;

    #[async_trait]
    impl ExtractionOracle for LineOracle {
        async fn extract_text(&self, text: &str) -> Result<OracleResponse, ExtractError> {
            Ok(OracleResponse::Records(
                text.lines()
                    .map(|line| json!({"product_name": line, "price_per_unit": 9.5}))
                    .collect(),
            ))
        }

        async fn extract_file(&self, _document: &DocumentInput) -> Result<OracleResponse, ExtractError> {
            Ok(OracleResponse::Records(Vec::new()))
        }

        fn name(&self) -> &'static str {
            "lines"
        }
    }

    fn app() -> Router {
        let fetcher = AttachmentFetcher::new(Duration::from_secs(5), None, 1024 * 1024).unwrap();
        let pipeline = Pipeline::new(
            SourceAggregator::new(Arc::new(LineOracle), fetcher, Duration::from_secs(5), 2),
            Normalizer::new("test", 0.6),
            Arc::new(StaticRateOracle::new(BTreeMap::new())),
            DeliveryDispatcher::new(Arc::new(LogTransport), Duration::from_secs(5)),
            true,
        );
        let store = Arc::new(MemoryJobStore::new(Duration::from_secs(3600)));
        build_router(AppState {
            jobs: JobOrchestrator::new(store, Arc::new(pipeline)),
        })
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn wait_for_terminal(app: &Router, job_id: &str) -> Value {
        for _ in 0..200 {
            let (status, body) = send(app, get(&format!("/api/result/{}", job_id))).await;
            assert_eq!(status, StatusCode::OK);
            if body["status"] == "done" || body["status"] == "failed" {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} never finished", job_id);
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(&app(), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "offer-ingest");
    }

    #[tokio::test]
    async fn test_ingest_then_poll_until_done() {
        let app = app();
        let (status, body) = send(
            &app,
            post_json(
                "/api/ingest",
                json!({
                    "source_channel": "whatsapp",
                    "text_body": "Baileys Original 12x70cl 17% EUR\nJameson 12y"
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        let job_id = body["job_id"].as_str().unwrap().to_string();

        let result = wait_for_terminal(&app, &job_id).await;
        assert_eq!(result["status"], "done");
        assert_eq!(result["partial_success"], false);
        assert_eq!(result["products"].as_array().unwrap().len(), 2);
        assert_eq!(result["stats"]["validated"], 2);
        assert_eq!(result["products"][0]["source_channel"], "whatsapp");
    }

    #[tokio::test]
    async fn test_empty_submission_is_unprocessable() {
        let (status, body) = send(
            &app(),
            post_json("/api/ingest", json!({"text_body": "  ", "attachments": []})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["detail"].as_str().unwrap().contains("neither"));
    }

    #[tokio::test]
    async fn test_unknown_job_is_not_found() {
        let (status, body) = send(&app(), get("/api/result/does-not-exist")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "Unknown job");
    }

    #[tokio::test]
    async fn test_raw_email_ingest() {
        let raw = "From: Sales <sales@example.com>\r\n\
Message-ID: <m-1@example.com>\r\n\
Subject: Offer\r\n\
\r\n\
Aperol 6x1L\r\n";
        let request = Request::builder()
            .method("POST")
            .uri("/api/ingest/email?channel=email")
            .header(CONTENT_TYPE, "message/rfc822")
            .body(Body::from(raw))
            .unwrap();

        let app = app();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::ACCEPTED);

        let job_id = body["job_id"].as_str().unwrap().to_string();
        let result = wait_for_terminal(&app, &job_id).await;
        assert_eq!(result["products"][0]["supplier_email"], "sales@example.com");
    }

    #[tokio::test]
    async fn test_debug_endpoints() {
        let app = app();
        let (status, body) = send(&app, get("/debug/jobs")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["storage_type"], "memory");

        let (status, body) = send(&app, get("/debug/job/nope")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["job_id"], "nope");
        assert_eq!(body["exists"], false);
        assert!(body["status"].is_null());
    }
}
