//! Test harness running whole jobs against scripted collaborators.
//!
//! The extraction oracle answers from a script keyed by source, rates come
//! from a fixed table and deliveries are recorded in memory.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::Notify;

use offer_ingest::currency::StaticRateOracle;
use offer_ingest::delivery::{DeliveryDispatcher, DeliveryEnvelope, DeliveryTransport};
use offer_ingest::extract::{
    AttachmentFetcher, DocumentInput, ExtractionOracle, OracleResponse, SourceAggregator,
};
use offer_ingest::model::IngestRequest;
use offer_ingest::normalize::Normalizer;
use offer_ingest::{
    DeliveryError, ExtractError, JobOrchestrator, JobResult, JobView, MemoryJobStore, Pipeline,
};

#[derive(Debug, Clone)]
pub enum Script {
    Reply(Value),
    Fail(String),
}

/// Oracle answering from a per-source script. Sources without a script
/// yield no records.
#[derive(Default)]
pub struct ScriptedOracle {
    text: Option<Script>,
    files: HashMap<String, Script>,
    gate: Option<Arc<Notify>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_text(mut self, reply: Value) -> Self {
        self.text = Some(Script::Reply(reply));
        self
    }

    pub fn fail_text(mut self, message: &str) -> Self {
        self.text = Some(Script::Fail(message.to_string()));
        self
    }

    pub fn on_file(mut self, filename: &str, reply: Value) -> Self {
        self.files
            .insert(filename.to_string(), Script::Reply(reply));
        self
    }

    pub fn fail_file(mut self, filename: &str, message: &str) -> Self {
        self.files
            .insert(filename.to_string(), Script::Fail(message.to_string()));
        self
    }

    /// Every call waits for one notification before answering.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    async fn answer(&self, script: Option<&Script>) -> Result<OracleResponse, ExtractError> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        match script {
            None => Ok(OracleResponse::Records(Vec::new())),
            Some(Script::Reply(value)) => OracleResponse::from_value(value.clone()),
            Some(Script::Fail(message)) => Err(ExtractError::Oracle(message.clone())),
        }
    }
}

#[async_trait]
impl ExtractionOracle for ScriptedOracle {
    async fn extract_text(&self, _text: &str) -> Result<OracleResponse, ExtractError> {
        self.answer(self.text.as_ref()).await
    }

    async fn extract_file(&self, document: &DocumentInput) -> Result<OracleResponse, ExtractError> {
        self.answer(self.files.get(&document.filename)).await
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Records `(delivery_id, product_key)` for each delivery.
#[derive(Default)]
pub struct RecordingTransport {
    deliveries: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl RecordingTransport {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn deliveries(&self) -> Vec<(String, String)> {
        self.deliveries.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliveryTransport for RecordingTransport {
    async fn send(&self, envelope: &DeliveryEnvelope<'_>) -> Result<(), DeliveryError> {
        if self.fail {
            return Err(DeliveryError::Status { status: 502 });
        }
        self.deliveries.lock().unwrap().push((
            envelope.delivery_id.to_string(),
            envelope.data.product_key.clone().unwrap_or_default(),
        ));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// EUR per unit used by every harness run.
pub fn test_rates() -> BTreeMap<String, f64> {
    BTreeMap::from([("USD".to_string(), 0.9), ("GBP".to_string(), 1.17)])
}

pub struct TestHarness {
    pub jobs: JobOrchestrator,
    pub transport: Arc<RecordingTransport>,
}

impl TestHarness {
    pub fn new(oracle: ScriptedOracle) -> Self {
        Self::with_transport(oracle, RecordingTransport::default())
    }

    pub fn with_transport(oracle: ScriptedOracle, transport: RecordingTransport) -> Self {
        let transport = Arc::new(transport);
        let fetcher = AttachmentFetcher::new(Duration::from_secs(2), None, 1024 * 1024)
            .expect("Failed to build fetcher");
        let pipeline = Pipeline::new(
            SourceAggregator::new(Arc::new(oracle), fetcher, Duration::from_secs(10), 4),
            Normalizer::new("test", 0.6),
            Arc::new(StaticRateOracle::new(test_rates())),
            DeliveryDispatcher::new(transport.clone(), Duration::from_secs(5)),
            true,
        );
        let store = Arc::new(MemoryJobStore::new(Duration::from_secs(3600)));

        Self {
            jobs: JobOrchestrator::new(store, Arc::new(pipeline)),
            transport,
        }
    }

    /// Runs a job in the foreground and returns its persisted result.
    pub async fn run(&self, job_id: &str, request: IngestRequest) -> JobResult {
        self.jobs
            .run(job_id, request, Utc::now())
            .await
            .expect("Job run failed");
        self.jobs
            .poll(job_id)
            .await
            .expect("Job vanished")
            .result
            .expect("Terminal job has no result")
    }

    pub async fn wait_for_terminal(&self, job_id: &str) -> JobView {
        for _ in 0..500 {
            let view = self.jobs.poll(job_id).await.expect("Job vanished");
            if view.status.is_terminal() {
                return view;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("Job {} did not finish", job_id);
    }

    pub fn delivery_ids(&self) -> Vec<String> {
        self.transport
            .deliveries()
            .into_iter()
            .map(|(id, _)| id)
            .collect()
    }
}
