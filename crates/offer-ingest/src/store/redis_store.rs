//! Redis-backed job store: `job:{id}:status` and `job:{id}:result`, both
//! written with `SET … EX ttl`.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;

use super::{result_key, status_key, JobStore};
use crate::error::StoreError;
use crate::jobs::{JobResult, JobStatus};

#[derive(Clone)]
pub struct RedisJobStore {
    conn: ConnectionManager,
    ttl_secs: u64,
}

impl std::fmt::Debug for RedisJobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisJobStore")
            .field("connection", &"ConnectionManager")
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

impl RedisJobStore {
    pub async fn connect(redis_url: &str, ttl: Duration) -> Result<Self, StoreError> {
        log::info!("Connecting to Redis job store");
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        log::info!("Connected to Redis job store");

        Ok(Self {
            conn,
            ttl_secs: ttl.as_secs().max(1),
        })
    }
}

#[async_trait]
impl JobStore for RedisJobStore {
    async fn set_status(&self, job_id: &str, status: JobStatus) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(status_key(job_id), status.as_str(), self.ttl_secs)
            .await?;
        Ok(())
    }

    async fn get_status(&self, job_id: &str) -> Result<Option<JobStatus>, StoreError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(status_key(job_id)).await?;
        raw.map(|s| s.parse()).transpose()
    }

    async fn set_result(&self, job_id: &str, result: &JobResult) -> Result<(), StoreError> {
        let json = serde_json::to_string(result)?;
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(result_key(job_id), json, self.ttl_secs)
            .await?;
        Ok(())
    }

    async fn get_result(&self, job_id: &str) -> Result<Option<JobResult>, StoreError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(result_key(job_id)).await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn exists(&self, job_id: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(status_key(job_id)).await?;
        Ok(exists)
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
