//! Job status and result storage with expiry.

pub mod memory;
pub mod redis_store;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{StoreBackend, StoreConfig};
use crate::error::StoreError;
use crate::jobs::{JobResult, JobStatus};

pub use memory::MemoryJobStore;
pub use redis_store::RedisJobStore;

/// Upper bound on the initial Redis handshake at startup.
const REDIS_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Keyed job state. Every write refreshes the entry's TTL.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn set_status(&self, job_id: &str, status: JobStatus) -> Result<(), StoreError>;

    async fn get_status(&self, job_id: &str) -> Result<Option<JobStatus>, StoreError>;

    async fn set_result(&self, job_id: &str, result: &JobResult) -> Result<(), StoreError>;

    async fn get_result(&self, job_id: &str) -> Result<Option<JobResult>, StoreError>;

    async fn exists(&self, job_id: &str) -> Result<bool, StoreError>;

    fn backend_name(&self) -> &'static str;
}

pub fn status_key(job_id: &str) -> String {
    format!("job:{}:status", job_id)
}

pub fn result_key(job_id: &str) -> String {
    format!("job:{}:result", job_id)
}

/// Opens the configured backend. A Redis backend that cannot be reached at
/// startup degrades to the in-memory store.
pub async fn open_store(config: &StoreConfig) -> Arc<dyn JobStore> {
    let ttl = config.ttl();

    if config.backend == StoreBackend::Redis {
        let url = config.redis_url.as_deref().unwrap_or_default();
        match tokio::time::timeout(REDIS_CONNECT_TIMEOUT, RedisJobStore::connect(url, ttl)).await {
            Ok(Ok(store)) => return Arc::new(store),
            Ok(Err(e)) => {
                log::warn!("Redis unavailable ({}), falling back to in-memory job store", e);
            }
            Err(_) => {
                log::warn!(
                    "Redis did not answer within {}s, falling back to in-memory job store",
                    REDIS_CONNECT_TIMEOUT.as_secs()
                );
            }
        }
    }

    Arc::new(MemoryJobStore::new(ttl))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys() {
        assert_eq!(status_key("abc"), "job:abc:status");
        assert_eq!(result_key("abc"), "job:abc:result");
    }

    #[tokio::test]
    async fn test_memory_backend_selected() {
        let store = open_store(&StoreConfig::default()).await;
        assert_eq!(store.backend_name(), "memory");
    }

    #[tokio::test]
    async fn test_bad_redis_url_falls_back_to_memory() {
        let config = StoreConfig {
            backend: StoreBackend::Redis,
            redis_url: Some("not-a-redis-url".to_string()),
            ..Default::default()
        };
        let store = open_store(&config).await;
        assert_eq!(store.backend_name(), "memory");
    }
}
