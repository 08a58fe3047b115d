//! In-process job store.
//!
//! Entries expire like their Redis counterparts; expired entries are treated
//! as absent on read and purged on the next write.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use super::JobStore;
use crate::error::StoreError;
use crate::jobs::{JobResult, JobStatus};

struct Expiring<T> {
    value: T,
    expires_at: Instant,
}

impl<T: Clone> Expiring<T> {
    fn live(&self, now: Instant) -> Option<T> {
        (self.expires_at > now).then(|| self.value.clone())
    }
}

#[derive(Default)]
struct Entries {
    statuses: HashMap<String, Expiring<JobStatus>>,
    results: HashMap<String, Expiring<JobResult>>,
}

impl Entries {
    fn purge_expired(&mut self, now: Instant) {
        self.statuses.retain(|_, e| e.expires_at > now);
        self.results.retain(|_, e| e.expires_at > now);
    }
}

pub struct MemoryJobStore {
    entries: RwLock<Entries>,
    ttl: Duration,
}

impl MemoryJobStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(Entries::default()),
            ttl,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Entries> {
        match self.entries.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Memory job store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, Entries> {
        match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Memory job store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Number of live jobs, for diagnostics.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.read()
            .statuses
            .values()
            .filter(|e| e.expires_at > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn set_status(&self, job_id: &str, status: JobStatus) -> Result<(), StoreError> {
        let now = Instant::now();
        let mut entries = self.write();
        entries.purge_expired(now);
        entries.statuses.insert(
            job_id.to_string(),
            Expiring {
                value: status,
                expires_at: now + self.ttl,
            },
        );
        Ok(())
    }

    async fn get_status(&self, job_id: &str) -> Result<Option<JobStatus>, StoreError> {
        let now = Instant::now();
        Ok(self.read().statuses.get(job_id).and_then(|e| e.live(now)))
    }

    async fn set_result(&self, job_id: &str, result: &JobResult) -> Result<(), StoreError> {
        let now = Instant::now();
        let mut entries = self.write();
        entries.purge_expired(now);
        entries.results.insert(
            job_id.to_string(),
            Expiring {
                value: result.clone(),
                expires_at: now + self.ttl,
            },
        );
        Ok(())
    }

    async fn get_result(&self, job_id: &str) -> Result<Option<JobResult>, StoreError> {
        let now = Instant::now();
        Ok(self.read().results.get(job_id).and_then(|e| e.live(now)))
    }

    async fn exists(&self, job_id: &str) -> Result<bool, StoreError> {
        Ok(self.get_status(job_id).await?.is_some())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
