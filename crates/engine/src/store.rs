//! Shared in-memory job store.
//!
//! One store instance is shared between the request layer and the pipeline
//! tasks. Readers always get cloned snapshots; the lock is never held across
//! an await point in callers.

use crate::job::JobRecord;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared map of job id to record.
pub type SharedJobs = Arc<RwLock<HashMap<String, JobRecord>>>;

/// Cloneable handle to the job map. All handles point at the same state.
#[derive(Debug, Clone, Default)]
pub struct JobStore {
    jobs: SharedJobs,
}

impl JobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, replacing any existing record with the same id.
    pub async fn insert(&self, record: JobRecord) {
        let mut jobs = self.jobs.write().await;
        jobs.insert(record.id.clone(), record);
    }

    /// Cloned point-in-time copy of one record.
    pub async fn snapshot(&self, id: &str) -> Option<JobRecord> {
        let jobs = self.jobs.read().await;
        jobs.get(id).cloned()
    }

    /// Apply a mutation to a record in place. Returns false when the id is
    /// unknown, for example after a concurrent cleanup.
    pub async fn update<F>(&self, id: &str, mutate: F) -> bool
    where
        F: FnOnce(&mut JobRecord),
    {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(id) {
            Some(record) => {
                mutate(record);
                true
            }
            None => false,
        }
    }

    /// Remove a record, returning it if it was present.
    pub async fn remove(&self, id: &str) -> Option<JobRecord> {
        let mut jobs = self.jobs.write().await;
        jobs.remove(id)
    }

    /// Number of tracked jobs.
    pub async fn len(&self) -> usize {
        let jobs = self.jobs.read().await;
        jobs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
