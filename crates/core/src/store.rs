//! Persistence seam for job records.
//!
//! The orchestrator only sees [`JobStore`]; the PostgreSQL implementation
//! lives in `atelier-db`.

use async_trait::async_trait;

use crate::job::JobRecord;
use crate::types::JobId;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The underlying storage failed.
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// A stored row violates the job lifecycle invariants.
    #[error("Stored job {id} is corrupt: {reason}")]
    Corrupt { id: JobId, reason: String },

    #[error("Job {0} already exists")]
    Duplicate(JobId),
}

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a newly created job.
    async fn insert(&self, job: &JobRecord) -> Result<(), StoreError>;

    /// Overwrite the lifecycle and result fields of an existing job.
    async fn save(&self, job: &JobRecord) -> Result<(), StoreError>;

    async fn find(&self, id: JobId) -> Result<Option<JobRecord>, StoreError>;

    async fn find_by_correlation_id(
        &self,
        correlation_id: &str,
    ) -> Result<Option<JobRecord>, StoreError>;

    async fn find_by_output_filename(
        &self,
        filename: &str,
    ) -> Result<Option<JobRecord>, StoreError>;
}
