//! [`JobStore`] backed by PostgreSQL.

use async_trait::async_trait;
use atelier_core::job::JobRecord;
use atelier_core::store::{JobStore, StoreError};
use atelier_core::types::JobId;

use crate::models::generation_job::GenerationJobRow;
use crate::repositories::GenerationJobRepo;
use crate::DbPool;

#[derive(Debug, Clone)]
pub struct PgJobStore {
    pool: DbPool,
}

impl PgJobStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn map_err(job_id: JobId, err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return StoreError::Duplicate(job_id);
        }
    }
    StoreError::Backend(err.to_string())
}

fn into_record(row: Option<GenerationJobRow>) -> Result<Option<JobRecord>, StoreError> {
    row.map(GenerationJobRow::into_record).transpose()
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn insert(&self, job: &JobRecord) -> Result<(), StoreError> {
        GenerationJobRepo::insert(&self.pool, job)
            .await
            .map_err(|e| map_err(job.id, e))
    }

    async fn save(&self, job: &JobRecord) -> Result<(), StoreError> {
        let updated = GenerationJobRepo::update_lifecycle(&self.pool, job)
            .await
            .map_err(|e| map_err(job.id, e))?;
        if !updated {
            tracing::warn!(job_id = %job.id, "Saved job has no row; inserting");
            GenerationJobRepo::insert(&self.pool, job)
                .await
                .map_err(|e| map_err(job.id, e))?;
        }
        Ok(())
    }

    async fn find(&self, id: JobId) -> Result<Option<JobRecord>, StoreError> {
        let row = GenerationJobRepo::find_by_id(&self.pool, id)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        into_record(row)
    }

    async fn find_by_correlation_id(
        &self,
        correlation_id: &str,
    ) -> Result<Option<JobRecord>, StoreError> {
        let row = GenerationJobRepo::find_by_correlation_id(&self.pool, correlation_id)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        into_record(row)
    }

    async fn find_by_output_filename(
        &self,
        filename: &str,
    ) -> Result<Option<JobRecord>, StoreError> {
        let row = GenerationJobRepo::find_by_output_filename(&self.pool, filename)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        into_record(row)
    }
}
