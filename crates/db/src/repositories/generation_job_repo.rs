//! Repository for the `generation_jobs` table.

use atelier_core::job::JobRecord;
use atelier_core::types::JobId;
use sqlx::PgPool;

use crate::models::generation_job::GenerationJobRow;

/// Column list for `generation_jobs` queries.
const COLUMNS: &str = "\
    id, user_id, username, prompt, parameters, workflow, is_private, \
    status_id, correlation_id, output_filename, metadata, error_message, \
    progress_percent, queued_at, started_at, completed_at, \
    created_at, updated_at";

/// Provides persistence operations for generation jobs.
pub struct GenerationJobRepo;

impl GenerationJobRepo {
    /// Insert a freshly created job.
    pub async fn insert(pool: &PgPool, job: &JobRecord) -> Result<(), sqlx::Error> {
        let lc = job.lifecycle();
        sqlx::query(
            "INSERT INTO generation_jobs \
                (id, user_id, username, prompt, parameters, workflow, is_private, \
                 status_id, correlation_id, output_filename, metadata, error_message, \
                 progress_percent, queued_at, started_at, completed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
        )
        .bind(job.id)
        .bind(&job.user_id)
        .bind(&job.username)
        .bind(&job.prompt)
        .bind(&job.parameters)
        .bind(&job.workflow)
        .bind(job.private)
        .bind(lc.status.id())
        .bind(&lc.correlation_id)
        .bind(&lc.output_filename)
        .bind(&job.metadata)
        .bind(&lc.error_message)
        .bind(i16::from(lc.progress_percent))
        .bind(lc.queued_at)
        .bind(lc.started_at)
        .bind(lc.completed_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Write the mutable lifecycle and result columns. Returns `false` if
    /// no row matched.
    pub async fn update_lifecycle(pool: &PgPool, job: &JobRecord) -> Result<bool, sqlx::Error> {
        let lc = job.lifecycle();
        let result = sqlx::query(
            "UPDATE generation_jobs SET \
                status_id = $2, correlation_id = $3, output_filename = $4, \
                metadata = $5, error_message = $6, progress_percent = $7, \
                started_at = $8, completed_at = $9, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(job.id)
        .bind(lc.status.id())
        .bind(&lc.correlation_id)
        .bind(&lc.output_filename)
        .bind(&job.metadata)
        .bind(&lc.error_message)
        .bind(i16::from(lc.progress_percent))
        .bind(lc.started_at)
        .bind(lc.completed_at)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: JobId,
    ) -> Result<Option<GenerationJobRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM generation_jobs WHERE id = $1");
        sqlx::query_as::<_, GenerationJobRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_correlation_id(
        pool: &PgPool,
        correlation_id: &str,
    ) -> Result<Option<GenerationJobRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM generation_jobs WHERE correlation_id = $1");
        sqlx::query_as::<_, GenerationJobRow>(&query)
            .bind(correlation_id)
            .fetch_optional(pool)
            .await
    }

    /// Most recent job that produced `filename`.
    pub async fn find_by_output_filename(
        pool: &PgPool,
        filename: &str,
    ) -> Result<Option<GenerationJobRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM generation_jobs \
             WHERE output_filename = $1 \
             ORDER BY completed_at DESC NULLS LAST \
             LIMIT 1"
        );
        sqlx::query_as::<_, GenerationJobRow>(&query)
            .bind(filename)
            .fetch_optional(pool)
            .await
    }
}
