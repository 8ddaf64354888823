//! Row model for the `generation_jobs` table.

use atelier_core::job::{JobLifecycle, JobRecord, JobStatus, StatusId};
use atelier_core::store::StoreError;
use atelier_core::types::{JobId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `generation_jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct GenerationJobRow {
    pub id: JobId,
    pub user_id: String,
    pub username: String,
    pub prompt: String,
    pub parameters: serde_json::Value,
    pub workflow: String,
    pub is_private: bool,
    pub status_id: StatusId,
    pub correlation_id: Option<String>,
    pub output_filename: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub progress_percent: i16,
    pub queued_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl GenerationJobRow {
    /// Rebuild the domain record, rejecting rows that break lifecycle rules.
    pub fn into_record(self) -> Result<JobRecord, StoreError> {
        let id = self.id;
        let status = JobStatus::from_id(self.status_id).ok_or_else(|| StoreError::Corrupt {
            id,
            reason: format!("unknown status_id {}", self.status_id),
        })?;

        let lifecycle = JobLifecycle {
            status,
            queued_at: self.queued_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            error_message: self.error_message,
            correlation_id: self.correlation_id,
            output_filename: self.output_filename,
            progress_percent: self.progress_percent.clamp(0, 100) as u8,
        };

        JobRecord::restore(
            id,
            self.user_id,
            self.username,
            self.prompt,
            self.parameters,
            self.workflow,
            self.is_private,
            self.metadata,
            lifecycle,
        )
        .map_err(|e| StoreError::Corrupt {
            id,
            reason: e.to_string(),
        })
    }
}
