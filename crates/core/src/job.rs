//! Generation job record and its lifecycle state machine.
//!
//! ```text
//! pending --mark_processing--> processing --mark_completed--> completed
//!    |                             |
//!    +---------mark_failed---------+----------------------->  failed
//! ```
//!
//! Terminal states (`completed`, `failed`) accept no further transitions.
//! Lifecycle fields are private; they change only through the `mark_*`
//! methods, or are restored wholesale from storage via [`JobRecord::restore`].

use serde::{Deserialize, Serialize};

use crate::params::ParameterSet;
use crate::types::{JobId, Timestamp};

/// Status ID type matching the SMALLINT column in the database.
pub type StatusId = i16;

/// Job lifecycle status.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending = 1,
    Processing = 2,
    Completed = 3,
    Failed = 4,
}

impl JobStatus {
    /// Return the database status ID.
    pub fn id(self) -> StatusId {
        self as StatusId
    }

    pub fn from_id(id: StatusId) -> Option<Self> {
        match id {
            1 => Some(Self::Pending),
            2 => Some(Self::Processing),
            3 => Some(Self::Completed),
            4 => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected state-machine operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum JobStateError {
    #[error("Job is already {0} and cannot change state")]
    AlreadyTerminal(JobStatus),

    #[error("Correlation id is already set to '{existing}'")]
    CorrelationMismatch { existing: String },

    #[error("A completed job requires a non-empty output filename")]
    MissingOutput,

    #[error("Inconsistent stored job: {0}")]
    Inconsistent(&'static str),
}

/// Lifecycle fields of a job, as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobLifecycle {
    pub status: JobStatus,
    pub queued_at: Timestamp,
    pub started_at: Option<Timestamp>,
    /// Terminal timestamp for both completed and failed jobs.
    pub completed_at: Option<Timestamp>,
    pub error_message: Option<String>,
    /// Backend-assigned id (e.g. the remote prompt id).
    pub correlation_id: Option<String>,
    pub output_filename: Option<String>,
    /// Latest reported progress (0-100). Informational.
    pub progress_percent: u8,
}

/// One generation request and its lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub user_id: String,
    pub username: String,
    /// Original prompt text as submitted.
    pub prompt: String,
    /// Canonical parameters (see [`ParameterSet::to_json`]).
    pub parameters: serde_json::Value,
    /// Workflow / model identifier used for backend selection.
    pub workflow: String,
    pub private: bool,
    /// Metadata extracted from the finished artifact.
    pub metadata: Option<serde_json::Value>,
    #[serde(flatten)]
    lifecycle: JobLifecycle,
}

/// Identity and request fields for a new job.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub user_id: String,
    pub username: String,
    pub prompt: String,
    pub parameters: ParameterSet,
    pub workflow: String,
    pub private: bool,
}

impl JobRecord {
    /// Create a pending job with a fresh id, queued now.
    pub fn new(input: NewJob) -> Self {
        Self {
            id: uuid::Uuid::now_v7(),
            user_id: input.user_id,
            username: input.username,
            prompt: input.prompt,
            parameters: input.parameters.to_json(),
            workflow: input.workflow,
            private: input.private,
            metadata: None,
            lifecycle: JobLifecycle {
                status: JobStatus::Pending,
                queued_at: chrono::Utc::now(),
                started_at: None,
                completed_at: None,
                error_message: None,
                correlation_id: None,
                output_filename: None,
                progress_percent: 0,
            },
        }
    }

    /// Rebuild a job from stored fields, checking lifecycle invariants.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: JobId,
        user_id: String,
        username: String,
        prompt: String,
        parameters: serde_json::Value,
        workflow: String,
        private: bool,
        metadata: Option<serde_json::Value>,
        lifecycle: JobLifecycle,
    ) -> Result<Self, JobStateError> {
        match lifecycle.status {
            JobStatus::Completed => {
                if lifecycle.output_filename.as_deref().map_or(true, str::is_empty) {
                    return Err(JobStateError::MissingOutput);
                }
                if lifecycle.error_message.is_some() {
                    return Err(JobStateError::Inconsistent(
                        "completed job carries an error message",
                    ));
                }
                if lifecycle.completed_at.is_none() {
                    return Err(JobStateError::Inconsistent("completed job without completed_at"));
                }
            }
            JobStatus::Failed => {
                if lifecycle.error_message.is_none() {
                    return Err(JobStateError::Inconsistent("failed job without error message"));
                }
            }
            JobStatus::Pending | JobStatus::Processing => {
                if lifecycle.completed_at.is_some() {
                    return Err(JobStateError::Inconsistent(
                        "non-terminal job with completed_at",
                    ));
                }
            }
        }
        Ok(Self {
            id,
            user_id,
            username,
            prompt,
            parameters,
            workflow,
            private,
            metadata,
            lifecycle,
        })
    }

    // ---- accessors ----

    pub fn lifecycle(&self) -> &JobLifecycle {
        &self.lifecycle
    }

    pub fn status(&self) -> JobStatus {
        self.lifecycle.status
    }

    pub fn queued_at(&self) -> Timestamp {
        self.lifecycle.queued_at
    }

    pub fn started_at(&self) -> Option<Timestamp> {
        self.lifecycle.started_at
    }

    pub fn completed_at(&self) -> Option<Timestamp> {
        self.lifecycle.completed_at
    }

    pub fn error_message(&self) -> Option<&str> {
        self.lifecycle.error_message.as_deref()
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.lifecycle.correlation_id.as_deref()
    }

    pub fn output_filename(&self) -> Option<&str> {
        self.lifecycle.output_filename.as_deref()
    }

    pub fn progress_percent(&self) -> u8 {
        self.lifecycle.progress_percent
    }

    /// Canonical parameters decoded back into a [`ParameterSet`].
    pub fn parameter_set(&self) -> Result<ParameterSet, serde_json::Error> {
        ParameterSet::from_json(&self.parameters)
    }

    /// `completed_at - started_at`, when both are set.
    pub fn processing_time(&self) -> Option<chrono::Duration> {
        match (self.lifecycle.started_at, self.lifecycle.completed_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    // ---- transitions ----

    /// Enter `processing`. Returns `true` if the state changed.
    ///
    /// A no-op when already processing or terminal; `started_at` is set
    /// at most once.
    pub fn mark_processing(&mut self) -> bool {
        if self.lifecycle.status != JobStatus::Pending {
            return false;
        }
        self.lifecycle.status = JobStatus::Processing;
        if self.lifecycle.started_at.is_none() {
            self.lifecycle.started_at = Some(chrono::Utc::now());
        }
        true
    }

    /// Record the backend-assigned id. Setting the same id again is a no-op.
    pub fn set_correlation_id(&mut self, correlation_id: &str) -> Result<(), JobStateError> {
        match &self.lifecycle.correlation_id {
            Some(existing) if existing == correlation_id => Ok(()),
            Some(existing) => Err(JobStateError::CorrelationMismatch {
                existing: existing.clone(),
            }),
            None => {
                self.lifecycle.correlation_id = Some(correlation_id.to_string());
                Ok(())
            }
        }
    }

    /// Record intermediate progress. Ignored once terminal.
    pub fn record_progress(&mut self, percent: u8) -> bool {
        if self.lifecycle.status.is_terminal() {
            return false;
        }
        self.lifecycle.progress_percent = percent.min(100);
        true
    }

    /// Enter `completed` with the stored artifact filename.
    pub fn mark_completed(
        &mut self,
        filename: &str,
        correlation_id: Option<&str>,
    ) -> Result<(), JobStateError> {
        self.mark_completed_at(filename, correlation_id, chrono::Utc::now())
    }

    /// Like [`mark_completed`](Self::mark_completed) with an explicit
    /// completion time, so the artifact's date directory and
    /// `completed_at` agree.
    pub fn mark_completed_at(
        &mut self,
        filename: &str,
        correlation_id: Option<&str>,
        at: Timestamp,
    ) -> Result<(), JobStateError> {
        self.ensure_not_terminal()?;
        if filename.trim().is_empty() {
            return Err(JobStateError::MissingOutput);
        }
        if let Some(id) = correlation_id {
            self.set_correlation_id(id)?;
        }
        self.lifecycle.status = JobStatus::Completed;
        self.lifecycle.completed_at = Some(at);
        self.lifecycle.output_filename = Some(filename.to_string());
        self.lifecycle.progress_percent = 100;
        Ok(())
    }

    /// Enter `failed` with a user-displayable message.
    pub fn mark_failed(&mut self, message: &str) -> Result<(), JobStateError> {
        self.ensure_not_terminal()?;
        self.lifecycle.status = JobStatus::Failed;
        self.lifecycle.completed_at = Some(chrono::Utc::now());
        self.lifecycle.error_message = Some(message.to_string());
        Ok(())
    }

    fn ensure_not_terminal(&self) -> Result<(), JobStateError> {
        if self.lifecycle.status.is_terminal() {
            return Err(JobStateError::AlreadyTerminal(self.lifecycle.status));
        }
        Ok(())
    }

    /// Compact public view used in notifications.
    pub fn summary(&self) -> JobSummary {
        JobSummary {
            id: self.id,
            username: self.username.clone(),
            prompt: self.prompt.clone(),
            workflow: self.workflow.clone(),
            status: self.lifecycle.status,
            parameters: self.parameters.clone(),
            output_filename: self.lifecycle.output_filename.clone(),
            queued_at: self.lifecycle.queued_at,
            completed_at: self.lifecycle.completed_at,
            processing_time_secs: self
                .processing_time()
                .map(|d| d.num_milliseconds() as f64 / 1000.0),
        }
    }
}

/// Job summary embedded in notification events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: JobId,
    pub username: String,
    pub prompt: String,
    pub workflow: String,
    pub status: JobStatus,
    pub parameters: serde_json::Value,
    pub output_filename: Option<String>,
    pub queued_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    pub processing_time_secs: Option<f64>,
}
