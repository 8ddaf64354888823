//! Generation backend contract.
//!
//! A backend turns a [`GenerationRequest`] into artifact bytes plus the
//! backend-assigned correlation id, reporting lifecycle signals through an
//! [`EventCallback`] as it goes. Each backend crate converts its own
//! transport errors into [`BackendError`] so raw HTTP errors never reach the
//! orchestrator.

use std::time::Duration;

use async_trait::async_trait;

use crate::params::ParameterSet;
use crate::types::JobId;

/// Lifecycle signals emitted during one generation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationEvent {
    /// The job was accepted by the backend.
    Started,
    /// The backend assigned its correlation id before the job finished.
    Assigned(String),
    /// The backend began executing the job. Fired at most once.
    Running,
    /// Intermediate progress, 0-100.
    Progress(u8),
    /// The artifact has been retrieved.
    Completed,
}

/// Callback receiving [`GenerationEvent`]s. Must not block.
pub type EventCallback = dyn Fn(GenerationEvent) + Send + Sync;

/// What a backend is able to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendCapabilities {
    /// `false` means only `Started` and `Completed` are ever emitted.
    pub supports_progress: bool,
}

/// Input to a generation run.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub job_id: JobId,
    /// Workflow template or model name.
    pub workflow: String,
    pub params: ParameterSet,
}

/// Result of a successful generation run.
#[derive(Debug, Clone)]
pub struct GenerationOutput {
    pub bytes: Vec<u8>,
    pub correlation_id: String,
    /// Lowercase file extension of the artifact, without the dot.
    pub extension: String,
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Network or decoding failure talking to the backend.
    #[error("Backend request failed: {0}")]
    Transport(String),

    /// The backend answered with a non-success status.
    #[error("Backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The backend ran the job and reported a failure.
    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Generation timed out after {0:?}")]
    Timeout(Duration),

    /// The job description could not be built.
    #[error("Invalid workflow template: {0}")]
    Template(String),

    /// A required field was absent from a backend response.
    #[error("Backend response is missing '{0}'")]
    MissingField(&'static str),

    /// The backend reported success but the artifact is unusable.
    #[error("Invalid backend output: {0}")]
    InvalidOutput(String),
}

#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> BackendCapabilities;

    /// Timeout applied by [`generate`](Self::generate).
    fn default_timeout(&self) -> Duration;

    /// Whether this backend can run the given workflow / model.
    fn handles(&self, workflow: &str) -> bool;

    /// Run a job with the backend's default timeout.
    async fn generate(
        &self,
        request: &GenerationRequest,
        on_event: &EventCallback,
    ) -> Result<GenerationOutput, BackendError> {
        self.generate_and_wait(request, on_event, self.default_timeout())
            .await
    }

    /// Run a job, aborting with [`BackendError::Timeout`] after `max_wait`.
    async fn generate_and_wait(
        &self,
        request: &GenerationRequest,
        on_event: &EventCallback,
        max_wait: Duration,
    ) -> Result<GenerationOutput, BackendError>;
}

/// Lowercase extension of `filename`, or `fallback` when it has none.
pub fn extension_of(filename: &str, fallback: &str) -> String {
    std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .unwrap_or(fallback)
        .to_ascii_lowercase()
}
