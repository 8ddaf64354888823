//! [`GenerationBackend`] implementation for the direct service.

use std::time::Duration;

use async_trait::async_trait;
use atelier_core::backend::{
    BackendCapabilities, BackendError, EventCallback, GenerationBackend, GenerationEvent,
    GenerationOutput, GenerationRequest,
};
use atelier_core::blocking::BlockingPool;

use crate::api::{DirectApi, DirectApiError, JOB_ID_HEADER};
use crate::models::{build_request_body, is_direct_model};
use crate::normalize::normalize_to_png;

/// Default bound on one generate call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone)]
pub struct DirectBackendConfig {
    /// Base URL of the service, e.g. `http://gpu-2:9000`.
    pub base_url: String,
    pub default_timeout: Duration,
}

impl DirectBackendConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            default_timeout: DEFAULT_TIMEOUT,
        }
    }
}

pub struct DirectBackend {
    api: DirectApi,
    pool: BlockingPool,
    default_timeout: Duration,
}

impl DirectBackend {
    pub fn new(config: DirectBackendConfig, pool: BlockingPool) -> Self {
        Self {
            api: DirectApi::new(config.base_url),
            pool,
            default_timeout: config.default_timeout,
        }
    }
}

#[async_trait]
impl GenerationBackend for DirectBackend {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            supports_progress: false,
        }
    }

    fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    fn handles(&self, workflow: &str) -> bool {
        is_direct_model(workflow)
    }

    async fn generate_and_wait(
        &self,
        request: &GenerationRequest,
        on_event: &EventCallback,
        max_wait: Duration,
    ) -> Result<GenerationOutput, BackendError> {
        let body = build_request_body(&request.workflow, &request.params);
        on_event(GenerationEvent::Started);

        let response = self
            .api
            .generate(&body, max_wait)
            .await
            .map_err(|e| match e {
                DirectApiError::Request(ref inner) if inner.is_timeout() => {
                    BackendError::Timeout(max_wait)
                }
                other => other.into(),
            })?;

        let correlation_id = response
            .job_id
            .ok_or(BackendError::MissingField(JOB_ID_HEADER))?;
        tracing::info!(
            job_id = %request.job_id,
            correlation_id = %correlation_id,
            content_type = ?response.content_type,
            size = response.bytes.len(),
            "Direct generation finished",
        );

        let raw = response.bytes;
        let bytes = self
            .pool
            .run(move || normalize_to_png(raw))
            .await
            .map_err(|e| BackendError::InvalidOutput(e.to_string()))?
            .map_err(|e| BackendError::InvalidOutput(e.to_string()))?;

        on_event(GenerationEvent::Completed);
        Ok(GenerationOutput {
            bytes,
            correlation_id,
            extension: "png".to_string(),
        })
    }
}
