//! HTTP client for the direct generation service.

use atelier_core::backend::BackendError;

/// Header carrying the service-assigned job id.
pub const JOB_ID_HEADER: &str = "x-job-id";

#[derive(Debug, Clone)]
pub struct DirectApi {
    client: reqwest::Client,
    base_url: String,
}

/// Raw `POST /generate` result.
#[derive(Debug)]
pub struct GenerateResponse {
    pub bytes: Vec<u8>,
    /// Value of the `x-job-id` header, if present.
    pub job_id: Option<String>,
    pub content_type: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum DirectApiError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Generation service error ({status}): {body}")]
    ApiError { status: u16, body: String },
}

impl From<DirectApiError> for BackendError {
    fn from(err: DirectApiError) -> Self {
        match err {
            DirectApiError::Request(e) => BackendError::Transport(e.to_string()),
            DirectApiError::ApiError { status, body } => BackendError::Status { status, body },
        }
    }
}

impl DirectApi {
    pub fn new(base_url: String) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Send `POST /generate` and wait for the artifact.
    ///
    /// `timeout` bounds the whole request, since the service answers only
    /// once generation finishes.
    pub async fn generate(
        &self,
        body: &serde_json::Value,
        timeout: std::time::Duration,
    ) -> Result<GenerateResponse, DirectApiError> {
        let response = self
            .client
            .post(format!("{}/generate", self.base_url))
            .timeout(timeout)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(DirectApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let job_id = header(JOB_ID_HEADER);
        let content_type = header(reqwest::header::CONTENT_TYPE.as_str());

        let bytes = response.bytes().await?.to_vec();
        Ok(GenerateResponse {
            bytes,
            job_id,
            content_type,
        })
    }
}
