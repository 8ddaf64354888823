//! [`GenerationBackend`] implementation for ComfyUI.
//!
//! One run: materialize the workflow template, `POST /prompt`, then follow
//! the prompt over the WebSocket while polling `/queue` and
//! `/history/{id}` on a fixed interval until it succeeds, fails, or the
//! timeout (counted from the moment the prompt starts running) expires.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use atelier_core::backend::{
    extension_of, BackendCapabilities, BackendError, EventCallback, GenerationBackend,
    GenerationEvent, GenerationOutput, GenerationRequest,
};

use crate::api::ComfyUIApi;
use crate::client::{ws_url_from_api, ComfyUIClient, ComfyUIConnection};
use crate::history::{self, HistoryOutcome};
use crate::messages::{parse_message, ComfyUIMessage};
use crate::progress::ProgressTracker;
use crate::workflow::WorkflowTemplate;

/// Default interval between queue/history polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default maximum running time of one prompt.
pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(600);

/// Extension assumed when the produced file has none.
const FALLBACK_EXTENSION: &str = "png";

#[derive(Debug, Clone)]
pub struct ComfyUIBackendConfig {
    /// Base HTTP URL, e.g. `http://127.0.0.1:8188`.
    pub api_url: String,
    /// WebSocket base URL; derived from `api_url` when `None`.
    pub ws_url: Option<String>,
    /// Directory holding `<workflow>.json` templates.
    pub workflow_dir: PathBuf,
    pub poll_interval: Duration,
    pub default_timeout: Duration,
}

impl ComfyUIBackendConfig {
    pub fn new(api_url: impl Into<String>, workflow_dir: impl Into<PathBuf>) -> Self {
        Self {
            api_url: api_url.into(),
            ws_url: None,
            workflow_dir: workflow_dir.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            default_timeout: DEFAULT_GENERATION_TIMEOUT,
        }
    }
}

pub struct ComfyUIBackend {
    api: ComfyUIApi,
    client: ComfyUIClient,
    workflow_dir: PathBuf,
    poll_interval: Duration,
    default_timeout: Duration,
}

/// Downloaded artifact bytes and their file extension.
type Artifact = (Vec<u8>, String);

impl ComfyUIBackend {
    pub fn new(config: ComfyUIBackendConfig) -> Self {
        let ws_url = config
            .ws_url
            .unwrap_or_else(|| ws_url_from_api(&config.api_url));
        Self {
            api: ComfyUIApi::new(config.api_url),
            client: ComfyUIClient::new(ws_url),
            workflow_dir: config.workflow_dir,
            poll_interval: config.poll_interval,
            default_timeout: config.default_timeout,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Follow a submitted prompt until it produces an artifact.
    async fn follow(
        &self,
        prompt_id: &str,
        output_node: &str,
        connection: &mut Option<ComfyUIConnection>,
        on_event: &EventCallback,
        max_wait: Duration,
    ) -> Result<Artifact, BackendError> {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut tracker = ProgressTracker::new();
        let mut running_since: Option<Instant> = None;
        let mut ws_open = connection.is_some();

        loop {
            let mut poll_now = false;
            tokio::select! {
                text = next_text(connection), if ws_open => match text {
                    Some(text) => {
                        poll_now = handle_ws_text(&text, prompt_id, &mut tracker, on_event);
                    }
                    None => {
                        ws_open = false;
                        tracing::debug!(prompt_id, "Subscription ended, continuing by polling");
                    }
                },
                _ = ticker.tick() => poll_now = true,
            }
            if !poll_now {
                continue;
            }

            if let Some(start) = running_since {
                if start.elapsed() >= max_wait {
                    tracing::warn!(prompt_id, ?max_wait, "Generation timed out");
                    return Err(BackendError::Timeout(max_wait));
                }
            }

            if let Some(artifact) = self
                .poll_once(prompt_id, output_node, &mut running_since, on_event)
                .await?
            {
                return Ok(artifact);
            }
        }
    }

    /// One queue + history check.
    async fn poll_once(
        &self,
        prompt_id: &str,
        output_node: &str,
        running_since: &mut Option<Instant>,
        on_event: &EventCallback,
    ) -> Result<Option<Artifact>, BackendError> {
        if running_since.is_none() {
            let queue = self.api.get_queue().await?;
            if history::is_running(&queue, prompt_id) {
                tracing::info!(prompt_id, "Prompt is running");
                *running_since = Some(Instant::now());
                on_event(GenerationEvent::Running);
            }
        }

        let body = self.api.get_history(prompt_id).await?;
        match history::parse_history(&body, prompt_id, output_node) {
            HistoryOutcome::Pending => Ok(None),
            HistoryOutcome::Failed(message) => {
                tracing::warn!(prompt_id, error = %message, "Prompt failed");
                Err(BackendError::Generation(message))
            }
            HistoryOutcome::Succeeded(None) => Err(BackendError::InvalidOutput(format!(
                "prompt {prompt_id} finished without output on node {output_node}"
            ))),
            HistoryOutcome::Succeeded(Some(file)) => {
                let bytes = self.api.view(&file).await?;
                if bytes.is_empty() {
                    return Err(BackendError::InvalidOutput(format!(
                        "'{}' is empty",
                        file.filename
                    )));
                }
                tracing::debug!(prompt_id, filename = %file.filename, size = bytes.len(), "Fetched artifact");
                Ok(Some((bytes, extension_of(&file.filename, FALLBACK_EXTENSION))))
            }
        }
    }
}

async fn next_text(connection: &mut Option<ComfyUIConnection>) -> Option<String> {
    match connection {
        Some(conn) => conn.next_text().await,
        None => None,
    }
}

/// Handle one WebSocket frame. Returns `true` when the frame hints that
/// the prompt has finished and history should be checked right away.
fn handle_ws_text(
    text: &str,
    prompt_id: &str,
    tracker: &mut ProgressTracker,
    on_event: &EventCallback,
) -> bool {
    let msg = match parse_message(text) {
        Ok(msg) => msg,
        Err(e) => {
            tracing::trace!(prompt_id, error = %e, "Ignoring unrecognized ComfyUI message");
            return false;
        }
    };
    if !msg.concerns(prompt_id) {
        return false;
    }
    match msg {
        ComfyUIMessage::Progress(data) => {
            if let Some(percent) = tracker.observe(data.value, data.max) {
                tracing::debug!(prompt_id, percent, "Generation progress");
                on_event(GenerationEvent::Progress(percent));
            }
            false
        }
        ComfyUIMessage::Executing(data) => data.node.is_none(),
        ComfyUIMessage::ExecutionSuccess(_) => true,
        ComfyUIMessage::ExecutionError(data) => {
            tracing::warn!(
                prompt_id,
                node_id = ?data.node_id,
                error_type = ?data.exception_type,
                error_message = %data.exception_message,
                "Execution error",
            );
            true
        }
        ComfyUIMessage::ExecutionStart(_) | ComfyUIMessage::Status(_) => false,
    }
}

#[async_trait]
impl GenerationBackend for ComfyUIBackend {
    fn name(&self) -> &'static str {
        "comfyui"
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            supports_progress: true,
        }
    }

    fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// ComfyUI is the fallback backend: any workflow name is accepted and
    /// a missing template surfaces as a template error.
    fn handles(&self, _workflow: &str) -> bool {
        true
    }

    async fn generate_and_wait(
        &self,
        request: &GenerationRequest,
        on_event: &EventCallback,
        max_wait: Duration,
    ) -> Result<GenerationOutput, BackendError> {
        let template = WorkflowTemplate::load(&self.workflow_dir, &request.workflow).await?;
        let document = template.materialize(&request.params)?;

        let client_id = uuid::Uuid::new_v4().to_string();
        let submitted = self.api.submit_workflow(&document, &client_id).await?;
        let prompt_id = submitted
            .prompt_id
            .filter(|id| !id.is_empty())
            .ok_or(BackendError::MissingField("prompt_id"))?;

        tracing::info!(
            job_id = %request.job_id,
            prompt_id = %prompt_id,
            queue_number = ?submitted.number,
            "Submitted workflow '{}'",
            request.workflow,
        );
        on_event(GenerationEvent::Started);
        on_event(GenerationEvent::Assigned(prompt_id.clone()));

        let mut connection = match self.client.connect(&client_id).await {
            Ok(conn) => Some(conn),
            Err(e) => {
                tracing::warn!(prompt_id = %prompt_id, error = %e, "Progress subscription unavailable");
                None
            }
        };

        let result = self
            .follow(
                &prompt_id,
                template.output_node(),
                &mut connection,
                on_event,
                max_wait,
            )
            .await;

        if let Some(conn) = connection {
            conn.close().await;
        }

        let (bytes, extension) = result?;
        on_event(GenerationEvent::Completed);

        Ok(GenerationOutput {
            bytes,
            correlation_id: prompt_id,
            extension,
        })
    }
}
