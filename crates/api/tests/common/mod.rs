#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use atelier_core::backend::{
    BackendCapabilities, BackendError, EventCallback, GenerationBackend, GenerationEvent,
    GenerationOutput, GenerationRequest,
};
use atelier_core::blocking::BlockingPool;
use atelier_core::job::{JobRecord, JobStatus};
use atelier_core::storage::StorageLayout;
use atelier_core::store::{JobStore, StoreError};
use atelier_core::types::JobId;
use atelier_events::NotificationHub;
use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use atelier_api::config::ServerConfig;
use atelier_api::engine::GenerationRunner;
use atelier_api::router::build_app_router;
use atelier_api::state::AppState;

// ---------------------------------------------------------------------------
// In-memory job store
// ---------------------------------------------------------------------------

/// `JobStore` double keyed by job id. Every `save` is recorded.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: Mutex<HashMap<JobId, JobRecord>>,
    saves: Mutex<Vec<JobStatus>>,
    fail_saves: bool,
}

impl MemoryJobStore {
    /// A store whose `save` always fails (inserts still work).
    pub fn failing_saves() -> Self {
        Self {
            fail_saves: true,
            ..Self::default()
        }
    }

    pub fn get(&self, id: JobId) -> Option<JobRecord> {
        self.jobs.lock().unwrap().get(&id).cloned()
    }

    /// Status of the job at each successful or attempted save, in order.
    pub fn saved_statuses(&self) -> Vec<JobStatus> {
        self.saves.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, job: &JobRecord) -> Result<(), StoreError> {
        let mut jobs = self.jobs.lock().unwrap();
        if jobs.contains_key(&job.id) {
            return Err(StoreError::Duplicate(job.id));
        }
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn save(&self, job: &JobRecord) -> Result<(), StoreError> {
        self.saves.lock().unwrap().push(job.status());
        if self.fail_saves {
            return Err(StoreError::Backend("connection refused".into()));
        }
        self.jobs.lock().unwrap().insert(job.id, job.clone());
        Ok(())
    }

    async fn find(&self, id: JobId) -> Result<Option<JobRecord>, StoreError> {
        Ok(self.get(id))
    }

    async fn find_by_correlation_id(
        &self,
        correlation_id: &str,
    ) -> Result<Option<JobRecord>, StoreError> {
        let jobs = self.jobs.lock().unwrap();
        Ok(jobs
            .values()
            .find(|j| j.correlation_id() == Some(correlation_id))
            .cloned())
    }

    async fn find_by_output_filename(
        &self,
        filename: &str,
    ) -> Result<Option<JobRecord>, StoreError> {
        let jobs = self.jobs.lock().unwrap();
        Ok(jobs
            .values()
            .find(|j| j.output_filename() == Some(filename))
            .cloned())
    }
}

// ---------------------------------------------------------------------------
// Scripted backend
// ---------------------------------------------------------------------------

/// What a [`ScriptedBackend`] run ends with.
#[derive(Clone)]
pub enum Script {
    /// Emit `Started`, `Assigned`, `Running`, the given progress values,
    /// then succeed.
    Succeed { progress: Vec<u8> },
    /// Emit `Started` and `Assigned`, then fail with a generation error.
    Fail(String),
}

pub struct ScriptedBackend {
    name: &'static str,
    workflows: Option<Vec<String>>,
    supports_progress: bool,
    script: Script,
    calls: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedBackend {
    /// Handles every workflow.
    pub fn catch_all(name: &'static str, script: Script) -> Self {
        Self {
            name,
            workflows: None,
            supports_progress: true,
            script,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Handles only the listed workflows and reports no progress.
    pub fn only(name: &'static str, workflows: &[&str], script: Script) -> Self {
        Self {
            name,
            workflows: Some(workflows.iter().map(|w| w.to_string()).collect()),
            supports_progress: false,
            script,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<GenerationRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        self.name
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            supports_progress: self.supports_progress,
        }
    }

    fn default_timeout(&self) -> Duration {
        Duration::from_secs(5)
    }

    fn handles(&self, workflow: &str) -> bool {
        self.workflows
            .as_ref()
            .map_or(true, |list| list.iter().any(|w| w == workflow))
    }

    async fn generate_and_wait(
        &self,
        request: &GenerationRequest,
        on_event: &EventCallback,
        _max_wait: Duration,
    ) -> Result<GenerationOutput, BackendError> {
        self.calls.lock().unwrap().push(request.clone());
        let correlation_id = format!("{}-{}", self.name, request.job_id);
        on_event(GenerationEvent::Started);
        if self.supports_progress {
            on_event(GenerationEvent::Assigned(correlation_id.clone()));
        }
        match &self.script {
            Script::Succeed { progress } => {
                if self.supports_progress {
                    on_event(GenerationEvent::Running);
                    for p in progress {
                        on_event(GenerationEvent::Progress(*p));
                    }
                }
                on_event(GenerationEvent::Completed);
                Ok(GenerationOutput {
                    bytes: tiny_png(8, 8),
                    correlation_id,
                    extension: "png".into(),
                })
            }
            Script::Fail(message) => Err(BackendError::Generation(message.clone())),
        }
    }
}

/// A solid-colour PNG of the given size.
pub fn tiny_png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 100, 50]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

// ---------------------------------------------------------------------------
// App construction
// ---------------------------------------------------------------------------

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config(storage_root: &std::path::Path) -> ServerConfig {
    let mut config = ServerConfig::from_lookup(|key| match key {
        "DATABASE_URL" => Some("postgres://unused/test".to_string()),
        _ => None,
    })
    .unwrap();
    config.host = "127.0.0.1".into();
    config.port = 0;
    config.storage_root = storage_root.to_path_buf();
    config
}

/// Everything a test needs to drive and inspect the service.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryJobStore>,
    pub hub: Arc<NotificationHub>,
    pub storage: TempDir,
}

/// Build the full application router around an in-memory store, a local
/// hub and the given backends (consulted in order).
pub fn build_test_app(backends: Vec<Arc<dyn GenerationBackend>>) -> TestApp {
    build_test_app_with(backends, |_| {})
}

/// Like [`build_test_app`], with a hook to adjust the configuration.
pub fn build_test_app_with(
    backends: Vec<Arc<dyn GenerationBackend>>,
    configure: impl FnOnce(&mut ServerConfig),
) -> TestApp {
    let storage = TempDir::new().unwrap();
    let mut config = test_config(storage.path());
    configure(&mut config);

    let store = Arc::new(MemoryJobStore::default());
    let hub = Arc::new(NotificationHub::new());
    let runner = build_runner(store.clone(), hub.clone(), storage.path(), backends);

    let state = AppState {
        config: Arc::new(config),
        store: store.clone(),
        hub: hub.clone(),
        runner: Arc::new(runner),
    };

    TestApp {
        router: build_app_router(state.clone()),
        state,
        store,
        hub,
        storage,
    }
}

pub fn build_runner(
    store: Arc<dyn JobStore>,
    hub: Arc<NotificationHub>,
    storage_root: &std::path::Path,
    backends: Vec<Arc<dyn GenerationBackend>>,
) -> GenerationRunner {
    backends.into_iter().fold(
        GenerationRunner::new(store, hub, StorageLayout::new(storage_root), BlockingPool::new(2)),
        |runner, backend| runner.with_backend(backend),
    )
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Poll the store until the job is terminal or two seconds pass.
pub async fn wait_for_terminal(store: &MemoryJobStore, id: JobId) -> JobRecord {
    for _ in 0..200 {
        if let Some(job) = store.get(id) {
            if job.status().is_terminal() {
                return job;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {id} did not reach a terminal state");
}
