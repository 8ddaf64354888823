//! Integration tests for `GenerationRunner` outside the HTTP layer.

mod common;

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use assert_matches::assert_matches;
use atelier_api::engine::RunError;
use async_trait::async_trait;
use atelier_core::backend::{
    BackendCapabilities, BackendError, EventCallback, GenerationBackend, GenerationEvent,
    GenerationOutput, GenerationRequest,
};
use atelier_core::job::{JobRecord, JobStatus, NewJob};
use atelier_core::params::parse;
use atelier_core::params::ParsedInput;
use atelier_core::store::{JobStore, StoreError};
use atelier_core::types::JobId;
use atelier_events::{NotificationHub, Outbound};
use common::{build_runner, tiny_png, MemoryJobStore, Script, ScriptedBackend};
use tempfile::TempDir;

fn new_job(text: &str) -> JobRecord {
    let ParsedInput::Generate(params) = parse(text, "flux").unwrap() else {
        panic!("expected a generation request");
    };
    JobRecord::new(NewJob {
        user_id: "u-1".into(),
        username: "ada".into(),
        prompt: text.to_string(),
        workflow: params.model().unwrap_or("flux").to_string(),
        parameters: params,
        private: false,
    })
}

// ---------------------------------------------------------------------------
// Test: every transition is persisted in order
// ---------------------------------------------------------------------------

#[tokio::test]
async fn successful_run_persists_each_transition() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryJobStore::default());
    let backend: Arc<dyn GenerationBackend> = Arc::new(ScriptedBackend::catch_all(
        "comfyui",
        Script::Succeed {
            progress: vec![10, 10, 60],
        },
    ));
    let runner = build_runner(
        store.clone(),
        Arc::new(NotificationHub::new()),
        dir.path(),
        vec![backend],
    );

    let job = new_job("a red kite");
    store.insert(&job).await.unwrap();
    let done = runner.run(job).await.unwrap();

    assert_eq!(done.status(), JobStatus::Completed);
    assert!(done.started_at().is_some());
    // correlation id, processing, progress 10 (repeat skipped), progress 60, completed
    assert_eq!(
        store.saved_statuses(),
        vec![
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Processing,
            JobStatus::Processing,
            JobStatus::Completed,
        ]
    );
    assert_eq!(store.get(done.id).unwrap(), done);
}

// ---------------------------------------------------------------------------
// Test: a backend without progress enters processing on Started
// ---------------------------------------------------------------------------

#[tokio::test]
async fn started_marks_processing_for_backends_without_progress() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryJobStore::default());
    let backend: Arc<dyn GenerationBackend> = Arc::new(ScriptedBackend::only(
        "direct",
        &["flux"],
        Script::Succeed { progress: vec![] },
    ));
    let runner = build_runner(
        store.clone(),
        Arc::new(NotificationHub::new()),
        dir.path(),
        vec![backend],
    );

    let done = runner.run(new_job("a teapot")).await.unwrap();

    assert!(done.started_at().is_some());
    assert_eq!(
        store.saved_statuses(),
        vec![JobStatus::Processing, JobStatus::Completed]
    );
}

// ---------------------------------------------------------------------------
// Test: backend failure marks the job failed and returns the error
// ---------------------------------------------------------------------------

#[tokio::test]
async fn backend_failure_marks_job_failed() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryJobStore::default());
    let hub = Arc::new(NotificationHub::new());
    let mut viewer = hub.subscribe("viewer".into()).await;
    let backend: Arc<dyn GenerationBackend> = Arc::new(ScriptedBackend::catch_all(
        "comfyui",
        Script::Fail("KSampler: CUDA out of memory".into()),
    ));
    let runner = build_runner(store.clone(), hub.clone(), dir.path(), vec![backend]);

    let job = new_job("a storm");
    let id = job.id;
    store.insert(&job).await.unwrap();

    let err = runner.run(job).await.unwrap_err();
    assert_matches!(err, RunError::Backend(BackendError::Generation(_)));

    let stored = store.get(id).unwrap();
    assert_eq!(stored.status(), JobStatus::Failed);
    assert!(stored
        .error_message()
        .unwrap()
        .contains("CUDA out of memory"));
    assert!(stored.completed_at().is_some());
    assert!(stored.output_filename().is_none());
    let correlation_id = format!("comfyui-{id}");
    assert_eq!(stored.correlation_id(), Some(correlation_id.as_str()));
    let found = store.find_by_correlation_id(&correlation_id).await.unwrap();
    assert_eq!(found.map(|job| job.id), Some(id));
    assert!(viewer.try_recv().is_err(), "failures are not announced");
}

#[tokio::test]
async fn unroutable_workflow_fails_without_calling_any_backend() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryJobStore::default());
    let direct = Arc::new(ScriptedBackend::only(
        "direct",
        &["sd35"],
        Script::Succeed { progress: vec![] },
    ));
    let runner = build_runner(
        store.clone(),
        Arc::new(NotificationHub::new()),
        dir.path(),
        vec![direct.clone() as Arc<dyn GenerationBackend>],
    );

    let err = runner.run(new_job("a boat")).await.unwrap_err();

    assert_matches!(err, RunError::NoBackend(ref w) if w == "flux");
    assert!(direct.calls().is_empty());
    assert_eq!(store.saved_statuses(), vec![JobStatus::Failed]);
}

// ---------------------------------------------------------------------------
// Test: persistence failures are warnings, never job failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn store_failures_do_not_fail_the_run() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryJobStore::failing_saves());
    let hub = Arc::new(NotificationHub::new());
    let mut viewer = hub.subscribe("viewer".into()).await;
    let backend: Arc<dyn GenerationBackend> = Arc::new(ScriptedBackend::catch_all(
        "comfyui",
        Script::Succeed {
            progress: vec![50],
        },
    ));
    let runner = build_runner(store.clone(), hub, dir.path(), vec![backend]);

    let done = runner.run(new_job("a lantern")).await.unwrap();

    assert_eq!(done.status(), JobStatus::Completed);
    assert_eq!(store.saved_statuses().last(), Some(&JobStatus::Completed));
    assert_matches!(viewer.recv().await, Some(Outbound::Text(_)));
}

// ---------------------------------------------------------------------------
// Test: shutdown waits for spawned runs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn shutdown_drains_spawned_runs() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryJobStore::default());
    let backend: Arc<dyn GenerationBackend> = Arc::new(ScriptedBackend::catch_all(
        "comfyui",
        Script::Succeed { progress: vec![] },
    ));
    let runner = Arc::new(build_runner(
        store.clone(),
        Arc::new(NotificationHub::new()),
        dir.path(),
        vec![backend],
    ));

    let job = new_job("a comet");
    let id = job.id;
    store.insert(&job).await.unwrap();
    runner.spawn(job);

    assert!(runner.shutdown(Duration::from_secs(5)).await);
    assert_eq!(runner.in_flight(), 0);
    assert_eq!(store.get(id).unwrap().status(), JobStatus::Completed);
}

// ---------------------------------------------------------------------------
// Test: a slow store does not stall the backend
// ---------------------------------------------------------------------------

/// Delegates to a [`MemoryJobStore`] after sleeping in every `save`.
struct SlowStore {
    inner: MemoryJobStore,
    delay: Duration,
}

#[async_trait]
impl JobStore for SlowStore {
    async fn insert(&self, job: &JobRecord) -> Result<(), StoreError> {
        self.inner.insert(job).await
    }

    async fn save(&self, job: &JobRecord) -> Result<(), StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.save(job).await
    }

    async fn find(&self, id: JobId) -> Result<Option<JobRecord>, StoreError> {
        self.inner.find(id).await
    }

    async fn find_by_correlation_id(
        &self,
        correlation_id: &str,
    ) -> Result<Option<JobRecord>, StoreError> {
        self.inner.find_by_correlation_id(correlation_id).await
    }

    async fn find_by_output_filename(
        &self,
        filename: &str,
    ) -> Result<Option<JobRecord>, StoreError> {
        self.inner.find_by_output_filename(filename).await
    }
}

/// Reports `Running`, then times one short poll-sized sleep.
#[derive(Default)]
struct TickingBackend {
    tick: Mutex<Option<Duration>>,
}

#[async_trait]
impl GenerationBackend for TickingBackend {
    fn name(&self) -> &'static str {
        "ticking"
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            supports_progress: true,
        }
    }

    fn default_timeout(&self) -> Duration {
        Duration::from_secs(5)
    }

    fn handles(&self, _workflow: &str) -> bool {
        true
    }

    async fn generate_and_wait(
        &self,
        request: &GenerationRequest,
        on_event: &EventCallback,
        _max_wait: Duration,
    ) -> Result<GenerationOutput, BackendError> {
        on_event(GenerationEvent::Started);
        on_event(GenerationEvent::Running);
        // Let the runner pick up `Running` and start saving.
        tokio::task::yield_now().await;

        let started = Instant::now();
        tokio::time::sleep(Duration::from_millis(10)).await;
        *self.tick.lock().unwrap() = Some(started.elapsed());

        on_event(GenerationEvent::Completed);
        Ok(GenerationOutput {
            bytes: tiny_png(4, 4),
            correlation_id: request.job_id.to_string(),
            extension: "png".into(),
        })
    }
}

#[tokio::test]
async fn slow_saves_do_not_delay_backend_polling() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(SlowStore {
        inner: MemoryJobStore::default(),
        delay: Duration::from_millis(500),
    });
    let backend = Arc::new(TickingBackend::default());
    let runner = build_runner(
        store.clone(),
        Arc::new(NotificationHub::new()),
        dir.path(),
        vec![backend.clone() as Arc<dyn GenerationBackend>],
    );

    let done = runner.run(new_job("a windmill")).await.unwrap();

    assert_eq!(done.status(), JobStatus::Completed);
    let tick = backend.tick.lock().unwrap().unwrap();
    assert!(
        tick < Duration::from_millis(250),
        "backend tick took {tick:?} while a save was in progress"
    );
    // Every transition still reached the store, in order.
    assert_eq!(
        store.inner.saved_statuses(),
        vec![JobStatus::Processing, JobStatus::Completed]
    );
}
