//! Orchestration of a single generation job.
//!
//! One run owns one [`JobRecord`]. Backend events arrive through an
//! unbounded channel and are applied by a consumer joined with the backend
//! future, so a slow store never stalls the backend's polling loop. Every
//! persistence failure is a warning: the in-memory record stays
//! authoritative for the rest of the run.

use std::sync::Arc;
use std::time::Duration;

use atelier_core::backend::{
    BackendError, GenerationBackend, GenerationEvent, GenerationOutput, GenerationRequest,
};
use atelier_core::blocking::BlockingPool;
use atelier_core::job::{JobRecord, JobStateError};
use atelier_core::storage::{artifact_filename, StorageLayout};
use atelier_core::store::JobStore;
use atelier_events::NotificationHub;
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;

use crate::engine::metadata::extract_metadata;

/// Why a run ended in `failed`.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("No backend can run workflow '{0}'")]
    NoBackend(String),

    #[error("Stored parameters are unreadable: {0}")]
    Parameters(#[from] serde_json::Error),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Failed to store artifact: {0}")]
    Storage(#[from] std::io::Error),

    #[error(transparent)]
    State(#[from] JobStateError),
}

pub struct GenerationRunner {
    store: Arc<dyn JobStore>,
    hub: Arc<NotificationHub>,
    storage: StorageLayout,
    pool: BlockingPool,
    /// Consulted in order; the first backend that handles the workflow wins.
    backends: Vec<Arc<dyn GenerationBackend>>,
    tracker: TaskTracker,
}

impl GenerationRunner {
    pub fn new(
        store: Arc<dyn JobStore>,
        hub: Arc<NotificationHub>,
        storage: StorageLayout,
        pool: BlockingPool,
    ) -> Self {
        Self {
            store,
            hub,
            storage,
            pool,
            backends: Vec::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Append a backend. Register specific backends before catch-all ones.
    pub fn with_backend(mut self, backend: Arc<dyn GenerationBackend>) -> Self {
        self.backends.push(backend);
        self
    }

    /// The backend responsible for `workflow`.
    pub fn select_backend(&self, workflow: &str) -> Option<Arc<dyn GenerationBackend>> {
        self.backends
            .iter()
            .find(|b| b.handles(workflow))
            .cloned()
    }

    /// Run `job` on the tracked task set.
    pub fn spawn(self: &Arc<Self>, job: JobRecord) {
        let runner = Arc::clone(self);
        self.tracker.spawn(async move {
            // Failures are already recorded on the job and logged.
            let _ = runner.run(job).await;
        });
    }

    /// Number of runs still in flight.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Stop accepting runs and wait up to `timeout` for in-flight ones.
    ///
    /// Returns `false` if runs were still active when the timeout expired.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.tracker.close();
        tokio::time::timeout(timeout, self.tracker.wait())
            .await
            .is_ok()
    }

    /// Drive `job` to a terminal state and return the final record.
    pub async fn run(&self, mut job: JobRecord) -> Result<JobRecord, RunError> {
        let job_id = job.id;
        tracing::info!(job_id = %job_id, workflow = %job.workflow, "Generation run started");

        match self.execute(&mut job).await {
            Ok(()) => {
                tracing::info!(
                    job_id = %job_id,
                    output = job.output_filename().unwrap_or_default(),
                    "Generation run completed",
                );
                Ok(job)
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Generation run failed");
                match job.mark_failed(&e.to_string()) {
                    Ok(()) => self.persist(&job).await,
                    Err(state) => {
                        tracing::warn!(job_id = %job_id, error = %state, "Job already terminal")
                    }
                }
                Err(e)
            }
        }
    }

    async fn execute(&self, job: &mut JobRecord) -> Result<(), RunError> {
        let backend = self
            .select_backend(&job.workflow)
            .ok_or_else(|| RunError::NoBackend(job.workflow.clone()))?;
        let request = GenerationRequest {
            job_id: job.id,
            workflow: job.workflow.clone(),
            params: job.parameter_set()?,
        };
        tracing::debug!(job_id = %job.id, backend = backend.name(), "Backend selected");

        let output = self.drive(job, backend.as_ref(), &request).await?;
        self.finish(job, output).await
    }

    /// Poll the backend while applying its events to `job`.
    ///
    /// The backend and the event consumer are joined rather than selected,
    /// so a slow save never delays the backend's next poll.
    async fn drive(
        &self,
        job: &mut JobRecord,
        backend: &dyn GenerationBackend,
        request: &GenerationRequest,
    ) -> Result<GenerationOutput, BackendError> {
        let supports_progress = backend.capabilities().supports_progress;
        let (tx, mut rx) = mpsc::unbounded_channel::<GenerationEvent>();

        // Owns the sender; the channel closes when the backend returns.
        let generation = async move {
            let on_event = move |event: GenerationEvent| {
                let _ = tx.send(event);
            };
            backend.generate(request, &on_event).await
        };
        let consume = async {
            while let Some(event) = rx.recv().await {
                self.apply_event(job, event, supports_progress).await;
            }
        };

        let (result, ()) = tokio::join!(generation, consume);
        result
    }

    async fn apply_event(&self, job: &mut JobRecord, event: GenerationEvent, supports_progress: bool) {
        let changed = match event {
            // Progress-capable backends report `Running` once work begins.
            GenerationEvent::Started => !supports_progress && job.mark_processing(),
            GenerationEvent::Assigned(correlation_id) => {
                let fresh = job.correlation_id().is_none();
                match job.set_correlation_id(&correlation_id) {
                    Ok(()) => fresh,
                    Err(e) => {
                        tracing::warn!(job_id = %job.id, error = %e, "Ignoring correlation id");
                        false
                    }
                }
            }
            GenerationEvent::Running => job.mark_processing(),
            GenerationEvent::Progress(percent) => {
                tracing::trace!(job_id = %job.id, percent, "Progress");
                percent != job.progress_percent() && job.record_progress(percent)
            }
            GenerationEvent::Completed => false,
        };
        if changed {
            self.persist(job).await;
        }
    }

    /// Store the artifact, record metadata, complete and announce.
    async fn finish(&self, job: &mut JobRecord, output: GenerationOutput) -> Result<(), RunError> {
        let completed_at = chrono::Utc::now();
        let filename = artifact_filename(job.id, &output.extension);
        let relative = self
            .storage
            .write_artifact(&filename, completed_at, &output.bytes)
            .await?;

        let bytes = output.bytes;
        match self.pool.run(move || extract_metadata(&bytes)).await {
            Ok(metadata) => job.metadata = Some(metadata),
            Err(e) => tracing::warn!(job_id = %job.id, error = %e, "Metadata extraction failed"),
        }

        job.mark_completed_at(&filename, Some(&output.correlation_id), completed_at)?;
        self.persist(job).await;

        if let Err(e) = self.hub.notify_new_artifact(&relative, Some(job.summary())).await {
            tracing::warn!(job_id = %job.id, error = %e, "Failed to announce new artifact");
        }
        Ok(())
    }

    async fn persist(&self, job: &JobRecord) {
        if let Err(e) = self.store.save(job).await {
            tracing::warn!(
                job_id = %job.id,
                status = %job.status(),
                error = %e,
                "Failed to persist job state",
            );
        }
    }
}
