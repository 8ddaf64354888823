//! Bounded pool for CPU-heavy synchronous work.
//!
//! Image re-encoding and metadata extraction must not run on async worker
//! threads. [`BlockingPool`] caps how many such jobs run concurrently on
//! tokio's blocking thread pool.

use std::sync::Arc;

use tokio::sync::Semaphore;

/// Default number of concurrent blocking jobs.
pub const DEFAULT_BLOCKING_POOL_SIZE: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum BlockingError {
    #[error("Blocking pool is closed")]
    Closed,

    #[error("Blocking task panicked: {0}")]
    Panicked(String),
}

#[derive(Debug, Clone)]
pub struct BlockingPool {
    permits: Arc<Semaphore>,
}

impl BlockingPool {
    pub fn new(size: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(size.max(1))),
        }
    }

    /// Run `f` on the blocking thread pool once a permit is free.
    pub async fn run<F, T>(&self, f: F) -> Result<T, BlockingError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| BlockingError::Closed)?;

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            f()
        })
        .await
        .map_err(|e| BlockingError::Panicked(e.to_string()))
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Reject all further work. Running jobs finish normally.
    pub fn close(&self) {
        self.permits.close();
    }
}

impl Default for BlockingPool {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCKING_POOL_SIZE)
    }
}
