//! Bounded pool for blocking work.
//!
//! Jobs that would stall the async runtime (file reads, CPU-heavy hashing)
//! run on tokio's blocking threads, but never more than `max_workers` at a
//! time. The pool is created once at startup, handed to whoever needs it,
//! and shut down explicitly before exit.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::info;

use crate::config::WorkersConfig;
use crate::{AppError, Result};

/// Handle to the blocking worker pool. Clones share the same permits.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    max_workers: u32,
}

impl WorkerPool {
    /// Create a pool running at most `max_workers` jobs at once (minimum 1).
    #[must_use]
    pub fn new(max_workers: u32) -> Self {
        let max_workers = max_workers.max(1);
        let permits = usize::try_from(max_workers).unwrap_or(1);
        Self {
            permits: Arc::new(Semaphore::new(permits)),
            max_workers,
        }
    }

    /// Create a pool sized from configuration.
    #[must_use]
    pub fn from_config(config: &WorkersConfig) -> Self {
        Self::new(config.max_workers)
    }

    /// Maximum number of concurrent jobs.
    #[must_use]
    pub fn max_workers(&self) -> u32 {
        self.max_workers
    }

    /// Whether [`shutdown`](Self::shutdown) has completed.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.permits.is_closed()
    }

    /// Run `job` on a blocking thread once a worker slot is free.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Worker` if the pool is shut down or the job panics.
    pub async fn run<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| AppError::Worker("worker pool is shut down".into()))?;

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        })
        .await
        .map_err(|err| AppError::Worker(format!("blocking job failed: {err}")))
    }

    /// Read a whole file as UTF-8 on the pool.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the file cannot be read, or
    /// `AppError::Worker` if the pool is shut down.
    pub async fn read_file(&self, path: impl AsRef<Path>) -> Result<String> {
        let path = path.as_ref().to_path_buf();
        self.run(move || std::fs::read_to_string(path))
            .await?
            .map_err(AppError::from)
    }

    /// Wait for running jobs to finish, then refuse new ones.
    ///
    /// Calling this more than once is harmless.
    pub async fn shutdown(&self) {
        if let Ok(all) = self.permits.acquire_many(self.max_workers).await {
            self.permits.close();
            drop(all);
            info!(max_workers = self.max_workers, "worker pool shut down");
        }
    }
}
