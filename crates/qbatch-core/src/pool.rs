//! Bounded worker pool for experiment units.
//!
//! Every unit of work runs as an independent task; at most `size` of them
//! execute at once. How a unit is driven depends on the [`PoolKind`],
//! which is picked once per process by [`PoolKind::detect`]:
//!
//! | Kind | Unit runs on |
//! |------|--------------|
//! | `Tasks` | the runtime's worker threads, as an ordinary task |
//! | `Threads` | a dedicated blocking thread that drives the unit to completion |
//!
//! The choice does not affect results, only where the work is scheduled.

use std::future::Future;
use std::sync::{Arc, OnceLock};

use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::debug;

/// Default number of units executing concurrently.
pub const DEFAULT_WORKERS: usize = 2;

/// Environment variable overriding the global pool size.
pub const WORKERS_ENV: &str = "QBATCH_WORKERS";

/// How units are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolKind {
    /// Units run as tasks on the runtime's worker threads.
    Tasks,
    /// Units run on dedicated blocking threads.
    Threads,
}

impl PoolKind {
    /// Pick the scheduling strategy for this platform.
    pub fn detect() -> Self {
        if cfg!(any(target_os = "macos", target_os = "windows")) {
            PoolKind::Threads
        } else {
            PoolKind::Tasks
        }
    }
}

/// A bounded pool that executes units of work.
#[derive(Debug)]
pub struct WorkerPool {
    size: usize,
    kind: PoolKind,
    permits: Arc<Semaphore>,
}

impl WorkerPool {
    /// Create a pool with `size` workers and the platform's [`PoolKind`].
    pub fn new(size: usize) -> Self {
        Self::with_kind(size, PoolKind::detect())
    }

    /// Create a pool with an explicit scheduling strategy.
    ///
    /// A `size` of zero is treated as one.
    pub fn with_kind(size: usize, kind: PoolKind) -> Self {
        let size = size.max(1);
        Self {
            size,
            kind,
            permits: Arc::new(Semaphore::new(size)),
        }
    }

    /// The process-wide pool, created on first use.
    ///
    /// Sized from `QBATCH_WORKERS` when set to a positive integer,
    /// otherwise [`DEFAULT_WORKERS`].
    pub fn global() -> Arc<WorkerPool> {
        static GLOBAL: OnceLock<Arc<WorkerPool>> = OnceLock::new();
        GLOBAL
            .get_or_init(|| {
                let size = std::env::var(WORKERS_ENV)
                    .ok()
                    .and_then(|v| v.parse::<usize>().ok())
                    .filter(|n| *n > 0)
                    .unwrap_or(DEFAULT_WORKERS);
                let pool = WorkerPool::new(size);
                debug!(size = pool.size, kind = ?pool.kind, "Created global worker pool");
                Arc::new(pool)
            })
            .clone()
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn kind(&self) -> PoolKind {
        self.kind
    }

    /// Number of workers currently idle.
    pub fn idle(&self) -> usize {
        self.permits.available_permits()
    }

    /// Schedule `work` on `runtime`.
    ///
    /// `work` is not polled until a worker slot is free. If the returned
    /// task is dropped or aborted before that, `work` is dropped unpolled.
    pub(crate) fn spawn<F>(&self, runtime: &Handle, work: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        let task = async move {
            // The semaphore is never closed.
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            work.await;
        };

        match self.kind {
            PoolKind::Tasks => runtime.spawn(task),
            PoolKind::Threads => {
                let driver = runtime.clone();
                runtime.spawn_blocking(move || driver.block_on(task))
            }
        }
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS)
    }
}
