//! Bounded worker pool for parallel evaluation

use crate::error::{EvalError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

/// Parallel evaluation settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parallelism {
    /// Maximum number of expressions evaluated at once
    pub workers: usize,

    /// Maximum number of children dispatched at once per parent
    pub batch_size: usize,
}

impl Parallelism {
    /// Create settings; zero values are raised to one
    pub fn new(workers: usize, batch_size: usize) -> Self {
        Self {
            workers: workers.max(1),
            batch_size: batch_size.max(1),
        }
    }
}

impl Default for Parallelism {
    fn default() -> Self {
        let workers = std::thread::available_parallelism().map_or(4, usize::from);
        Self::new(workers, 64)
    }
}

/// Gates expression evaluation across every level of one parallel walk
///
/// A permit is held only while a node's own expression runs, never while
/// the node waits for its children.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    workers: usize,
    batch_size: usize,
}

impl WorkerPool {
    pub fn new(parallelism: Parallelism) -> Self {
        let parallelism = Parallelism::new(parallelism.workers, parallelism.batch_size);
        Self {
            permits: Arc::new(Semaphore::new(parallelism.workers)),
            workers: parallelism.workers,
            batch_size: parallelism.batch_size,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Permits not currently held
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Wait for a permit, giving up when `cancel` fires
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<OwnedSemaphorePermit> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(EvalError::Cancelled),
            permit = Arc::clone(&self.permits).acquire_owned() => {
                permit.map_err(|e| EvalError::WorkerFailure(e.to_string()))
            }
        }
    }
}
