//! Worker pool for partition-level parallelism
//!
//! One pool is constructed per materialization run and shared by the two
//! embarrassingly-parallel stages: the maximal partitioner's ordering search
//! and per-partition materialization. Tasks are independent by construction
//! (the no-overlap guarantee), so the pool carries no shared mutable state;
//! workers communicate results only through their return values.

use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

use crate::error::{RmlError, RmlResult};

/// A fixed-size worker pool
pub struct WorkerPool {
    inner: ThreadPool,
    workers: usize,
}

impl WorkerPool {
    /// Build a pool with the given number of workers.
    pub fn new(workers: usize) -> RmlResult<Self> {
        if workers == 0 {
            return Err(RmlError::Pool("worker count must be at least 1".into()));
        }
        let inner = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("rml-worker-{i}"))
            .build()
            .map_err(|e| RmlError::Pool(e.to_string()))?;
        debug!(workers, "worker pool ready");
        Ok(Self { inner, workers })
    }

    /// Number of workers in the pool.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run a closure inside the pool so `rayon` parallel iterators inside it
    /// are scheduled on this pool rather than the global one.
    pub fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        self.inner.install(op)
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers)
            .finish()
    }
}
