//! Batch execution over a fixed number of workers.
//!
//! With the `parallel` feature a [`WorkerPool`] with more than one worker
//! owns a dedicated rayon thread pool. Every batch returns its outputs in
//! input order and fails as a whole if any invocation fails.
//!
//! Pools nest: a task running on a worker may build its own sub-pool, which
//! lives exactly as long as that task. Use [`WorkerPool::compute_nested`] for
//! this.

use std::fmt;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::{BoxError, Result, SweepError};

pub struct WorkerPool {
    num_workers: usize,
    #[cfg(feature = "parallel")]
    pool: Option<rayon::ThreadPool>,
}

impl WorkerPool {
    /// Create a pool with `num_workers` workers (at least one).
    ///
    /// A single-worker pool runs every batch on the calling thread.
    pub fn new(num_workers: usize) -> Result<Self> {
        let num_workers = num_workers.max(1);

        #[cfg(feature = "parallel")]
        let pool = if num_workers > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(num_workers)
                .thread_name(|i| format!("paramsweep-worker-{i}"))
                .build()
                .map_err(|e| SweepError::PoolBuild(e.to_string()))?;
            tracing::debug!(num_workers, "built worker pool");
            Some(pool)
        } else {
            None
        };

        Ok(Self {
            num_workers,
            #[cfg(feature = "parallel")]
            pool,
        })
    }

    /// Pool that runs every batch on the calling thread
    #[must_use]
    pub fn sequential() -> Self {
        Self {
            num_workers: 1,
            #[cfg(feature = "parallel")]
            pool: None,
        }
    }

    #[must_use]
    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    /// True if batches run on worker threads rather than the caller
    #[must_use]
    pub fn is_parallel(&self) -> bool {
        #[cfg(feature = "parallel")]
        {
            self.pool.is_some()
        }
        #[cfg(not(feature = "parallel"))]
        {
            false
        }
    }

    /// Apply `f` to every input, returning outputs in input order.
    ///
    /// `f` receives the input position and the input. If any invocation
    /// fails the batch fails with [`SweepError::BatchExecution`] tagged with
    /// the failing position. When several invocations fail concurrently,
    /// which one is reported is unspecified.
    pub fn compute<I, O, F>(&self, inputs: &[I], f: F) -> Result<Vec<O>>
    where
        I: Sync,
        O: Send,
        F: Fn(usize, &I) -> std::result::Result<O, BoxError> + Sync,
    {
        let run = |(index, input): (usize, &I)| {
            f(index, input).map_err(|source| SweepError::BatchExecution { index, source })
        };

        #[cfg(feature = "parallel")]
        if let Some(pool) = &self.pool {
            return pool.install(|| {
                inputs
                    .par_iter()
                    .enumerate()
                    .map(run)
                    .collect::<Result<Vec<O>>>()
            });
        }

        inputs.iter().enumerate().map(run).collect()
    }

    /// Like [`WorkerPool::compute`], but every invocation gets its own
    /// sub-pool of `inner_workers` workers, dropped when the invocation ends.
    pub fn compute_nested<I, O, F>(&self, inputs: &[I], inner_workers: usize, f: F) -> Result<Vec<O>>
    where
        I: Sync,
        O: Send,
        F: Fn(&WorkerPool, usize, &I) -> std::result::Result<O, BoxError> + Sync,
    {
        self.compute(inputs, |index, input| {
            let sub_pool = WorkerPool::new(inner_workers)?;
            f(&sub_pool, index, input)
        })
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::sequential()
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("num_workers", &self.num_workers)
            .field("parallel", &self.is_parallel())
            .finish()
    }
}
