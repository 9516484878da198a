//! # Threading Configuration
//!
//! Builds the dedicated rayon pool a grid search runs on. Each search owns
//! its pool, so the worker count is exactly what the caller asked for and
//! never shared with unrelated rayon work in the process.

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{GridError, Result};

/// Worker count used when the caller does not pick one
pub fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Resolve the optional thread count, rejecting zero
pub fn resolve_threads(requested: Option<usize>) -> Result<usize> {
    match requested {
        Some(0) => Err(GridError::config("thread count must be at least 1")),
        Some(n) => Ok(n),
        None => Ok(default_threads()),
    }
}

/// Create a configured thread pool.
pub fn build_thread_pool(n_threads: usize) -> Result<ThreadPool> {
    ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .thread_name(|i| format!("etas-grid-worker-{}", i))
        .build()
        .map_err(|e| GridError::config(format!("failed to create thread pool: {}", e)))
}
