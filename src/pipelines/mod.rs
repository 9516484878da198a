//! # Pipeline Module
//!
//! Orchestration of the parallel grid search. `grid_search` owns the run
//! (queue, pool, monitor loop, outcome); `worker` is the per-thread loop.

pub mod grid_search;
mod worker;

pub use grid_search::{GridSearch, RunReport, RunStats, SearchOptions, SearchOutcome, SearchResult};
