//! # ETAS Grid Library Root
//!
//! ## Role
//! The crate root that declares all public modules and re-exports common types.
//!
//! ## Module Structure
//! ```text
//! etas_grid
//! ├── data        # Ranges, output grids, event history
//! ├── io          # Catalog file reading
//! ├── model       # Fitter traits, ETAS likelihood, grid reduction
//! ├── pipelines   # Grid search orchestration and workers
//! └── utils       # Work queue, threading, per-thread scratch, telemetry
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod io;
pub mod model;
pub mod pipelines;
pub mod utils;

pub use data::{BaseValueGrid, GridCoord, OutputGrid, ParameterRange, SearchRanges};
pub use error::{GridError, Result};
pub use model::{EtasFitter, Fitter, FitterOptions, ProductivityEvaluator, SeedParams};
pub use pipelines::{GridSearch, SearchOptions, SearchOutcome, SearchResult};
