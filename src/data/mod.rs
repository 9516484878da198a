//! # Data Module
//!
//! In-memory representations of the search space and its outputs.
//!
//! ## Layout
//! - `range`: search axes (`ParameterRange`, `SearchRanges`, `GridShape`)
//! - `grid`: flat row-major output storage (`OutputGrid`, `BaseValueGrid`)
//! - `history`: the event sequence the likelihood is evaluated on

pub mod grid;
pub mod history;
pub mod range;

// Re-export commonly used types
pub use grid::{BaseValueGrid, GridCoord, OutputGrid};
pub use history::{Event, History};
pub use range::{GridShape, ParameterRange, RangeSpec, SearchRanges};
