//! # Centralized Error Handling
//!
//! Unified error types for the entire crate using `thiserror`.

use thiserror::Error;

/// Main error type for grid-search operations
#[derive(Error, Debug)]
pub enum GridError {
    /// Configuration errors (mismatched range lengths, zero threads).
    /// Always raised before any worker is spawned.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A single work unit failed; the whole run is aborted
    #[error("Worker error at p_idx={p_idx}, c_idx={c_idx}: {message}")]
    Worker {
        p_idx: usize,
        c_idx: usize,
        message: String,
    },

    /// Likelihood model errors raised outside a work unit
    #[error("Model error: {message}")]
    Model { message: String },

    /// Invalid data errors (empty history, non-finite values, empty grids)
    #[error("Invalid data: {message}")]
    InvalidData { message: String },
}

/// Type alias for Results using GridError
pub type Result<T> = std::result::Result<T, GridError>;

impl GridError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a worker error for the unit at `(p_idx, c_idx)`
    pub fn worker(p_idx: usize, c_idx: usize, message: impl Into<String>) -> Self {
        Self::Worker {
            p_idx,
            c_idx,
            message: message.into(),
        }
    }

    /// Create a model error
    pub fn model(message: impl Into<String>) -> Self {
        Self::Model {
            message: message.into(),
        }
    }

    /// Create an invalid data error
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// True for errors that are detected before any thread is spawned
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }
}
