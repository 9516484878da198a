//! # Utilities Module
//!
//! ## Role
//! Cross-cutting helpers that don't belong in domain-specific modules.
//!
//! ## Sub-modules
//! - `queue`: lock-free work-unit dispenser
//! - `telemetry`: atomic progress counters, termination flag, progress output
//! - `threading`: Rayon thread pool configuration
//! - `workspace`: per-thread model handles and slab staging buffer

pub mod queue;
pub mod telemetry;
pub mod threading;
pub mod workspace;
