//! # Model Module
//!
//! The likelihood model behind the grid search.
//!
//! ## Contents
//! - `fitter`: handle-factory traits the engine evaluates through
//! - `etas`: direct ETAS implementation of those traits
//! - `omori`: Omori-Utsu kernel, integral and average scale
//! - `parameters`: seed point and branch-ratio-preserving rescaling
//! - `reducer`: argmax, marginals and best fit over a finished grid

pub mod etas;
pub mod fitter;
pub mod omori;
pub mod parameters;
pub mod reducer;

pub use etas::{EtasFitter, FitterOptions};
pub use fitter::{Fitter, ProductivityEvaluator};
pub use parameters::SeedParams;
pub use reducer::{best_fit, find_max, marginal, Axis, BestFit, MarginalPolicy};
