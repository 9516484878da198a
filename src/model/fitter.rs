//! # Likelihood Model Interface
//!
//! The grid-search engine treats the statistical model as opaque. A
//! [`Fitter`] is built once per run and hands out handles:
//!
//! | Handle           | Built from                | Lifetime                  |
//! |------------------|---------------------------|---------------------------|
//! | `MagExponent`    | `(b, alpha)`              | once per run, shared `&`  |
//! | `OmoriMatrix`    | `(p, c)`                  | per work unit, one thread |
//! | `PairMagOmori`   | `(mexp, omat)`            | per work unit, one thread |
//! | `Productivity`   | `(pmom, scale)`           | per work unit, one thread |
//!
//! Handles release their resources in `Drop`, so a worker that unwinds or
//! returns early still frees everything it acquired.

use crate::error::Result;

/// Evaluates the log-likelihood for one `(a, ams)` productivity pair
pub trait ProductivityEvaluator {
    /// `ten_a_q` and `ten_ams_q` are `10^a` and `10^ams`; `mu` is an optional
    /// fixed background rate.
    fn log_likelihood(&self, ten_a_q: f64, ten_ams_q: f64, mu: Option<f64>) -> Result<f64>;
}

/// Factory for the per-run and per-unit model handles
pub trait Fitter: Sync {
    /// Shared across all workers; must not be mutated after construction
    type MagExponent: Sync;
    type OmoriMatrix;
    type PairMagOmori;
    type Productivity: ProductivityEvaluator;

    fn mag_exponent(&self, b: f64, alpha: f64) -> Result<Self::MagExponent>;

    fn omori_matrix(&self, p: f64, c: f64) -> Result<Self::OmoriMatrix>;

    fn pair_mag_omori(
        &self,
        mexp: &Self::MagExponent,
        omat: &Self::OmoriMatrix,
    ) -> Result<Self::PairMagOmori>;

    fn avalue_productivity(
        &self,
        pmom: &Self::PairMagOmori,
        scale: f64,
    ) -> Result<Self::Productivity>;
}
