//! # Seed Parameters
//!
//! Reference point of the search. The grid axes are offsets from these
//! values; see [`crate::data::range`] for the mapping.
//!
//! ### Branch-ratio-preserving rescaling
//! Moving the Omori parameters from `(p0, c0)` to `(p, c)` changes the
//! expected number of direct aftershocks. The productivity base is shifted
//! so that count stays fixed:
//!
//! ```text
//! a_base(p, c) = a0 + log10( S(p0, c0) / S(p, c) )
//! S(p, c)      = mean of (t + c)^-p over [tbegin, tend]
//! ```

use crate::error::{GridError, Result};
use crate::model::omori::average_omori_scale;

/// Seed values and fixed model constants for one search
#[derive(Debug, Clone, PartialEq)]
pub struct SeedParams {
    /// Reference Omori exponent
    pub p0: f64,
    /// Reference Omori time offset (days, > 0)
    pub c0: f64,
    /// Reference productivity (log10)
    pub a0: f64,
    /// Gutenberg-Richter b-value
    pub b: f64,
    /// Productivity magnitude exponent
    pub alpha: f64,
    /// Start of the fitting interval (days)
    pub tbegin: f64,
    /// End of the fitting interval (days)
    pub tend: f64,
    /// Multiplier applied to productivity inside the likelihood
    pub mag_scale: f64,
    /// Optional fixed background rate (events/day)
    pub mu: Option<f64>,
}

impl SeedParams {
    /// Create seed parameters with `b = alpha = 1`, unit scale and no background
    pub fn new(p0: f64, c0: f64, a0: f64, tbegin: f64, tend: f64) -> Self {
        Self {
            p0,
            c0,
            a0,
            b: 1.0,
            alpha: 1.0,
            tbegin,
            tend,
            mag_scale: 1.0,
            mu: None,
        }
    }

    pub fn with_b_alpha(mut self, b: f64, alpha: f64) -> Self {
        self.b = b;
        self.alpha = alpha;
        self
    }

    pub fn with_background(mut self, mu: f64) -> Self {
        self.mu = Some(mu);
        self
    }

    pub fn with_mag_scale(mut self, mag_scale: f64) -> Self {
        self.mag_scale = mag_scale;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let finite = [
            ("p0", self.p0),
            ("c0", self.c0),
            ("a0", self.a0),
            ("b", self.b),
            ("alpha", self.alpha),
            ("tbegin", self.tbegin),
            ("tend", self.tend),
            ("mag_scale", self.mag_scale),
        ];
        if let Some((name, v)) = finite.iter().find(|(_, v)| !v.is_finite()) {
            return Err(GridError::config(format!("{} must be finite, got {}", name, v)));
        }
        if self.c0 <= 0.0 {
            return Err(GridError::config(format!("c0 must be positive, got {}", self.c0)));
        }
        if self.tend <= self.tbegin {
            return Err(GridError::config(format!(
                "tend ({}) must be greater than tbegin ({})",
                self.tend, self.tbegin
            )));
        }
        if let Some(mu) = self.mu {
            if !mu.is_finite() || mu < 0.0 {
                return Err(GridError::config(format!(
                    "background rate must be finite and non-negative, got {}",
                    mu
                )));
            }
        }
        Ok(())
    }

    /// Trial `p` for an additive offset
    #[inline]
    pub fn p_at(&self, offset: f64) -> f64 {
        self.p0 + offset
    }

    /// Trial `c` for a log10 multiplier
    #[inline]
    pub fn c_at(&self, log_mult: f64) -> f64 {
        self.c0 * 10f64.powf(log_mult)
    }

    /// `S(p0, c0)` over the fitting interval
    pub fn reference_scale(&self) -> f64 {
        average_omori_scale(self.p0, self.c0, self.tbegin, self.tend)
    }

    /// Productivity base that keeps the branch ratio of `(p0, c0, a0)` at `(p, c)`
    pub fn rescaled_a(&self, p: f64, c: f64) -> f64 {
        self.rescaled_a_from(self.reference_scale(), p, c)
    }

    /// Same as [`rescaled_a`](Self::rescaled_a) with `S(p0, c0)` precomputed
    #[inline]
    pub fn rescaled_a_from(&self, reference_scale: f64, p: f64, c: f64) -> f64 {
        let trial = average_omori_scale(p, c, self.tbegin, self.tend);
        self.a0 + (reference_scale / trial).log10()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rescaled_a_identity_at_seed() {
        let seed = SeedParams::new(1.08, 0.01, -2.0, 0.0, 30.0);
        assert_relative_eq!(seed.rescaled_a(1.08, 0.01), -2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rescaled_a_preserves_expected_count() {
        let seed = SeedParams::new(1.1, 0.02, -1.5, 0.0, 10.0);
        let (p, c) = (0.9, 0.5);
        let a = seed.rescaled_a(p, c);
        let before = 10f64.powf(seed.a0) * average_omori_scale(seed.p0, seed.c0, 0.0, 10.0);
        let after = 10f64.powf(a) * average_omori_scale(p, c, 0.0, 10.0);
        assert_relative_eq!(before, after, max_relative = 1e-10);
    }

    #[test]
    fn test_validate() {
        assert!(SeedParams::new(1.0, 0.01, -2.0, 0.0, 10.0).validate().is_ok());
        assert!(SeedParams::new(1.0, 0.0, -2.0, 0.0, 10.0).validate().is_err());
        assert!(SeedParams::new(1.0, 0.01, -2.0, 5.0, 5.0).validate().is_err());
        assert!(SeedParams::new(1.0, 0.01, -2.0, 0.0, 10.0)
            .with_background(-1.0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_axis_mapping() {
        let seed = SeedParams::new(1.0, 0.01, -2.0, 0.0, 10.0);
        assert_relative_eq!(seed.p_at(0.25), 1.25);
        assert_relative_eq!(seed.c_at(1.0), 0.1, epsilon = 1e-15);
    }
}
