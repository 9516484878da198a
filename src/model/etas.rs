//! # ETAS Likelihood Fitter
//!
//! A direct `O(targets × sources)` implementation of [`Fitter`] for a single
//! aftershock sequence. Each source event `i` triggers targets at rate
//!
//! ```text
//! k_i * (t - t_i + c)^-p,   k_i = 10^q * 10^(alpha (m_i - mref) - b (mc - mref))
//! ```
//!
//! where `q = ams` for the mainshock and `q = a` for every other source.
//! With background rate `mu` and productivity scale `s` the log-likelihood is
//!
//! ```text
//! LL = Σ_j ln(mu + s (10^a A_j + 10^ams M_j)) - (mu T + s (10^a IA + 10^ams IM))
//! ```
//!
//! `A_j`/`M_j` are the magnitude-weighted kernel sums at target `j` from
//! ordinary sources and the mainshock, `IA`/`IM` the matching integrals over
//! the fitting window.

use crate::data::history::History;
use crate::error::{GridError, Result};
use crate::model::fitter::{Fitter, ProductivityEvaluator};
use crate::model::omori::{omori_integral, omori_kernel};

/// Magnitude cutoffs, fitting window and model switches
#[derive(Debug, Clone, PartialEq)]
pub struct FitterOptions {
    /// Reference magnitude for productivity
    pub mref: f64,
    /// Magnitude of completeness; smaller events are ignored
    pub mc: f64,
    /// Fitting window start (days)
    pub tbegin: f64,
    /// Fitting window end (days)
    pub tend: f64,
    /// Whether events before `tbegin` (other than the mainshock) trigger targets
    pub sources_before_window: bool,
    /// Whether the background rate passed to `log_likelihood` is used
    pub background: bool,
}

impl Default for FitterOptions {
    fn default() -> Self {
        Self {
            mref: 3.0,
            mc: 3.0,
            tbegin: 0.0,
            tend: 1.0,
            sources_before_window: true,
            background: false,
        }
    }
}

/// ETAS fitter over a fixed history
#[derive(Debug, Clone)]
pub struct EtasFitter {
    /// (time, mag) of each source event
    sources: Vec<(f64, f64)>,
    /// Column of the mainshock in `sources`, if it is a source
    main_col: Option<usize>,
    /// Times of target events
    targets: Vec<f64>,
    options: FitterOptions,
}

impl EtasFitter {
    pub fn new(history: &History, options: FitterOptions) -> Result<Self> {
        if options.tend.is_nan() || options.tbegin.is_nan() || options.tend <= options.tbegin {
            return Err(GridError::config(format!(
                "fitting window is empty: [{}, {}]",
                options.tbegin, options.tend
            )));
        }

        let main_idx = history.mainshock_index();
        let mut sources = Vec::new();
        let mut main_col = None;
        let mut targets = Vec::new();

        for (i, e) in history.events().iter().enumerate() {
            let is_main = i == main_idx;
            if e.mag < options.mc && !is_main {
                continue;
            }
            let is_source = e.time < options.tend
                && (is_main || options.sources_before_window || e.time >= options.tbegin);
            if is_source {
                if is_main {
                    main_col = Some(sources.len());
                }
                sources.push((e.time, e.mag));
            }
            if !is_main && e.time >= options.tbegin && e.time <= options.tend {
                targets.push(e.time);
            }
        }

        tracing::debug!(
            n_sources = sources.len(),
            n_targets = targets.len(),
            has_mainshock = main_col.is_some(),
            "built ETAS fitter"
        );

        Ok(Self {
            sources,
            main_col,
            targets,
            options,
        })
    }

    pub fn n_sources(&self) -> usize {
        self.sources.len()
    }

    pub fn n_targets(&self) -> usize {
        self.targets.len()
    }

    pub fn options(&self) -> &FitterOptions {
        &self.options
    }
}

/// Per-source magnitude weights
#[derive(Debug, Clone)]
pub struct MagExponent {
    weights: Vec<f64>,
}

/// Omori kernels `(t_j - t_i + c)^-p`, row per target, and per-source integrals
#[derive(Debug, Clone)]
pub struct OmoriMatrix {
    kernel: Vec<f64>,
    integral: Vec<f64>,
}

/// Kernel sums split into mainshock and ordinary contributions
#[derive(Debug, Clone)]
pub struct PairMagOmori {
    other: Vec<f64>,
    main: Vec<f64>,
    other_integral: f64,
    main_integral: f64,
}

/// Productivity-scaled kernel sums, ready for repeated evaluation
#[derive(Debug, Clone)]
pub struct AValueProductivity {
    pair: PairMagOmori,
    scale: f64,
    duration: f64,
    background: bool,
}

impl Fitter for EtasFitter {
    type MagExponent = MagExponent;
    type OmoriMatrix = OmoriMatrix;
    type PairMagOmori = PairMagOmori;
    type Productivity = AValueProductivity;

    fn mag_exponent(&self, b: f64, alpha: f64) -> Result<MagExponent> {
        if !b.is_finite() || !alpha.is_finite() {
            return Err(GridError::model(format!(
                "non-finite magnitude exponent (b={}, alpha={})",
                b, alpha
            )));
        }
        let FitterOptions { mref, mc, .. } = self.options;
        let weights = self
            .sources
            .iter()
            .map(|&(_, m)| 10f64.powf(alpha * (m - mref) - b * (mc - mref)))
            .collect();
        Ok(MagExponent { weights })
    }

    fn omori_matrix(&self, p: f64, c: f64) -> Result<OmoriMatrix> {
        if c.is_nan() || c <= 0.0 || !p.is_finite() {
            return Err(GridError::model(format!(
                "invalid Omori parameters (p={}, c={})",
                p, c
            )));
        }
        let n_src = self.sources.len();
        let mut kernel = vec![0.0; self.targets.len() * n_src];
        for (row, &tj) in kernel.chunks_mut(n_src.max(1)).zip(self.targets.iter()) {
            for (k, &(ti, _)) in row.iter_mut().zip(self.sources.iter()) {
                if ti < tj {
                    *k = omori_kernel(p, c, tj - ti);
                }
            }
        }
        let integral = self
            .sources
            .iter()
            .map(|&(ti, _)| {
                let lo = (self.options.tbegin - ti).max(0.0);
                omori_integral(p, c, lo, self.options.tend - ti)
            })
            .collect();
        Ok(OmoriMatrix { kernel, integral })
    }

    fn pair_mag_omori(&self, mexp: &MagExponent, omat: &OmoriMatrix) -> Result<PairMagOmori> {
        let n_src = self.sources.len();
        let n_tgt = self.targets.len();
        if mexp.weights.len() != n_src
            || omat.integral.len() != n_src
            || omat.kernel.len() != n_tgt * n_src
        {
            return Err(GridError::model("handle dimensions do not match this fitter"));
        }

        let mut other = Vec::with_capacity(n_tgt);
        let mut main = Vec::with_capacity(n_tgt);
        for j in 0..n_tgt {
            let row = &omat.kernel[j * n_src..(j + 1) * n_src];
            let mut o = 0.0;
            let mut m = 0.0;
            for (col, (&k, &w)) in row.iter().zip(mexp.weights.iter()).enumerate() {
                if Some(col) == self.main_col {
                    m += w * k;
                } else {
                    o += w * k;
                }
            }
            other.push(o);
            main.push(m);
        }

        let mut other_integral = 0.0;
        let mut main_integral = 0.0;
        for (col, (&i, &w)) in omat.integral.iter().zip(mexp.weights.iter()).enumerate() {
            if Some(col) == self.main_col {
                main_integral += w * i;
            } else {
                other_integral += w * i;
            }
        }

        Ok(PairMagOmori {
            other,
            main,
            other_integral,
            main_integral,
        })
    }

    fn avalue_productivity(&self, pmom: &PairMagOmori, scale: f64) -> Result<AValueProductivity> {
        if !scale.is_finite() || scale < 0.0 {
            return Err(GridError::model(format!("invalid productivity scale {}", scale)));
        }
        Ok(AValueProductivity {
            pair: pmom.clone(),
            scale,
            duration: self.options.tend - self.options.tbegin,
            background: self.options.background,
        })
    }
}

impl ProductivityEvaluator for AValueProductivity {
    fn log_likelihood(&self, ten_a_q: f64, ten_ams_q: f64, mu: Option<f64>) -> Result<f64> {
        let mu = if self.background { mu.unwrap_or(0.0) } else { 0.0 };
        let s = self.scale;
        let pair = &self.pair;

        let mut ll = 0.0;
        for (&o, &m) in pair.other.iter().zip(pair.main.iter()) {
            let rate = mu + s * (ten_a_q * o + ten_ams_q * m);
            if rate <= 0.0 {
                return Ok(f64::NEG_INFINITY);
            }
            ll += rate.ln();
        }
        ll -= mu * self.duration
            + s * (ten_a_q * pair.other_integral + ten_ams_q * pair.main_integral);
        Ok(ll)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::history::Event;
    use approx::assert_relative_eq;

    fn options(tend: f64) -> FitterOptions {
        FitterOptions {
            mref: 3.0,
            mc: 3.0,
            tbegin: 0.0,
            tend,
            sources_before_window: true,
            background: false,
        }
    }

    #[test]
    fn test_mainshock_only_likelihood() {
        // Mainshock at t=0 (M=3 so weight 1) and one aftershock at t=1
        let history = History::new(vec![Event::new(0.0, 3.0), Event::new(1.0, 3.0)]).unwrap();
        // Magnitude tie: the earlier event is the mainshock
        let fitter = EtasFitter::new(&history, options(2.0)).unwrap();
        assert_eq!(fitter.n_sources(), 2);
        assert_eq!(fitter.n_targets(), 1);

        let mexp = fitter.mag_exponent(1.0, 1.0).unwrap();
        let omat = fitter.omori_matrix(2.0, 1.0).unwrap();
        let pair = fitter.pair_mag_omori(&mexp, &omat).unwrap();
        let prod = fitter.avalue_productivity(&pair, 1.0).unwrap();

        // Rate at t=1 from the mainshock: 10^ams * (1 + 1)^-2 = 10^ams / 4
        // Mainshock integral over [0, 2]: 1 - 1/3; aftershock integral over [0, 1]: 1/2
        let ten_a = 1.0;
        let ten_ams = 2.0;
        let expected = (ten_ams / 4.0f64).ln() - (ten_ams * (2.0 / 3.0) + ten_a * 0.5);
        let ll = prod.log_likelihood(ten_a, ten_ams, None).unwrap();
        assert_relative_eq!(ll, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_background_flag() {
        let history = History::new(vec![Event::new(0.0, 5.0), Event::new(0.5, 3.0)]).unwrap();
        let mut opts = options(1.0);
        let fitter = EtasFitter::new(&history, opts.clone()).unwrap();
        let mexp = fitter.mag_exponent(1.0, 1.0).unwrap();
        let omat = fitter.omori_matrix(1.1, 0.01).unwrap();
        let pair = fitter.pair_mag_omori(&mexp, &omat).unwrap();
        let ignored = fitter.avalue_productivity(&pair, 1.0).unwrap();
        let ll_no_bg = ignored.log_likelihood(0.01, 0.01, Some(5.0)).unwrap();
        assert_relative_eq!(ll_no_bg, ignored.log_likelihood(0.01, 0.01, None).unwrap());

        opts.background = true;
        let fitter = EtasFitter::new(&history, opts).unwrap();
        let pair = fitter.pair_mag_omori(&mexp, &omat).unwrap();
        let used = fitter.avalue_productivity(&pair, 1.0).unwrap();
        let ll_bg = used.log_likelihood(0.01, 0.01, Some(5.0)).unwrap();
        assert!((ll_bg - ll_no_bg).abs() > 1e-6);
    }

    #[test]
    fn test_zero_rate_is_negative_infinity() {
        // The only target precedes the mainshock, so nothing triggers it
        let history = History::new(vec![Event::new(0.5, 3.0), Event::new(1.0, 6.0)]).unwrap();
        let fitter = EtasFitter::new(&history, options(2.0)).unwrap();
        let mexp = fitter.mag_exponent(1.0, 1.0).unwrap();
        let omat = fitter.omori_matrix(1.0, 0.1).unwrap();
        let pair = fitter.pair_mag_omori(&mexp, &omat).unwrap();
        let prod = fitter.avalue_productivity(&pair, 1.0).unwrap();
        assert_eq!(prod.log_likelihood(1.0, 1.0, None).unwrap(), f64::NEG_INFINITY);
    }

    #[test]
    fn test_invalid_handles() {
        let history = History::new(vec![Event::new(0.0, 5.0)]).unwrap();
        let fitter = EtasFitter::new(&history, options(1.0)).unwrap();
        assert!(fitter.omori_matrix(1.0, 0.0).is_err());
        assert!(fitter.mag_exponent(f64::NAN, 1.0).is_err());
        assert!(EtasFitter::new(&history, options(0.0)).is_err());
    }
}
