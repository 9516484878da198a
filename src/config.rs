//! # Configuration Logic
//!
//! ## Role
//! CLI argument parsing and validation for the `etas-grid` binary.
//!
//! Search axes are given as `lo:hi:n` (or a single value) and are offsets
//! from the seed point:
//! - `--p-range`: added to `p0`
//! - `--c-range`: log10 multiplier on `c0`
//! - `--a-range`: added to the rescaled productivity base
//! - `--ams-range`: added to the trial `a`
//!
//! ## Example CLI
//! ```bash
//! etas-grid --catalog seq.txt --p0 1.08 --c0 0.01 --a0 -2 --nthreads 8 --max-runtime 600
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::data::range::{RangeSpec, SearchRanges};
use crate::error::{GridError, Result};
use crate::model::etas::FitterOptions;
use crate::model::parameters::SeedParams;
use crate::pipelines::SearchOptions;
use crate::utils::threading::default_threads;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "etas-grid",
    version,
    about = "Parallel grid-search likelihood fitting of ETAS aftershock parameters"
)]
pub struct Config {
    /// Catalog file with one `time mag` pair per line
    #[arg(long)]
    pub catalog: PathBuf,

    /// Reference Omori exponent
    #[arg(long, default_value_t = 1.08, allow_hyphen_values = true)]
    pub p0: f64,

    /// Reference Omori time offset (days)
    #[arg(long, default_value_t = 0.01)]
    pub c0: f64,

    /// Reference productivity (log10)
    #[arg(long, default_value_t = -2.0, allow_hyphen_values = true)]
    pub a0: f64,

    /// Gutenberg-Richter b-value
    #[arg(short = 'b', long, default_value_t = 1.0)]
    pub b: f64,

    /// Productivity magnitude exponent
    #[arg(long, default_value_t = 1.0)]
    pub alpha: f64,

    /// Reference magnitude
    #[arg(long, default_value_t = 3.0, allow_hyphen_values = true)]
    pub mref: f64,

    /// Magnitude of completeness
    #[arg(long, default_value_t = 3.0, allow_hyphen_values = true)]
    pub mc: f64,

    /// Start of the fitting window (days)
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub tbegin: f64,

    /// End of the fitting window (default: last catalog event)
    #[arg(long, allow_hyphen_values = true)]
    pub tend: Option<f64>,

    /// Fixed background rate (events/day); enables the background term
    #[arg(long)]
    pub mu: Option<f64>,

    /// Productivity scale applied inside the likelihood
    #[arg(long, default_value_t = 1.0)]
    pub mag_scale: f64,

    /// Ignore events before the fitting window as sources (mainshock excepted)
    #[arg(long)]
    pub window_sources_only: bool,

    #[arg(long, default_value = "-0.3:0.3:31", allow_hyphen_values = true)]
    pub p_range: RangeSpec,

    #[arg(long, default_value = "-1:1:17", allow_hyphen_values = true)]
    pub c_range: RangeSpec,

    #[arg(long, default_value = "-1:1:51", allow_hyphen_values = true)]
    pub a_range: RangeSpec,

    #[arg(long, default_value = "-1:1:51", allow_hyphen_values = true)]
    pub ams_range: RangeSpec,

    /// Number of worker threads (default: all cores)
    #[arg(long)]
    pub nthreads: Option<usize>,

    /// Stop claiming new work units after this many seconds
    #[arg(long, allow_hyphen_values = true)]
    pub max_runtime: Option<f64>,

    /// Seconds between progress reports (default: no reports)
    #[arg(long)]
    pub progress: Option<f64>,

    /// Print span timings
    #[arg(long)]
    pub profile: bool,
}

impl Config {
    /// Parse CLI arguments and validate them
    pub fn parse_and_validate() -> Result<Self> {
        let config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.c0 <= 0.0 {
            return Err(GridError::config("c0 must be positive"));
        }
        if let Some(tend) = self.tend {
            if tend <= self.tbegin {
                return Err(GridError::config(format!(
                    "tend ({}) must be greater than tbegin ({})",
                    tend, self.tbegin
                )));
            }
        }
        if let Some(mu) = self.mu {
            if !mu.is_finite() || mu < 0.0 {
                return Err(GridError::config("mu must be finite and non-negative"));
            }
        }
        if self.nthreads == Some(0) {
            return Err(GridError::config("nthreads must be at least 1"));
        }
        if let Some(secs) = self.max_runtime {
            if Duration::try_from_secs_f64(secs).is_err() {
                return Err(GridError::config("max-runtime must be a non-negative number of seconds"));
            }
        }
        if let Some(secs) = self.progress {
            if secs <= 0.0 || Duration::try_from_secs_f64(secs).is_err() {
                return Err(GridError::config("progress must be a positive number of seconds"));
            }
        }
        Ok(())
    }

    /// Get number of threads to use
    pub fn nthreads(&self) -> usize {
        self.nthreads.unwrap_or_else(default_threads)
    }

    pub fn search_options(&self) -> SearchOptions {
        SearchOptions {
            num_threads: Some(self.nthreads()),
            max_runtime: self.max_runtime.and_then(|s| Duration::try_from_secs_f64(s).ok()),
            progress_interval: self.progress.and_then(|s| Duration::try_from_secs_f64(s).ok()),
        }
    }

    /// End of the fitting window, falling back to the catalog's last event
    pub fn window_end(&self, catalog_end: f64) -> f64 {
        self.tend.unwrap_or(catalog_end)
    }

    pub fn seed_params(&self, catalog_end: f64) -> SeedParams {
        let seed = SeedParams::new(self.p0, self.c0, self.a0, self.tbegin, self.window_end(catalog_end))
            .with_b_alpha(self.b, self.alpha)
            .with_mag_scale(self.mag_scale);
        match self.mu {
            Some(mu) => seed.with_background(mu),
            None => seed,
        }
    }

    pub fn fitter_options(&self, catalog_end: f64) -> FitterOptions {
        FitterOptions {
            mref: self.mref,
            mc: self.mc,
            tbegin: self.tbegin,
            tend: self.window_end(catalog_end),
            sources_before_window: !self.window_sources_only,
            background: self.mu.is_some(),
        }
    }

    pub fn ranges(&self) -> Result<SearchRanges> {
        Ok(SearchRanges::new(
            self.p_range.into_range("p")?,
            self.c_range.into_range("c")?,
            self.a_range.into_range("a")?,
            self.ams_range.into_range("ams")?,
        ))
    }
}
