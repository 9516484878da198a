//! # Workspace Pattern for Per-Thread Scratch
//!
//! Each worker owns one [`UnitScratch`] for its whole lifetime. It holds the
//! model handles that depend on the current `(p, c)` and a staging buffer the
//! size of one slab.
//!
//! ## Design Philosophy
//! Handles are rebuilt for every work unit and are never shared between
//! threads, so they need no locking. Dropping the scratch (normal exit, early
//! return, or unwinding) releases whatever handles are currently held.
//!
//! Values are computed into the staging buffer and copied into the output
//! grid only once the whole slab succeeded, so a failing unit never leaves a
//! half-written slab behind.

use crate::error::{GridError, Result};
use crate::model::fitter::Fitter;

/// Thread-confined model handles and slab buffer
pub struct UnitScratch<F: Fitter> {
    omori: Option<F::OmoriMatrix>,
    pair: Option<F::PairMagOmori>,
    productivity: Option<F::Productivity>,
    values: Vec<f64>,
    rebuilds: usize,
}

impl<F: Fitter> UnitScratch<F> {
    /// Create an empty scratch with a staging buffer of `slab_len` cells
    pub fn new(slab_len: usize) -> Self {
        Self {
            omori: None,
            pair: None,
            productivity: None,
            values: vec![f64::NAN; slab_len],
            rebuilds: 0,
        }
    }

    /// Drop held handles, dependents first
    pub fn release(&mut self) {
        self.productivity = None;
        self.pair = None;
        self.omori = None;
    }

    /// Replace the handles with ones built for `(p, c)`
    pub fn rebuild(
        &mut self,
        fitter: &F,
        mexp: &F::MagExponent,
        p: f64,
        c: f64,
        scale: f64,
    ) -> Result<()> {
        self.release();
        if let Err(e) = self.build(fitter, mexp, p, c, scale) {
            self.release();
            return Err(e);
        }
        self.rebuilds += 1;
        Ok(())
    }

    fn build(
        &mut self,
        fitter: &F,
        mexp: &F::MagExponent,
        p: f64,
        c: f64,
        scale: f64,
    ) -> Result<()> {
        let omori = self.omori.insert(fitter.omori_matrix(p, c)?);
        let pair = self.pair.insert(fitter.pair_mag_omori(mexp, omori)?);
        self.productivity = Some(fitter.avalue_productivity(pair, scale)?);
        Ok(())
    }

    /// Current productivity handle and the staging buffer
    pub fn split_mut(&mut self) -> Result<(&F::Productivity, &mut [f64])> {
        match self.productivity.as_ref() {
            Some(prod) => Ok((prod, self.values.as_mut_slice())),
            None => Err(GridError::model("scratch used before rebuild")),
        }
    }

    /// Reset the staging buffer before a new slab
    pub fn clear_values(&mut self) {
        self.values.fill(f64::NAN);
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of units this scratch has been rebuilt for
    pub fn rebuilds(&self) -> usize {
        self.rebuilds
    }

    pub fn holds_handles(&self) -> bool {
        self.omori.is_some() || self.pair.is_some() || self.productivity.is_some()
    }
}

impl<F: Fitter> Drop for UnitScratch<F> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fitter::ProductivityEvaluator;
    use std::sync::atomic::{AtomicIsize, Ordering};
    use std::sync::Arc;

    /// Handle that counts how many instances are alive
    struct Handle(Arc<AtomicIsize>);

    impl Handle {
        fn new(live: &Arc<AtomicIsize>) -> Self {
            live.fetch_add(1, Ordering::SeqCst);
            Self(live.clone())
        }
    }

    impl Drop for Handle {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    impl ProductivityEvaluator for Handle {
        fn log_likelihood(&self, a: f64, ams: f64, _mu: Option<f64>) -> Result<f64> {
            Ok(a + ams)
        }
    }

    struct ArcFitter {
        live: Arc<AtomicIsize>,
        fail_pair: bool,
    }

    impl Fitter for ArcFitter {
        type MagExponent = ();
        type OmoriMatrix = Handle;
        type PairMagOmori = Handle;
        type Productivity = Handle;

        fn mag_exponent(&self, _b: f64, _alpha: f64) -> Result<()> {
            Ok(())
        }
        fn omori_matrix(&self, _p: f64, _c: f64) -> Result<Handle> {
            Ok(Handle::new(&self.live))
        }
        fn pair_mag_omori(&self, _m: &(), _o: &Handle) -> Result<Handle> {
            if self.fail_pair {
                return Err(GridError::model("pair failed"));
            }
            Ok(Handle::new(&self.live))
        }
        fn avalue_productivity(&self, _p: &Handle, _s: f64) -> Result<Handle> {
            Ok(Handle::new(&self.live))
        }
    }

    #[test]
    fn test_rebuild_replaces_handles() {
        let fitter = ArcFitter {
            live: Default::default(),
            fail_pair: false,
        };
        let mut scratch: UnitScratch<ArcFitter> = UnitScratch::new(4);
        scratch.rebuild(&fitter, &(), 1.0, 0.1, 1.0).unwrap();
        assert_eq!(fitter.live.load(Ordering::SeqCst), 3);
        scratch.rebuild(&fitter, &(), 1.1, 0.1, 1.0).unwrap();
        assert_eq!(fitter.live.load(Ordering::SeqCst), 3);
        assert_eq!(scratch.rebuilds(), 2);

        let (prod, values) = scratch.split_mut().unwrap();
        values[0] = prod.log_likelihood(1.0, 2.0, None).unwrap();
        assert_eq!(scratch.values()[0], 3.0);

        drop(scratch);
        assert_eq!(fitter.live.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failed_rebuild_releases_partial_handles() {
        let fitter = ArcFitter {
            live: Default::default(),
            fail_pair: true,
        };
        let mut scratch: UnitScratch<ArcFitter> = UnitScratch::new(1);
        assert!(scratch.rebuild(&fitter, &(), 1.0, 0.1, 1.0).is_err());
        assert!(!scratch.holds_handles());
        assert_eq!(fitter.live.load(Ordering::SeqCst), 0);
        assert!(scratch.split_mut().is_err());
        drop(scratch);
        assert_eq!(fitter.live.load(Ordering::SeqCst), 0);
    }
}
