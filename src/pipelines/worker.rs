//! # Grid Worker
//!
//! The per-thread loop. A worker owns one [`UnitScratch`] and repeatedly:
//! 1. checks the termination flag (cancellation happens only here, between units)
//! 2. claims the next `(p_idx, c_idx)` from the [`WorkQueue`]
//! 3. rescales the productivity base for the trial `(p, c)`
//! 4. rebuilds its thread-confined model handles
//! 5. evaluates the `a × ams` slab into the staging buffer
//! 6. commits the staging buffer into the unit's slab of the output grid
//!
//! Steps 3-5 run under `catch_unwind`, so a failing or panicking model
//! surfaces as a [`GridError::Worker`] naming the unit. Nothing of a failed
//! unit is committed.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Mutex;

use crate::data::grid::SlabMut;
use crate::error::{GridError, Result};
use crate::model::fitter::{Fitter, ProductivityEvaluator};
use crate::pipelines::grid_search::SharedBase;
use crate::utils::queue::{WorkQueue, WorkUnit};
use crate::utils::telemetry::TelemetryBlackboard;
use crate::utils::workspace::UnitScratch;

/// Borrowed view of the run state one worker needs
pub(crate) struct Worker<'r, 'g, F: Fitter> {
    pub id: usize,
    pub base: &'r SharedBase<'r, F>,
    pub queue: &'r WorkQueue,
    pub slabs: &'r [Mutex<Option<SlabMut<'g>>>],
    pub telemetry: &'r TelemetryBlackboard,
}

impl<F: Fitter> Worker<'_, '_, F> {
    /// Claim and compute units until the queue is empty or termination is
    /// requested. Returns the number of units committed.
    pub fn run(&self) -> Result<usize> {
        let _span = tracing::debug_span!("worker", id = self.id).entered();

        let mut scratch = UnitScratch::<F>::new(self.base.ranges.shape().slab_len());
        let mut done = 0usize;

        while !self.telemetry.should_terminate() {
            let Some(unit) = self.queue.next() else {
                break;
            };
            tracing::trace!(p_idx = unit.p_idx, c_idx = unit.c_idx, "claimed unit");

            let a_base = self.evaluate_guarded(unit, &mut scratch)?;
            self.commit(unit, a_base, scratch.values())?;
            done += 1;
        }

        tracing::debug!(units = done, rebuilds = scratch.rebuilds(), "worker finished");
        Ok(done)
    }

    fn evaluate_guarded(&self, unit: WorkUnit, scratch: &mut UnitScratch<F>) -> Result<f64> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.evaluate(unit, scratch))) {
            Ok(Ok(a_base)) => Ok(a_base),
            Ok(Err(e)) => Err(GridError::worker(unit.p_idx, unit.c_idx, e.to_string())),
            Err(payload) => {
                // Handles built before the panic may be half-initialized
                scratch.release();
                Err(GridError::worker(
                    unit.p_idx,
                    unit.c_idx,
                    format!("panicked: {}", panic_message(payload.as_ref())),
                ))
            }
        }
    }

    /// Fill the staging buffer for `unit`; returns the unit's `a_base`
    fn evaluate(&self, unit: WorkUnit, scratch: &mut UnitScratch<F>) -> Result<f64> {
        let base = self.base;
        let seed = base.seed;
        let ranges = base.ranges;

        let p = seed.p_at(ranges.p.get(unit.p_idx));
        let c = seed.c_at(ranges.c.get(unit.c_idx));

        let a_base = seed.rescaled_a_from(base.reference_scale, p, c);
        if !a_base.is_finite() {
            return Err(GridError::model(format!(
                "productivity rescaling is not finite at p={}, c={}",
                p, c
            )));
        }

        scratch.rebuild(base.fitter, &base.mag_exponent, p, c, seed.mag_scale)?;
        scratch.clear_values();
        let (productivity, values) = scratch.split_mut()?;

        for (row, da) in values.chunks_mut(ranges.ams.len()).zip(ranges.a.iter()) {
            let a = a_base + da;
            let ten_a_q = 10f64.powf(a);
            for (cell, dams) in row.iter_mut().zip(ranges.ams.iter()) {
                let ams = a + dams;
                let ll = productivity.log_likelihood(ten_a_q, 10f64.powf(ams), seed.mu)?;
                if ll.is_nan() {
                    return Err(GridError::model(format!(
                        "log-likelihood is NaN at a={}, ams={}",
                        a, ams
                    )));
                }
                *cell = ll;
            }
        }

        Ok(a_base)
    }

    /// Copy a finished slab into the output grid. Each slab can be taken once.
    fn commit(&self, unit: WorkUnit, a_base: f64, values: &[f64]) -> Result<()> {
        let idx = unit.slab_index(self.base.ranges.p.len());
        let slab = self.slabs[idx]
            .lock()
            .map_err(|_| GridError::worker(unit.p_idx, unit.c_idx, "slab lock poisoned"))?
            .take()
            .ok_or_else(|| GridError::worker(unit.p_idx, unit.c_idx, "slab already committed"))?;

        slab.values.copy_from_slice(values);
        *slab.a_base = a_base;
        self.telemetry.record_unit(values.len());
        Ok(())
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        let payload = panic::catch_unwind(|| panic!("bad cell {}", 7)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "bad cell 7");

        let payload = panic::catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "static");
    }
}
