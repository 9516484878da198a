//! # Grid Search Orchestrator
//!
//! Fills the `[c][p][a][ams]` log-likelihood grid on a dedicated rayon pool.
//!
//! ## Run sequence
//! 1. Validate options and grid shapes (fails before any thread exists)
//! 2. Build the [`WorkQueue`] and the shared base (magnitude-exponent handle)
//! 3. Split the output grids into one slab per work unit
//! 4. Spawn one [`Worker`] per pool thread
//! 5. Monitor on the calling thread: wait for worker exits with a bounded
//!    timeout, emit progress reports, raise the termination flag on deadline
//!    or on the first worker error
//! 6. Decide the outcome once every worker has exited
//!
//! Cancellation is cooperative. Workers check the flag between units, so a
//! timed-out run returns at most one unit's duration after the deadline. A
//! deadline that has passed before the workers start (`max_runtime = 0`)
//! raises the flag first, so no unit is computed.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use crate::data::grid::{split_slabs, BaseValueGrid, OutputGrid, SlabMut};
use crate::data::range::SearchRanges;
use crate::error::{GridError, Result};
use crate::model::fitter::Fitter;
use crate::model::parameters::SeedParams;
use crate::pipelines::worker::{panic_message, Worker};
use crate::utils::queue::WorkQueue;
use crate::utils::telemetry::{ProgressReport, Stage, TelemetryBlackboard};
use crate::utils::threading::{build_thread_pool, resolve_threads};

/// Run-level knobs. `None` means default thread count, no deadline and no
/// progress reports respectively.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOptions {
    pub num_threads: Option<usize>,
    pub max_runtime: Option<Duration>,
    pub progress_interval: Option<Duration>,
}

impl SearchOptions {
    pub fn with_threads(mut self, n: usize) -> Self {
        self.num_threads = Some(n);
        self
    }

    pub fn with_max_runtime(mut self, limit: Duration) -> Self {
        self.max_runtime = Some(limit);
        self
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = Some(interval);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_threads == Some(0) {
            return Err(GridError::config("thread count must be at least 1"));
        }
        if self.progress_interval == Some(Duration::ZERO) {
            return Err(GridError::config("progress interval must be positive"));
        }
        Ok(())
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Every unit was computed and committed
    Success,
    /// The deadline passed before the queue drained
    TimedOut,
    /// A worker failed; the message names the failing unit
    Aborted(String),
}

impl SearchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SearchOutcome::Success)
    }
}

/// Counters collected over one run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunStats {
    pub elapsed: Duration,
    pub units_completed: usize,
    pub units_dispensed: usize,
    pub total_units: usize,
    pub threads: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub outcome: SearchOutcome,
    pub stats: RunStats,
}

/// Grids and outcome of [`GridSearch::run`]. Unless the outcome is
/// `Success`, only cells of completed units hold values; the rest keep `NaN`.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub outcome: SearchOutcome,
    pub stats: RunStats,
    pub grid: OutputGrid,
    pub a_base: BaseValueGrid,
}

/// Read-only state every worker borrows for the whole run
pub(crate) struct SharedBase<'r, F: Fitter> {
    pub fitter: &'r F,
    pub seed: &'r SeedParams,
    pub ranges: &'r SearchRanges,
    pub mag_exponent: F::MagExponent,
    /// `S(p0, c0)`, identical for every unit
    pub reference_scale: f64,
}

impl<'r, F: Fitter> SharedBase<'r, F> {
    pub fn build(fitter: &'r F, seed: &'r SeedParams, ranges: &'r SearchRanges) -> Result<Self> {
        let mag_exponent = fitter
            .mag_exponent(seed.b, seed.alpha)
            .map_err(|e| GridError::model(format!("building magnitude exponent: {}", e)))?;

        let reference_scale = seed.reference_scale();
        if !reference_scale.is_finite() || reference_scale <= 0.0 {
            return Err(GridError::model(format!(
                "reference Omori scale is {} at p0={}, c0={}",
                reference_scale, seed.p0, seed.c0
            )));
        }

        Ok(Self {
            fitter,
            seed,
            ranges,
            mag_exponent,
            reference_scale,
        })
    }
}

/// Message a worker job sends when it stops
struct WorkerExit {
    id: usize,
    result: Result<usize>,
}

/// Parallel grid search over `(p, c, a, ams)`
pub struct GridSearch<'f, F: Fitter> {
    fitter: &'f F,
    seed: SeedParams,
    ranges: SearchRanges,
    options: SearchOptions,
}

impl<'f, F: Fitter> GridSearch<'f, F> {
    pub fn new(fitter: &'f F, seed: SeedParams, ranges: SearchRanges) -> Self {
        Self {
            fitter,
            seed,
            ranges,
            options: SearchOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SearchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn seed(&self) -> &SeedParams {
        &self.seed
    }

    pub fn ranges(&self) -> &SearchRanges {
        &self.ranges
    }

    pub fn validate(&self) -> Result<()> {
        self.seed.validate()?;
        self.options.validate()
    }

    /// Allocate fresh grids and fill them
    pub fn run(&self) -> Result<SearchResult> {
        self.run_observed(|_| {})
    }

    /// Like [`run`](Self::run), handing every progress report to `observer`
    pub fn run_observed(&self, observer: impl FnMut(&ProgressReport)) -> Result<SearchResult> {
        self.validate()?;
        let shape = self.ranges.shape();
        let mut grid = OutputGrid::unwritten(shape);
        let mut a_base = BaseValueGrid::unwritten(shape.n_c, shape.n_p);

        let report = self.run_into(&mut grid, &mut a_base, observer)?;
        Ok(SearchResult {
            outcome: report.outcome,
            stats: report.stats,
            grid,
            a_base,
        })
    }

    /// Fill caller-provided grids. Cells of units that never complete are
    /// left as they were.
    ///
    /// Configuration problems and a failing shared-base build are returned as
    /// `Err`. Anything that goes wrong inside a worker is reported as
    /// [`SearchOutcome::Aborted`].
    #[instrument(skip_all, fields(units = self.ranges.shape().n_units()))]
    pub fn run_into(
        &self,
        grid: &mut OutputGrid,
        a_base: &mut BaseValueGrid,
        mut observer: impl FnMut(&ProgressReport),
    ) -> Result<RunReport> {
        self.validate()?;
        let shape = self.ranges.shape();
        if grid.shape() != shape {
            return Err(GridError::config(format!(
                "output grid shape {:?} does not match range lengths {:?}",
                grid.shape(),
                shape
            )));
        }
        if a_base.n_c() != shape.n_c || a_base.n_p() != shape.n_p {
            return Err(GridError::config(format!(
                "base value grid is {}x{}, expected {}x{}",
                a_base.n_c(),
                a_base.n_p(),
                shape.n_c,
                shape.n_p
            )));
        }
        let threads = resolve_threads(self.options.num_threads)?;
        let start = Instant::now();

        let queue = WorkQueue::new(shape.n_p, shape.n_c);
        let telemetry = TelemetryBlackboard::new(queue.len());

        telemetry.set_stage(Stage::BuildingBase);
        let base = SharedBase::build(self.fitter, &self.seed, &self.ranges)?;
        let pool = build_thread_pool(threads)?;

        let slabs: Vec<Mutex<Option<SlabMut<'_>>>> = split_slabs(grid, a_base)
            .into_iter()
            .map(|slab| Mutex::new(Some(slab)))
            .collect();

        info!(
            threads,
            units = queue.len(),
            cells = shape.n_cells(),
            "Starting grid search"
        );
        telemetry.set_stage(Stage::Searching);

        // A limit too large to represent as an `Instant` never fires
        let deadline = self.options.max_runtime.and_then(|limit| start.checked_add(limit));
        let interval = self.options.progress_interval;
        let mut first_error: Option<GridError> = None;
        let mut deadline_pending = deadline.is_some();
        let mut timed_out = false;

        // Already past the deadline: raise the flag before any worker can claim
        if deadline.is_some_and(|limit| Instant::now() >= limit) && !queue.is_empty() {
            deadline_pending = false;
            timed_out = true;
            warn!(total = queue.len(), "max runtime reached before the search started");
            telemetry.request_termination();
            telemetry.set_stage(Stage::Draining);
        }

        let (tx, rx) = mpsc::channel::<WorkerExit>();

        pool.in_place_scope(|scope| {
            for id in 0..threads {
                let tx = tx.clone();
                let worker = Worker {
                    id,
                    base: &base,
                    queue: &queue,
                    slabs: &slabs,
                    telemetry: &telemetry,
                };
                scope.spawn(move |_| {
                    let result = match panic::catch_unwind(AssertUnwindSafe(|| worker.run())) {
                        Ok(result) => result,
                        Err(payload) => Err(GridError::model(format!(
                            "worker {} panicked: {}",
                            id,
                            panic_message(payload.as_ref())
                        ))),
                    };
                    if result.is_err() {
                        worker.telemetry.request_termination();
                    }
                    // The monitor outlives every worker; a failed send only
                    // means it already gave up on the channel
                    let _ = tx.send(WorkerExit { id, result });
                });
            }
            drop(tx);

            let mut running = threads;
            let mut next_report = interval.and_then(|i| start.checked_add(i));

            while running > 0 {
                let wake = [deadline.filter(|_| deadline_pending), next_report]
                    .into_iter()
                    .flatten()
                    .min();
                let received = match wake {
                    Some(at) => rx.recv_timeout(at.saturating_duration_since(Instant::now())),
                    None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
                };

                match received {
                    Ok(WorkerExit { id, result: Ok(units) }) => {
                        running -= 1;
                        tracing::debug!(worker = id, units, "worker exited");
                    }
                    Ok(WorkerExit { id, result: Err(e) }) => {
                        running -= 1;
                        warn!(worker = id, error = %e, "worker failed, stopping search");
                        telemetry.request_termination();
                        telemetry.set_stage(Stage::Draining);
                        if first_error.is_none() {
                            first_error = Some(e);
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => break,
                }

                let now = Instant::now();
                if let Some(limit) = deadline {
                    if deadline_pending && now >= limit {
                        deadline_pending = false;
                    }
                    if !deadline_pending && !timed_out && !queue_done(&queue, &telemetry) {
                        timed_out = true;
                        warn!(
                            elapsed_ms = start.elapsed().as_millis() as u64,
                            completed = telemetry.units_completed(),
                            total = queue.len(),
                            "max runtime reached, waiting for in-flight units"
                        );
                        telemetry.request_termination();
                        telemetry.set_stage(Stage::Draining);
                    }
                }
                if let (Some(at), Some(every)) = (next_report, interval) {
                    if now >= at {
                        let report = telemetry.snapshot(queue.progress().0);
                        tracing::debug!(
                            completed = report.completed,
                            dispensed = report.dispensed,
                            total = report.total,
                            "progress"
                        );
                        observer(&report);
                        next_report = now.checked_add(every);
                    }
                }
            }
        });

        telemetry.set_stage(Stage::Complete);
        let (dispensed, total) = queue.progress();
        let final_report = telemetry.snapshot(dispensed);
        if interval.is_some() {
            observer(&final_report);
        }

        let completed = telemetry.units_completed();
        let outcome = match first_error {
            Some(e) => SearchOutcome::Aborted(e.to_string()),
            None if completed == total => SearchOutcome::Success,
            None if timed_out => SearchOutcome::TimedOut,
            None => SearchOutcome::Aborted(format!(
                "workers exited with {} of {} units completed",
                completed, total
            )),
        };

        let stats = RunStats {
            elapsed: start.elapsed(),
            units_completed: completed,
            units_dispensed: dispensed,
            total_units: total,
            threads,
        };
        info!(
            outcome = ?outcome,
            completed,
            total,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "Grid search finished"
        );

        Ok(RunReport { outcome, stats })
    }
}

/// True once every unit has been both claimed and committed
fn queue_done(queue: &WorkQueue, telemetry: &TelemetryBlackboard) -> bool {
    queue.is_exhausted() && telemetry.units_completed() == queue.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_validate() {
        assert!(SearchOptions::default().validate().is_ok());
        assert!(SearchOptions::default().with_threads(0).validate().unwrap_err().is_config());
        assert!(SearchOptions::default()
            .with_progress_interval(Duration::ZERO)
            .validate()
            .unwrap_err()
            .is_config());
        assert!(SearchOptions::default()
            .with_threads(2)
            .with_max_runtime(Duration::from_millis(5))
            .validate()
            .is_ok());
    }

    #[test]
    fn test_outcome_is_success() {
        assert!(SearchOutcome::Success.is_success());
        assert!(!SearchOutcome::TimedOut.is_success());
        assert!(!SearchOutcome::Aborted("x".into()).is_success());
    }
}
