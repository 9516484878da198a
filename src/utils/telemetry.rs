//! # Telemetry Blackboard
//!
//! Thread-safe progress tracking for a grid search.
//! Uses atomic counters that can be cheaply updated from worker threads.
//!
//! The blackboard pattern decouples work execution from progress reporting:
//! - Worker threads update atomic counters with minimal overhead
//! - The orchestrator's monitor loop periodically reads a [`ProgressReport`]
//!   snapshot and hands it to an observer (for the CLI, a [`ProgressPrinter`])

use std::io::{self, IsTerminal, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Processing stage for high-level progress tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Stage {
    Initializing = 0,
    BuildingBase = 1,
    Searching = 2,
    Draining = 3,
    Complete = 4,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Initializing => "Initializing",
            Stage::BuildingBase => "Building shared base",
            Stage::Searching => "Searching",
            Stage::Draining => "Draining workers",
            Stage::Complete => "Complete",
        }
    }

    fn from_u64(val: u64) -> Self {
        match val {
            0 => Stage::Initializing,
            1 => Stage::BuildingBase,
            2 => Stage::Searching,
            3 => Stage::Draining,
            _ => Stage::Complete,
        }
    }
}

/// Run-local telemetry and control state shared by the orchestrator and workers.
///
/// Counters use relaxed ordering since the monitor only needs eventual
/// visibility. The termination flag uses acquire/release so a worker that
/// observes it also observes everything written before it was raised.
pub struct TelemetryBlackboard {
    stage: AtomicU64,
    total_units: usize,
    units_completed: AtomicUsize,
    cells_written: AtomicU64,

    start_time: Instant,
    last_progress_nanos: AtomicU64,

    terminate: AtomicBool,
}

impl TelemetryBlackboard {
    pub fn new(total_units: usize) -> Self {
        Self {
            stage: AtomicU64::new(Stage::Initializing as u64),
            total_units,
            units_completed: AtomicUsize::new(0),
            cells_written: AtomicU64::new(0),
            start_time: Instant::now(),
            last_progress_nanos: AtomicU64::new(0),
            terminate: AtomicBool::new(false),
        }
    }

    // === Stage Updates ===

    #[inline]
    pub fn set_stage(&self, stage: Stage) {
        self.stage.store(stage as u64, Ordering::Relaxed);
        self.touch_progress();
    }

    #[inline]
    pub fn stage(&self) -> Stage {
        Stage::from_u64(self.stage.load(Ordering::Relaxed))
    }

    // === Worker Updates ===

    /// Record one fully committed work unit
    #[inline]
    pub fn record_unit(&self, cells: usize) {
        self.units_completed.fetch_add(1, Ordering::Relaxed);
        self.cells_written.fetch_add(cells as u64, Ordering::Relaxed);
        self.touch_progress();
    }

    pub fn units_completed(&self) -> usize {
        self.units_completed.load(Ordering::Relaxed)
    }

    pub fn cells_written(&self) -> u64 {
        self.cells_written.load(Ordering::Relaxed)
    }

    // === Control ===

    /// Ask workers to stop before claiming another unit
    pub fn request_termination(&self) {
        self.terminate.store(true, Ordering::Release);
    }

    #[inline]
    pub fn should_terminate(&self) -> bool {
        self.terminate.load(Ordering::Acquire)
    }

    // === Timing ===

    #[inline]
    fn touch_progress(&self) {
        let elapsed = self.start_time.elapsed().as_nanos() as u64;
        self.last_progress_nanos.store(elapsed, Ordering::Relaxed);
    }

    /// Snapshot for the monitor loop; `dispensed` comes from the work queue
    pub fn snapshot(&self, dispensed: usize) -> ProgressReport {
        let now_nanos = self.start_time.elapsed().as_nanos() as u64;
        let last = self.last_progress_nanos.load(Ordering::Relaxed);
        ProgressReport {
            stage: self.stage(),
            elapsed: Duration::from_nanos(now_nanos),
            dispensed,
            completed: self.units_completed(),
            total: self.total_units,
            cells_written: self.cells_written(),
            since_progress: Duration::from_nanos(now_nanos.saturating_sub(last)),
        }
    }
}

/// Snapshot of telemetry state at a point in time.
///
/// `dispensed` counts units handed out by the queue, which runs ahead of
/// `completed` by up to one unit per worker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressReport {
    pub stage: Stage,
    pub elapsed: Duration,
    pub dispensed: usize,
    pub completed: usize,
    pub total: usize,
    pub cells_written: u64,
    pub since_progress: Duration,
}

impl ProgressReport {
    /// Completed fraction in `[0, 1]`
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            (self.completed as f64 / self.total as f64).min(1.0)
        }
    }
}

/// Progress output configuration
#[derive(Debug, Clone)]
pub struct PrinterConfig {
    /// Stall warning threshold (no unit finished for this long)
    pub stall_threshold: Duration,
    /// Rewrite a single line instead of printing log lines
    pub tty: bool,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            stall_threshold: Duration::from_secs(300), // 5 minutes
            tty: io::stderr().is_terminal(),
        }
    }
}

/// Renders progress reports to stderr
pub struct ProgressPrinter {
    config: PrinterConfig,
    last_completed: usize,
    last_elapsed: Duration,
}

impl ProgressPrinter {
    pub fn new(config: PrinterConfig) -> Self {
        Self {
            config,
            last_completed: 0,
            last_elapsed: Duration::ZERO,
        }
    }

    pub fn observe(&mut self, report: &ProgressReport) {
        let dt = report.elapsed.saturating_sub(self.last_elapsed).as_secs_f64();
        let velocity = if dt > 0.1 {
            report.completed.saturating_sub(self.last_completed) as f64 / dt
        } else {
            0.0
        };
        self.last_completed = report.completed;
        self.last_elapsed = report.elapsed;

        let eta = if velocity > 0.0 && report.total > report.completed {
            format_duration((report.total - report.completed) as f64 / velocity)
        } else {
            "unknown".to_string()
        };
        let is_stalled = report.since_progress > self.config.stall_threshold;
        let rss_mb = get_rss_mb();

        if self.config.tty {
            print_tty_progress(report, &eta, rss_mb, velocity, is_stalled);
        } else {
            print_log_progress(report, &eta, rss_mb, velocity, is_stalled);
        }
    }

    /// Clear the TTY progress line
    pub fn finish(&self) {
        if self.config.tty {
            eprint!("\r\x1b[K");
            let _ = io::stderr().flush();
        }
    }
}

/// Get RSS memory usage in MB (Linux only)
fn get_rss_mb() -> Option<u64> {
    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/proc/self/statm")
            .ok()
            .and_then(|s| {
                let parts: Vec<&str> = s.split_whitespace().collect();
                // Second field is RSS in pages
                parts.get(1)?.parse::<u64>().ok()
            })
            .map(|pages| pages * 4096 / (1024 * 1024)) // pages to MB
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

/// Format duration in human-readable form
pub fn format_duration(secs: f64) -> String {
    if secs < 60.0 {
        format!("{:.0}s", secs)
    } else if secs < 3600.0 {
        let mins = (secs / 60.0).floor();
        let remaining_secs = secs % 60.0;
        format!("{:.0}m{:.0}s", mins, remaining_secs)
    } else {
        format!("{:.1}h", secs / 3600.0)
    }
}

/// Print progress for TTY (rewriting single line)
fn print_tty_progress(
    report: &ProgressReport,
    eta: &str,
    rss_mb: Option<u64>,
    velocity: f64,
    is_stalled: bool,
) {
    let progress_pct = report.fraction() * 100.0;

    // Build progress bar (20 chars)
    let bar_width = 20;
    let filled = ((progress_pct / 100.0) * bar_width as f64) as usize;
    let bar: String = "=".repeat(filled.min(bar_width))
        + &" ".repeat(bar_width.saturating_sub(filled));

    let mem_str = rss_mb.map(|mb| format!(" {}MB", mb)).unwrap_or_default();
    let stall_str = if is_stalled { " [STALLED]" } else { "" };

    eprint!(
        "\r[{}] {:>5.1}% | {} U{}/{} (claimed {}) | {:.1} units/s | {} | ETA: {}{}{}    \x1b[K",
        bar,
        progress_pct,
        report.stage.as_str(),
        report.completed,
        report.total,
        report.dispensed,
        velocity,
        format_duration(report.elapsed.as_secs_f64()),
        eta,
        mem_str,
        stall_str
    );
    let _ = io::stderr().flush();
}

/// Print progress for non-TTY (structured log line)
fn print_log_progress(
    report: &ProgressReport,
    eta: &str,
    rss_mb: Option<u64>,
    velocity: f64,
    is_stalled: bool,
) {
    eprintln!(
        "[HEARTBEAT] stage=\"{}\" units={}/{} dispensed={} cells={} \
         velocity={:.1}/s elapsed={:.0}s eta={} rss_mb={} stalled={}",
        report.stage.as_str(),
        report.completed,
        report.total,
        report.dispensed,
        report.cells_written,
        velocity,
        report.elapsed.as_secs_f64(),
        eta,
        rss_mb
            .map(|m| m.to_string())
            .unwrap_or_else(|| "?".to_string()),
        is_stalled
    );
}
