//! # etas-grid: Parallel Grid-Search ETAS Likelihood Fitting
//!
//! Evaluates the ETAS log-likelihood of an aftershock sequence over a 4-D
//! `(c, p, a, ams)` grid around a seed point and reports the maximum.
//!
//! ## Usage
//! ```bash
//! etas-grid --catalog seq.txt --p0 1.08 --c0 0.01 --a0 -2
//!
//! # Bounded run with progress output
//! etas-grid --catalog seq.txt --nthreads 16 --max-runtime 600 --progress 5
//!
//! # With profiling output
//! etas-grid --catalog seq.txt --profile
//! ```
//!
//! Exit status is 0 when the whole grid was filled, 2 when the run timed out
//! and 1 when it was aborted or failed to start.

use std::time::Instant;

use anyhow::Context;
use tracing_subscriber::filter::LevelFilter;

use etas_grid::config::Config;
use etas_grid::data::OutputGrid;
use etas_grid::io::read_catalog;
use etas_grid::model::{best_fit, marginal, Axis, EtasFitter, MarginalPolicy};
use etas_grid::pipelines::{GridSearch, SearchOutcome};
use etas_grid::utils::telemetry::{PrinterConfig, ProgressPrinter};

fn main() {
    match run() {
        Ok(SearchOutcome::Success) => {}
        Ok(SearchOutcome::TimedOut) => std::process::exit(2),
        Ok(SearchOutcome::Aborted(_)) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Initialize the tracing subscriber; `profile` adds span timings
fn init_tracing(profile: bool) {
    use tracing_subscriber::fmt::format::FmtSpan;
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let registry = tracing_subscriber::registry();
    if profile {
        registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_span_events(FmtSpan::CLOSE)
                    .with_target(false)
                    .with_timer(fmt::time::uptime()),
            )
            .with(LevelFilter::DEBUG)
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .with(LevelFilter::INFO)
            .init();
    }
}

/// Print one normalized marginal as `value<TAB>probability` lines
fn print_marginal(grid: &OutputGrid, axis: Axis, value_at: impl Fn(usize) -> f64) {
    match marginal(grid, axis, MarginalPolicy::LogLikelihood) {
        Ok(probs) => {
            println!("# {:?} marginal", axis);
            for (i, prob) in probs.iter().enumerate() {
                println!("{}\t{:.6}", value_at(i), prob);
            }
        }
        Err(e) => tracing::warn!(axis = ?axis, error = %e, "marginal not available"),
    }
}

fn run() -> anyhow::Result<SearchOutcome> {
    let start = Instant::now();

    let config = Config::parse_and_validate()?;
    init_tracing(config.profile);
    if config.profile {
        eprintln!("=== Profiling enabled ===\n");
    }

    eprintln!("etas-grid v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("Threads: {}", config.nthreads());
    eprintln!("Catalog: {:?}", config.catalog);

    let history = read_catalog(&config.catalog)?;
    let catalog_end = history.end_time();
    let seed = config.seed_params(catalog_end);
    let ranges = config.ranges()?;
    let fitter = EtasFitter::new(&history, config.fitter_options(catalog_end))
        .context("Failed to build ETAS fitter")?;

    let shape = ranges.shape();
    eprintln!(
        "Events: {} (mainshock M{:.1} at t={})",
        history.len(),
        history.mainshock().mag,
        history.mainshock().time
    );
    eprintln!(
        "Grid: c={} p={} a={} ams={} ({} units, {} cells)",
        shape.n_c,
        shape.n_p,
        shape.n_a,
        shape.n_ams,
        shape.n_units(),
        shape.n_cells()
    );

    let search = GridSearch::new(&fitter, seed, ranges).with_options(config.search_options());
    let mut printer = ProgressPrinter::new(PrinterConfig::default());
    let result = search.run_observed(|report| printer.observe(report))?;
    printer.finish();

    match &result.outcome {
        SearchOutcome::Success => eprintln!("Search complete"),
        SearchOutcome::TimedOut => eprintln!(
            "Search timed out: {} of {} units completed, grid is partial",
            result.stats.units_completed, result.stats.total_units
        ),
        SearchOutcome::Aborted(msg) => eprintln!("Search aborted: {}", msg),
    }

    match best_fit(&result.grid, &result.a_base, search.ranges(), search.seed()) {
        Some(best) => {
            println!("log_likelihood\t{}", best.log_likelihood);
            println!("p\t{}", best.p);
            println!("c\t{}", best.c);
            println!("a\t{}", best.a);
            println!("ams\t{}", best.ams);

            let seed = search.seed();
            print_marginal(&result.grid, Axis::P, |i| seed.p_at(search.ranges().p.get(i)));
            print_marginal(&result.grid, Axis::C, |i| seed.c_at(search.ranges().c.get(i)));
        }
        None => eprintln!("No grid cell was computed"),
    }

    eprintln!("\nCompleted in {:.2}s", start.elapsed().as_secs_f64());
    Ok(result.outcome)
}
