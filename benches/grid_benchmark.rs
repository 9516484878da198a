use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use etas_grid::data::{Event, GridShape, History, OutputGrid};
use etas_grid::model::{find_max, marginal, Axis, EtasFitter, FitterOptions, MarginalPolicy};
use etas_grid::{GridSearch, ParameterRange, SearchOptions, SearchRanges, SeedParams};
use std::hint::black_box;

fn synthetic_history(n: usize) -> History {
    let mut events = vec![Event::new(0.0, 6.5)];
    for k in 1..=n {
        let t = 0.01 * (k as f64).powf(1.5);
        events.push(Event::new(t, 3.0 + ((k * 37) % 23) as f64 * 0.1));
    }
    History::new(events).unwrap()
}

fn ranges(n_p: usize, n_c: usize, n_a: usize, n_ams: usize) -> SearchRanges {
    SearchRanges::new(
        ParameterRange::linspace("p", -0.3, 0.3, n_p).unwrap(),
        ParameterRange::linspace("c", -1.0, 1.0, n_c).unwrap(),
        ParameterRange::linspace("a", -1.0, 1.0, n_a).unwrap(),
        ParameterRange::linspace("ams", -1.0, 1.0, n_ams).unwrap(),
    )
}

/// Benchmark the full search on the same grid with different worker counts
fn bench_grid_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid_search");
    group.sample_size(10);

    let history = synthetic_history(400);
    let tend = history.end_time();
    let fitter = EtasFitter::new(
        &history,
        FitterOptions {
            tend,
            ..FitterOptions::default()
        },
    )
    .unwrap();
    let seed = SeedParams::new(1.08, 0.02, -1.8, 0.0, tend);
    let ranges = ranges(8, 6, 11, 11);
    group.throughput(Throughput::Elements(ranges.shape().n_cells() as u64));

    for threads in [1, 2, 4, 8] {
        group.bench_with_input(BenchmarkId::new("threads", threads), &threads, |b, &threads| {
            let search = GridSearch::new(&fitter, seed.clone(), ranges.clone())
                .with_options(SearchOptions::default().with_threads(threads));
            b.iter(|| black_box(search.run().unwrap()))
        });
    }

    group.finish();
}

/// Benchmark argmax and marginal reduction over the reference grid shape
fn bench_reducer(c: &mut Criterion) {
    let mut group = c.benchmark_group("reducer");

    let shape = GridShape::new(17, 31, 51, 51);
    let mut grid = OutputGrid::new(shape, 0.0);
    for idx in 0..shape.n_cells() {
        let coord = grid.coord_of(idx);
        let v = -((idx * 7919) % 1000) as f64 * 0.01;
        grid.set(coord, v);
    }
    group.throughput(Throughput::Elements(shape.n_cells() as u64));

    group.bench_function("find_max", |b| b.iter(|| black_box(find_max(black_box(&grid)))));

    for axis in [Axis::C, Axis::P] {
        group.bench_with_input(
            BenchmarkId::new("marginal", format!("{:?}", axis)),
            &axis,
            |b, &axis| {
                b.iter(|| {
                    black_box(marginal(black_box(&grid), axis, MarginalPolicy::LogLikelihood).unwrap())
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_grid_search, bench_reducer);
criterion_main!(benches);
