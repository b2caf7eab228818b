//! Criterion benchmarks for full screening runs.
//!
//! Benchmarks:
//! 1. One preset over synthetic universes of growing size, serial
//! 2. The same run on a four-worker pool

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use screenlab_core::data::SyntheticUniverse;
use screenlab_runner::{Screener, Strategy, StrategyPreset};

fn bench_screen(c: &mut Criterion) {
    let mut group = c.benchmark_group("screen_strong_pullback");
    group.sample_size(20);
    for n in [200usize, 1000] {
        let store = SyntheticUniverse::new(42, n, 120).build();
        for workers in [1usize, 4] {
            let strategy =
                Strategy::from_config(StrategyPreset::StrongPullback.config().with_workers(workers))
                    .unwrap();
            group.bench_with_input(
                BenchmarkId::new(format!("workers_{workers}"), n),
                &strategy,
                |b, strategy| b.iter(|| Screener::new(&store).run(strategy).unwrap()),
            );
        }
    }
    group.finish();
}

fn bench_sector_screen(c: &mut Criterion) {
    let store = SyntheticUniverse::new(42, 1000, 120).build();
    let strategy = Strategy::from_config(StrategyPreset::StrongSectorPullback.config()).unwrap();
    c.bench_function("screen_strong_sector_pullback_1000", |b| {
        b.iter(|| Screener::new(&store).run(&strategy).unwrap())
    });
}

criterion_group!(benches, bench_screen, bench_sector_screen);
criterion_main!(benches);
