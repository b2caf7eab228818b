//! Criterion benchmarks for screening hot paths.
//!
//! Benchmarks:
//! 1. Indicator engine (snapshot history over one year of bars)
//! 2. Gate pipeline evaluation on a precomputed history
//! 3. Cohort ranking over a synthetic universe

use std::collections::BTreeMap;

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use screenlab_core::cohort::{CohortConfig, CohortRanker, Memberships};
use screenlab_core::data::{DataStore, SyntheticUniverse};
use screenlab_core::domain::{Bar, InstrumentRef};
use screenlab_core::engine::IndicatorEngine;
use screenlab_core::gates::*;

fn make_bars(n: usize) -> Vec<Bar> {
    let base_date = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
    let mut prev = 20.0;
    (0..n)
        .map(|i| {
            let close = 20.0 + (i as f64 * 0.1).sin() * 2.0;
            let bar = Bar {
                instrument: "600000.SH".into(),
                date: base_date + chrono::Duration::days(i as i64),
                open: prev,
                high: prev.max(close) + 0.2,
                low: prev.min(close) - 0.2,
                close,
                pre_close: Some(prev),
                pct_change: None,
                volume: 1_000_000.0 + (i % 500) as f64 * 1000.0,
                amount: 2.0e7,
            };
            prev = close;
            bar
        })
        .collect()
}

fn bench_engine(c: &mut Criterion) {
    let mut group = c.benchmark_group("indicator_engine");
    let engine = IndicatorEngine::new(20);
    for n in [60usize, 250, 1000] {
        let bars = make_bars(n);
        group.bench_with_input(BenchmarkId::new("compute", n), &bars, |b, bars| {
            b.iter(|| engine.compute(black_box(bars)))
        });
    }
    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let history = IndicatorEngine::new(20).compute(&make_bars(60)).unwrap();
    let reference = InstrumentRef::bare("600000.SH");
    let pipeline = GatePipeline::new(vec![
        Box::new(ExcludeBoards::new(ExcludeBoardsParams::default())),
        Box::new(MinPrice::new(MinPriceParams::default())),
        Box::new(NotSpecialTreatment),
        Box::new(TrendIntact::new(TrendIntactParams::default())),
        Box::new(VolumeShrinkage::new(VolumeShrinkageParams::default())),
        Box::new(PriorSurge::new(PriorSurgeParams::default())),
    ])
    .unwrap();

    c.bench_function("gate_pipeline_6_gates", |b| {
        b.iter(|| {
            let input = GateInput::new(&reference, &history).unwrap();
            pipeline.evaluate(black_box(&input))
        })
    });
}

fn bench_cohort(c: &mut Criterion) {
    let store = SyntheticUniverse::new(7, 1000, 30).build();
    let ids = store.instruments().unwrap();
    let observations: BTreeMap<String, f64> = store
        .bars()
        .iter()
        .filter_map(|(id, bars)| bars.last().and_then(Bar::change_pct).map(|c| (id.clone(), c)))
        .collect();
    let reference = store.get_reference(&ids).unwrap();
    let themes = store.get_group_memberships(&ids).unwrap();
    let ranker = CohortRanker::new(CohortConfig::default());

    c.bench_function("cohort_rank_1000", |b| {
        b.iter(|| {
            let memberships = Memberships::from_sources(&reference, &themes);
            ranker.rank_observations(black_box(&observations), memberships)
        })
    });
}

criterion_group!(benches, bench_engine, bench_pipeline, bench_cohort);
criterion_main!(benches);
