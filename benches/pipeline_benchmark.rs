use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use pairs_analytics::aggregator::{aggregate, Timeframe};
use pairs_analytics::logging;
use pairs_analytics::series::closes;
use pairs_analytics::simulator::{synthetic_pair_ticks, SimulatorConfig};
use pairs_analytics::stats::{pair_analytics, rolling_zscore, stationarity_test};
use pairs_analytics::tick::Tick;

const STEPS: usize = 50_000;

fn seeded_ticks() -> Vec<Tick> {
    let config = SimulatorConfig {
        seed: Some(0xBADF00D),
        ..SimulatorConfig::default()
    };
    synthetic_pair_ticks(config, STEPS, 1_700_000_000_000, 200)
}

fn bench_aggregation(c: &mut Criterion) {
    logging::set_silent(true);
    let ticks = seeded_ticks();

    let mut group = c.benchmark_group("aggregation");
    group.throughput(Throughput::Elements(ticks.len() as u64));
    for timeframe in Timeframe::ALL {
        group.bench_function(timeframe.label(), |b| {
            b.iter(|| aggregate(black_box(&ticks), timeframe.interval()))
        });
    }
    group.finish();
}

fn bench_rolling_stats(c: &mut Criterion) {
    logging::set_silent(true);
    let ticks = seeded_ticks();
    let (leg_a, leg_b): (Vec<Tick>, Vec<Tick>) = ticks.into_iter().partition(|tick| tick.symbol == "BTCUSDT");
    let a = closes(&aggregate(&leg_a, Duration::from_secs(1)));
    let b = closes(&aggregate(&leg_b, Duration::from_secs(1)));

    let mut group = c.benchmark_group("rolling_stats");
    group.throughput(Throughput::Elements(a.len() as u64));
    group.bench_function("zscore_w100", |bench| {
        bench.iter(|| rolling_zscore(black_box(&a), 100).expect("zscore"))
    });
    group.bench_function("pair_analytics_w20", |bench| {
        bench.iter(|| pair_analytics(black_box(&a), black_box(&b), 20).expect("analytics"))
    });
    group.sample_size(20);
    group.bench_function("adf", |bench| {
        bench.iter(|| stationarity_test(black_box(&a[..2_000])).expect("adf"))
    });
    group.finish();
}

criterion_group!(benches, bench_aggregation, bench_rolling_stats);
criterion_main!(benches);
