use std::sync::Arc;
use std::time::Duration;

use pairs_analytics::aggregator::Timeframe;
use pairs_analytics::alert::AlertEvaluator;
use pairs_analytics::config::AnalyticsConfig;
use pairs_analytics::export::{collect_tables, write_tables, ExportFormat, ExportSelection};
use pairs_analytics::feed::FeedCoordinator;
use pairs_analytics::logging;
use pairs_analytics::monitor::PairMonitor;
use pairs_analytics::series::values;
use pairs_analytics::simulator::trade_frame;
use pairs_analytics::store::TickStore;
use pairs_analytics::tick::Tick;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const START_MS: u64 = 1_700_000_000_000;

fn pair_ticks(seconds: u64, seed: u64) -> Vec<Tick> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut ticks = Vec::with_capacity(seconds as usize * 2);
    for i in 0..seconds {
        let ts = START_MS + i * 1_000 + rng.gen_range(0..900);
        let price_b = 100.0 + rng.gen_range(-2.0..2.0);
        let price_a = 2.0 * price_b + 5.0 + rng.gen_range(-0.1..0.1);
        ticks.push(Tick::new("BTCUSDT", ts, price_a, rng.gen_range(0.01..1.0)));
        ticks.push(Tick::new("ETHUSDT", ts, price_b, rng.gen_range(0.01..1.0)));
    }
    ticks
}

fn per_second() -> AnalyticsConfig {
    AnalyticsConfig {
        timeframe: Timeframe::Second,
        ..AnalyticsConfig::default()
    }
    .validated()
    .expect("valid config")
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, var.sqrt())
}

#[test]
fn cointegrated_pair_recovers_hedge_ratio_and_unit_zscore() {
    logging::set_silent(true);
    let store = Arc::new(TickStore::in_memory());
    store.append(&pair_ticks(1_000, 42)).expect("append");

    let mut monitor = PairMonitor::new(store, AlertEvaluator::new(2.0));
    let config = per_second();
    let snapshot = monitor.refresh(&config, START_MS + 1_000_000).expect("snapshot");

    assert_eq!(snapshot.bars_a, 1_000);
    assert_eq!(snapshot.bars_b, 1_000);
    let hedge = snapshot.analytics.hedge;
    assert!((hedge.beta - 2.0).abs() < 0.02, "{hedge:?}");
    assert!((hedge.alpha - 5.0).abs() < 2.5, "{hedge:?}");
    assert!(hedge.r_squared > 0.99, "{hedge:?}");

    let zscores = values(&snapshot.analytics.zscore);
    assert_eq!(zscores.len(), 1_000 - config.window + 1);
    let (mean, std) = mean_std(&zscores);
    assert!(mean.abs() < 0.15, "z-score mean {mean}");
    assert!((0.7..1.3).contains(&std), "z-score std {std}");

    let stationarity = monitor.stationarity(&config).expect("adf");
    assert!(stationarity.is_stationary, "{stationarity:?}");
}

#[test]
fn export_round_trips_pipeline_tables() {
    logging::set_silent(true);
    let store = Arc::new(TickStore::in_memory());
    store.append(&pair_ticks(120, 7)).expect("append");
    let mut monitor = PairMonitor::new(store, AlertEvaluator::new(1.0));
    let config = AnalyticsConfig {
        alert_threshold: 1.0,
        ..per_second()
    };
    monitor.replay_alerts(&config, 10_000).expect("replay");

    let tables = collect_tables(&monitor, &config, ExportSelection::default());
    let names: Vec<&str> = tables.iter().map(|table| table.name.as_str()).collect();
    assert_eq!(names, vec!["ticks", "ohlc_1s", "analytics", "alerts"]);
    assert_eq!(tables[0].rows.len(), 240);
    assert_eq!(tables[1].rows.len(), 240);
    assert_eq!(tables[2].rows.len(), 120);
    assert_eq!(tables[3].rows.len(), monitor.alerts().history().len());

    let dir = std::env::temp_dir().join(format!("pairs-pipeline-export-{}", std::process::id()));
    let paths = write_tables(&tables, ExportFormat::Json, &dir, "pair").expect("export");
    let document: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&paths[0]).expect("read")).expect("json");
    assert_eq!(document["analytics"].as_array().map(Vec::len), Some(120));
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn frames_flow_from_feed_to_snapshot() {
    logging::set_silent(true);
    let store = Arc::new(TickStore::in_memory());
    let mut coordinator = FeedCoordinator::new(store.clone(), Duration::from_millis(20));
    coordinator.start();

    let ticks = pair_ticks(60, 9);
    for symbol in ["BTCUSDT", "ETHUSDT"] {
        let frames: Vec<_> = ticks
            .iter()
            .filter(|tick| tick.symbol == symbol)
            .map(|tick| Ok(trade_frame(tick)))
            .collect();
        coordinator.subscribe(symbol, Box::pin(futures_util::stream::iter(frames)));
    }

    for _ in 0..100 {
        if store.count(None) == 120 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    coordinator.stop().await;
    assert_eq!(store.count(None), 120);

    let mut monitor = PairMonitor::new(store, AlertEvaluator::new(2.0));
    let snapshot = monitor.refresh(&per_second(), START_MS).expect("snapshot");
    assert_eq!(snapshot.bars_a, 60);
    assert!((snapshot.analytics.hedge.beta - 2.0).abs() < 0.05);
}
