use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use serde_json::json;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};

use crate::alert::AlertEvaluator;
use crate::cli::PairArgs;
use crate::config::{AnalyticsConfig, FeedConfig};
use crate::constants::{REFRESH_INTERVAL_MS, SIMULATOR_TICK_INTERVAL_MS};
use crate::error::AnalyticsError;
use crate::feed::{binance, FeedCoordinator, TradeFrames};
use crate::logging;
use crate::monitor::PairMonitor;
use crate::series::Observation;
use crate::simulator::{self, SimulatorConfig};
use crate::store::TickStore;

#[derive(Debug, Args, Clone)]
pub struct LiveArgs {
    #[command(flatten)]
    pub pair: PairArgs,

    /// Stop after this many seconds instead of waiting for a signal
    #[arg(short, long)]
    pub duration_secs: Option<u64>,

    /// Milliseconds between analytics refreshes
    #[arg(long, default_value_t = REFRESH_INTERVAL_MS)]
    pub refresh_ms: u64,
}

impl Default for LiveArgs {
    fn default() -> Self {
        Self {
            pair: PairArgs::default(),
            duration_secs: None,
            refresh_ms: REFRESH_INTERVAL_MS,
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub live: LiveArgs,

    /// Seed for a reproducible price path
    #[arg(long)]
    pub seed: Option<u64>,

    /// Milliseconds between synthetic trades
    #[arg(long, default_value_t = SIMULATOR_TICK_INTERVAL_MS)]
    pub tick_ms: u64,
}

/// Live exchange ingestion for both legs of the pair.
pub async fn run(store_path: &Path, args: LiveArgs) -> Result<()> {
    let config = args.pair.config()?;
    let mut feeds = Vec::new();
    for symbol in [&config.symbol_a, &config.symbol_b] {
        let frames = binance::trade_stream(symbol).await?;
        feeds.push((symbol.clone(), frames));
    }
    run_session(store_path, config, &args, feeds).await
}

pub async fn simulate(store_path: &Path, args: SimulateArgs) -> Result<()> {
    let config = args.live.pair.config()?;
    let feeds = simulator::spawn_feed(SimulatorConfig {
        symbol_a: config.symbol_a.clone(),
        symbol_b: config.symbol_b.clone(),
        tick_interval: Duration::from_millis(args.tick_ms.max(1)),
        seed: args.seed,
        ..SimulatorConfig::default()
    });
    run_session(store_path, config, &args.live, feeds).await
}

async fn run_session(
    store_path: &Path,
    config: AnalyticsConfig,
    args: &LiveArgs,
    feeds: Vec<(String, TradeFrames)>,
) -> Result<()> {
    let feed_config = FeedConfig {
        symbols: feeds.iter().map(|(symbol, _)| symbol.clone()).collect(),
        store_path: store_path.to_path_buf(),
        ..FeedConfig::default()
    };
    let store = Arc::new(
        TickStore::open(&feed_config.store_path)
            .with_context(|| format!("failed to open tick store {:?}", feed_config.store_path))?,
    );
    logging::info(
        "session.start",
        "Pair session starting",
        json!({
            "pair": config.pair_label(),
            "symbols": feed_config.symbols,
            "store": feed_config.store_path.display().to_string(),
            "stored_ticks": store.count(None),
        }),
    );

    let mut coordinator = FeedCoordinator::new(store.clone(), feed_config.flush_interval);
    coordinator.start();
    for (symbol, frames) in feeds {
        coordinator.subscribe(&symbol, frames);
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let signals_task = tokio::spawn(handle_signals(shutdown_tx.clone()));
    let deadline_task = args.duration_secs.map(|secs| {
        let shutdown_tx = shutdown_tx.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_secs(secs)).await;
            logging::info("session.deadline", "Session duration elapsed", json!({ "secs": secs }));
            let _ = shutdown_tx.send(true);
        })
    });

    let mut monitor = PairMonitor::new(store, AlertEvaluator::new(config.alert_threshold));
    run_refresh_loop(&mut monitor, &coordinator, &config, Duration::from_millis(args.refresh_ms.max(1)), shutdown_rx).await;

    signals_task.abort();
    if let Some(task) = deadline_task {
        task.abort();
    }
    coordinator.stop().await;

    logging::info(
        "session.stop",
        "Pair session stopped",
        json!({
            "feeds": coordinator.stats(),
            "stored_ticks": monitor.tick_count(None),
            "alerts": monitor.alerts().history().len(),
        }),
    );
    Ok(())
}

async fn run_refresh_loop(
    monitor: &mut PairMonitor,
    coordinator: &FeedCoordinator,
    config: &AnalyticsConfig,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => report(monitor, config, &coordinator.closed_symbols()),
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

fn report(monitor: &mut PairMonitor, config: &AnalyticsConfig, closed: &[String]) {
    match monitor.refresh(config, logging::now_ms()) {
        Ok(snapshot) => {
            let latest = |series: Option<Observation>| series.map(|obs| obs.value);
            logging::info(
                "pair.snapshot",
                "Pair analytics refreshed",
                json!({
                    "pair": snapshot.symbol_pair,
                    "timeframe": config.timeframe.label(),
                    "bars": snapshot.bars_a.min(snapshot.bars_b),
                    "beta": snapshot.analytics.hedge.beta,
                    "alpha": snapshot.analytics.hedge.alpha,
                    "spread": latest(snapshot.analytics.latest_spread()),
                    "zscore": latest(snapshot.analytics.latest_zscore()),
                    "correlation": latest(snapshot.analytics.latest_correlation()),
                    "alert": snapshot.alert.as_ref().map(|alert| alert.side.to_string()),
                    "closed_legs": closed,
                }),
            );
        }
        Err(AnalyticsError::InsufficientData { required, available }) if closed.is_empty() => logging::info(
            "pair.waiting",
            "Not enough bars for analytics yet",
            json!({ "required": required, "available": available }),
        ),
        Err(AnalyticsError::InsufficientData { required, available }) => logging::warn(
            "pair.waiting",
            "Not enough bars and a trade stream has closed",
            json!({ "required": required, "available": available, "closed_legs": closed }),
        ),
        Err(err) => logging::warn(
            "pair.refresh_failed",
            "Pair analytics refresh failed",
            json!({ "error": err.to_string() }),
        ),
    }
}

async fn handle_signals(shutdown_tx: watch::Sender<bool>) -> Result<()> {
    let mut sigterm = signal(SignalKind::terminate()).context("failed to register SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("failed to register SIGINT handler")?;

    let name = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    logging::info(
        "signal.received",
        "Shutdown signal received, flushing buffered ticks",
        json!({ "signal": name }),
    );
    let _ = shutdown_tx.send(true);
    Ok(())
}
