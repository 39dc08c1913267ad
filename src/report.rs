use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use serde_json::json;

use crate::alert::AlertEvaluator;
use crate::cli::PairArgs;
use crate::constants::EXPORT_TICK_DEPTH;
use crate::export::{collect_tables, write_tables, ExportFormat, ExportSelection};
use crate::logging;
use crate::monitor::PairMonitor;
use crate::stats::SummaryStats;
use crate::store::TickStore;

#[derive(Debug, Args, Clone)]
pub struct StatsArgs {
    #[command(flatten)]
    pub pair: PairArgs,

    /// Print one JSON document instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args, Clone)]
pub struct ExportArgs {
    #[command(flatten)]
    pub pair: PairArgs,

    /// csv, json or ndjson
    #[arg(short, long, default_value = "csv")]
    pub format: ExportFormat,

    /// Directory the files are written to
    #[arg(short, long, default_value = ".")]
    pub out_dir: PathBuf,

    /// File name prefix; defaults to the pair and timeframe
    #[arg(long)]
    pub stem: Option<String>,

    /// Tables to include
    #[arg(long, value_delimiter = ',', default_value = "ticks,bars,analytics,alerts")]
    pub tables: Vec<String>,
}

impl ExportArgs {
    pub fn selection(&self) -> ExportSelection {
        let wants = |name: &str| self.tables.iter().any(|table| table.trim().eq_ignore_ascii_case(name));
        ExportSelection {
            ticks: wants("ticks"),
            bars: wants("bars"),
            analytics: wants("analytics"),
            alerts: wants("alerts"),
        }
    }
}

fn open_monitor(store_path: &Path, threshold: f64) -> Result<PairMonitor> {
    let store = TickStore::open(store_path)
        .with_context(|| format!("failed to open tick store {:?}", store_path))?;
    Ok(PairMonitor::new(Arc::new(store), AlertEvaluator::new(threshold)))
}

pub async fn stats(store_path: &Path, args: StatsArgs) -> Result<()> {
    let config = args.pair.config()?;
    if args.json {
        logging::set_silent(true);
    }
    let mut monitor = open_monitor(store_path, config.alert_threshold)?;

    let summaries = monitor.summaries(&config);
    let stationarity = monitor.stationarity(&config);
    let snapshot = monitor.refresh(&config, logging::now_ms());

    if args.json {
        let document = json!({
            "pair": config.pair_label(),
            "timeframe": config.timeframe.label(),
            "summaries": { (config.symbol_a.clone()): summaries.a, (config.symbol_b.clone()): summaries.b },
            "hedge": snapshot.as_ref().ok().map(|s| s.analytics.hedge),
            "zscore": snapshot.as_ref().ok().and_then(|s| s.analytics.latest_zscore()).map(|obs| obs.value),
            "stationarity": stationarity.as_ref().ok(),
            "errors": [snapshot.as_ref().err().map(ToString::to_string), stationarity.as_ref().err().map(ToString::to_string)],
        });
        println!("{}", serde_json::to_string_pretty(&document)?);
        return Ok(());
    }

    println!("{} @ {} ({} ticks stored)", config.pair_label(), config.timeframe, monitor.tick_count(None));
    println!("{:>10} | {:>6} | {:>12} | {:>12} | {:>12} | {:>12} | {:>10}", "symbol", "bars", "mean", "std", "min", "max", "ret std");
    print_summary(&config.symbol_a, &summaries.a);
    print_summary(&config.symbol_b, &summaries.b);

    match &snapshot {
        Ok(snapshot) => {
            let hedge = snapshot.analytics.hedge;
            println!("hedge ratio  beta={:.6} alpha={:.6} r2={:.4}", hedge.beta, hedge.alpha, hedge.r_squared);
            if let Some(z) = snapshot.analytics.latest_zscore() {
                println!("latest z     {:+.4}", z.value);
            }
        }
        Err(err) => println!("analytics    unavailable: {err}"),
    }

    match &stationarity {
        Ok(result) => println!(
            "ADF          stat={:.4} p={:.4} lag={} nobs={} crit(1%/5%/10%)={:.3}/{:.3}/{:.3} -> {}",
            result.adf_statistic,
            result.p_value,
            result.used_lag,
            result.n_observations,
            result.critical_values.one_pct,
            result.critical_values.five_pct,
            result.critical_values.ten_pct,
            if result.is_stationary { "stationary" } else { "not stationary" }
        ),
        Err(err) => println!("ADF          unavailable: {err}"),
    }
    Ok(())
}

fn print_summary(symbol: &str, stats: &SummaryStats) {
    println!(
        "{:>10} | {:>6} | {:>12.4} | {:>12.4} | {:>12.4} | {:>12.4} | {:>10.6}",
        symbol, stats.count, stats.mean, stats.std, stats.min, stats.max, stats.returns_std
    );
}

pub async fn export(store_path: &Path, args: ExportArgs) -> Result<()> {
    let config = args.pair.config()?;
    let mut monitor = open_monitor(store_path, config.alert_threshold)?;
    let selection = args.selection();

    if selection.alerts {
        if let Err(err) = monitor.replay_alerts(&config, EXPORT_TICK_DEPTH) {
            logging::warn(
                "export.alerts_skipped",
                "Alert history not rebuilt",
                json!({ "error": err.to_string() }),
            );
        }
    }

    let tables = collect_tables(&monitor, &config, selection);
    let stem = args.stem.clone().unwrap_or_else(|| {
        format!("{}_{}_{}", config.symbol_a, config.symbol_b, config.timeframe).to_ascii_lowercase()
    });
    let paths = write_tables(&tables, args.format, &args.out_dir, &stem)?;
    for path in paths {
        println!("{}", path.display());
    }
    Ok(())
}
