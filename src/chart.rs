use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use textplots::{Chart, Plot, Shape};

use crate::alert::AlertEvaluator;
use crate::cli::PairArgs;
use crate::constants::LIVE_TICK_DEPTH;
use crate::monitor::PairMonitor;
use crate::series::{closes, Observation};
use crate::stats::pair_analytics;
use crate::store::TickStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ChartSeries {
    #[default]
    Zscore,
    Spread,
    Correlation,
}

#[derive(Debug, Args, Clone)]
pub struct ChartArgs {
    #[command(flatten)]
    pub pair: PairArgs,

    /// Which derived series to plot
    #[arg(long, value_enum, default_value_t = ChartSeries::Zscore)]
    pub series: ChartSeries,

    /// Chart width in characters
    #[arg(long, default_value_t = 120)]
    pub width: u32,

    /// Chart height in characters
    #[arg(long, default_value_t = 30)]
    pub height: u32,
}

pub async fn run(store_path: &Path, args: ChartArgs) -> Result<()> {
    let config = args.pair.config()?;
    let store = TickStore::open(store_path)
        .with_context(|| format!("failed to open tick store {:?}; run `pairs-analytics run` first", store_path))?;
    let monitor = PairMonitor::new(Arc::new(store), AlertEvaluator::new(config.alert_threshold));

    let (bars_a, bars_b) = monitor.bars(&config, LIVE_TICK_DEPTH);
    let analytics = pair_analytics(&closes(&bars_a), &closes(&bars_b), config.window)?;
    let series = match args.series {
        ChartSeries::Zscore => &analytics.zscore,
        ChartSeries::Spread => &analytics.spread,
        ChartSeries::Correlation => &analytics.correlation,
    };
    if series.len() < 2 {
        bail!(
            "not enough bars to chart {} @ {}; need more than {} per leg",
            config.pair_label(),
            config.timeframe,
            config.window
        );
    }

    println!(
        "{:?} of {} @ {} ({} points, beta {:.4})",
        args.series,
        config.pair_label(),
        config.timeframe,
        series.len(),
        analytics.hedge.beta
    );
    let points = elapsed_minutes(series);
    if args.series == ChartSeries::Zscore {
        println!("alert band: ±{:.2}", config.alert_threshold);
    }
    render(&points, args.width, args.height);
    Ok(())
}

/// Minutes since the first point against value, for plotting.
fn elapsed_minutes(series: &[Observation]) -> Vec<(f32, f32)> {
    let Some(first) = series.first() else {
        return Vec::new();
    };
    series
        .iter()
        .map(|obs| {
            let minutes = (obs.timestamp_ms - first.timestamp_ms) as f64 / 60_000.0;
            (minutes as f32, obs.value as f32)
        })
        .collect()
}

fn render(points: &[(f32, f32)], width: u32, height: u32) {
    let max_x = points.last().map(|(x, _)| *x).unwrap_or_default().max(1e-3);
    Chart::new(width.max(40), height.max(10), 0.0, max_x)
        .lineplot(&Shape::Lines(points))
        .display();
    println!();
}
