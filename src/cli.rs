use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::aggregator::Timeframe;
use crate::chart::ChartArgs;
use crate::config::AnalyticsConfig;
use crate::constants::{DEFAULT_ALERT_THRESHOLD, DEFAULT_SYMBOL_A, DEFAULT_SYMBOL_B, DEFAULT_WINDOW, STORE_PATH};
use crate::error::ConfigError;
use crate::live::{LiveArgs, SimulateArgs};
use crate::report::{ExportArgs, StatsArgs};
use crate::tail::TailArgs;

#[derive(Debug, Parser)]
#[command(author, version, about = "Real-time pairs trading analytics")]
pub struct Cli {
    /// Tick journal to append to and read from
    #[arg(long, global = true, default_value = STORE_PATH)]
    pub store: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

impl Cli {
    pub fn command(self) -> (PathBuf, Command) {
        (self.store, self.command.unwrap_or_default())
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Ingest live exchange trades and refresh pair analytics
    Run(LiveArgs),
    /// Same loop over a synthetic cointegrated pair
    Simulate(SimulateArgs),
    /// Print summary statistics and a stationarity test over stored ticks
    Stats(StatsArgs),
    /// Print the latest stored ticks
    Tail(TailArgs),
    /// Render the spread z-score as an ASCII chart
    Chart(ChartArgs),
    /// Write ticks, bars, analytics and alerts to files
    Export(ExportArgs),
}

impl Default for Command {
    fn default() -> Self {
        Command::Run(LiveArgs::default())
    }
}

/// Pair selection and analytics knobs shared by most commands.
#[derive(Debug, Args, Clone)]
pub struct PairArgs {
    /// First leg (the regressand)
    #[arg(short = 'a', long, default_value = DEFAULT_SYMBOL_A)]
    pub symbol_a: String,

    /// Second leg (the regressor)
    #[arg(short = 'b', long, default_value = DEFAULT_SYMBOL_B)]
    pub symbol_b: String,

    /// Bar width: 1s, 1m or 5m
    #[arg(short, long, default_value = "1m")]
    pub timeframe: Timeframe,

    /// Rolling window in bars (5..=100)
    #[arg(short, long, default_value_t = DEFAULT_WINDOW)]
    pub window: usize,

    /// Absolute z-score that raises an alert (1.0..=4.0)
    #[arg(long, default_value_t = DEFAULT_ALERT_THRESHOLD)]
    pub threshold: f64,
}

impl Default for PairArgs {
    fn default() -> Self {
        let defaults = AnalyticsConfig::default();
        Self {
            symbol_a: defaults.symbol_a,
            symbol_b: defaults.symbol_b,
            timeframe: defaults.timeframe,
            window: defaults.window,
            threshold: defaults.alert_threshold,
        }
    }
}

impl PairArgs {
    pub fn config(&self) -> Result<AnalyticsConfig, ConfigError> {
        AnalyticsConfig {
            symbol_a: self.symbol_a.clone(),
            symbol_b: self.symbol_b.clone(),
            timeframe: self.timeframe,
            window: self.window,
            alert_threshold: self.threshold,
        }
        .validated()
    }
}
