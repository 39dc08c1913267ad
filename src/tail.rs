use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use clap::Args;

use crate::store::TickStore;
use crate::tick::Tick;

#[derive(Debug, Args, Clone)]
pub struct TailArgs {
    /// Filter ticks to a single symbol (e.g. BTCUSDT)
    #[arg(short, long)]
    pub symbol: Option<String>,

    /// Number of most recent ticks to print
    #[arg(short, long, default_value_t = 20)]
    pub limit: usize,
}

pub async fn run(store_path: &Path, args: TailArgs) -> Result<()> {
    let store = TickStore::open(store_path)
        .with_context(|| format!("failed to open tick store {:?}; run `pairs-analytics run` first", store_path))?;

    let symbol = args.symbol.as_deref().map(str::to_ascii_uppercase);
    let ticks = latest(&store, symbol.as_deref(), args.limit);
    if ticks.is_empty() {
        bail!("no ticks stored in {:?}", store_path);
    }

    println!("{} of {} stored ticks:", ticks.len(), store.count(symbol.as_deref()));
    for tick in &ticks {
        println!("{}", format_tick(tick));
    }
    Ok(())
}

/// Newest `limit` ticks across the selected symbols, oldest first.
fn latest(store: &TickStore, symbol: Option<&str>, limit: usize) -> Vec<Tick> {
    let symbols: Vec<String> = match symbol {
        Some(symbol) => vec![symbol.to_ascii_uppercase()],
        None => store.distinct_symbols().into_iter().collect(),
    };
    let mut ticks: Vec<Tick> = symbols
        .iter()
        .flat_map(|symbol| store.latest_ticks(symbol, limit))
        .collect();
    ticks.sort_by_key(|tick| tick.timestamp_ms);
    let skip = ticks.len().saturating_sub(limit);
    ticks.split_off(skip)
}

fn format_tick(tick: &Tick) -> String {
    let time = DateTime::<Utc>::from_timestamp_millis(tick.timestamp_ms as i64)
        .map(|time| time.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{:>24} | {:>12} | {:>14.4} | {:>12.6}",
        time, tick.symbol, tick.price, tick.quantity
    )
}
