//! Table exports. Every exported entity is first flattened into a [`Table`];
//! the format writers only ever see tables.

use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};

use crate::aggregator::Bar;
use crate::alert::Alert;
use crate::config::AnalyticsConfig;
use crate::constants::EXPORT_TICK_DEPTH;
use crate::error::{ConfigError, ExportError};
use crate::logging;
use crate::monitor::PairMonitor;
use crate::series::closes;
use crate::stats::pair_analytics;
use crate::tick::Tick;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
    NdJson,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::NdJson => "ndjson",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            "ndjson" | "jsonl" => Ok(ExportFormat::NdJson),
            _ => Err(ConfigError::Unknown {
                kind: "export format",
                value: value.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Int(u64),
    Float(f64),
    Text(String),
    Empty,
}

impl Cell {
    fn to_json(&self) -> Value {
        match self {
            Cell::Int(value) => json!(value),
            // serde_json maps non-finite floats to null
            Cell::Float(value) => json!(value),
            Cell::Text(value) => json!(value),
            Cell::Empty => Value::Null,
        }
    }

    fn to_field(&self) -> String {
        match self {
            Cell::Int(value) => value.to_string(),
            Cell::Float(value) if value.is_finite() => value.to_string(),
            Cell::Text(value) => value.clone(),
            Cell::Float(_) | Cell::Empty => String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub columns: Vec<&'static str>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn from_rows<R: TableRow>(name: impl Into<String>, rows: &[R]) -> Self {
        Self {
            name: name.into(),
            columns: R::columns().to_vec(),
            rows: rows.iter().map(TableRow::cells).collect(),
        }
    }

    fn records(&self) -> impl Iterator<Item = Map<String, Value>> + '_ {
        self.rows.iter().map(|row| {
            self.columns
                .iter()
                .zip(row)
                .map(|(column, cell)| (column.to_string(), cell.to_json()))
                .collect()
        })
    }
}

/// Flattening of one exported entity into a table row.
pub trait TableRow {
    fn columns() -> &'static [&'static str];
    fn cells(&self) -> Vec<Cell>;
}

fn iso_time(timestamp_ms: u64) -> Cell {
    match DateTime::<Utc>::from_timestamp_millis(timestamp_ms as i64) {
        Some(time) => Cell::Text(time.to_rfc3339_opts(SecondsFormat::Millis, true)),
        None => Cell::Empty,
    }
}

impl TableRow for Tick {
    fn columns() -> &'static [&'static str] {
        &["timestamp_ms", "time", "symbol", "price", "quantity"]
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::Int(self.timestamp_ms),
            iso_time(self.timestamp_ms),
            Cell::Text(self.symbol.clone()),
            Cell::Float(self.price),
            Cell::Float(self.quantity),
        ]
    }
}

/// A bar tagged with the symbol it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolBar {
    pub symbol: String,
    pub bar: Bar,
}

impl TableRow for SymbolBar {
    fn columns() -> &'static [&'static str] {
        &["period_start_ms", "time", "symbol", "open", "high", "low", "close", "volume"]
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::Int(self.bar.period_start_ms),
            iso_time(self.bar.period_start_ms),
            Cell::Text(self.symbol.clone()),
            Cell::Float(self.bar.open),
            Cell::Float(self.bar.high),
            Cell::Float(self.bar.low),
            Cell::Float(self.bar.close),
            Cell::Float(self.bar.volume),
        ]
    }
}

/// Spread and z-score at one bar; z-score is empty during warm-up.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticsRow {
    pub timestamp_ms: u64,
    pub spread: f64,
    pub zscore: Option<f64>,
}

impl TableRow for AnalyticsRow {
    fn columns() -> &'static [&'static str] {
        &["timestamp_ms", "time", "spread", "zscore"]
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::Int(self.timestamp_ms),
            iso_time(self.timestamp_ms),
            Cell::Float(self.spread),
            self.zscore.map_or(Cell::Empty, Cell::Float),
        ]
    }
}

impl TableRow for Alert {
    fn columns() -> &'static [&'static str] {
        &["timestamp_ms", "time", "symbol_pair", "zscore", "spread", "signal"]
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::Int(self.timestamp_ms),
            iso_time(self.timestamp_ms),
            Cell::Text(self.symbol_pair.clone()),
            Cell::Float(self.zscore),
            Cell::Float(self.spread),
            Cell::Text(self.side.to_string()),
        ]
    }
}

/// Which tables [`collect_tables`] builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportSelection {
    pub ticks: bool,
    pub bars: bool,
    pub analytics: bool,
    pub alerts: bool,
}

impl Default for ExportSelection {
    fn default() -> Self {
        Self {
            ticks: true,
            bars: true,
            analytics: true,
            alerts: true,
        }
    }
}

/// Build the selected tables for the configured pair. Analytics are left out
/// when there are too few bars to compute them.
pub fn collect_tables(monitor: &PairMonitor, config: &AnalyticsConfig, selection: ExportSelection) -> Vec<Table> {
    let mut tables = Vec::new();

    if selection.ticks {
        let mut ticks = monitor.latest_ticks(&config.symbol_a, EXPORT_TICK_DEPTH);
        ticks.extend(monitor.latest_ticks(&config.symbol_b, EXPORT_TICK_DEPTH));
        tables.push(Table::from_rows("ticks", &ticks));
    }

    let (bars_a, bars_b) = monitor.bars(config, EXPORT_TICK_DEPTH);
    if selection.bars {
        let tagged: Vec<SymbolBar> = [(&config.symbol_a, &bars_a), (&config.symbol_b, &bars_b)]
            .into_iter()
            .flat_map(|(symbol, bars)| {
                bars.iter().map(move |bar| SymbolBar {
                    symbol: symbol.clone(),
                    bar: *bar,
                })
            })
            .collect();
        tables.push(Table::from_rows(format!("ohlc_{}", config.timeframe.label()), &tagged));
    }

    if selection.analytics {
        match pair_analytics(&closes(&bars_a), &closes(&bars_b), config.window) {
            Ok(analytics) => {
                let mut zscores = analytics.zscore.iter().peekable();
                let rows: Vec<AnalyticsRow> = analytics
                    .spread
                    .iter()
                    .map(|point| {
                        let zscore = zscores
                            .next_if(|z| z.timestamp_ms == point.timestamp_ms)
                            .map(|z| z.value);
                        AnalyticsRow {
                            timestamp_ms: point.timestamp_ms,
                            spread: point.value,
                            zscore,
                        }
                    })
                    .collect();
                tables.push(Table::from_rows("analytics", &rows));
            }
            Err(err) => logging::warn(
                "export.analytics_skipped",
                "Analytics table not exported",
                json!({ "error": err.to_string() }),
            ),
        }
    }

    if selection.alerts {
        tables.push(Table::from_rows("alerts", monitor.alerts().history()));
    }

    tables
}

/// Write `tables` under `dir` and return the created paths.
pub fn write_tables(
    tables: &[Table],
    format: ExportFormat,
    dir: &Path,
    stem: &str,
) -> Result<Vec<PathBuf>, ExportError> {
    fs::create_dir_all(dir)?;
    let paths = match format {
        ExportFormat::Csv => tables
            .iter()
            .map(|table| {
                let path = dir.join(format!("{stem}_{}.csv", table.name));
                write_csv(table, &path)?;
                Ok(path)
            })
            .collect::<Result<Vec<_>, ExportError>>()?,
        ExportFormat::Json => {
            let path = dir.join(format!("{stem}.json"));
            write_json(tables, &path)?;
            vec![path]
        }
        ExportFormat::NdJson => {
            let path = dir.join(format!("{stem}.ndjson"));
            write_ndjson(tables, &path)?;
            vec![path]
        }
    };

    logging::info(
        "export.written",
        "Export files written",
        json!({
            "format": format.extension(),
            "tables": tables.len(),
            "files": paths.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
        }),
    );
    Ok(paths)
}

fn write_csv(table: &Table, path: &Path) -> Result<(), ExportError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&table.columns)?;
    for row in &table.rows {
        writer.write_record(row.iter().map(Cell::to_field))?;
    }
    writer.flush()?;
    Ok(())
}

fn write_json(tables: &[Table], path: &Path) -> Result<(), ExportError> {
    let document: Map<String, Value> = tables
        .iter()
        .map(|table| (table.name.clone(), Value::Array(table.records().map(Value::Object).collect())))
        .collect();
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, &document)?;
    writer.flush()?;
    Ok(())
}

fn write_ndjson(tables: &[Table], path: &Path) -> Result<(), ExportError> {
    let mut writer = BufWriter::new(File::create(path)?);
    for table in tables {
        for mut record in table.records() {
            record.insert("table".to_string(), Value::String(table.name.clone()));
            serde_json::to_writer(&mut writer, &record)?;
            writer.write_all(b"\n")?;
        }
    }
    writer.flush()?;
    Ok(())
}
