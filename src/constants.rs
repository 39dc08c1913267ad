pub const STORE_PATH: &str = "ticks.ndjson";
pub const BINANCE_STREAM_URL: &str = "wss://fstream.binance.com/ws";
pub const DEFAULT_SYMBOL_A: &str = "BTCUSDT";
pub const DEFAULT_SYMBOL_B: &str = "ETHUSDT";

pub const FLUSH_INTERVAL_MS: u64 = 1_000;
pub const REFRESH_INTERVAL_MS: u64 = 2_000;
pub const SIMULATOR_TICK_INTERVAL_MS: u64 = 100;

pub const ALERT_DEBOUNCE_MS: u64 = 5_000;
pub const ALERT_VIEW_LEN: usize = 20;

pub const DEFAULT_WINDOW: usize = 20;
pub const MIN_WINDOW: usize = 5;
pub const MAX_WINDOW: usize = 100;
pub const DEFAULT_ALERT_THRESHOLD: f64 = 2.0;
pub const MIN_ALERT_THRESHOLD: f64 = 1.0;
pub const MAX_ALERT_THRESHOLD: f64 = 4.0;

pub const ADF_MIN_OBSERVATIONS: usize = 50;
pub const STATIONARITY_P_VALUE: f64 = 0.05;

pub const LIVE_TICK_DEPTH: usize = 5_000;
pub const EXPORT_TICK_DEPTH: usize = 10_000;
