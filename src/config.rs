use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::aggregator::Timeframe;
use crate::constants::{
    DEFAULT_ALERT_THRESHOLD, DEFAULT_SYMBOL_A, DEFAULT_SYMBOL_B, DEFAULT_WINDOW, FLUSH_INTERVAL_MS,
    MAX_ALERT_THRESHOLD, MAX_WINDOW, MIN_ALERT_THRESHOLD, MIN_WINDOW, STORE_PATH,
};
use crate::error::ConfigError;

/// Request-scoped analytics settings, passed into every refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    pub symbol_a: String,
    pub symbol_b: String,
    pub timeframe: Timeframe,
    pub window: usize,
    pub alert_threshold: f64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            symbol_a: DEFAULT_SYMBOL_A.to_string(),
            symbol_b: DEFAULT_SYMBOL_B.to_string(),
            timeframe: Timeframe::default(),
            window: DEFAULT_WINDOW,
            alert_threshold: DEFAULT_ALERT_THRESHOLD,
        }
    }
}

impl AnalyticsConfig {
    pub fn pair_label(&self) -> String {
        format!("{}/{}", self.symbol_a, self.symbol_b)
    }

    /// Uppercase the symbols and check the bounded fields.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        self.symbol_a = normalise_symbol(&self.symbol_a)?;
        self.symbol_b = normalise_symbol(&self.symbol_b)?;
        if self.symbol_a == self.symbol_b {
            return Err(ConfigError::SameSymbol(self.symbol_a));
        }
        if !(MIN_WINDOW..=MAX_WINDOW).contains(&self.window) {
            return Err(ConfigError::Window {
                value: self.window,
                min: MIN_WINDOW,
                max: MAX_WINDOW,
            });
        }
        if !(MIN_ALERT_THRESHOLD..=MAX_ALERT_THRESHOLD).contains(&self.alert_threshold) {
            return Err(ConfigError::Threshold {
                value: self.alert_threshold,
                min: MIN_ALERT_THRESHOLD,
                max: MAX_ALERT_THRESHOLD,
            });
        }
        Ok(self)
    }
}

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub symbols: Vec<String>,
    pub store_path: PathBuf,
    pub flush_interval: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            symbols: vec![DEFAULT_SYMBOL_A.to_string(), DEFAULT_SYMBOL_B.to_string()],
            store_path: PathBuf::from(STORE_PATH),
            flush_interval: Duration::from_millis(FLUSH_INTERVAL_MS),
        }
    }
}

pub fn normalise_symbol(symbol: &str) -> Result<String, ConfigError> {
    let symbol = symbol.trim().to_ascii_uppercase();
    if symbol.is_empty() {
        return Err(ConfigError::EmptySymbol);
    }
    Ok(symbol)
}
