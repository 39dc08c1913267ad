use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::constants::{ALERT_DEBOUNCE_MS, ALERT_VIEW_LEN};
use crate::logging;

/// Which way the spread is stretched when an alert fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSide {
    /// Spread rich: sell leg A, buy leg B.
    ShortSpread,
    /// Spread cheap: buy leg A, sell leg B.
    LongSpread,
}

impl AlertSide {
    pub fn from_zscore(zscore: f64) -> Self {
        if zscore > 0.0 {
            AlertSide::ShortSpread
        } else {
            AlertSide::LongSpread
        }
    }
}

impl fmt::Display for AlertSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertSide::ShortSpread => f.write_str("SELL spread"),
            AlertSide::LongSpread => f.write_str("BUY spread"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub timestamp_ms: u64,
    pub symbol_pair: String,
    pub zscore: f64,
    pub spread: f64,
    pub side: AlertSide,
}

/// Debounced threshold detector over live z-score observations.
///
/// A pair may raise at most one alert per debounce interval. There is no
/// separate re-arm state: dipping back under the threshold does not make the
/// pair eligible any sooner.
#[derive(Debug, Clone)]
pub struct AlertEvaluator {
    threshold: f64,
    debounce_ms: u64,
    last_alert_ms: HashMap<String, u64>,
    history: Vec<Alert>,
}

impl AlertEvaluator {
    pub fn new(threshold: f64) -> Self {
        Self::with_debounce(threshold, Duration::from_millis(ALERT_DEBOUNCE_MS))
    }

    pub fn with_debounce(threshold: f64, debounce: Duration) -> Self {
        Self {
            threshold,
            debounce_ms: debounce.as_millis() as u64,
            last_alert_ms: HashMap::new(),
            history: Vec::new(),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: f64) {
        self.threshold = threshold;
    }

    pub fn observe(&mut self, symbol_pair: &str, zscore: f64, spread: f64, now_ms: u64) -> Option<Alert> {
        if !zscore.is_finite() || zscore.abs() <= self.threshold {
            return None;
        }
        if let Some(&last) = self.last_alert_ms.get(symbol_pair) {
            if now_ms.saturating_sub(last) < self.debounce_ms {
                return None;
            }
        }

        let alert = Alert {
            timestamp_ms: now_ms,
            symbol_pair: symbol_pair.to_string(),
            zscore,
            spread,
            side: AlertSide::from_zscore(zscore),
        };
        self.last_alert_ms.insert(symbol_pair.to_string(), now_ms);
        self.history.push(alert.clone());

        logging::info(
            "alert.raised",
            "Z-score threshold breached",
            json!({
                "pair": symbol_pair,
                "zscore": zscore,
                "spread": spread,
                "threshold": self.threshold,
                "side": alert.side.to_string(),
            }),
        );
        Some(alert)
    }

    /// Most recent alerts first, capped at the display length.
    pub fn recent(&self) -> Vec<&Alert> {
        self.history.iter().rev().take(ALERT_VIEW_LEN).collect()
    }

    pub fn history(&self) -> &[Alert] {
        &self.history
    }

    pub fn clear(&mut self) {
        self.history.clear();
        self.last_alert_ms.clear();
    }
}
