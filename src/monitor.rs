use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;

use crate::aggregator::{aggregate, Bar};
use crate::alert::{Alert, AlertEvaluator};
use crate::config::AnalyticsConfig;
use crate::constants::LIVE_TICK_DEPTH;
use crate::error::AnalyticsError;
use crate::series::{align, closes};
use crate::stats::{
    hedge_ratio, pair_analytics, spread, stationarity_test, summary_stats, PairAnalytics,
    StationarityResult, SummaryStats,
};
use crate::store::TickStore;
use crate::tick::Tick;

/// Result of one refresh cycle.
#[derive(Debug, Clone, Serialize)]
pub struct PairSnapshot {
    pub symbol_pair: String,
    pub timestamp_ms: u64,
    pub bars_a: usize,
    pub bars_b: usize,
    pub analytics: PairAnalytics,
    pub alert: Option<Alert>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PairSummaries {
    pub a: SummaryStats,
    pub b: SummaryStats,
}

/// Long-lived analytics front end over a tick store. Owns the alert
/// debounce state; everything else is recomputed per call from the config
/// it is handed.
pub struct PairMonitor {
    store: Arc<TickStore>,
    alerts: AlertEvaluator,
}

impl PairMonitor {
    pub fn new(store: Arc<TickStore>, alerts: AlertEvaluator) -> Self {
        Self { store, alerts }
    }

    pub fn symbols(&self) -> BTreeSet<String> {
        self.store.distinct_symbols()
    }

    pub fn tick_count(&self, symbol: Option<&str>) -> usize {
        self.store.count(symbol)
    }

    pub fn latest_ticks(&self, symbol: &str, n: usize) -> Vec<Tick> {
        self.store.latest_ticks(symbol, n)
    }

    /// Bars for both legs from their latest `depth` ticks.
    pub fn bars(&self, config: &AnalyticsConfig, depth: usize) -> (Vec<Bar>, Vec<Bar>) {
        let interval = config.timeframe.interval();
        rayon::join(
            || aggregate(&self.store.latest_ticks(&config.symbol_a, depth), interval),
            || aggregate(&self.store.latest_ticks(&config.symbol_b, depth), interval),
        )
    }

    pub fn refresh(&mut self, config: &AnalyticsConfig, now_ms: u64) -> Result<PairSnapshot, AnalyticsError> {
        let (bars_a, bars_b) = self.bars(config, LIVE_TICK_DEPTH);
        let available = bars_a.len().min(bars_b.len());
        if available <= config.window {
            return Err(AnalyticsError::InsufficientData {
                required: config.window + 1,
                available,
            });
        }

        let analytics = pair_analytics(&closes(&bars_a), &closes(&bars_b), config.window)?;
        let symbol_pair = config.pair_label();

        self.alerts.set_threshold(config.alert_threshold);
        let alert = match (analytics.latest_zscore(), analytics.latest_spread()) {
            (Some(zscore), Some(spread)) => self.alerts.observe(&symbol_pair, zscore.value, spread.value, now_ms),
            _ => None,
        };

        Ok(PairSnapshot {
            symbol_pair,
            timestamp_ms: now_ms,
            bars_a: bars_a.len(),
            bars_b: bars_b.len(),
            analytics,
            alert,
        })
    }

    /// ADF test on the current hedged spread.
    pub fn stationarity(&self, config: &AnalyticsConfig) -> Result<StationarityResult, AnalyticsError> {
        let (bars_a, bars_b) = self.bars(config, LIVE_TICK_DEPTH);
        let (a, b) = (closes(&bars_a), closes(&bars_b));
        let hedge = hedge_ratio(&a, &b);
        stationarity_test(&spread(&a, &b, hedge.beta))
    }

    pub fn summaries(&self, config: &AnalyticsConfig) -> PairSummaries {
        let (bars_a, bars_b) = self.bars(config, LIVE_TICK_DEPTH);
        PairSummaries {
            a: summary_stats(&closes(&bars_a)),
            b: summary_stats(&closes(&bars_b)),
        }
    }

    /// Feed every historical z-score of the current bars through the alert
    /// evaluator, stamped with its bar time. Returns the number raised.
    pub fn replay_alerts(&mut self, config: &AnalyticsConfig, depth: usize) -> Result<usize, AnalyticsError> {
        let (bars_a, bars_b) = self.bars(config, depth);
        let analytics = pair_analytics(&closes(&bars_a), &closes(&bars_b), config.window)?;
        let symbol_pair = config.pair_label();

        self.alerts.set_threshold(config.alert_threshold);
        let raised = align(&analytics.zscore, &analytics.spread)
            .into_iter()
            .filter_map(|row| self.alerts.observe(&symbol_pair, row.a, row.b, row.timestamp_ms))
            .count();
        Ok(raised)
    }

    pub fn alerts(&self) -> &AlertEvaluator {
        &self.alerts
    }
}
