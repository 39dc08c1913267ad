use serde::{Deserialize, Serialize};

/// A single executed trade. Never mutated once it leaves the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub timestamp_ms: u64,
    pub symbol: String,
    pub price: f64,
    pub quantity: f64,
}

impl Tick {
    pub fn new(symbol: impl Into<String>, timestamp_ms: u64, price: f64, quantity: f64) -> Self {
        Self {
            timestamp_ms,
            symbol: symbol.into(),
            price,
            quantity,
        }
    }
}

/// Persisted ledger row: the tick plus the wall-clock time it reached the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickRecord {
    pub timestamp_ms: u64,
    pub symbol: String,
    pub price: f64,
    pub quantity: f64,
    pub ingestion_time_ms: u64,
}

impl TickRecord {
    pub fn from_tick(tick: &Tick, ingestion_time_ms: u64) -> Self {
        Self {
            timestamp_ms: tick.timestamp_ms,
            symbol: tick.symbol.clone(),
            price: tick.price,
            quantity: tick.quantity,
            ingestion_time_ms,
        }
    }

    pub fn into_tick(self) -> Tick {
        Tick {
            timestamp_ms: self.timestamp_ms,
            symbol: self.symbol,
            price: self.price,
            quantity: self.quantity,
        }
    }
}
