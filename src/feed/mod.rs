//! Live feed coordination: one task per symbol subscription pushing parsed
//! trades into a shared buffer, and one periodic task flushing that buffer
//! into the tick sink.

pub mod binance;
mod parse;

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::json;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::error::FeedError;
use crate::logging;
use crate::store::TickSink;
use crate::tick::Tick;

pub use parse::parse_trade;

/// Raw text frames of one symbol's trade stream.
pub type TradeFrames = Pin<Box<dyn Stream<Item = Result<String, FeedError>> + Send>>;

/// Liveness counters for one symbol.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SymbolStats {
    pub ticks: u64,
    pub last_price: f64,
    pub last_trade_ms: u64,
    pub malformed: u64,
    /// The stream ended on its own or with an error; nothing more will arrive.
    pub closed: bool,
}

type SharedBuffer = Arc<Mutex<Vec<Tick>>>;
type SharedStats = Arc<RwLock<HashMap<String, SymbolStats>>>;

/// Owns the ingestion tasks. Buffered ticks that arrive after the final flush
/// of [`FeedCoordinator::stop`] are lost; the window is at most one period.
pub struct FeedCoordinator {
    sink: Arc<dyn TickSink>,
    flush_interval: Duration,
    buffer: SharedBuffer,
    stats: SharedStats,
    streams_shutdown: watch::Sender<bool>,
    flush_shutdown: watch::Sender<bool>,
    subscriptions: Vec<JoinHandle<()>>,
    flusher: Option<JoinHandle<()>>,
}

impl FeedCoordinator {
    pub fn new(sink: Arc<dyn TickSink>, flush_interval: Duration) -> Self {
        let (streams_shutdown, _) = watch::channel(false);
        let (flush_shutdown, _) = watch::channel(false);
        Self {
            sink,
            flush_interval,
            buffer: Arc::new(Mutex::new(Vec::new())),
            stats: Arc::new(RwLock::new(HashMap::new())),
            streams_shutdown,
            flush_shutdown,
            subscriptions: Vec::new(),
            flusher: None,
        }
    }

    /// Spawn the periodic flush task. Calling it twice is a no-op.
    pub fn start(&mut self) {
        if self.flusher.is_some() {
            return;
        }
        let _ = self.flush_shutdown.send(false);
        let _ = self.streams_shutdown.send(false);
        self.flusher = Some(tokio::spawn(run_flusher(
            Arc::clone(&self.sink),
            Arc::clone(&self.buffer),
            self.flush_interval,
            self.flush_shutdown.subscribe(),
        )));
        logging::info(
            "feed.start",
            "Feed coordinator started",
            json!({ "flush_interval_ms": self.flush_interval.as_millis() as u64 }),
        );
    }

    /// Attach a symbol's frame stream; it runs until the stream ends or
    /// [`FeedCoordinator::stop`] is called.
    pub fn subscribe(&mut self, symbol: &str, frames: TradeFrames) {
        let symbol = symbol.to_ascii_uppercase();
        self.stats.write().entry(symbol.clone()).or_default();
        self.subscriptions.push(tokio::spawn(run_subscription(
            symbol,
            frames,
            Arc::clone(&self.buffer),
            Arc::clone(&self.stats),
            self.streams_shutdown.subscribe(),
        )));
    }

    pub fn is_running(&self) -> bool {
        self.flusher.is_some()
    }

    pub fn stats(&self) -> HashMap<String, SymbolStats> {
        self.stats.read().clone()
    }

    /// Symbols whose stream ended before shutdown, sorted.
    pub fn closed_symbols(&self) -> Vec<String> {
        let mut closed: Vec<String> = self
            .stats
            .read()
            .iter()
            .filter(|(_, stats)| stats.closed)
            .map(|(symbol, _)| symbol.clone())
            .collect();
        closed.sort();
        closed
    }

    pub fn buffered(&self) -> usize {
        self.buffer.lock().len()
    }

    /// Close every subscription, then let the flusher run one last drain.
    pub async fn stop(&mut self) {
        let _ = self.streams_shutdown.send(true);
        for handle in self.subscriptions.drain(..) {
            let _ = handle.await;
        }

        let _ = self.flush_shutdown.send(true);
        if let Some(flusher) = self.flusher.take() {
            let _ = flusher.await;
        }

        logging::info(
            "feed.stop",
            "Feed coordinator stopped",
            json!({ "unflushed": self.buffered() }),
        );
    }
}

impl Drop for FeedCoordinator {
    fn drop(&mut self) {
        for handle in &self.subscriptions {
            handle.abort();
        }
        if let Some(flusher) = &self.flusher {
            flusher.abort();
        }
    }
}

async fn run_subscription(
    symbol: String,
    mut frames: TradeFrames,
    buffer: SharedBuffer,
    stats: SharedStats,
    mut shutdown: watch::Receiver<bool>,
) {
    logging::info("feed.subscribe", "Trade stream subscribed", json!({ "symbol": symbol }));

    loop {
        tokio::select! {
            frame = frames.next() => match frame {
                Some(Ok(payload)) => ingest_frame(&symbol, &payload, &buffer, &stats),
                Some(Err(err)) if err.is_malformed() => record_malformed(&symbol, &stats),
                Some(Err(err)) => {
                    logging::warn(
                        "feed.stream_error",
                        "Trade stream ended with error",
                        json!({ "symbol": symbol, "error": err.to_string() }),
                    );
                    mark_closed(&symbol, &stats);
                    break;
                }
                None => {
                    logging::info("feed.stream_end", "Trade stream closed", json!({ "symbol": symbol }));
                    mark_closed(&symbol, &stats);
                    break;
                }
            },
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    drop(frames);
    logging::info("feed.unsubscribe", "Trade stream released", json!({ "symbol": symbol }));
}

fn ingest_frame(symbol: &str, payload: &str, buffer: &SharedBuffer, stats: &SharedStats) {
    match parse_trade(symbol, payload) {
        Ok(Some(tick)) => {
            let (price, trade_ms) = (tick.price, tick.timestamp_ms);
            buffer.lock().push(tick);

            let mut stats = stats.write();
            let entry = stats.entry(symbol.to_string()).or_default();
            entry.ticks += 1;
            entry.last_price = price;
            entry.last_trade_ms = trade_ms;
        }
        Ok(None) => {}
        Err(_) => record_malformed(symbol, stats),
    }
}

fn record_malformed(symbol: &str, stats: &SharedStats) {
    stats.write().entry(symbol.to_string()).or_default().malformed += 1;
}

fn mark_closed(symbol: &str, stats: &SharedStats) {
    stats.write().entry(symbol.to_string()).or_default().closed = true;
}

async fn run_flusher(
    sink: Arc<dyn TickSink>,
    buffer: SharedBuffer,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker.reset();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                flush_once(&sink, &buffer).await;
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    flush_once(&sink, &buffer).await;
}

/// Drain the buffer into the sink. A failed batch goes back in front of
/// anything buffered meanwhile and is retried next period.
async fn flush_once(sink: &Arc<dyn TickSink>, buffer: &SharedBuffer) -> usize {
    let batch = std::mem::take(&mut *buffer.lock());
    if batch.is_empty() {
        return 0;
    }

    let sink = Arc::clone(sink);
    let written = tokio::task::spawn_blocking(move || {
        let result = sink.append(&batch);
        (result, batch)
    })
    .await;

    match written {
        Ok((Ok(()), batch)) => batch.len(),
        Ok((Err(err), batch)) => {
            logging::warn(
                "feed.flush_failed",
                "Tick batch not persisted, retrying next period",
                json!({ "ticks": batch.len(), "error": err.to_string() }),
            );
            let mut guard = buffer.lock();
            let newer = std::mem::replace(&mut *guard, batch);
            guard.extend(newer);
            0
        }
        Err(err) => {
            logging::error(
                "feed.flush_panicked",
                "Flush task aborted, batch dropped",
                json!({ "error": err.to_string() }),
            );
            0
        }
    }
}
