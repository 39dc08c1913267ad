use std::collections::{BTreeSet, HashMap};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde_json::json;

use crate::error::StoreError;
use crate::logging;
use crate::tick::{Tick, TickRecord};

/// Destination for flushed tick batches.
pub trait TickSink: Send + Sync {
    fn append(&self, ticks: &[Tick]) -> Result<(), StoreError>;
}

/// Inclusive timestamp bounds for [`TickStore::query`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start_ms: u64,
    pub end_ms: u64,
}

impl TimeRange {
    pub fn between(start_ms: u64, end_ms: u64) -> Self {
        Self { start_ms, end_ms }
    }

    pub fn since(start_ms: u64) -> Self {
        Self::between(start_ms, u64::MAX)
    }

    pub fn until(end_ms: u64) -> Self {
        Self::between(0, end_ms)
    }
}

/// Append-only tick ledger with per-symbol time ordering.
///
/// All access goes through one mutex, so a reader never observes half of a
/// batch. Batches arrive roughly once per second, which keeps contention low.
pub struct TickStore {
    ledger: Mutex<Ledger>,
}

struct Ledger {
    by_symbol: HashMap<String, Vec<Tick>>,
    total: usize,
    journal: Option<Journal>,
}

struct Journal {
    path: PathBuf,
    file: Box<dyn JournalFile>,
}

/// Append target of the journal; must be able to cut itself back to a
/// previous length.
trait JournalFile: Write + Send {
    fn end(&self) -> io::Result<u64>;
    fn truncate(&mut self, len: u64) -> io::Result<()>;
}

impl JournalFile for File {
    fn end(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

/// Write one serialized batch, or nothing: a partial write is cut back to
/// the previous end so a retry never lands after a torn record.
fn write_batch(file: &mut dyn JournalFile, payload: &[u8]) -> Result<(), StoreError> {
    let end = file.end()?;
    let written = file.write_all(payload).and_then(|()| file.flush());
    if let Err(err) = written {
        if let Err(rollback) = file.truncate(end) {
            logging::error(
                "store.rollback_failed",
                "Journal could not be cut back after a failed append",
                json!({ "length": end, "error": rollback.to_string() }),
            );
        }
        return Err(err.into());
    }
    Ok(())
}

impl TickStore {
    pub fn in_memory() -> Self {
        Self {
            ledger: Mutex::new(Ledger {
                by_symbol: HashMap::new(),
                total: 0,
                journal: None,
            }),
        }
    }

    /// Open (or create) an NDJSON journal and rebuild the in-memory index from it.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let mut ledger = Ledger {
            by_symbol: HashMap::new(),
            total: 0,
            journal: None,
        };

        if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            let mut skipped = 0usize;
            for line in reader.split(b'\n') {
                let line = line?;
                if line.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }
                match serde_json::from_slice::<TickRecord>(&line) {
                    Ok(record) => ledger.insert(record.into_tick()),
                    Err(_) => skipped += 1,
                }
            }
            if skipped > 0 {
                logging::warn(
                    "store.replay_skip",
                    "Skipped unreadable journal lines during replay",
                    json!({ "path": path.display().to_string(), "skipped": skipped }),
                );
            }
            logging::info(
                "store.replay",
                "Tick journal replayed",
                json!({ "path": path.display().to_string(), "ticks": ledger.total }),
            );
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        ledger.journal = Some(Journal {
            path,
            file: Box::new(file),
        });

        Ok(Self {
            ledger: Mutex::new(ledger),
        })
    }

    pub fn journal_path(&self) -> Option<PathBuf> {
        self.ledger
            .lock()
            .journal
            .as_ref()
            .map(|journal| journal.path.clone())
    }

    /// Append a batch. The journal is written first; on failure nothing is
    /// indexed and the caller is expected to retry the same batch later.
    pub fn append(&self, ticks: &[Tick]) -> Result<(), StoreError> {
        if ticks.is_empty() {
            return Ok(());
        }

        let mut ledger = self.ledger.lock();
        if let Some(journal) = ledger.journal.as_mut() {
            let ingestion_time_ms = logging::now_ms();
            let mut payload = Vec::with_capacity(ticks.len() * 96);
            for tick in ticks {
                serde_json::to_writer(&mut payload, &TickRecord::from_tick(tick, ingestion_time_ms))?;
                payload.push(b'\n');
            }
            write_batch(journal.file.as_mut(), &payload)?;
        }

        for tick in ticks {
            ledger.insert(tick.clone());
        }
        Ok(())
    }

    /// Ticks for `symbol` in ascending time order. With `limit`, only the most
    /// recent `limit` ticks of the (optionally range-filtered) set are returned.
    pub fn query(&self, symbol: &str, limit: Option<usize>, range: Option<TimeRange>) -> Vec<Tick> {
        let ledger = self.ledger.lock();
        let Some(ticks) = ledger.by_symbol.get(symbol) else {
            return Vec::new();
        };

        let (lo, hi) = match range {
            Some(range) => (
                ticks.partition_point(|tick| tick.timestamp_ms < range.start_ms),
                ticks.partition_point(|tick| tick.timestamp_ms <= range.end_ms),
            ),
            None => (0, ticks.len()),
        };
        if lo >= hi {
            return Vec::new();
        }

        let window = &ticks[lo..hi];
        let start = limit.map_or(0, |n| window.len().saturating_sub(n));
        window[start..].to_vec()
    }

    pub fn latest_ticks(&self, symbol: &str, n: usize) -> Vec<Tick> {
        self.query(symbol, Some(n), None)
    }

    pub fn count(&self, symbol: Option<&str>) -> usize {
        let ledger = self.ledger.lock();
        match symbol {
            Some(symbol) => ledger.by_symbol.get(symbol).map_or(0, Vec::len),
            None => ledger.total,
        }
    }

    pub fn distinct_symbols(&self) -> BTreeSet<String> {
        self.ledger.lock().by_symbol.keys().cloned().collect()
    }
}

impl TickSink for TickStore {
    fn append(&self, ticks: &[Tick]) -> Result<(), StoreError> {
        TickStore::append(self, ticks)
    }
}

impl Ledger {
    fn insert(&mut self, tick: Tick) {
        let ticks = self.by_symbol.entry(tick.symbol.clone()).or_default();
        match ticks.last() {
            Some(last) if last.timestamp_ms > tick.timestamp_ms => {
                // late arrival: after every tick with an equal or earlier timestamp
                let at = ticks.partition_point(|held| held.timestamp_ms <= tick.timestamp_ms);
                ticks.insert(at, tick);
            }
            _ => ticks.push(tick),
        }
        self.total += 1;
    }
}
