use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use serde_json::Value;

static SILENT: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warn,
    Error,
}

#[derive(Serialize)]
struct LogLine<'a> {
    level: Level,
    event: &'a str,
    message: &'a str,
    timestamp_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<Value>,
}

/// Suppress all log output. Benches and noisy tests flip this on.
pub fn set_silent(silent: bool) {
    SILENT.store(silent, Ordering::Relaxed);
}

pub fn is_silent() -> bool {
    SILENT.load(Ordering::Relaxed)
}

fn emit(level: Level, event: &str, message: &str, metadata: Option<Value>) {
    if is_silent() {
        return;
    }

    let line = LogLine {
        level,
        event,
        message,
        timestamp_ms: now_ms(),
        metadata,
    };

    match serde_json::to_string(&line) {
        Ok(payload) => match level {
            Level::Error | Level::Warn => eprintln!("{payload}"),
            Level::Info => println!("{payload}"),
        },
        Err(err) => eprintln!(
            "{{\"level\":\"error\",\"event\":\"logging.failure\",\"message\":\"failed to serialise log line\",\"error\":\"{err}\"}}"
        ),
    }
}

pub fn info(event: &str, message: &str, metadata: Value) {
    emit(Level::Info, event, message, Some(metadata));
}

pub fn warn(event: &str, message: &str, metadata: Value) {
    emit(Level::Warn, event, message, Some(metadata));
}

pub fn error(event: &str, message: &str, metadata: Value) {
    emit(Level::Error, event, message, Some(metadata));
}

pub fn info_simple(event: &str, message: &str) {
    emit(Level::Info, event, message, None);
}

/// Wall clock in milliseconds since the Unix epoch, clamped at zero.
pub fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_line_omits_missing_metadata() {
        let line = LogLine {
            level: Level::Warn,
            event: "feed.flush",
            message: "flush failed",
            timestamp_ms: 7,
            metadata: None,
        };
        let payload = serde_json::to_string(&line).expect("serialise");
        assert_eq!(
            payload,
            r#"{"level":"warn","event":"feed.flush","message":"flush failed","timestamp_ms":7}"#
        );
    }

    #[test]
    fn now_ms_is_after_2020() {
        assert!(now_ms() > 1_577_836_800_000);
    }
}
