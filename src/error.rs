use thiserror::Error;

/// Failures writing to or replaying the tick ledger. Always transient from the
/// coordinator's point of view: the batch is retried on the next flush.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("tick store io failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialise tick record: {0}")]
    Serialise(#[from] serde_json::Error),

    #[error("tick store rejected batch: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("malformed trade frame for {symbol}: {reason}")]
    Malformed { symbol: String, reason: String },

    #[error("failed to connect trade stream {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("trade stream for {symbol} failed: {reason}")]
    Stream { symbol: String, reason: String },
}

impl FeedError {
    /// Malformed frames are dropped and counted; every other error ends the
    /// subscription it came from.
    pub fn is_malformed(&self) -> bool {
        matches!(self, FeedError::Malformed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalyticsError {
    #[error("insufficient data: {required} observations required, {available} available")]
    InsufficientData { required: usize, available: usize },

    #[error("rolling window must be at least 2, got {0}")]
    InvalidWindow(usize),

    #[error("regression design matrix is singular")]
    Singular,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("rolling window {value} outside [{min}, {max}]")]
    Window { value: usize, min: usize, max: usize },

    #[error("alert threshold {value} outside [{min}, {max}]")]
    Threshold { value: f64, min: f64, max: f64 },

    #[error("pair legs must differ, both are {0}")]
    SameSymbol(String),

    #[error("symbol must not be empty")]
    EmptySymbol,

    #[error("unknown {kind} `{value}`")]
    Unknown { kind: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("export io failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv export failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("json export failed: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_malformed_frames_are_recoverable() {
        struct TestCase {
            input: FeedError,
            expected: bool,
        }

        let tests = vec![
            TestCase {
                // TC0: bad payload is dropped and counted
                input: FeedError::Malformed {
                    symbol: "BTCUSDT".into(),
                    reason: "missing price".into(),
                },
                expected: true,
            },
            TestCase {
                // TC1: transport failure ends the subscription
                input: FeedError::Stream {
                    symbol: "BTCUSDT".into(),
                    reason: "connection reset".into(),
                },
                expected: false,
            },
            TestCase {
                // TC2: connect failure never reaches the stream loop
                input: FeedError::Connect {
                    url: "wss://example".into(),
                    reason: "refused".into(),
                },
                expected: false,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            assert_eq!(test.input.is_malformed(), test.expected, "TC{index} failed");
        }
    }

    #[test]
    fn insufficient_data_message_names_counts() {
        let err = AnalyticsError::InsufficientData {
            required: 50,
            available: 12,
        };
        assert_eq!(
            err.to_string(),
            "insufficient data: 50 observations required, 12 available"
        );
    }
}
