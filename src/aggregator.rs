use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::tick::Tick;

/// Bar width offered to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timeframe {
    Second,
    #[default]
    Minute,
    FiveMinutes,
}

impl Timeframe {
    pub const ALL: [Timeframe; 3] = [Timeframe::Second, Timeframe::Minute, Timeframe::FiveMinutes];

    pub fn interval(self) -> Duration {
        match self {
            Timeframe::Second => Duration::from_secs(1),
            Timeframe::Minute => Duration::from_secs(60),
            Timeframe::FiveMinutes => Duration::from_secs(300),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Timeframe::Second => "1s",
            Timeframe::Minute => "1m",
            Timeframe::FiveMinutes => "5m",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Timeframe {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "1s" | "second" => Ok(Timeframe::Second),
            "1m" | "1min" | "minute" => Ok(Timeframe::Minute),
            "5m" | "5min" | "five_minutes" => Ok(Timeframe::FiveMinutes),
            _ => Err(ConfigError::Unknown {
                kind: "timeframe",
                value: value.to_string(),
            }),
        }
    }
}

/// OHLCV aggregate of the ticks in `[period_start_ms, period_start_ms + interval)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub period_start_ms: u64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    fn open_with(period_start_ms: u64, tick: &Tick) -> Self {
        Self {
            period_start_ms,
            open: tick.price,
            high: tick.price,
            low: tick.price,
            close: tick.price,
            volume: tick.quantity.max(0.0),
        }
    }

    fn absorb(&mut self, tick: &Tick) {
        self.high = self.high.max(tick.price);
        self.low = self.low.min(tick.price);
        self.close = tick.price;
        self.volume += tick.quantity.max(0.0);
    }
}

/// Resample ticks into epoch-aligned OHLCV bars.
///
/// Input order does not matter: ticks are stably sorted by timestamp first, so
/// ticks sharing a timestamp keep their arrival order. That tie-break decides
/// open (first arrival at the earliest timestamp) and close (last arrival at
/// the latest timestamp). Empty buckets produce no bar.
pub fn aggregate(ticks: &[Tick], interval: Duration) -> Vec<Bar> {
    let width = interval.as_millis() as u64;
    if width == 0 || ticks.is_empty() {
        return Vec::new();
    }

    let mut ordered: Vec<&Tick> = ticks.iter().filter(|tick| tick.price.is_finite()).collect();
    ordered.sort_by_key(|tick| tick.timestamp_ms);

    let mut bars: Vec<Bar> = Vec::new();
    for tick in ordered {
        let bucket = tick.timestamp_ms / width * width;
        match bars.last_mut() {
            Some(bar) if bar.period_start_ms == bucket => bar.absorb(tick),
            _ => bars.push(Bar::open_with(bucket, tick)),
        }
    }
    bars
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    fn tick(timestamp_ms: u64, price: f64, quantity: f64) -> Tick {
        Tick::new("AAA", timestamp_ms, price, quantity)
    }

    #[test]
    fn builds_ohlcv_per_bucket() {
        let ticks = vec![
            tick(1_000, 10.0, 1.0),
            tick(1_200, 12.0, 0.5),
            tick(1_400, 9.0, 0.25),
            tick(1_999, 11.0, 1.0),
            tick(2_000, 20.0, 2.0),
        ];

        let bars = aggregate(&ticks, Duration::from_secs(1));
        assert_eq!(bars.len(), 2);
        assert_eq!(
            bars[0],
            Bar {
                period_start_ms: 1_000,
                open: 10.0,
                high: 12.0,
                low: 9.0,
                close: 11.0,
                volume: 2.75,
            }
        );
        assert_eq!(bars[1].period_start_ms, 2_000);
        assert_eq!(bars[1].open, 20.0);
        assert_eq!(bars[1].close, 20.0);
    }

    #[test]
    fn empty_buckets_are_skipped() {
        let ticks = vec![tick(0, 1.0, 1.0), tick(5_500, 2.0, 1.0)];
        let bars = aggregate(&ticks, Duration::from_secs(1));
        let starts: Vec<u64> = bars.iter().map(|bar| bar.period_start_ms).collect();
        assert_eq!(starts, vec![0, 5_000]);
    }

    #[test]
    fn empty_input_yields_no_bars() {
        assert!(aggregate(&[], Duration::from_secs(60)).is_empty());
        assert!(aggregate(&[tick(1, 1.0, 1.0)], Duration::ZERO).is_empty());
    }

    #[test]
    fn ties_resolve_by_arrival_order() {
        let ticks = vec![
            tick(3_000, 7.0, 1.0),
            tick(3_000, 8.0, 1.0),
            tick(3_500, 5.0, 1.0),
            tick(3_500, 6.0, 1.0),
        ];
        let bars = aggregate(&ticks, Duration::from_secs(1));
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].open, 7.0, "first arrival at earliest timestamp opens");
        assert_eq!(bars[0].close, 6.0, "last arrival at latest timestamp closes");
    }

    #[test]
    fn bars_respect_price_envelope_and_ignore_shuffles() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut price = 100.0;
        let ticks: Vec<Tick> = (0..2_000u64)
            .map(|i| {
                price += rng.gen_range(-0.5..0.5);
                tick(i * 137, price, rng.gen_range(0.0..3.0))
            })
            .collect();

        let expected = aggregate(&ticks, Duration::from_secs(1));
        for bar in &expected {
            assert!(bar.low <= bar.open && bar.open <= bar.high, "{bar:?}");
            assert!(bar.low <= bar.close && bar.close <= bar.high, "{bar:?}");
            assert!(bar.volume >= 0.0);
        }

        // timestamps are distinct here, so any permutation must give the same bars
        for _ in 0..5 {
            let mut shuffled = ticks.clone();
            shuffled.shuffle(&mut rng);
            assert_eq!(aggregate(&shuffled, Duration::from_secs(1)), expected);
        }
    }

    #[test]
    fn timeframe_parses_labels() {
        for timeframe in Timeframe::ALL {
            assert_eq!(timeframe.label().parse::<Timeframe>(), Ok(timeframe));
        }
        assert_eq!("1min".parse::<Timeframe>(), Ok(Timeframe::Minute));
        assert!("2h".parse::<Timeframe>().is_err());
        assert_eq!(Timeframe::FiveMinutes.interval(), Duration::from_secs(300));
    }

    #[test]
    fn non_finite_prices_are_ignored() {
        let ticks = vec![
            tick(1_000, 10.0, 1.0),
            tick(1_100, f64::NAN, 5.0),
            tick(1_200, f64::INFINITY, 5.0),
            tick(1_300, 12.0, 1.0),
            tick(2_500, f64::NEG_INFINITY, 5.0),
        ];

        let bars = aggregate(&ticks, Duration::from_secs(1));
        assert_eq!(bars.len(), 1, "a bucket holding only non-finite prices yields no bar");
        assert_eq!(bars[0].high, 12.0);
        assert_eq!(bars[0].low, 10.0);
        assert_eq!(bars[0].close, 12.0);
        assert_eq!(bars[0].volume, 2.0);
    }
}
