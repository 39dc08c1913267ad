use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::aggregator::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub timestamp_ms: u64,
    pub value: f64,
}

impl Observation {
    pub fn new(timestamp_ms: u64, value: f64) -> Self {
        Self {
            timestamp_ms,
            value,
        }
    }
}

/// Time-indexed values, ascending by timestamp. Undefined points are absent
/// rather than stored as NaN.
pub type Series = Vec<Observation>;

/// A row of the inner join of two series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aligned {
    pub timestamp_ms: u64,
    pub a: f64,
    pub b: f64,
}

pub fn closes(bars: &[Bar]) -> Series {
    bars.iter()
        .map(|bar| Observation::new(bar.period_start_ms, bar.close))
        .collect()
}

pub fn values(series: &[Observation]) -> Vec<f64> {
    series.iter().map(|obs| obs.value).collect()
}

/// Inner join on timestamp. Rows where either side is missing or non-finite
/// are dropped; a repeated timestamp keeps its last value.
pub fn align(a: &[Observation], b: &[Observation]) -> Vec<Aligned> {
    let right: BTreeMap<u64, f64> = b
        .iter()
        .filter(|obs| obs.value.is_finite())
        .map(|obs| (obs.timestamp_ms, obs.value))
        .collect();
    let left: BTreeMap<u64, f64> = a
        .iter()
        .filter(|obs| obs.value.is_finite())
        .map(|obs| (obs.timestamp_ms, obs.value))
        .collect();

    left.into_iter()
        .filter_map(|(timestamp_ms, a)| {
            right.get(&timestamp_ms).map(|&b| Aligned {
                timestamp_ms,
                a,
                b,
            })
        })
        .collect()
}
