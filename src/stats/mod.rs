//! Pairs statistics over bar close series. Everything here is pure and
//! synchronous; callers pass configuration in explicitly.

mod adf;
mod ols;
pub mod rolling;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::AnalyticsError;
use crate::series::{align, Observation, Series};

pub use adf::{adf_test, critical_values, mackinnon_p_value, stationarity_test, CriticalValues, StationarityResult};
pub use rolling::{rolling_correlation, rolling_zscore, RollingComoments, RollingMoments};

/// OLS fit of leg A on `[1, B]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HedgeRatio {
    pub beta: f64,
    pub alpha: f64,
    pub r_squared: f64,
}

impl Default for HedgeRatio {
    /// Neutral fallback used when there is nothing to fit. It keeps the
    /// pipeline moving; it is not an estimate.
    fn default() -> Self {
        Self {
            beta: 1.0,
            alpha: 0.0,
            r_squared: 0.0,
        }
    }
}

pub fn hedge_ratio(a: &[Observation], b: &[Observation]) -> HedgeRatio {
    let rows = align(a, b);
    if rows.len() < 2 {
        return HedgeRatio::default();
    }

    let y = DVector::from_iterator(rows.len(), rows.iter().map(|row| row.a));
    let x = DMatrix::from_fn(rows.len(), 2, |i, j| if j == 0 { 1.0 } else { rows[i].b });
    match ols::fit(&y, &x) {
        Ok(fit) => HedgeRatio {
            beta: fit.params[1],
            alpha: fit.params[0],
            r_squared: fit.r_squared(&y),
        },
        Err(_) => HedgeRatio::default(),
    }
}

/// `A - beta * B` over the shared timestamps.
pub fn spread(a: &[Observation], b: &[Observation], beta: f64) -> Series {
    align(a, b)
        .into_iter()
        .map(|row| Observation::new(row.timestamp_ms, row.a - beta * row.b))
        .filter(|obs| obs.value.is_finite())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SummaryStats {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub last: f64,
    pub returns_mean: f64,
    pub returns_std: f64,
}

/// Descriptive statistics of the finite values plus their percentage
/// first-difference returns. Empty input gives the all-zero summary.
pub fn summary_stats(series: &[Observation]) -> SummaryStats {
    let values: Vec<f64> = series
        .iter()
        .map(|obs| obs.value)
        .filter(|value| value.is_finite())
        .collect();
    let Some(&last) = values.last() else {
        return SummaryStats::default();
    };

    let returns: Vec<f64> = values
        .windows(2)
        .filter(|pair| pair[0] != 0.0)
        .map(|pair| (pair[1] - pair[0]) / pair[0])
        .collect();

    let (mean, std) = mean_std(&values);
    let (returns_mean, returns_std) = mean_std(&returns);
    SummaryStats {
        count: values.len(),
        mean,
        std,
        min: values.iter().copied().fold(f64::INFINITY, f64::min),
        max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        last,
        returns_mean,
        returns_std,
    }
}

/// Mean and sample standard deviation; zeros where undefined.
fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return (mean, 0.0);
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, variance.sqrt())
}

/// Everything one refresh cycle derives from a pair of close series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairAnalytics {
    pub hedge: HedgeRatio,
    pub spread: Series,
    pub zscore: Series,
    pub correlation: Series,
}

impl PairAnalytics {
    pub fn latest_zscore(&self) -> Option<Observation> {
        self.zscore.last().copied()
    }

    pub fn latest_spread(&self) -> Option<Observation> {
        self.spread.last().copied()
    }

    pub fn latest_correlation(&self) -> Option<Observation> {
        self.correlation.last().copied()
    }
}

pub fn pair_analytics(
    a: &[Observation],
    b: &[Observation],
    window: usize,
) -> Result<PairAnalytics, AnalyticsError> {
    let hedge = hedge_ratio(a, b);
    let spread = spread(a, b, hedge.beta);
    let zscore = rolling_zscore(&spread, window)?;
    let correlation = rolling_correlation(a, b, window)?;
    Ok(PairAnalytics {
        hedge,
        spread,
        zscore,
        correlation,
    })
}
