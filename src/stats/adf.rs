//! Augmented Dickey-Fuller unit-root test with a constant term.
//!
//! Lag order is picked by minimum AIC over a common estimation sample, the
//! chosen model is refitted on every usable row, and the statistic is mapped to
//! a p-value with MacKinnon's (1994) response-surface approximation. Critical
//! values use MacKinnon's (2010) finite-sample coefficients.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use super::ols;
use crate::constants::{ADF_MIN_OBSERVATIONS, STATIONARITY_P_VALUE};
use crate::error::AnalyticsError;
use crate::series::Observation;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CriticalValues {
    #[serde(rename = "1%")]
    pub one_pct: f64,
    #[serde(rename = "5%")]
    pub five_pct: f64,
    #[serde(rename = "10%")]
    pub ten_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StationarityResult {
    pub adf_statistic: f64,
    pub p_value: f64,
    pub critical_values: CriticalValues,
    pub is_stationary: bool,
    pub n_observations: usize,
    pub used_lag: usize,
}

// MacKinnon (1994), one variable, constant only.
const TAU_MAX: f64 = 2.74;
const TAU_MIN: f64 = -18.83;
const TAU_STAR: f64 = -1.61;
const TAU_SMALL_P: [f64; 3] = [2.1659, 1.4412, 0.038269];
const TAU_LARGE_P: [f64; 4] = [1.7339, 0.93202, -0.12745, -0.010368];

// MacKinnon (2010), constant only: rows are 1%, 5%, 10%.
const TAU_CRIT: [[f64; 4]; 3] = [
    [-3.43035, -6.5393, -16.786, -79.433],
    [-2.86154, -2.8903, -4.234, -40.040],
    [-2.56677, -1.5384, -2.809, 0.0],
];

/// Run the ADF test on the finite values of `series`.
pub fn stationarity_test(series: &[Observation]) -> Result<StationarityResult, AnalyticsError> {
    let values: Vec<f64> = series
        .iter()
        .map(|obs| obs.value)
        .filter(|value| value.is_finite())
        .collect();
    adf_test(&values)
}

pub fn adf_test(values: &[f64]) -> Result<StationarityResult, AnalyticsError> {
    let n = values.len();
    if n < ADF_MIN_OBSERVATIONS {
        return Err(AnalyticsError::InsufficientData {
            required: ADF_MIN_OBSERVATIONS,
            available: n,
        });
    }

    let diffs: Vec<f64> = values.windows(2).map(|pair| pair[1] - pair[0]).collect();
    let max_lag = schwert_max_lag(n).min(n / 2 - 2);

    let mut best: Option<(f64, usize)> = None;
    for lag in 0..=max_lag {
        let (y, x) = design(values, &diffs, lag, max_lag);
        let aic = ols::fit(&y, &x)?.aic();
        if best.map_or(true, |(best_aic, _)| aic < best_aic) {
            best = Some((aic, lag));
        }
    }
    let used_lag = best.map_or(0, |(_, lag)| lag);

    let (y, x) = design(values, &diffs, used_lag, used_lag);
    let n_observations = y.len();
    let fit = ols::fit(&y, &x)?;
    let adf_statistic = fit.t_value(0);
    let p_value = mackinnon_p_value(adf_statistic);

    Ok(StationarityResult {
        adf_statistic,
        p_value,
        critical_values: critical_values(n_observations),
        is_stationary: p_value < STATIONARITY_P_VALUE,
        n_observations,
        used_lag,
    })
}

fn schwert_max_lag(n: usize) -> usize {
    (12.0 * (n as f64 / 100.0).powf(0.25)).ceil() as usize
}

/// Regression of `diff_t` on `[level_t, diff_{t-1} .. diff_{t-lag}, 1]`, using
/// rows `t >= trim` so that models with different `lag` share one sample.
fn design(levels: &[f64], diffs: &[f64], lag: usize, trim: usize) -> (DVector<f64>, DMatrix<f64>) {
    let rows = diffs.len() - trim;
    let cols = lag + 2;
    let y = DVector::from_iterator(rows, diffs[trim..].iter().copied());
    let x = DMatrix::from_fn(rows, cols, |row, col| {
        let t = trim + row;
        match col {
            0 => levels[t],
            c if c == cols - 1 => 1.0,
            c => diffs[t - c],
        }
    });
    (y, x)
}

pub fn mackinnon_p_value(statistic: f64) -> f64 {
    if statistic > TAU_MAX {
        return 1.0;
    }
    if statistic < TAU_MIN {
        return 0.0;
    }
    let z = if statistic <= TAU_STAR {
        polyval(&TAU_SMALL_P, statistic)
    } else {
        polyval(&TAU_LARGE_P, statistic)
    };
    normal_cdf(z)
}

pub fn critical_values(n_observations: usize) -> CriticalValues {
    let inv = 1.0 / n_observations as f64;
    CriticalValues {
        one_pct: polyval(&TAU_CRIT[0], inv),
        five_pct: polyval(&TAU_CRIT[1], inv),
        ten_pct: polyval(&TAU_CRIT[2], inv),
    }
}

/// `c[0] + c[1] x + c[2] x^2 + ...`
fn polyval(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

fn normal_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / std::f64::consts::SQRT_2)
}

// Chebyshev fit, fractional error below 1.2e-7 everywhere.
fn erfc(x: f64) -> f64 {
    let z = x.abs();
    let t = 1.0 / (1.0 + 0.5 * z);
    let poly = -z * z - 1.26551223
        + t * (1.00002368
            + t * (0.37409196
                + t * (0.09678418
                    + t * (-0.18628806
                        + t * (0.27886807
                            + t * (-1.13520398
                                + t * (1.48851587 + t * (-0.82215223 + t * 0.17087277))))))));
    let ans = t * poly.exp();
    if x >= 0.0 {
        ans
    } else {
        2.0 - ans
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, StandardNormal};

    fn ar1(phi: f64, n: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut value = 0.0;
        (0..n)
            .map(|_| {
                let shock: f64 = StandardNormal.sample(&mut rng);
                value = phi * value + shock;
                value
            })
            .collect()
    }

    fn as_series(values: &[f64]) -> Vec<Observation> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| Observation::new(i as u64, v))
            .collect()
    }

    #[test]
    fn rejects_short_series() {
        let values = ar1(0.5, 49, 1);
        assert_eq!(
            stationarity_test(&as_series(&values)),
            Err(AnalyticsError::InsufficientData {
                required: 50,
                available: 49
            })
        );
    }

    #[test]
    fn missing_points_do_not_count() {
        let mut values = ar1(0.5, 55, 2);
        for value in values.iter_mut().take(10) {
            *value = f64::NAN;
        }
        assert!(matches!(
            stationarity_test(&as_series(&values)),
            Err(AnalyticsError::InsufficientData { available: 45, .. })
        ));
    }

    #[test]
    fn mean_reverting_series_is_stationary() {
        let values = ar1(0.5, 500, 7);
        let result = stationarity_test(&as_series(&values)).expect("adf");

        assert!(result.is_stationary, "{result:?}");
        assert!(result.p_value < 0.01);
        assert!(result.adf_statistic < result.critical_values.one_pct);
        assert!(result.n_observations <= 499);
        assert_eq!(result.n_observations, 499 - result.used_lag);
    }

    #[test]
    fn random_walks_are_mostly_not_stationary() {
        let non_stationary = (0..10u64)
            .filter(|&seed| {
                let walk = ar1(1.0, 300, 100 + seed);
                !stationarity_test(&as_series(&walk)).expect("adf").is_stationary
            })
            .count();
        assert!(non_stationary >= 7, "only {non_stationary}/10 walks flagged");
    }

    #[test]
    fn p_value_matches_mackinnon_levels() {
        assert!((mackinnon_p_value(-2.86154) - 0.05).abs() < 2e-3);
        assert!((mackinnon_p_value(-3.43035) - 0.01).abs() < 1e-3);
        assert_eq!(mackinnon_p_value(3.0), 1.0);
        assert_eq!(mackinnon_p_value(-25.0), 0.0);

        let mut previous = 0.0;
        for step in 0..200 {
            let p = mackinnon_p_value(-18.0 + step as f64 * 0.1);
            assert!(p >= previous - 1e-12, "p-value must be monotone");
            previous = p;
        }
    }

    #[test]
    fn critical_values_approach_asymptotic() {
        let large = critical_values(1_000_000);
        assert!((large.one_pct + 3.43035).abs() < 1e-4);
        assert!((large.five_pct + 2.86154).abs() < 1e-4);
        assert!((large.ten_pct + 2.56677).abs() < 1e-4);

        let small = critical_values(50);
        assert!(small.one_pct < small.five_pct && small.five_pct < small.ten_pct);
        assert!(small.one_pct < large.one_pct);
    }

    #[test]
    fn normal_cdf_is_accurate() {
        assert!((normal_cdf(0.0) - 0.5).abs() < 1e-7);
        assert!((normal_cdf(1.959964) - 0.975).abs() < 1e-6);
        assert!((normal_cdf(-1.644854) - 0.05).abs() < 1e-6);
    }
}
