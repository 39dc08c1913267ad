//! Sliding-window moments updated in O(1) per observation.
//!
//! Both accumulators use Welford style add/remove updates instead of running
//! sums of squares, which lose precision badly on price-sized values. When the
//! accumulated second moment collapses towards zero the window is re-checked
//! directly so a flat window reports an undefined statistic instead of a
//! division by floating-point dust.

use std::collections::VecDeque;

use crate::error::AnalyticsError;
use crate::series::{align, Observation, Series};

#[derive(Debug, Clone)]
pub struct RollingMoments {
    window: usize,
    values: VecDeque<f64>,
    mean: f64,
    m2: f64,
}

impl RollingMoments {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            values: VecDeque::with_capacity(window + 1),
            mean: 0.0,
            m2: 0.0,
        }
    }

    pub fn push(&mut self, value: f64) {
        if self.values.len() == self.window {
            if let Some(oldest) = self.values.pop_front() {
                let n = self.values.len() as f64;
                if n == 0.0 {
                    self.mean = 0.0;
                    self.m2 = 0.0;
                } else {
                    let delta = oldest - self.mean;
                    self.mean -= delta / n;
                    self.m2 -= delta * (oldest - self.mean);
                }
            }
        }

        self.values.push_back(value);
        let n = self.values.len() as f64;
        let delta = value - self.mean;
        self.mean += delta / n;
        self.m2 += delta * (value - self.mean);
    }

    pub fn is_full(&self) -> bool {
        self.values.len() == self.window
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sample standard deviation of the window, `None` while it is filling or
    /// when every value in it is identical.
    pub fn std_dev(&self) -> Option<f64> {
        let n = self.values.len();
        if n < 2 || !self.is_full() {
            return None;
        }
        let m2 = if collapsed(self.m2, self.mean, n) {
            if is_flat(self.values.iter().copied()) {
                return None;
            }
            two_pass_m2(self.values.iter().copied())
        } else {
            self.m2
        };
        let std = (m2.max(0.0) / (n - 1) as f64).sqrt();
        (std > 0.0).then_some(std)
    }

    /// Standardised value of the most recent observation.
    pub fn zscore(&self) -> Option<f64> {
        let latest = *self.values.back()?;
        self.std_dev().map(|std| (latest - self.mean) / std)
    }
}

#[derive(Debug, Clone)]
pub struct RollingComoments {
    window: usize,
    pairs: VecDeque<(f64, f64)>,
    mean_a: f64,
    mean_b: f64,
    m2_a: f64,
    m2_b: f64,
    co_moment: f64,
}

impl RollingComoments {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            pairs: VecDeque::with_capacity(window + 1),
            mean_a: 0.0,
            mean_b: 0.0,
            m2_a: 0.0,
            m2_b: 0.0,
            co_moment: 0.0,
        }
    }

    pub fn push(&mut self, a: f64, b: f64) {
        if self.pairs.len() == self.window {
            if let Some((old_a, old_b)) = self.pairs.pop_front() {
                let n = self.pairs.len() as f64;
                if n == 0.0 {
                    self.reset_moments();
                } else {
                    let delta_a = old_a - self.mean_a;
                    let delta_b = old_b - self.mean_b;
                    let mean_b_before = self.mean_b;
                    self.mean_a -= delta_a / n;
                    self.mean_b -= delta_b / n;
                    self.m2_a -= delta_a * (old_a - self.mean_a);
                    self.m2_b -= delta_b * (old_b - self.mean_b);
                    self.co_moment -= (old_a - self.mean_a) * (old_b - mean_b_before);
                }
            }
        }

        self.pairs.push_back((a, b));
        let n = self.pairs.len() as f64;
        let delta_a = a - self.mean_a;
        let delta_b = b - self.mean_b;
        self.mean_a += delta_a / n;
        self.mean_b += delta_b / n;
        self.m2_a += delta_a * (a - self.mean_a);
        self.m2_b += delta_b * (b - self.mean_b);
        self.co_moment += delta_a * (b - self.mean_b);
    }

    pub fn is_full(&self) -> bool {
        self.pairs.len() == self.window
    }

    /// Pearson correlation of the window; `None` while filling or when either
    /// leg is flat.
    pub fn correlation(&self) -> Option<f64> {
        let n = self.pairs.len();
        if n < 2 || !self.is_full() {
            return None;
        }
        let collapsed_a = collapsed(self.m2_a, self.mean_a, n);
        let collapsed_b = collapsed(self.m2_b, self.mean_b, n);
        let (m2_a, m2_b, co_moment) = if collapsed_a || collapsed_b {
            if (collapsed_a && is_flat(self.pairs.iter().map(|&(a, _)| a)))
                || (collapsed_b && is_flat(self.pairs.iter().map(|&(_, b)| b)))
            {
                return None;
            }
            self.two_pass()
        } else {
            (self.m2_a, self.m2_b, self.co_moment)
        };

        let denominator = (m2_a.max(0.0) * m2_b.max(0.0)).sqrt();
        if denominator == 0.0 {
            return None;
        }
        Some((co_moment / denominator).clamp(-1.0, 1.0))
    }

    fn two_pass(&self) -> (f64, f64, f64) {
        let n = self.pairs.len() as f64;
        let mean_a = self.pairs.iter().map(|&(a, _)| a).sum::<f64>() / n;
        let mean_b = self.pairs.iter().map(|&(_, b)| b).sum::<f64>() / n;
        self.pairs
            .iter()
            .fold((0.0, 0.0, 0.0), |(m2_a, m2_b, co), &(a, b)| {
                let da = a - mean_a;
                let db = b - mean_b;
                (m2_a + da * da, m2_b + db * db, co + da * db)
            })
    }

    fn reset_moments(&mut self) {
        self.mean_a = 0.0;
        self.mean_b = 0.0;
        self.m2_a = 0.0;
        self.m2_b = 0.0;
        self.co_moment = 0.0;
    }
}

// Below this the incremental moment may be mostly rounding residue.
fn collapsed(m2: f64, mean: f64, n: usize) -> bool {
    m2 <= 1e-8 * (mean * mean + 1.0) * n as f64
}

fn two_pass_m2(values: impl Iterator<Item = f64> + Clone) -> f64 {
    let (count, sum) = values.clone().fold((0usize, 0.0), |(c, s), v| (c + 1, s + v));
    let mean = sum / count as f64;
    values.map(|v| (v - mean).powi(2)).sum()
}

fn is_flat(mut values: impl Iterator<Item = f64>) -> bool {
    match values.next() {
        Some(first) => values.all(|value| value == first),
        None => true,
    }
}

fn check_window(window: usize) -> Result<(), AnalyticsError> {
    if window < 2 {
        return Err(AnalyticsError::InvalidWindow(window));
    }
    Ok(())
}

/// Rolling z-score of each point against the `window` points ending at it.
/// The first `window - 1` points and flat windows are absent from the output.
pub fn rolling_zscore(series: &[Observation], window: usize) -> Result<Series, AnalyticsError> {
    check_window(window)?;

    let mut moments = RollingMoments::new(window);
    let mut out = Vec::with_capacity(series.len().saturating_sub(window - 1));
    for obs in series.iter().filter(|obs| obs.value.is_finite()) {
        moments.push(obs.value);
        if let Some(z) = moments.zscore() {
            out.push(Observation::new(obs.timestamp_ms, z));
        }
    }
    Ok(out)
}

/// Rolling Pearson correlation over the inner join of `a` and `b`.
pub fn rolling_correlation(
    a: &[Observation],
    b: &[Observation],
    window: usize,
) -> Result<Series, AnalyticsError> {
    check_window(window)?;

    let mut comoments = RollingComoments::new(window);
    let rows = align(a, b);
    let mut out = Vec::with_capacity(rows.len().saturating_sub(window - 1));
    for row in rows {
        comoments.push(row.a, row.b);
        if let Some(rho) = comoments.correlation() {
            out.push(Observation::new(row.timestamp_ms, rho));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn series_from(values: &[f64]) -> Series {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| Observation::new(i as u64 * 1_000, v))
            .collect()
    }

    fn naive_zscore(values: &[f64]) -> f64 {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        (values[values.len() - 1] - mean) / var.sqrt()
    }

    #[test]
    fn zscore_defined_count_matches_window() {
        let mut rng = StdRng::seed_from_u64(3);
        let values: Vec<f64> = (0..57).map(|_| rng.gen_range(90.0..110.0)).collect();
        let series = series_from(&values);

        for window in [2, 5, 20, 57, 80] {
            let z = rolling_zscore(&series, window).expect("zscore");
            assert_eq!(z.len(), (values.len() + 1).saturating_sub(window), "window {window}");
        }
    }

    #[test]
    fn zscore_matches_two_pass_reference() {
        let mut rng = StdRng::seed_from_u64(5);
        // large offset stresses cancellation in naive running sums
        let values: Vec<f64> = (0..400).map(|_| 1.0e6 + rng.gen_range(-1.0..1.0)).collect();
        let window = 20;

        let z = rolling_zscore(&series_from(&values), window).expect("zscore");
        for (offset, obs) in z.iter().enumerate() {
            let expected = naive_zscore(&values[offset..offset + window]);
            assert!(
                (obs.value - expected).abs() < 1e-6,
                "index {offset}: {} vs {expected}",
                obs.value
            );
            assert_eq!(obs.timestamp_ms, (offset + window - 1) as u64 * 1_000);
        }
    }

    #[test]
    fn flat_window_is_undefined() {
        let mut values = vec![5.0; 10];
        values.extend([6.0, 7.0]);
        values.extend(vec![3.0; 10]);
        let z = rolling_zscore(&series_from(&values), 5).expect("zscore");

        assert!(z.iter().all(|obs| obs.value.is_finite()));
        // windows ending at indexes 4..=9 and 16..=21 are flat
        let stamps: Vec<u64> = z.iter().map(|obs| obs.timestamp_ms / 1_000).collect();
        assert_eq!(stamps, (10..=15).collect::<Vec<u64>>());
    }

    #[test]
    fn window_below_two_is_rejected() {
        let series = series_from(&[1.0, 2.0, 3.0]);
        assert_eq!(rolling_zscore(&series, 1), Err(AnalyticsError::InvalidWindow(1)));
        assert_eq!(
            rolling_correlation(&series, &series, 0),
            Err(AnalyticsError::InvalidWindow(0))
        );
    }

    #[test]
    fn correlation_of_linear_pair_is_one() {
        let a: Vec<f64> = (0..30).map(|i| (i as f64 * 0.7).sin() * 10.0 + 100.0).collect();
        let b: Vec<f64> = a.iter().map(|v| -3.0 * v + 4.0).collect();

        let rho = rolling_correlation(&series_from(&a), &series_from(&b), 10).expect("corr");
        assert_eq!(rho.len(), 21);
        assert!(rho.iter().all(|obs| (obs.value + 1.0).abs() < 1e-9));
    }

    #[test]
    fn correlation_matches_reference_on_noise() {
        let mut rng = StdRng::seed_from_u64(21);
        let a: Vec<f64> = (0..200).map(|_| rng.gen_range(0.0..1.0)).collect();
        let b: Vec<f64> = a.iter().map(|v| v + rng.gen_range(0.0..1.0)).collect();
        let window = 25;

        let rho = rolling_correlation(&series_from(&a), &series_from(&b), window).expect("corr");
        for (offset, obs) in rho.iter().enumerate() {
            let xs = &a[offset..offset + window];
            let ys = &b[offset..offset + window];
            let mx = xs.iter().sum::<f64>() / window as f64;
            let my = ys.iter().sum::<f64>() / window as f64;
            let sxy: f64 = xs.iter().zip(ys).map(|(x, y)| (x - mx) * (y - my)).sum();
            let sxx: f64 = xs.iter().map(|x| (x - mx).powi(2)).sum();
            let syy: f64 = ys.iter().map(|y| (y - my).powi(2)).sum();
            let expected = sxy / (sxx * syy).sqrt();
            assert!((obs.value - expected).abs() < 1e-9, "offset {offset}");
        }
    }

    #[test]
    fn correlation_only_uses_shared_timestamps() {
        let a = series_from(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let b: Series = a
            .iter()
            .filter(|obs| obs.timestamp_ms != 2_000)
            .map(|obs| Observation::new(obs.timestamp_ms, obs.value * 2.0))
            .collect();

        let rho = rolling_correlation(&a, &b, 3).expect("corr");
        let stamps: Vec<u64> = rho.iter().map(|obs| obs.timestamp_ms).collect();
        assert_eq!(stamps, vec![3_000, 4_000]);
    }

    #[test]
    fn correlation_is_absent_while_one_leg_is_flat() {
        let a = series_from(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let b = series_from(&[7.0, 7.0, 7.0, 7.0, 8.0, 9.0]);
        let rho = rolling_correlation(&a, &b, 3).expect("corr");

        let stamps: Vec<u64> = rho.iter().map(|obs| obs.timestamp_ms).collect();
        assert_eq!(stamps, vec![4_000, 5_000]);
        assert!(rho.iter().all(|obs| obs.value.is_finite()));
        assert!((rho[1].value - 1.0).abs() < 1e-9);
    }
}
