use nalgebra::{DMatrix, DVector};

use crate::error::AnalyticsError;

/// Ordinary least squares fit of `y` on the columns of `x`, solved through a
/// thin QR factorisation rather than the normal equations.
pub(crate) struct OlsFit {
    pub params: DVector<f64>,
    pub std_errors: DVector<f64>,
    pub ssr: f64,
    pub nobs: usize,
}

const RANK_TOLERANCE: f64 = 1e-10;

pub(crate) fn fit(y: &DVector<f64>, x: &DMatrix<f64>) -> Result<OlsFit, AnalyticsError> {
    let (nobs, k) = x.shape();
    if nobs < k || k == 0 {
        return Err(AnalyticsError::InsufficientData {
            required: k.max(1),
            available: nobs,
        });
    }

    let scale = x
        .column_iter()
        .map(|column| column.norm())
        .fold(1.0_f64, f64::max);

    let qr = x.clone().qr();
    let r = qr.r();
    if (0..k).any(|i| r[(i, i)].abs() <= RANK_TOLERANCE * scale) {
        return Err(AnalyticsError::Singular);
    }

    let qty = qr.q().transpose() * y;
    let params = r
        .solve_upper_triangular(&qty)
        .ok_or(AnalyticsError::Singular)?;

    let residuals = y - x * &params;
    let ssr = residuals.norm_squared();

    let dof = nobs - k;
    let std_errors = if dof == 0 {
        DVector::from_element(k, f64::NAN)
    } else {
        let sigma2 = ssr / dof as f64;
        let r_inv = r
            .solve_upper_triangular(&DMatrix::identity(k, k))
            .ok_or(AnalyticsError::Singular)?;
        // (X'X)^-1 = R^-1 R^-T, only the diagonal is needed
        DVector::from_iterator(
            k,
            (0..k).map(|i| (sigma2 * r_inv.row(i).norm_squared()).sqrt()),
        )
    };

    Ok(OlsFit {
        params,
        std_errors,
        ssr,
        nobs,
    })
}

impl OlsFit {
    pub fn t_value(&self, index: usize) -> f64 {
        self.params[index] / self.std_errors[index]
    }

    /// Gaussian log-likelihood based AIC, `-2 llf + 2 k`.
    pub fn aic(&self) -> f64 {
        let n = self.nobs as f64;
        let llf = -0.5 * n * ((2.0 * std::f64::consts::PI).ln() + (self.ssr / n).ln() + 1.0);
        -2.0 * llf + 2.0 * self.params.len() as f64
    }

    pub fn r_squared(&self, y: &DVector<f64>) -> f64 {
        let mean = y.mean();
        let sst: f64 = y.iter().map(|v| (v - mean).powi(2)).sum();
        if sst == 0.0 {
            0.0
        } else {
            1.0 - self.ssr / sst
        }
    }
}
