//! Ordinary least squares on a single regressor.

use nalgebra::{Matrix2, Vector2};
use serde::Serialize;

/// A fitted line y = intercept + slope·x.
#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Residual variance SSE/(n−2); 0 when the fit is saturated.
    pub residual_variance: f64,
    pub n: usize,
}

impl LinearFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Fit by solving the 2×2 normal equations. Returns `None` for fewer than
/// two points or a degenerate (constant-x) design.
pub fn fit_ols(x: &[f64], y: &[f64]) -> Option<LinearFit> {
    let n = x.len();
    if n < 2 || n != y.len() {
        return None;
    }
    let nf = n as f64;
    let sx: f64 = x.iter().sum();
    let sxx: f64 = x.iter().map(|v| v * v).sum();
    let sy: f64 = y.iter().sum();
    let sxy: f64 = x.iter().zip(y).map(|(a, b)| a * b).sum();

    let xtx = Matrix2::new(nf, sx, sx, sxx);
    let xty = Vector2::new(sy, sxy);
    let solution = xtx.lu().solve(&xty)?;
    let (intercept, slope) = (solution[0], solution[1]);
    if !intercept.is_finite() || !slope.is_finite() {
        return None;
    }
    // LU succeeds on near-singular designs; reject them explicitly.
    let x_var = sxx / nf - (sx / nf) * (sx / nf);
    if x_var.abs() < 1e-12 {
        return None;
    }

    let sse: f64 = x
        .iter()
        .zip(y)
        .map(|(a, b)| {
            let r = b - (intercept + slope * a);
            r * r
        })
        .sum();
    let residual_variance = if n > 2 { sse / (n - 2) as f64 } else { 0.0 };
    Some(LinearFit {
        slope,
        intercept,
        residual_variance,
        n,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_known_line() {
        let x: Vec<f64> = (0..20).map(|i| i as f64 * 0.05).collect();
        let y: Vec<f64> = x.iter().map(|v| 0.12 + 0.8 * v).collect();
        let fit = fit_ols(&x, &y).unwrap();
        assert!((fit.slope - 0.8).abs() < 1e-10);
        assert!((fit.intercept - 0.12).abs() < 1e-10);
        assert!(fit.residual_variance < 1e-18);
    }

    #[test]
    fn rejects_degenerate_designs() {
        assert!(fit_ols(&[1.0], &[2.0]).is_none());
        assert!(fit_ols(&[3.0, 3.0, 3.0], &[1.0, 2.0, 3.0]).is_none());
    }
}
