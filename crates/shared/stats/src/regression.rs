//! Co-movement between two series

use serde::{Deserialize, Serialize};

use crate::descriptive::{mean, variance};

/// Ordinary least squares fit of `y = alpha + beta * x`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Regression {
    pub alpha: f64,
    pub beta: f64,
    pub r_squared: f64,
}

/// Sample covariance over the common prefix of both series
pub fn covariance(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return 0.0;
    }
    let (x, y) = (&x[..n], &y[..n]);
    let mx = mean(x);
    let my = mean(y);
    x.iter()
        .zip(y)
        .map(|(a, b)| (a - mx) * (b - my))
        .sum::<f64>()
        / (n - 1) as f64
}

/// Pearson correlation, 0 if either series is constant
pub fn correlation(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return 0.0;
    }
    let sx = variance(&x[..n]).sqrt();
    let sy = variance(&y[..n]).sqrt();
    if sx <= f64::EPSILON || sy <= f64::EPSILON {
        return 0.0;
    }
    (covariance(x, y) / (sx * sy)).clamp(-1.0, 1.0)
}

/// Regress `y` on `x`. `None` when `x` has no variance.
pub fn linear_regression(x: &[f64], y: &[f64]) -> Option<Regression> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }
    let (x, y) = (&x[..n], &y[..n]);
    let var_x = variance(x);
    if var_x <= f64::EPSILON {
        return None;
    }
    let beta = covariance(x, y) / var_x;
    let alpha = mean(y) - beta * mean(x);
    let rho = correlation(x, y);
    Some(Regression {
        alpha,
        beta,
        r_squared: rho * rho,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_perfect_linear_fit() {
        let x = [0.01, -0.02, 0.03, 0.00, 0.015];
        let y: Vec<f64> = x.iter().map(|v| 0.001 + 1.5 * v).collect();

        let fit = linear_regression(&x, &y).unwrap();
        assert_relative_eq!(fit.beta, 1.5, epsilon = 1e-9);
        assert_relative_eq!(fit.alpha, 0.001, epsilon = 1e-9);
        assert_relative_eq!(fit.r_squared, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_correlation_bounds() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [4.0, 3.0, 2.0, 1.0];
        assert_relative_eq!(correlation(&x, &y), -1.0, epsilon = 1e-12);
        assert_eq!(correlation(&x, &[1.0, 1.0, 1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_constant_regressor() {
        assert!(linear_regression(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]).is_none());
    }
}
