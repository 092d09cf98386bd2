//! Tail risk and drawdowns

use serde::{Deserialize, Serialize};

use crate::descriptive::{mean, percentile};

/// Historical Value-at-Risk: the `(1 - confidence)` percentile of the
/// return series, expressed as a return (losses are negative).
pub fn historical_var(returns: &[f64], confidence: f64) -> Option<f64> {
    percentile(returns, (1.0 - confidence) * 100.0)
}

/// Historical Conditional VaR: mean of the returns at or below VaR
pub fn historical_cvar(returns: &[f64], confidence: f64) -> Option<f64> {
    let var = historical_var(returns, confidence)?;
    let tail: Vec<f64> = returns.iter().copied().filter(|r| *r <= var).collect();
    if tail.is_empty() {
        Some(var)
    } else {
        Some(mean(&tail))
    }
}

/// Gaussian VaR for the given mean and standard deviation
pub fn parametric_var(mu: f64, sigma: f64, confidence: f64) -> f64 {
    mu + sigma * inverse_normal_cdf(1.0 - confidence)
}

/// Right tail over left tail: `|p95| / |p5|`, 0 when the left tail is flat
pub fn tail_ratio(returns: &[f64]) -> f64 {
    match (percentile(returns, 95.0), percentile(returns, 5.0)) {
        (Some(right), Some(left)) if left.abs() > f64::EPSILON => right.abs() / left.abs(),
        _ => 0.0,
    }
}

/// Drawdown summary of an equity series
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DrawdownStats {
    /// Largest peak-to-trough decline as a fraction of the peak
    pub max_drawdown: f64,
    /// Longest run of consecutive periods spent below a prior peak
    pub max_duration: usize,
    /// Decline of the last observation from its running peak
    pub current_drawdown: f64,
    /// Mean drawdown over the periods spent under water
    pub avg_drawdown: f64,
}

/// Fractional decline from the running peak at every observation
pub fn drawdown_series(equity: &[f64]) -> Vec<f64> {
    let mut peak = f64::MIN;
    equity
        .iter()
        .map(|&value| {
            peak = peak.max(value);
            if peak > 0.0 {
                ((peak - value) / peak).max(0.0)
            } else {
                0.0
            }
        })
        .collect()
}

/// Max drawdown and its duration from a running peak and a streak counter
pub fn drawdown_stats(equity: &[f64]) -> DrawdownStats {
    let series = drawdown_series(equity);
    if series.is_empty() {
        return DrawdownStats::default();
    }

    let mut max_drawdown: f64 = 0.0;
    let mut streak = 0usize;
    let mut max_duration = 0usize;
    let mut underwater_sum = 0.0;
    let mut underwater_count = 0usize;

    for &dd in &series {
        max_drawdown = max_drawdown.max(dd);
        if dd > 0.0 {
            streak += 1;
            underwater_sum += dd;
            underwater_count += 1;
            max_duration = max_duration.max(streak);
        } else {
            streak = 0;
        }
    }

    DrawdownStats {
        max_drawdown,
        max_duration,
        current_drawdown: series.last().copied().unwrap_or(0.0),
        avg_drawdown: if underwater_count > 0 {
            underwater_sum / underwater_count as f64
        } else {
            0.0
        },
    }
}

/// Standard normal quantile (Acklam's rational approximation,
/// relative error below 1.2e-9).
pub fn inverse_normal_cdf(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969683028665376e1,
        2.209460984245205e2,
        -2.759285104469687e2,
        1.383577518672690e2,
        -3.066479806614716e1,
        2.506628277459239e0,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e1,
        1.615858368580409e2,
        -1.556989798598866e2,
        6.680131188771972e1,
        -1.328068155288572e1,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-3,
        -3.223964580411365e-1,
        -2.400758277161838e0,
        -2.549732539343734e0,
        4.374664141464968e0,
        2.938163982698783e0,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-3,
        3.224671290700398e-1,
        2.445134137142996e0,
        3.754408661907416e0,
    ];
    const P_LOW: f64 = 0.02425;

    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    let tail = |q: f64| {
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };

    if p < P_LOW {
        tail((-2.0 * p.ln()).sqrt())
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        -tail((-2.0 * (1.0 - p).ln()).sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand_distr::{Distribution, Normal};

    #[test]
    fn test_var_of_increasing_series_is_percentile() {
        for n in [20usize, 37, 100] {
            let series: Vec<f64> = (0..n).map(|i| -0.05 + 0.001 * i as f64).collect();
            let var = historical_var(&series, 0.95).unwrap();
            assert_eq!(Some(var), percentile(&series, 5.0));
            assert!(var >= series[0] && var <= series[n - 1]);
        }
    }

    #[test]
    fn test_var_matches_normal_quantile() {
        let (mu, sigma) = (0.0005, 0.01);
        let normal = Normal::new(mu, sigma).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let returns: Vec<f64> = (0..200_000).map(|_| normal.sample(&mut rng)).collect();

        let empirical = historical_var(&returns, 0.95).unwrap();
        let closed_form = parametric_var(mu, sigma, 0.95);
        assert_relative_eq!(empirical, closed_form, max_relative = 0.02);

        let cvar = historical_cvar(&returns, 0.95).unwrap();
        assert!(cvar < empirical);
    }

    #[test]
    fn test_inverse_normal_cdf_known_points() {
        assert_relative_eq!(inverse_normal_cdf(0.5), 0.0, epsilon = 1e-9);
        assert_relative_eq!(inverse_normal_cdf(0.05), -1.6448536, epsilon = 1e-6);
        assert_relative_eq!(inverse_normal_cdf(0.99), 2.3263479, epsilon = 1e-6);
        assert_relative_eq!(inverse_normal_cdf(0.001), -3.0902323, epsilon = 1e-6);
    }

    #[test]
    fn test_drawdown_stats() {
        let equity = [100.0, 110.0, 99.0, 104.5, 115.0, 92.0, 92.0];
        let stats = drawdown_stats(&equity);

        assert_relative_eq!(stats.max_drawdown, 0.2, epsilon = 1e-12);
        assert_eq!(stats.max_duration, 2);
        assert_relative_eq!(stats.current_drawdown, 0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(historical_var(&[], 0.95), None);
        assert_eq!(drawdown_stats(&[]), DrawdownStats::default());
        assert_eq!(tail_ratio(&[0.0, 0.0]), 0.0);
    }
}
