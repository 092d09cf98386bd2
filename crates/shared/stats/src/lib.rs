//! Meridian Statistics
//!
//! Pure `f64` statistics over return and equity series. Every function is
//! total: empty or degenerate input yields `0.0` (or `None` where there is
//! no meaningful answer), never NaN and never a panic.

mod descriptive;
mod regression;
mod risk;

pub use descriptive::{
    downside_deviation, kurtosis, mean, percentile, simple_returns, skewness, std_dev, variance,
};
pub use regression::{Regression, correlation, covariance, linear_regression};
pub use risk::{
    DrawdownStats, drawdown_series, drawdown_stats, historical_cvar, historical_var,
    inverse_normal_cdf, parametric_var, tail_ratio,
};
