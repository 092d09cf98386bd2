//! Meridian Performance Analyzer
//!
//! Performance analytics over strategy equity curves:
//!
//! - **Series**: bounded per-strategy equity series with derived returns and
//!   drawdowns, sampled from the Engine on a refresh loop
//! - **Metrics**: returns, volatility, Sharpe/Sortino/Calmar, drawdowns,
//!   VaR/CVaR, higher moments, trade statistics and benchmark alpha/beta
//! - **Comparison**: return correlation matrix and composite ranking
//! - **Reports**: plain text per strategy
//!
//! [`PerformanceMetrics::compute`] is also used directly by the backtester.

pub mod analyzer;
pub mod compare;
pub mod config;
pub mod error;
pub mod metrics;
pub mod report;
pub mod series;

pub use analyzer::PerformanceAnalyzer;
pub use compare::{ComparisonInput, RankedStrategy, StrategyComparison, compare};
pub use config::PerformanceConfig;
pub use error::{PerformanceError, Result};
pub use metrics::{BenchmarkStats, MetricParams, PerformanceMetrics, TradeStats};
pub use report::render_report;
pub use series::{EquitySample, EquitySeries};
