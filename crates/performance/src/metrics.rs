//! The performance metrics bundle

use chrono::{DateTime, Utc};
use meridian_core::ClosedTrade;
use meridian_stats::{
    correlation, downside_deviation, drawdown_stats, historical_cvar, historical_var, kurtosis,
    linear_regression, mean, skewness, std_dev, tail_ratio,
};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::config::PerformanceConfig;
use crate::series::EquitySample;

/// Below this a dispersion is treated as zero
const MIN_DISPERSION: f64 = 1e-12;

fn guarded(numerator: f64, denominator: f64) -> f64 {
    if denominator.abs() > MIN_DISPERSION {
        numerator / denominator
    } else {
        0.0
    }
}

/// Annualisation settings for [`PerformanceMetrics::compute`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricParams {
    pub periods_per_year: f64,
    /// Annual rate
    pub risk_free_rate: f64,
    pub var_confidence: f64,
}

impl Default for MetricParams {
    fn default() -> Self {
        Self::from(&PerformanceConfig::default())
    }
}

impl From<&PerformanceConfig> for MetricParams {
    fn from(config: &PerformanceConfig) -> Self {
        Self {
            periods_per_year: config.periods_per_year(),
            risk_free_rate: config.risk_free_rate,
            var_confidence: config.var_confidence,
        }
    }
}

/// Closed-trade statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeStats {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    /// Gross profit over gross loss
    pub profit_factor: f64,
    pub avg_win: f64,
    /// Mean losing trade, as a negative number
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub avg_trade: f64,
    /// Average win over the magnitude of the average loss
    pub payoff_ratio: f64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    pub total_commission: f64,
}

impl TradeStats {
    /// Statistics over net P&L of each closed leg, in close order
    pub fn from_trades(trades: &[ClosedTrade]) -> Self {
        let pnls: Vec<f64> = trades
            .iter()
            .map(|t| t.net_pnl().to_f64().unwrap_or(0.0))
            .collect();
        let mut stats = Self {
            total_trades: pnls.len(),
            total_commission: trades
                .iter()
                .map(|t| t.commission.to_f64().unwrap_or(0.0))
                .sum(),
            ..Default::default()
        };
        if pnls.is_empty() {
            return stats;
        }

        let wins: Vec<f64> = pnls.iter().copied().filter(|p| *p > 0.0).collect();
        let losses: Vec<f64> = pnls.iter().copied().filter(|p| *p < 0.0).collect();
        let gross_profit: f64 = wins.iter().sum();
        let gross_loss: f64 = losses.iter().sum::<f64>().abs();

        stats.winning_trades = wins.len();
        stats.losing_trades = losses.len();
        stats.win_rate = wins.len() as f64 / pnls.len() as f64;
        stats.profit_factor = guarded(gross_profit, gross_loss);
        stats.avg_win = mean(&wins);
        stats.avg_loss = mean(&losses);
        stats.largest_win = wins.iter().copied().fold(0.0, f64::max);
        stats.largest_loss = losses.iter().copied().fold(0.0, f64::min);
        stats.avg_trade = mean(&pnls);
        stats.payoff_ratio = guarded(stats.avg_win, stats.avg_loss.abs());

        let (mut win_streak, mut loss_streak) = (0usize, 0usize);
        for pnl in &pnls {
            if *pnl > 0.0 {
                win_streak += 1;
                loss_streak = 0;
            } else if *pnl < 0.0 {
                loss_streak += 1;
                win_streak = 0;
            } else {
                win_streak = 0;
                loss_streak = 0;
            }
            stats.max_consecutive_wins = stats.max_consecutive_wins.max(win_streak);
            stats.max_consecutive_losses = stats.max_consecutive_losses.max(loss_streak);
        }
        stats
    }
}

/// Relative figures against a benchmark return series
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkStats {
    /// Annualised regression intercept
    pub alpha: f64,
    pub beta: f64,
    pub correlation: f64,
    pub tracking_error: f64,
    pub information_ratio: f64,
    /// Compounded benchmark return over the aligned window
    pub benchmark_return: f64,
}

impl BenchmarkStats {
    /// Both series are aligned on their most recent observations
    pub fn compute(returns: &[f64], benchmark: &[f64], periods_per_year: f64) -> Option<Self> {
        let n = returns.len().min(benchmark.len());
        if n < 2 {
            return None;
        }
        let strategy = &returns[returns.len() - n..];
        let benchmark = &benchmark[benchmark.len() - n..];

        let regression = linear_regression(benchmark, strategy);
        let active: Vec<f64> = strategy.iter().zip(benchmark).map(|(s, b)| s - b).collect();
        let tracking_error = std_dev(&active) * periods_per_year.sqrt();

        Some(Self {
            alpha: regression.map(|r| r.alpha * periods_per_year).unwrap_or(0.0),
            beta: regression.map(|r| r.beta).unwrap_or(0.0),
            correlation: correlation(strategy, benchmark),
            tracking_error,
            information_ratio: guarded(mean(&active) * periods_per_year, tracking_error),
            benchmark_return: benchmark.iter().fold(1.0, |acc, r| acc * (1.0 + r)) - 1.0,
        })
    }
}

/// Full metrics bundle for one equity curve
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub periods: usize,
    pub initial_equity: f64,
    pub final_equity: f64,

    // Returns
    pub total_return: f64,
    pub annual_return: f64,
    pub best_period: f64,
    pub worst_period: f64,
    /// Share of periods with a positive return
    pub positive_periods: f64,

    // Risk
    pub volatility: f64,
    pub downside_volatility: f64,
    pub max_drawdown: f64,
    pub max_drawdown_duration: usize,
    pub current_drawdown: f64,
    pub avg_drawdown: f64,
    pub var: f64,
    pub cvar: f64,
    pub skewness: f64,
    pub kurtosis: f64,
    pub tail_ratio: f64,

    // Risk-adjusted
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,

    pub trades: TradeStats,
    pub benchmark: Option<BenchmarkStats>,
}

impl PerformanceMetrics {
    /// Derive every metric from an equity curve, its closed trades and an
    /// optional benchmark return series. Degenerate inputs give zeros.
    pub fn compute(
        equity: &[EquitySample],
        trades: &[ClosedTrade],
        benchmark_returns: Option<&[f64]>,
        params: &MetricParams,
    ) -> Self {
        let mut metrics = Self {
            trades: TradeStats::from_trades(trades),
            ..Default::default()
        };
        let (Some(first), Some(last)) = (equity.first(), equity.last()) else {
            return metrics;
        };
        metrics.start = Some(first.timestamp);
        metrics.end = Some(last.timestamp);
        metrics.initial_equity = first.equity;
        metrics.final_equity = last.equity;

        let levels: Vec<f64> = equity.iter().map(|s| s.equity).collect();
        let returns = meridian_stats::simple_returns(&levels);
        metrics.periods = returns.len();
        if returns.is_empty() {
            return metrics;
        }

        let ppy = params.periods_per_year;
        let per_period_rf = params.risk_free_rate / ppy;

        metrics.total_return = guarded(last.equity - first.equity, first.equity);
        let growth = 1.0 + metrics.total_return;
        metrics.annual_return = if growth > 0.0 {
            growth.powf(ppy / returns.len() as f64) - 1.0
        } else {
            -1.0
        };
        if !metrics.annual_return.is_finite() {
            metrics.annual_return = 0.0;
        }

        metrics.best_period = returns.iter().copied().fold(f64::MIN, f64::max);
        metrics.worst_period = returns.iter().copied().fold(f64::MAX, f64::min);
        metrics.positive_periods =
            returns.iter().filter(|r| **r > 0.0).count() as f64 / returns.len() as f64;

        let sigma = std_dev(&returns);
        let downside = downside_deviation(&returns, per_period_rf);
        let excess = mean(&returns) - per_period_rf;
        metrics.volatility = sigma * ppy.sqrt();
        metrics.downside_volatility = downside * ppy.sqrt();
        metrics.sharpe_ratio = if sigma > MIN_DISPERSION {
            excess / sigma * ppy.sqrt()
        } else {
            0.0
        };
        metrics.sortino_ratio = if downside > MIN_DISPERSION {
            excess / downside * ppy.sqrt()
        } else {
            0.0
        };

        let drawdown = drawdown_stats(&levels);
        metrics.max_drawdown = drawdown.max_drawdown;
        metrics.max_drawdown_duration = drawdown.max_duration;
        metrics.current_drawdown = drawdown.current_drawdown;
        metrics.avg_drawdown = drawdown.avg_drawdown;
        metrics.calmar_ratio = guarded(metrics.annual_return, metrics.max_drawdown);

        metrics.var = historical_var(&returns, params.var_confidence).unwrap_or(0.0);
        metrics.cvar = historical_cvar(&returns, params.var_confidence).unwrap_or(0.0);
        metrics.skewness = skewness(&returns);
        metrics.kurtosis = kurtosis(&returns);
        metrics.tail_ratio = tail_ratio(&returns);

        metrics.benchmark =
            benchmark_returns.and_then(|b| BenchmarkStats::compute(&returns, b, ppy));
        metrics
    }

    pub fn win_rate(&self) -> f64 {
        self.trades.win_rate
    }

    /// Composite ranking score: `0.3·Sharpe + 0.3·annual − 0.2·maxDD + 0.2·win rate`
    pub fn composite_score(&self) -> f64 {
        0.3 * self.sharpe_ratio + 0.3 * self.annual_return - 0.2 * self.max_drawdown
            + 0.2 * self.trades.win_rate
    }
}
