use chrono::{DateTime, Utc};
use meridian_core::{ClosedTrade, EquityPoint, StrategyId, TradeInfo};
use meridian_performance::PerformanceMetrics;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Everything derived from one backtest run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub strategy_id: StrategyId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub initial_capital: Decimal,
    pub final_equity: Decimal,

    pub total_return: f64,
    pub annual_return: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub max_drawdown: f64,
    pub max_drawdown_duration: usize,

    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    /// Closed position legs
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,

    /// Executions
    pub fills: usize,
    pub total_commission: Decimal,
    /// Price concession paid to slippage across all fills
    pub slippage_cost: Decimal,
    /// Orders cancelled for insufficient cash or position
    pub rejected_orders: usize,
    /// Orders still resting when the data ran out
    pub unfilled_orders: usize,
    pub bars_processed: usize,
    pub dropped_rows: usize,
    pub restarts: u32,

    pub benchmark_return: Option<f64>,
    pub equity_curve: Vec<EquityPoint>,
    pub trades: Vec<TradeInfo>,
    pub closed_trades: Vec<ClosedTrade>,
    pub metrics: PerformanceMetrics,
}

impl BacktestResult {
    pub fn net_pnl(&self) -> Decimal {
        self.final_equity - self.initial_capital
    }

    /// Strategy return in excess of the benchmark, if there is one
    pub fn excess_return(&self) -> Option<f64> {
        self.benchmark_return.map(|b| self.total_return - b)
    }
}

impl fmt::Display for BacktestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Backtest {} ({} .. {})",
            self.strategy_id,
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )?;
        writeln!(
            f,
            "  Equity {:.2} -> {:.2} ({:+.2}%), annual {:+.2}%",
            self.initial_capital,
            self.final_equity,
            self.total_return * 100.0,
            self.annual_return * 100.0
        )?;
        writeln!(
            f,
            "  Sharpe {:.2}  Sortino {:.2}  vol {:.2}%  maxDD {:.2}% over {} bars",
            self.sharpe_ratio,
            self.sortino_ratio,
            self.volatility * 100.0,
            self.max_drawdown * 100.0,
            self.max_drawdown_duration
        )?;
        writeln!(
            f,
            "  Trades {} ({} won, {} lost), win rate {:.1}%, profit factor {:.2}",
            self.total_trades,
            self.winning_trades,
            self.losing_trades,
            self.win_rate * 100.0,
            self.profit_factor
        )?;
        write!(
            f,
            "  Fills {}  commission {:.2}  slippage {:.2}  rejected {}  unfilled {}",
            self.fills,
            self.total_commission,
            self.slippage_cost,
            self.rejected_orders,
            self.unfilled_orders
        )?;
        if let Some(benchmark) = self.benchmark_return {
            write!(f, "\n  Benchmark {:+.2}%", benchmark * 100.0)?;
        }
        Ok(())
    }
}
