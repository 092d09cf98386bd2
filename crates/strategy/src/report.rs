use chrono::{DateTime, Utc};
use meridian_core::{PositionInfo, StrategyId, Symbol};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::StrategyCategory;
use crate::state::StrategyState;

/// Point-in-time view of a strategy, cheap to clone across tasks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategySnapshot {
    pub id: StrategyId,
    pub name: String,
    pub category: StrategyCategory,
    pub state: StrategyState,
    pub symbols: Vec<Symbol>,
    pub initial_capital: Decimal,
    pub cash: Decimal,
    pub equity: Decimal,
    pub realized_pnl: Decimal,
    pub unrealized_pnl: Decimal,
    pub commission: Decimal,
    pub gross_exposure: Decimal,
    pub positions: Vec<PositionInfo>,
    pub open_orders: usize,
    pub trade_count: u64,
    pub error_count: u32,
    pub restart_count: u32,
    pub halted: bool,
    pub max_position_fraction: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl StrategySnapshot {
    /// Return on initial capital
    pub fn total_return(&self) -> Decimal {
        if self.initial_capital.is_zero() {
            Decimal::ZERO
        } else {
            (self.equity - self.initial_capital) / self.initial_capital
        }
    }

    /// Realized + unrealized, net of commissions
    pub fn net_pnl(&self) -> Decimal {
        self.equity - self.initial_capital
    }

    pub fn largest_position_value(&self) -> Decimal {
        self.positions
            .iter()
            .map(|p| p.market_value.abs())
            .max()
            .unwrap_or(Decimal::ZERO)
    }
}

/// Summary produced when a strategy stops
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyReport {
    pub id: StrategyId,
    pub name: String,
    pub state: StrategyState,
    pub initial_capital: Decimal,
    pub final_equity: Decimal,
    pub total_return: Decimal,
    pub realized_pnl: Decimal,
    pub unrealized_pnl: Decimal,
    pub commission: Decimal,
    /// Executions during the last run
    pub trades: u64,
    /// Orders submitted during the last run
    pub orders: u64,
    pub error_count: u32,
    pub restart_count: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub stopped_at: DateTime<Utc>,
}

impl StrategyReport {
    pub fn runtime(&self) -> chrono::Duration {
        self.started_at
            .map(|start| self.stopped_at - start)
            .unwrap_or_else(chrono::Duration::zero)
    }
}

impl fmt::Display for StrategyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Strategy {} ({}) - {}", self.name, self.id, self.state)?;
        writeln!(f, "  Initial capital: {}", self.initial_capital.round_dp(2))?;
        writeln!(f, "  Final equity:    {}", self.final_equity.round_dp(2))?;
        writeln!(
            f,
            "  Return:          {}%",
            (self.total_return * Decimal::ONE_HUNDRED).round_dp(2)
        )?;
        writeln!(f, "  Realized P&L:    {}", self.realized_pnl.round_dp(2))?;
        writeln!(f, "  Unrealized P&L:  {}", self.unrealized_pnl.round_dp(2))?;
        writeln!(f, "  Commission:      {}", self.commission.round_dp(2))?;
        writeln!(f, "  Orders/Trades:   {}/{}", self.orders, self.trades)?;
        writeln!(
            f,
            "  Errors/Restarts: {}/{}",
            self.error_count, self.restart_count
        )?;
        write!(f, "  Runtime:         {}s", self.runtime().num_seconds())
    }
}
