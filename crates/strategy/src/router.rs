//! Seams between a strategy and whatever executes its orders.
//!
//! The Engine and the Backtest Engine each provide an [`OrderRouter`]; a risk
//! layer can plug in as an [`OrderGate`] consulted before an order is queued.

use meridian_core::{OrderInfo, StrategyId, Symbol};
use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::error::Result;

/// Read-only summary of a strategy's book at the moment an order is placed
#[derive(Debug, Clone, Default)]
pub struct ExposureView {
    pub strategy_id: StrategyId,
    pub equity: Decimal,
    pub cash: Decimal,
    /// Signed market value per symbol (shorts negative)
    pub positions: HashMap<Symbol, Decimal>,
    /// Signed quantity per symbol (shorts negative)
    pub quantities: HashMap<Symbol, Decimal>,
    pub max_position_fraction: Decimal,
}

impl ExposureView {
    /// Sum of absolute position values
    pub fn gross_exposure(&self) -> Decimal {
        self.positions.values().map(|v| v.abs()).sum()
    }

    pub fn position_value(&self, symbol: &str) -> Decimal {
        self.positions.get(symbol).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn position_quantity(&self, symbol: &str) -> Decimal {
        self.quantities.get(symbol).copied().unwrap_or(Decimal::ZERO)
    }

    /// True if executing the order would shrink the absolute position
    pub fn reduces_position(&self, order: &OrderInfo) -> bool {
        let current = self.position_quantity(&order.symbol);
        let after = current + order.quantity * order.side.sign();
        !current.is_zero() && after.abs() < current.abs() && after * current >= Decimal::ZERO
    }
}

/// Outcome of a pre-trade risk check: a boolean/reason pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskCheck {
    pub approved: bool,
    pub reason: Option<String>,
}

impl RiskCheck {
    pub fn approve() -> Self {
        Self {
            approved: true,
            reason: None,
        }
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            approved: false,
            reason: Some(reason.into()),
        }
    }
}

/// Delivers an accepted order to its executor.
///
/// Called synchronously from inside strategy hooks, so implementations must
/// not block or await; they enqueue and return.
pub trait OrderRouter: Send + Sync {
    fn route(&self, order: OrderInfo, view: &ExposureView) -> Result<()>;
}

/// Synchronous pre-trade check run before an order is queued
pub trait OrderGate: Send + Sync {
    fn check_order(&self, order: &OrderInfo, view: &ExposureView) -> RiskCheck;
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_core::Side;
    use rust_decimal_macros::dec;

    fn view_with(symbol: &str, qty: Decimal, value: Decimal) -> ExposureView {
        let mut view = ExposureView::default();
        view.quantities.insert(symbol.to_string(), qty);
        view.positions.insert(symbol.to_string(), value);
        view
    }

    #[test]
    fn test_reduces_position() {
        let view = view_with("AAPL", dec!(100), dec!(5000));

        let partial = OrderInfo::market("s", "AAPL", Side::Sell, dec!(40));
        let flip = OrderInfo::market("s", "AAPL", Side::Sell, dec!(250));
        let add = OrderInfo::market("s", "AAPL", Side::Buy, dec!(10));
        let full = OrderInfo::market("s", "AAPL", Side::Sell, dec!(100));

        assert!(view.reduces_position(&partial));
        assert!(view.reduces_position(&full));
        assert!(!view.reduces_position(&flip));
        assert!(!view.reduces_position(&add));
    }

    #[test]
    fn test_gross_exposure() {
        let mut view = view_with("AAPL", dec!(100), dec!(5000));
        view.positions.insert("TSLA".to_string(), dec!(-3000));
        assert_eq!(view.gross_exposure(), dec!(8000));
    }
}
