use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{OrderId, OrderInfo, PositionSide, Side};
use crate::values::{Price, Quantity, StrategyId, Symbol};

/// Unique identifier for a trade
pub type TradeId = Uuid;

/// One execution event. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeInfo {
    pub id: TradeId,
    /// Order that produced this execution
    pub order_id: OrderId,
    pub strategy_id: StrategyId,
    pub symbol: Symbol,
    pub side: Side,
    pub quantity: Quantity,
    pub price: Price,
    pub commission: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl TradeInfo {
    /// Create an execution for (part of) an order
    pub fn for_order(
        order: &OrderInfo,
        quantity: Quantity,
        price: Price,
        commission: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id: order.id,
            strategy_id: order.strategy_id.clone(),
            symbol: order.symbol.clone(),
            side: order.side,
            quantity,
            price,
            commission,
            timestamp,
        }
    }

    /// Returns the notional value of the trade (price * quantity)
    pub fn notional(&self) -> Decimal {
        self.price * self.quantity
    }

    /// Quantity signed by side (buys positive)
    pub fn signed_quantity(&self) -> Decimal {
        self.quantity * self.side.sign()
    }
}

/// A realized leg: the part of a fill that reduced an open position,
/// matched against the position's average cost.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub symbol: Symbol,
    /// Side of the position that was reduced
    pub side: PositionSide,
    pub quantity: Quantity,
    /// Average cost of the position at the time of the reduction
    pub entry_price: Price,
    pub exit_price: Price,
    /// Gross P&L of the leg, before commission
    pub realized_pnl: Decimal,
    /// Commission of the closing fill attributed to this leg
    pub commission: Decimal,
    pub opened_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
}

impl ClosedTrade {
    /// P&L net of the closing commission
    pub fn net_pnl(&self) -> Decimal {
        self.realized_pnl - self.commission
    }

    pub fn is_win(&self) -> bool {
        self.net_pnl() > Decimal::ZERO
    }

    /// Return on the capital committed to the leg
    pub fn return_fraction(&self) -> Decimal {
        let cost = self.entry_price * self.quantity;
        if cost.is_zero() {
            Decimal::ZERO
        } else {
            self.net_pnl() / cost
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_trade_from_order() {
        let order = OrderInfo::market("s1", "AAPL", Side::Sell, dec!(10));
        let trade = TradeInfo::for_order(&order, dec!(10), dec!(25), dec!(0.5), Utc::now());

        assert_eq!(trade.order_id, order.id);
        assert_eq!(trade.strategy_id, "s1");
        assert_eq!(trade.notional(), dec!(250));
        assert_eq!(trade.signed_quantity(), dec!(-10));
    }

    #[test]
    fn test_closed_trade_net_pnl() {
        let now = Utc::now();
        let leg = ClosedTrade {
            symbol: "AAPL".to_string(),
            side: PositionSide::Long,
            quantity: dec!(50),
            entry_price: dec!(51),
            exit_price: dec!(53),
            realized_pnl: dec!(100),
            commission: dec!(2),
            opened_at: now,
            closed_at: now,
        };
        assert_eq!(leg.net_pnl(), dec!(98));
        assert!(leg.is_win());
    }
}
