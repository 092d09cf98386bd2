use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Side;
use crate::values::{Price, Quantity, Symbol};

/// Position side - long (bought) or short (sold)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionSide {
    /// Long position - bought the asset, profit when price rises
    Long,
    /// Short position - sold borrowed asset, profit when price falls
    Short,
}

impl PositionSide {
    /// Returns the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            PositionSide::Long => PositionSide::Short,
            PositionSide::Short => PositionSide::Long,
        }
    }

    /// Side of the fill that opens (or adds to) a position of this side
    pub fn opening_side(&self) -> Side {
        match self {
            PositionSide::Long => Side::Buy,
            PositionSide::Short => Side::Sell,
        }
    }

    /// Side of the fill that reduces a position of this side
    pub fn closing_side(&self) -> Side {
        self.opening_side().opposite()
    }

    pub fn sign(&self) -> Decimal {
        match self {
            PositionSide::Long => Decimal::ONE,
            PositionSide::Short => Decimal::NEGATIVE_ONE,
        }
    }
}

impl From<Side> for PositionSide {
    fn from(side: Side) -> Self {
        match side {
            Side::Buy => PositionSide::Long,
            Side::Sell => PositionSide::Short,
        }
    }
}

/// Per-symbol aggregate of a strategy's fills
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionInfo {
    pub symbol: Symbol,

    /// Position side (long/short)
    pub side: PositionSide,

    /// Current position quantity (always positive)
    pub quantity: Quantity,

    /// Volume-weighted average entry price
    pub avg_price: Price,

    /// Last mark price
    pub market_price: Price,

    /// quantity * market_price
    pub market_value: Decimal,

    pub unrealized_pnl: Decimal,

    /// Realized P&L accumulated while this position was open
    pub realized_pnl: Decimal,

    pub opened_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PositionInfo {
    /// Open a new position from a fill
    pub fn open(
        symbol: impl Into<Symbol>,
        side: PositionSide,
        quantity: Quantity,
        price: Price,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            quantity,
            avg_price: price,
            market_price: price,
            market_value: quantity * price,
            unrealized_pnl: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            opened_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Add to the position, recomputing the weighted average price
    pub fn increase(&mut self, quantity: Quantity, price: Price, timestamp: DateTime<Utc>) {
        let total_cost = self.quantity * self.avg_price + quantity * price;
        self.quantity += quantity;
        self.avg_price = total_cost / self.quantity;
        self.updated_at = timestamp;
        self.mark(price, timestamp);
    }

    /// Reduce the position by at most its quantity. The average price is
    /// unchanged. Returns the gross P&L realized by the reduction.
    pub fn reduce(&mut self, quantity: Quantity, price: Price, timestamp: DateTime<Utc>) -> Decimal {
        let closed = quantity.min(self.quantity);
        let pnl = self.pnl_per_unit(price) * closed;
        self.quantity -= closed;
        self.realized_pnl += pnl;
        self.updated_at = timestamp;
        self.mark(price, timestamp);
        pnl
    }

    /// Mark to market at a new price
    pub fn mark(&mut self, price: Price, timestamp: DateTime<Utc>) {
        self.market_price = price;
        self.market_value = self.quantity * price;
        self.unrealized_pnl = self.pnl_per_unit(price) * self.quantity;
        self.updated_at = timestamp;
    }

    pub fn is_flat(&self) -> bool {
        self.quantity.is_zero()
    }

    /// Quantity signed by side (longs positive)
    pub fn signed_quantity(&self) -> Decimal {
        self.quantity * self.side.sign()
    }

    /// Market value signed by side (shorts negative)
    pub fn signed_market_value(&self) -> Decimal {
        self.market_value * self.side.sign()
    }

    /// Unrealized return relative to the cost basis
    pub fn unrealized_return(&self) -> Decimal {
        let cost = self.quantity * self.avg_price;
        if cost.is_zero() {
            Decimal::ZERO
        } else {
            self.unrealized_pnl / cost
        }
    }

    fn pnl_per_unit(&self, price: Price) -> Decimal {
        match self.side {
            PositionSide::Long => price - self.avg_price,
            PositionSide::Short => self.avg_price - price,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_weighted_average_increase() {
        let now = Utc::now();
        let mut pos = PositionInfo::open("AAPL", PositionSide::Long, dec!(100), dec!(50), now);
        pos.increase(dec!(100), dec!(52), now);

        assert_eq!(pos.quantity, dec!(200));
        assert_eq!(pos.avg_price, dec!(51));
        assert_eq!(pos.market_value, dec!(10400));
        assert_eq!(pos.unrealized_pnl, dec!(200));
    }

    #[test]
    fn test_reduce_keeps_average() {
        let now = Utc::now();
        let mut pos = PositionInfo::open("AAPL", PositionSide::Long, dec!(200), dec!(51), now);
        let pnl = pos.reduce(dec!(50), dec!(53), now);

        assert_eq!(pnl, dec!(100));
        assert_eq!(pos.quantity, dec!(150));
        assert_eq!(pos.avg_price, dec!(51));
        assert_eq!(pos.realized_pnl, dec!(100));
    }

    #[test]
    fn test_short_pnl() {
        let now = Utc::now();
        let mut pos = PositionInfo::open("ES", PositionSide::Short, dec!(2), dec!(100), now);
        pos.mark(dec!(90), now);

        assert_eq!(pos.unrealized_pnl, dec!(20));
        assert_eq!(pos.signed_quantity(), dec!(-2));
        assert_eq!(pos.signed_market_value(), dec!(-180));
        assert_eq!(pos.reduce(dec!(2), dec!(95), now), dec!(10));
        assert!(pos.is_flat());
    }
}
