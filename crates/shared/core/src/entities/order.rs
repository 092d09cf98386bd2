use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{OrderStatus, OrderType, Side};
use crate::error::ValidationError;
use crate::values::{Price, Quantity, StrategyId, Symbol};

/// Unique identifier for an order
pub type OrderId = Uuid;

/// Full order details.
///
/// Created by a strategy; mutated only through [`OrderInfo::record_fill`] and
/// [`OrderInfo::cancel`] by whichever component executes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderInfo {
    pub id: OrderId,
    /// Strategy that owns this order
    pub strategy_id: StrategyId,
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Quantity,
    /// Required for Limit and StopLimit orders
    pub price: Option<Price>,
    /// Required for Stop and StopLimit orders
    pub stop_price: Option<Price>,
    pub status: OrderStatus,
    pub filled_quantity: Quantity,
    /// Volume-weighted average fill price
    pub avg_fill_price: Price,
    /// Total commission charged so far
    pub commission: Decimal,
    /// Set when the order is cancelled or rejected
    pub cancel_reason: Option<String>,
    /// Commission as a fraction of notional; the executor's own rate when None
    #[serde(default)]
    pub commission_rate: Option<Decimal>,
    /// Adverse price adjustment on market and stop fills; the executor's own
    /// rate when None
    #[serde(default)]
    pub slippage_rate: Option<Decimal>,
    /// Only shrinks an existing position. Exempt from volume participation caps.
    #[serde(default)]
    pub reduce_only: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderInfo {
    /// Create a new order with explicit timestamp
    #[allow(clippy::too_many_arguments)]
    pub fn new_with_time(
        strategy_id: impl Into<StrategyId>,
        symbol: impl Into<Symbol>,
        side: Side,
        order_type: OrderType,
        quantity: Quantity,
        price: Option<Price>,
        stop_price: Option<Price>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            strategy_id: strategy_id.into(),
            symbol: symbol.into(),
            side,
            order_type,
            quantity,
            price,
            stop_price,
            status: OrderStatus::Pending,
            filled_quantity: Decimal::ZERO,
            avg_fill_price: Decimal::ZERO,
            commission: Decimal::ZERO,
            cancel_reason: None,
            commission_rate: None,
            slippage_rate: None,
            reduce_only: false,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Market order stamped with the current system time
    pub fn market(
        strategy_id: impl Into<StrategyId>,
        symbol: impl Into<Symbol>,
        side: Side,
        quantity: Quantity,
    ) -> Self {
        Self::new_with_time(
            strategy_id,
            symbol,
            side,
            OrderType::Market,
            quantity,
            None,
            None,
            Utc::now(),
        )
    }

    /// Limit order stamped with the current system time
    pub fn limit(
        strategy_id: impl Into<StrategyId>,
        symbol: impl Into<Symbol>,
        side: Side,
        quantity: Quantity,
        price: Price,
    ) -> Self {
        Self::new_with_time(
            strategy_id,
            symbol,
            side,
            OrderType::Limit,
            quantity,
            Some(price),
            None,
            Utc::now(),
        )
    }

    /// Charge these rates instead of the executor's defaults
    pub fn with_costs(mut self, commission_rate: Decimal, slippage_rate: Decimal) -> Self {
        self.commission_rate = Some(commission_rate);
        self.slippage_rate = Some(slippage_rate);
        self
    }

    pub fn reducing(mut self) -> Self {
        self.reduce_only = true;
        self
    }

    /// Validate the order based on order type requirements
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.quantity <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveQuantity(self.quantity));
        }
        if self.order_type.requires_limit_price()
            && !self.price.is_some_and(|p| p > Decimal::ZERO)
        {
            return Err(ValidationError::MissingPrice {
                order_type: self.order_type.to_string(),
                field: "limit",
            });
        }
        if self.order_type.requires_stop_price()
            && !self.stop_price.is_some_and(|p| p > Decimal::ZERO)
        {
            return Err(ValidationError::MissingPrice {
                order_type: self.order_type.to_string(),
                field: "stop",
            });
        }
        Ok(())
    }

    /// Apply an execution. Keeps `filled_quantity <= quantity` and refuses to
    /// touch terminal orders.
    pub fn record_fill(
        &mut self,
        quantity: Quantity,
        price: Price,
        commission: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Result<(), ValidationError> {
        if self.status.is_terminal() {
            return Err(ValidationError::OrderTerminal(self.id));
        }
        if quantity <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveQuantity(quantity));
        }
        let new_filled = self.filled_quantity + quantity;
        if new_filled > self.quantity {
            return Err(ValidationError::Overfill {
                order_id: self.id,
                requested: self.quantity,
                filled: new_filled,
            });
        }

        self.avg_fill_price =
            (self.avg_fill_price * self.filled_quantity + price * quantity) / new_filled;
        self.filled_quantity = new_filled;
        self.commission += commission;
        self.updated_at = timestamp;
        if self.filled_quantity == self.quantity {
            self.status = OrderStatus::Filled;
        }
        Ok(())
    }

    /// Cancel the order. Returns false if it was already terminal.
    pub fn cancel(&mut self, reason: impl Into<String>, timestamp: DateTime<Utc>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = OrderStatus::Cancelled;
        self.cancel_reason = Some(reason.into());
        self.updated_at = timestamp;
        true
    }

    /// Returns remaining quantity to be filled
    pub fn remaining_quantity(&self) -> Quantity {
        self.quantity - self.filled_quantity
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Notional at the order's own price, falling back to a reference price
    pub fn notional(&self, reference_price: Price) -> Decimal {
        self.quantity * self.price.unwrap_or(reference_price)
    }
}
