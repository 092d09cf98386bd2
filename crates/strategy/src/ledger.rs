//! Strategy Ledger
//!
//! Cash, positions, orders and executions of a single strategy. Positions use
//! weighted-average-cost accounting:
//!
//! 1. A fill in the position's direction recomputes the average price.
//! 2. A fill against it realizes P&L at the unchanged average price.
//! 3. A fill larger than the position closes it and opens the opposite side
//!    for the remainder at the fill price.
//!
//! Every reduction is recorded as a [`ClosedTrade`] leg, matched against the
//! average cost at the time of the fill.
//!
//! Histories are bounded by `history_limit` (oldest entries evicted first).

use chrono::{DateTime, Utc};
use meridian_core::{
    ClosedTrade, EquityPoint, OrderId, OrderInfo, PositionInfo, PositionSide, Price, Side,
    StrategyId, Symbol, TradeInfo, ValidationError,
};
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};

use crate::error::{Result, StrategyError};
use crate::router::ExposureView;

/// What a fill did to the ledger
#[derive(Debug, Clone)]
pub struct FillOutcome {
    /// Updated copy of the order, if the ledger knew it
    pub order: Option<OrderInfo>,
    /// Gross P&L realized by this fill
    pub realized_pnl: Decimal,
    /// Leg closed by this fill, if it reduced a position
    pub closed: Option<ClosedTrade>,
    /// Position after the fill (None when flat)
    pub position: Option<PositionInfo>,
}

#[derive(Debug, Clone)]
pub struct Ledger {
    initial_capital: Decimal,
    cash: Decimal,
    positions: HashMap<Symbol, PositionInfo>,
    orders: HashMap<OrderId, OrderInfo>,
    /// Terminal orders in completion order, for eviction
    retired: VecDeque<OrderId>,
    trades: VecDeque<TradeInfo>,
    closed_trades: VecDeque<ClosedTrade>,
    equity_history: VecDeque<EquityPoint>,
    history_limit: usize,
    realized_pnl: Decimal,
    total_commission: Decimal,
    /// Lifetime execution count (the trade log itself is bounded)
    trade_count: u64,
    last_prices: HashMap<Symbol, Price>,
}

fn push_bounded<T>(buffer: &mut VecDeque<T>, item: T, limit: usize) {
    buffer.push_back(item);
    while buffer.len() > limit {
        buffer.pop_front();
    }
}

impl Ledger {
    pub fn new(initial_capital: Decimal, history_limit: usize) -> Self {
        Self {
            initial_capital,
            cash: initial_capital,
            positions: HashMap::new(),
            orders: HashMap::new(),
            retired: VecDeque::new(),
            trades: VecDeque::new(),
            closed_trades: VecDeque::new(),
            equity_history: VecDeque::new(),
            history_limit: history_limit.max(1),
            realized_pnl: Decimal::ZERO,
            total_commission: Decimal::ZERO,
            trade_count: 0,
            last_prices: HashMap::new(),
        }
    }

    pub fn initial_capital(&self) -> Decimal {
        self.initial_capital
    }

    pub fn cash(&self) -> Decimal {
        self.cash
    }

    /// Cash plus signed market value of every open position
    pub fn equity(&self) -> Decimal {
        self.cash
            + self
                .positions
                .values()
                .map(PositionInfo::signed_market_value)
                .sum::<Decimal>()
    }

    pub fn realized_pnl(&self) -> Decimal {
        self.realized_pnl
    }

    pub fn unrealized_pnl(&self) -> Decimal {
        self.positions.values().map(|p| p.unrealized_pnl).sum()
    }

    pub fn total_commission(&self) -> Decimal {
        self.total_commission
    }

    /// Sum of absolute position values
    pub fn gross_exposure(&self) -> Decimal {
        self.positions.values().map(|p| p.market_value.abs()).sum()
    }

    pub fn position(&self, symbol: &str) -> Option<&PositionInfo> {
        self.positions.get(symbol)
    }

    pub fn positions(&self) -> impl Iterator<Item = &PositionInfo> {
        self.positions.values()
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    /// Signed quantity held (0 when flat)
    pub fn signed_quantity(&self, symbol: &str) -> Decimal {
        self.positions
            .get(symbol)
            .map(PositionInfo::signed_quantity)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn order(&self, id: &OrderId) -> Option<&OrderInfo> {
        self.orders.get(id)
    }

    pub fn open_orders(&self) -> impl Iterator<Item = &OrderInfo> {
        self.orders.values().filter(|o| o.status.is_active())
    }

    /// Remaining quantity of pending orders on one side of a symbol
    pub fn pending_quantity(&self, symbol: &str, side: Side) -> Decimal {
        self.open_orders()
            .filter(|o| o.symbol == symbol && o.side == side)
            .map(OrderInfo::remaining_quantity)
            .sum()
    }

    /// Cash earmarked for pending buys at their limit (or last) price
    pub fn reserved_cash(&self) -> Decimal {
        self.open_orders()
            .filter(|o| o.side == Side::Buy)
            .map(|o| {
                let price = o
                    .price
                    .or_else(|| self.last_price(&o.symbol))
                    .unwrap_or(Decimal::ZERO);
                o.remaining_quantity() * price
            })
            .sum()
    }

    pub fn available_cash(&self) -> Decimal {
        self.cash - self.reserved_cash()
    }

    pub fn trades(&self) -> &VecDeque<TradeInfo> {
        &self.trades
    }

    pub fn trade_count(&self) -> u64 {
        self.trade_count
    }

    pub fn closed_trades(&self) -> &VecDeque<ClosedTrade> {
        &self.closed_trades
    }

    pub fn equity_history(&self) -> &VecDeque<EquityPoint> {
        &self.equity_history
    }

    pub fn last_price(&self, symbol: &str) -> Option<Price> {
        self.last_prices.get(symbol).copied()
    }

    /// Track a newly accepted order
    pub fn register_order(&mut self, order: OrderInfo) {
        self.orders.insert(order.id, order);
    }

    /// Cancel a pending order, returning its final state
    pub fn cancel_order(
        &mut self,
        id: &OrderId,
        reason: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<OrderInfo> {
        let order = self
            .orders
            .get_mut(id)
            .ok_or(StrategyError::UnknownOrder(*id))?;
        if !order.cancel(reason, timestamp) {
            return Err(ValidationError::OrderTerminal(*id).into());
        }
        let snapshot = order.clone();
        self.retire(*id);
        Ok(snapshot)
    }

    /// Apply one execution. Fills for unknown orders (placed outside the
    /// strategy) still move cash and positions.
    pub fn apply_fill(&mut self, trade: &TradeInfo) -> Result<FillOutcome> {
        if trade.quantity <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveQuantity(trade.quantity).into());
        }

        let order = match self.orders.get_mut(&trade.order_id) {
            Some(order) => {
                order.record_fill(trade.quantity, trade.price, trade.commission, trade.timestamp)?;
                Some(order.clone())
            }
            None => None,
        };
        if order.as_ref().is_some_and(OrderInfo::is_terminal) {
            self.retire(trade.order_id);
        }

        let notional = trade.notional();
        match trade.side {
            Side::Buy => self.cash -= notional + trade.commission,
            Side::Sell => self.cash += notional - trade.commission,
        }
        self.total_commission += trade.commission;

        let (realized_pnl, closed) = self.update_position(trade);
        self.realized_pnl += realized_pnl;

        let mark = self.last_price(&trade.symbol).unwrap_or(trade.price);
        if let Some(position) = self.positions.get_mut(&trade.symbol) {
            position.mark(mark, trade.timestamp);
        }

        push_bounded(&mut self.trades, trade.clone(), self.history_limit);
        self.trade_count += 1;
        if let Some(leg) = &closed {
            push_bounded(&mut self.closed_trades, leg.clone(), self.history_limit);
        }

        Ok(FillOutcome {
            order,
            realized_pnl,
            closed,
            position: self.positions.get(&trade.symbol).cloned(),
        })
    }

    fn update_position(&mut self, trade: &TradeInfo) -> (Decimal, Option<ClosedTrade>) {
        let ts = trade.timestamp;
        let fill_side = PositionSide::from(trade.side);

        let Some(position) = self.positions.get_mut(&trade.symbol) else {
            self.positions.insert(
                trade.symbol.clone(),
                PositionInfo::open(trade.symbol.clone(), fill_side, trade.quantity, trade.price, ts),
            );
            return (Decimal::ZERO, None);
        };

        if position.side == fill_side {
            position.increase(trade.quantity, trade.price, ts);
            return (Decimal::ZERO, None);
        }

        let closed_qty = trade.quantity.min(position.quantity);
        let entry_price = position.avg_price;
        let opened_at = position.opened_at;
        let reduced_side = position.side;
        let pnl = position.reduce(closed_qty, trade.price, ts);
        let now_flat = position.is_flat();

        let leg = ClosedTrade {
            symbol: trade.symbol.clone(),
            side: reduced_side,
            quantity: closed_qty,
            entry_price,
            exit_price: trade.price,
            realized_pnl: pnl,
            commission: trade.commission * closed_qty / trade.quantity,
            opened_at,
            closed_at: ts,
        };

        if now_flat {
            self.positions.remove(&trade.symbol);
        }
        let remainder = trade.quantity - closed_qty;
        if remainder > Decimal::ZERO {
            self.positions.insert(
                trade.symbol.clone(),
                PositionInfo::open(trade.symbol.clone(), fill_side, remainder, trade.price, ts),
            );
        }

        (pnl, Some(leg))
    }

    /// Mark the symbol's position at a new market price
    pub fn mark(&mut self, symbol: &str, price: Price, timestamp: DateTime<Utc>) {
        self.last_prices.insert(symbol.to_string(), price);
        if let Some(position) = self.positions.get_mut(symbol) {
            position.mark(price, timestamp);
        }
    }

    /// Append the current equity to the bounded history
    pub fn record_equity(&mut self, timestamp: DateTime<Utc>) -> EquityPoint {
        let point = EquityPoint::new(timestamp, self.equity(), self.cash);
        push_bounded(&mut self.equity_history, point, self.history_limit);
        point
    }

    pub fn exposure_view(
        &self,
        strategy_id: &StrategyId,
        max_position_fraction: Decimal,
    ) -> ExposureView {
        ExposureView {
            strategy_id: strategy_id.clone(),
            equity: self.equity(),
            cash: self.cash,
            positions: self
                .positions
                .iter()
                .map(|(s, p)| (s.clone(), p.signed_market_value()))
                .collect(),
            quantities: self
                .positions
                .iter()
                .map(|(s, p)| (s.clone(), p.signed_quantity()))
                .collect(),
            max_position_fraction,
        }
    }

    fn retire(&mut self, id: OrderId) {
        self.retired.push_back(id);
        while self.retired.len() > self.history_limit {
            if let Some(old) = self.retired.pop_front() {
                self.orders.remove(&old);
            }
        }
    }
}
