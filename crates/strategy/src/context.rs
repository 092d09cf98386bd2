//! Strategy Context
//!
//! The handle a strategy trades through. Owns the ledger, runs the pre-trade
//! checks and hands accepted orders to the attached [`OrderRouter`].

use chrono::{DateTime, Utc};
use meridian_core::{
    MarketData, OrderId, OrderInfo, OrderType, PositionInfo, Price, Quantity, Side, Symbol,
    TradeInfo,
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::StrategyConfig;
use crate::error::{Result, StrategyError};
use crate::ledger::{FillOutcome, Ledger};
use crate::router::{ExposureView, OrderRouter};

pub struct StrategyContext {
    config: StrategyConfig,
    ledger: Ledger,
    router: Option<Arc<dyn OrderRouter>>,
    halted: bool,
    halt_reason: Option<String>,
    /// Timestamp of the most recent market data
    clock: DateTime<Utc>,
    latest: HashMap<Symbol, MarketData>,
    submitted: u64,
}

impl StrategyContext {
    pub fn new(config: StrategyConfig) -> Self {
        let ledger = Ledger::new(config.initial_capital, config.history_limit);
        Self {
            config,
            ledger,
            router: None,
            halted: false,
            halt_reason: None,
            clock: Utc::now(),
            latest: HashMap::new(),
            submitted: 0,
        }
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn attach(&mut self, router: Arc<dyn OrderRouter>) {
        self.router = Some(router);
    }

    pub fn detach(&mut self) {
        self.router = None;
    }

    pub fn is_attached(&self) -> bool {
        self.router.is_some()
    }

    /// Time of the latest market data seen
    pub fn now(&self) -> DateTime<Utc> {
        self.clock
    }

    pub fn latest(&self, symbol: &str) -> Option<&MarketData> {
        self.latest.get(symbol)
    }

    pub fn last_price(&self, symbol: &str) -> Option<Price> {
        self.ledger.last_price(symbol)
    }

    pub fn equity(&self) -> Decimal {
        self.ledger.equity()
    }

    pub fn cash(&self) -> Decimal {
        self.ledger.cash()
    }

    pub fn position(&self, symbol: &str) -> Option<&PositionInfo> {
        self.ledger.position(symbol)
    }

    /// Orders accepted by the router since construction
    pub fn orders_submitted(&self) -> u64 {
        self.submitted
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn halt_reason(&self) -> Option<&str> {
        self.halt_reason.as_deref()
    }

    /// Re-enable trading after a drawdown halt
    pub fn reset_halt(&mut self) {
        if self.halted {
            log::info!("[{}] Trading halt cleared", self.config.id);
        }
        self.halted = false;
        self.halt_reason = None;
    }

    pub fn exposure_view(&self) -> ExposureView {
        self.ledger
            .exposure_view(&self.config.id, self.config.max_position_fraction)
    }

    /// Buy at market, or at a limit when a price is given
    pub fn buy(&mut self, symbol: &str, quantity: Quantity, price: Option<Price>) -> Result<OrderId> {
        let order_type = if price.is_some() {
            OrderType::Limit
        } else {
            OrderType::Market
        };
        self.submit(Side::Buy, symbol, order_type, quantity, price, None)
    }

    /// Sell at market, or at a limit when a price is given
    pub fn sell(&mut self, symbol: &str, quantity: Quantity, price: Option<Price>) -> Result<OrderId> {
        let order_type = if price.is_some() {
            OrderType::Limit
        } else {
            OrderType::Market
        };
        self.submit(Side::Sell, symbol, order_type, quantity, price, None)
    }

    pub fn buy_order(
        &mut self,
        symbol: &str,
        order_type: OrderType,
        quantity: Quantity,
        price: Option<Price>,
        stop_price: Option<Price>,
    ) -> Result<OrderId> {
        self.submit(Side::Buy, symbol, order_type, quantity, price, stop_price)
    }

    pub fn sell_order(
        &mut self,
        symbol: &str,
        order_type: OrderType,
        quantity: Quantity,
        price: Option<Price>,
        stop_price: Option<Price>,
    ) -> Result<OrderId> {
        self.submit(Side::Sell, symbol, order_type, quantity, price, stop_price)
    }

    pub fn submit(
        &mut self,
        side: Side,
        symbol: &str,
        order_type: OrderType,
        quantity: Quantity,
        price: Option<Price>,
        stop_price: Option<Price>,
    ) -> Result<OrderId> {
        let order = OrderInfo::new_with_time(
            self.config.id.clone(),
            symbol,
            side,
            order_type,
            quantity,
            price,
            stop_price,
            self.clock,
        )
        .with_costs(self.config.commission_rate, self.config.slippage_rate);
        if let Err(e) = self.pre_trade_check(&order) {
            log::debug!("[{}] {} {} {} refused: {}", self.config.id, side, quantity, symbol, e);
            return Err(e);
        }
        if self.exposure_view().reduces_position(&order) {
            self.dispatch(order.reducing())
        } else {
            self.dispatch(order)
        }
    }

    /// Close `ratio` (in (0, 1]) of the position at market. Returns None when
    /// there is nothing to close.
    pub fn close_position(&mut self, symbol: &str, ratio: Decimal) -> Result<Option<OrderId>> {
        if ratio <= Decimal::ZERO || ratio > Decimal::ONE {
            return Err(StrategyError::rejected(format!(
                "close ratio must be in (0, 1], got {}",
                ratio
            )));
        }
        let Some(position) = self.ledger.position(symbol) else {
            return Ok(None);
        };
        let quantity = if ratio == Decimal::ONE {
            position.quantity
        } else {
            position.quantity * ratio
        };
        if quantity <= Decimal::ZERO {
            return Ok(None);
        }
        let side = position.side.closing_side();
        self.submit(side, symbol, OrderType::Market, quantity, None, None)
            .map(Some)
    }

    /// Close every open position, logging the ones that could not be closed
    pub fn close_all_positions(&mut self) -> Vec<OrderId> {
        let symbols: Vec<Symbol> = self.ledger.positions().map(|p| p.symbol.clone()).collect();
        let mut ids = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            match self.close_position(&symbol, Decimal::ONE) {
                Ok(Some(id)) => ids.push(id),
                Ok(None) => {}
                Err(e) => log::warn!("[{}] Failed to close {}: {}", self.config.id, symbol, e),
            }
        }
        ids
    }

    pub fn cancel_order(&mut self, id: &OrderId) -> Result<OrderInfo> {
        self.ledger.cancel_order(id, "cancelled by strategy", self.clock)
    }

    /// Run the pre-trade checks without sending anything
    pub fn pre_trade_check(&self, order: &OrderInfo) -> Result<()> {
        order.validate()?;

        let view = self.exposure_view();
        let closing = view.reduces_position(order);

        if self.halted && !closing {
            return Err(StrategyError::rejected(format!(
                "trading halted: {}",
                self.halt_reason.as_deref().unwrap_or("max drawdown")
            )));
        }
        if !self.config.trades(&order.symbol) {
            return Err(StrategyError::rejected(format!(
                "{} is not configured for {}",
                order.symbol, self.config.id
            )));
        }

        let price = order
            .price
            .or(order.stop_price)
            .or_else(|| self.ledger.last_price(&order.symbol))
            .ok_or_else(|| {
                StrategyError::rejected(format!("no reference price for {}", order.symbol))
            })?;
        let notional = order.quantity * price;

        match order.side {
            Side::Buy if !closing => {
                let cost = notional * (Decimal::ONE + self.config.commission_rate);
                let buying_power = self.ledger.available_cash()
                    + (self.config.max_leverage - Decimal::ONE)
                        * self.ledger.equity().max(Decimal::ZERO);
                if cost > buying_power {
                    return Err(StrategyError::rejected(format!(
                        "insufficient cash: need {}, available {}",
                        cost.round_dp(2),
                        buying_power.round_dp(2)
                    )));
                }
            }
            Side::Sell if !self.config.allow_short => {
                let held = self.ledger.signed_quantity(&order.symbol).max(Decimal::ZERO);
                let free = held - self.ledger.pending_quantity(&order.symbol, Side::Sell);
                if order.quantity > free {
                    return Err(StrategyError::rejected(format!(
                        "insufficient position: selling {} of {} with {} free",
                        order.quantity, order.symbol, free
                    )));
                }
            }
            _ => {}
        }

        if !closing {
            let after = view.position_quantity(&order.symbol) + order.quantity * order.side.sign();
            let value = (after * price).abs();
            let limit = view.equity * self.config.max_position_fraction;
            if value > limit {
                return Err(StrategyError::rejected(format!(
                    "position limit: {} value {} exceeds {} of equity",
                    order.symbol,
                    value.round_dp(2),
                    self.config.max_position_fraction
                )));
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, order: OrderInfo) -> Result<OrderId> {
        let Some(router) = self.router.clone() else {
            return Err(StrategyError::Detached);
        };
        let view = self.exposure_view();
        let id = order.id;
        log::debug!(
            "[{}] {} {} {} {} @ {:?}",
            self.config.id,
            order.order_type,
            order.side,
            order.quantity,
            order.symbol,
            order.price
        );
        self.ledger.register_order(order.clone());

        if let Err(e) = router.route(order, &view) {
            if let Err(cancel) = self.ledger.cancel_order(&id, &e.to_string(), self.clock) {
                log::warn!("[{}] Unrouted order {} not cancelled: {}", self.config.id, id, cancel);
            }
            return Err(e);
        }
        self.submitted += 1;
        Ok(id)
    }

    /// Mark to market without running any checks
    pub(crate) fn observe(&mut self, data: &MarketData) {
        if data.timestamp > self.clock || self.latest.is_empty() {
            self.clock = data.timestamp;
        }
        self.ledger
            .mark(&data.symbol, data.last_price(), data.timestamp);
        self.latest.insert(data.symbol.clone(), data.clone());
    }

    /// Mark to market, then enforce exit levels and the drawdown halt
    pub(crate) fn on_market_data(&mut self, data: &MarketData) {
        self.observe(data);
        self.check_exit_levels(&data.symbol);
        self.check_drawdown();
    }

    fn check_exit_levels(&mut self, symbol: &str) {
        let Some(position) = self.ledger.position(symbol) else {
            return;
        };
        if self
            .ledger
            .pending_quantity(symbol, position.side.closing_side())
            > Decimal::ZERO
        {
            return;
        }

        let ret = position.unrealized_return();
        let trigger = if let Some(stop) = self.config.stop_loss_fraction
            && ret <= -stop
        {
            Some("stop-loss")
        } else if let Some(target) = self.config.take_profit_fraction
            && ret >= target
        {
            Some("take-profit")
        } else {
            None
        };

        if let Some(trigger) = trigger {
            log::info!(
                "[{}] {} hit on {}: return {}",
                self.config.id,
                trigger,
                symbol,
                ret.round_dp(4)
            );
            if let Err(e) = self.close_position(symbol, Decimal::ONE) {
                log::warn!("[{}] {} exit on {} failed: {}", self.config.id, trigger, symbol, e);
            }
        }
    }

    /// Current loss from initial capital as a fraction
    pub fn drawdown_from_initial(&self) -> Decimal {
        let initial = self.ledger.initial_capital();
        if initial <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        ((initial - self.ledger.equity()) / initial).max(Decimal::ZERO)
    }

    fn check_drawdown(&mut self) {
        let loss = self.drawdown_from_initial();
        if !self.halted && loss > self.config.max_drawdown_fraction {
            let reason = format!(
                "max drawdown breached: {} > {}",
                loss.round_dp(4),
                self.config.max_drawdown_fraction
            );
            log::warn!("[{}] {}, liquidating", self.config.id, reason);
            self.halted = true;
            self.halt_reason = Some(reason);
        }
        if self.halted {
            self.liquidate_unprotected();
        }
    }

    /// Close positions that have no exit order pending
    fn liquidate_unprotected(&mut self) {
        let exposed: Vec<Symbol> = self
            .ledger
            .positions()
            .filter(|p| {
                self.ledger
                    .pending_quantity(&p.symbol, p.side.closing_side())
                    .is_zero()
            })
            .map(|p| p.symbol.clone())
            .collect();
        for symbol in exposed {
            if let Err(e) = self.close_position(&symbol, Decimal::ONE) {
                log::warn!("[{}] Liquidation of {} failed: {}", self.config.id, symbol, e);
            }
        }
    }

    /// Record an order submitted on the strategy's behalf from outside its hooks
    pub(crate) fn track_external(&mut self, order: OrderInfo) {
        self.ledger.register_order(order);
        self.submitted += 1;
    }

    pub(crate) fn apply_fill(&mut self, trade: &TradeInfo) -> Result<FillOutcome> {
        self.ledger.apply_fill(trade)
    }

    /// Cancel an order the executor refused
    pub(crate) fn order_rejected(&mut self, id: &OrderId, reason: &str) -> Option<OrderInfo> {
        self.ledger.cancel_order(id, reason, self.clock).ok()
    }

    pub(crate) fn record_equity(&mut self, timestamp: DateTime<Utc>) {
        self.ledger.record_equity(timestamp);
    }
}
