//! Synchronous pre-trade risk gate
//!
//! Installed as the Engine's [`OrderGate`]. It holds only shared lookup state
//! (prices and a book-level exposure cache refreshed by the limit loop), so
//! it never reaches back into the Engine.

use meridian_core::{OrderInfo, StrategyId};
use meridian_engine::PriceCache;
use meridian_strategy::{ExposureView, OrderGate, RiskCheck};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use std::collections::HashSet;
use std::sync::Arc;

/// Book-level figures the gate checks aggregate exposure against
#[derive(Debug, Clone, Default)]
pub struct ExposureCache {
    pub gross_exposure: Decimal,
    pub total_equity: Decimal,
    /// Strategies whose trading was stopped by a risk action
    pub blocked: HashSet<StrategyId>,
    /// Set by an emergency stop; blocks every new position
    pub halted: bool,
}

#[derive(Debug, Clone)]
pub struct GateLimits {
    pub max_total_exposure: f64,
    pub max_order_volume_ratio: f64,
}

pub struct RiskGate {
    limits: GateLimits,
    prices: PriceCache,
    cache: Arc<RwLock<ExposureCache>>,
}

impl RiskGate {
    pub fn new(limits: GateLimits, prices: PriceCache, cache: Arc<RwLock<ExposureCache>>) -> Self {
        Self {
            limits,
            prices,
            cache,
        }
    }

    fn decimal(value: f64) -> Decimal {
        Decimal::from_f64(value).unwrap_or(Decimal::ZERO)
    }

    /// Validate position sizing, aggregate exposure and volume participation
    pub fn check(&self, order: &OrderInfo, view: &ExposureView) -> RiskCheck {
        // exits are never blocked
        if view.reduces_position(order) {
            return RiskCheck::approve();
        }

        let cache = self.cache.read().clone();
        if cache.halted {
            return RiskCheck::reject("trading halted by emergency stop");
        }
        if cache.blocked.contains(&order.strategy_id) {
            return RiskCheck::reject(format!(
                "trading stopped for strategy {}",
                order.strategy_id
            ));
        }

        let latest = self.prices.latest(&order.symbol);
        let Some(price) = order
            .price
            .or_else(|| latest.as_ref().map(|d| d.last_price()))
        else {
            return RiskCheck::reject(format!("no reference price for {}", order.symbol));
        };

        let current = view.position_value(&order.symbol);
        let after = current + order.quantity * price * order.side.sign();
        if view.equity > Decimal::ZERO {
            let fraction = after.abs() / view.equity;
            if fraction > view.max_position_fraction {
                return RiskCheck::reject(format!(
                    "position in {} would be {:.2}% of equity (max {:.2}%)",
                    order.symbol,
                    fraction * Decimal::ONE_HUNDRED,
                    view.max_position_fraction * Decimal::ONE_HUNDRED
                ));
            }
        } else {
            return RiskCheck::reject("strategy equity is not positive");
        }

        if cache.total_equity <= Decimal::ZERO && cache.gross_exposure > Decimal::ZERO {
            return RiskCheck::reject("book equity is not positive");
        }
        if cache.total_equity > Decimal::ZERO {
            let gross_after = cache.gross_exposure - current.abs() + after.abs();
            let ratio = gross_after / cache.total_equity;
            if ratio > Self::decimal(self.limits.max_total_exposure) {
                return RiskCheck::reject(format!(
                    "aggregate exposure would be {:.2}x equity (max {:.2}x)",
                    ratio, self.limits.max_total_exposure
                ));
            }
        }

        if let Some(data) = latest
            && data.volume > Decimal::ZERO
            && self.limits.max_order_volume_ratio > 0.0
        {
            let ratio = (order.quantity / data.volume).to_f64().unwrap_or(f64::MAX);
            if ratio > self.limits.max_order_volume_ratio {
                return RiskCheck::reject(format!(
                    "order size is {:.2}% of last volume (max {:.2}%)",
                    ratio * 100.0,
                    self.limits.max_order_volume_ratio * 100.0
                ));
            }
        }

        RiskCheck::approve()
    }
}

impl OrderGate for RiskGate {
    fn check_order(&self, order: &OrderInfo, view: &ExposureView) -> RiskCheck {
        let check = self.check(order, view);
        if !check.approved {
            log::warn!(
                "[RISK] Rejected {} {} {} for {}: {}",
                order.side,
                order.quantity,
                order.symbol,
                order.strategy_id,
                check.reason.as_deref().unwrap_or("")
            );
        }
        check
    }
}
