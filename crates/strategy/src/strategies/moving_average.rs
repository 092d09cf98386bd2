//! Moving Average Crossover
//!
//! Trend-following strategy that:
//! - Goes long when the fast SMA crosses above the slow SMA
//! - Closes the long when the fast SMA crosses back below
//! - With `allow_short`, also shorts on the downward cross

use async_trait::async_trait;
use meridian_core::{MarketData, Symbol};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};

use super::{entry_fraction, entry_quantity, tolerate_rejection};
use crate::config::StrategyConfig;
use crate::context::StrategyContext;
use crate::error::{Result, StrategyError};
use crate::strategy::{HookResult, Strategy};

pub struct MovingAverageCross {
    fast_period: usize,
    slow_period: usize,
    fraction: Decimal,
    closes: HashMap<Symbol, VecDeque<f64>>,
    /// Whether fast was above slow on the previous bar
    fast_above: HashMap<Symbol, bool>,
}

impl MovingAverageCross {
    pub const KIND: &'static str = "moving_average_cross";

    pub fn new(fast_period: usize, slow_period: usize, fraction: Decimal) -> Result<Self> {
        if fast_period == 0 || fast_period >= slow_period {
            return Err(StrategyError::InvalidConfig(format!(
                "moving average periods must satisfy 0 < fast < slow, got {}/{}",
                fast_period, slow_period
            )));
        }
        Ok(Self {
            fast_period,
            slow_period,
            fraction,
            closes: HashMap::new(),
            fast_above: HashMap::new(),
        })
    }

    /// Reads `fast_period` (10), `slow_period` (30) and `position_fraction`
    pub fn from_config(config: &StrategyConfig) -> Result<Self> {
        Self::new(
            config.parameter("fast_period", 10.0) as usize,
            config.parameter("slow_period", 30.0) as usize,
            entry_fraction(config),
        )
    }

    fn averages(&self, symbol: &str) -> Option<(f64, f64)> {
        let window = self.closes.get(symbol)?;
        if window.len() < self.slow_period {
            return None;
        }
        let slow = window.iter().sum::<f64>() / self.slow_period as f64;
        let fast = window.iter().rev().take(self.fast_period).sum::<f64>() / self.fast_period as f64;
        Some((fast, slow))
    }

    fn on_price(&mut self, data: &MarketData, ctx: &mut StrategyContext) -> HookResult {
        let price = data.last_price();
        let window = self.closes.entry(data.symbol.clone()).or_default();
        window.push_back(price.to_f64().unwrap_or(0.0));
        while window.len() > self.slow_period {
            window.pop_front();
        }

        let Some((fast, slow)) = self.averages(&data.symbol) else {
            return Ok(());
        };
        let above = fast > slow;
        let previous = self.fast_above.insert(data.symbol.clone(), above);

        match previous {
            Some(false) if above => self.cross_up(&data.symbol, price, ctx),
            Some(true) if !above => self.cross_down(&data.symbol, price, ctx),
            _ => Ok(()),
        }
    }

    fn cross_up(&self, symbol: &str, price: Decimal, ctx: &mut StrategyContext) -> HookResult {
        let id = ctx.id().to_string();
        let held = ctx.ledger().signed_quantity(symbol);
        if held < Decimal::ZERO {
            log::info!("[{}] COVER signal on {}: price={}", id, symbol, price);
            tolerate_rejection(&id, ctx.close_position(symbol, Decimal::ONE))?;
            return Ok(());
        }
        if held > Decimal::ZERO {
            return Ok(());
        }
        let quantity = entry_quantity(ctx, self.fraction, price);
        if quantity > Decimal::ZERO {
            log::info!("[{}] BUY signal on {}: qty={}, price={}", id, symbol, quantity, price);
            tolerate_rejection(&id, ctx.buy(symbol, quantity, None))?;
        }
        Ok(())
    }

    fn cross_down(&self, symbol: &str, price: Decimal, ctx: &mut StrategyContext) -> HookResult {
        let id = ctx.id().to_string();
        let held = ctx.ledger().signed_quantity(symbol);
        if held > Decimal::ZERO {
            log::info!("[{}] EXIT signal on {}: price={}", id, symbol, price);
            tolerate_rejection(&id, ctx.close_position(symbol, Decimal::ONE))?;
            return Ok(());
        }
        if held.is_zero() && ctx.config().allow_short {
            let quantity = entry_quantity(ctx, self.fraction, price);
            if quantity > Decimal::ZERO {
                log::info!("[{}] SELL signal on {}: qty={}, price={}", id, symbol, quantity, price);
                tolerate_rejection(&id, ctx.sell(symbol, quantity, None))?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Strategy for MovingAverageCross {
    fn name(&self) -> &str {
        "MovingAverageCross"
    }

    async fn on_start(&mut self, ctx: &mut StrategyContext) -> HookResult {
        log::info!(
            "[{}] SMA {}/{} on {:?}",
            ctx.id(),
            self.fast_period,
            self.slow_period,
            ctx.config().symbols
        );
        Ok(())
    }

    async fn on_stop(&mut self, _ctx: &mut StrategyContext) -> HookResult {
        Ok(())
    }

    async fn on_tick(&mut self, data: &MarketData, ctx: &mut StrategyContext) -> HookResult {
        self.on_price(data, ctx)
    }

    async fn on_bar(&mut self, data: &MarketData, ctx: &mut StrategyContext) -> HookResult {
        self.on_price(data, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::{ExposureView, OrderRouter};
    use chrono::{Duration, TimeZone, Utc};
    use meridian_core::{OrderInfo, Side};
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    #[derive(Default)]
    struct Capture(Mutex<Vec<OrderInfo>>);

    impl OrderRouter for Capture {
        fn route(&self, order: OrderInfo, _view: &ExposureView) -> Result<()> {
            self.0.lock().push(order);
            Ok(())
        }
    }

    #[test]
    fn test_rejects_bad_periods() {
        assert!(MovingAverageCross::new(5, 5, dec!(0.2)).is_err());
        assert!(MovingAverageCross::new(0, 5, dec!(0.2)).is_err());

        let config = StrategyConfig::new("ma", vec!["AAPL".to_string()])
            .with_parameter("fast_period", 3.0)
            .with_parameter("slow_period", 8.0);
        let strategy = MovingAverageCross::from_config(&config).unwrap();
        assert_eq!(strategy.fast_period, 3);
        assert_eq!(strategy.fraction, dec!(0.225));
    }

    #[tokio::test]
    async fn test_buys_on_upward_cross() {
        let config = StrategyConfig::new("ma", vec!["AAPL".to_string()]);
        let mut ctx = StrategyContext::new(config);
        let router = Arc::new(Capture::default());
        ctx.attach(router.clone());
        let mut strategy = MovingAverageCross::new(2, 4, dec!(0.2)).unwrap();

        let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let prices = [dec!(10), dec!(9), dec!(8), dec!(7), dec!(6), dec!(9), dec!(12)];
        for (i, price) in prices.into_iter().enumerate() {
            let bar = MarketData::bar("AAPL", start + Duration::days(i as i64), price, price, price, price, dec!(1000));
            ctx.on_market_data(&bar);
            strategy.on_bar(&bar, &mut ctx).await.unwrap();
        }

        let orders = router.0.lock();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].side, Side::Buy);
        // 20% of 100,000 at the crossing close of 12
        assert_eq!(orders[0].quantity, dec!(1666));
    }
}
