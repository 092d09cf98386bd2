//! Mean Reversion Strategy
//!
//! A statistical strategy that:
//! - Tracks a rolling mean and standard deviation of closes per symbol
//! - Buys when price is `entry_z` deviations below the mean
//! - Sells short (if allowed) when price is `entry_z` deviations above it
//! - Closes positions once the z-score reverts inside `exit_z`

use async_trait::async_trait;
use meridian_core::{MarketData, Side, Symbol};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};

use super::{entry_fraction, entry_quantity, tolerate_rejection};
use crate::config::StrategyConfig;
use crate::context::StrategyContext;
use crate::error::{Result, StrategyError};
use crate::strategy::{HookResult, Strategy};

/// Mean reversion settings
#[derive(Debug, Clone, Copy)]
pub struct MeanReversionParams {
    /// Rolling window length
    pub lookback: usize,
    /// |z| to enter a position
    pub entry_z: f64,
    /// |z| below which positions are closed
    pub exit_z: f64,
}

impl Default for MeanReversionParams {
    fn default() -> Self {
        Self {
            lookback: 20,
            entry_z: 2.0,
            exit_z: 0.5,
        }
    }
}

pub struct MeanReversion {
    params: MeanReversionParams,
    fraction: Decimal,
    windows: HashMap<Symbol, VecDeque<f64>>,
}

impl MeanReversion {
    pub const KIND: &'static str = "mean_reversion";

    pub fn new(params: MeanReversionParams, fraction: Decimal) -> Result<Self> {
        if params.lookback < 2 {
            return Err(StrategyError::InvalidConfig(format!(
                "lookback must be at least 2, got {}",
                params.lookback
            )));
        }
        if !(params.entry_z > params.exit_z && params.exit_z >= 0.0) {
            return Err(StrategyError::InvalidConfig(format!(
                "need entry_z > exit_z >= 0, got {}/{}",
                params.entry_z, params.exit_z
            )));
        }
        Ok(Self {
            params,
            fraction,
            windows: HashMap::new(),
        })
    }

    /// Reads `lookback` (20), `entry_z` (2.0), `exit_z` (0.5) and
    /// `position_fraction`
    pub fn from_config(config: &StrategyConfig) -> Result<Self> {
        let defaults = MeanReversionParams::default();
        let params = MeanReversionParams {
            lookback: config.parameter("lookback", defaults.lookback as f64) as usize,
            entry_z: config.parameter("entry_z", defaults.entry_z),
            exit_z: config.parameter("exit_z", defaults.exit_z),
        };
        Self::new(params, entry_fraction(config))
    }

    /// z-score of the latest close against the window before it
    fn z_score(&self, symbol: &str, price: f64) -> Option<f64> {
        let window = self.windows.get(symbol)?;
        if window.len() < self.params.lookback {
            return None;
        }
        let values: Vec<f64> = window.iter().copied().collect();
        let mean = meridian_stats::mean(&values);
        let sd = meridian_stats::std_dev(&values);
        if sd <= f64::EPSILON {
            return None;
        }
        Some((price - mean) / sd)
    }

    /// Generate and submit the order implied by the z-score, if any
    fn generate_signal(&self, symbol: &str, price: Decimal, z: f64, ctx: &mut StrategyContext) -> HookResult {
        let id = ctx.id().to_string();
        let held = ctx.ledger().signed_quantity(symbol);
        let pending = ctx.ledger().pending_quantity(symbol, Side::Buy)
            + ctx.ledger().pending_quantity(symbol, Side::Sell);
        if !pending.is_zero() {
            return Ok(());
        }

        // Exit logic: close once price reverts toward the mean
        if !held.is_zero() && z.abs() < self.params.exit_z {
            log::info!("[{}] EXIT signal on {}: z={:.2}, position {}", id, symbol, z, held);
            tolerate_rejection(&id, ctx.close_position(symbol, Decimal::ONE))?;
            return Ok(());
        }
        if !held.is_zero() {
            return Ok(());
        }

        if z < -self.params.entry_z {
            let qty = entry_quantity(ctx, self.fraction, price);
            if qty > Decimal::ZERO {
                log::info!("[{}] BUY signal on {}: z={:.2}, price={}", id, symbol, z, price);
                tolerate_rejection(&id, ctx.buy(symbol, qty, None))?;
            }
        } else if z > self.params.entry_z && ctx.config().allow_short {
            let qty = entry_quantity(ctx, self.fraction, price);
            if qty > Decimal::ZERO {
                log::info!("[{}] SELL signal on {}: z={:.2}, price={}", id, symbol, z, price);
                tolerate_rejection(&id, ctx.sell(symbol, qty, None))?;
            }
        }
        Ok(())
    }

    fn on_price(&mut self, data: &MarketData, ctx: &mut StrategyContext) -> HookResult {
        let price = data.last_price();
        let value = price.to_f64().unwrap_or(0.0);

        let signal = self.z_score(&data.symbol, value);

        let window = self.windows.entry(data.symbol.clone()).or_default();
        window.push_back(value);
        while window.len() > self.params.lookback {
            window.pop_front();
        }

        match signal {
            Some(z) => self.generate_signal(&data.symbol, price, z, ctx),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Strategy for MeanReversion {
    fn name(&self) -> &str {
        "MeanReversion"
    }

    async fn on_start(&mut self, ctx: &mut StrategyContext) -> HookResult {
        log::info!(
            "[{}] Mean reversion lookback={} entry_z={} exit_z={}",
            ctx.id(),
            self.params.lookback,
            self.params.entry_z,
            self.params.exit_z
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
    use meridian_core::{OrderInfo, TradeInfo};
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
    fn test_params_defaults() {
        let params = MeanReversionParams::default();
        assert_eq!(params.lookback, 20);
        assert!(MeanReversion::new(MeanReversionParams { exit_z: 3.0, ..params }, dec!(0.1)).is_err());
    }

    #[tokio::test]
    async fn test_buys_dip_and_exits_on_reversion() {
        let config = StrategyConfig::new("mr", vec!["BTC-USD".to_string()]);
        let mut ctx = StrategyContext::new(config);
        let router = Arc::new(Capture::default());
        ctx.attach(router.clone());
        let params = MeanReversionParams {
            lookback: 5,
            entry_z: 1.5,
            exit_z: 0.5,
        };
        let mut strategy = MeanReversion::new(params, dec!(0.1)).unwrap();

        let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let feed = |i: i64, price: Decimal| {
            MarketData::bar("BTC-USD", start + Duration::hours(i), price, price, price, price, dec!(10))
        };

        for (i, price) in [dec!(100), dec!(101), dec!(99), dec!(100), dec!(101)].into_iter().enumerate() {
            let bar = feed(i as i64, price);
            ctx.on_market_data(&bar);
            strategy.on_bar(&bar, &mut ctx).await.unwrap();
        }
        assert!(router.0.lock().is_empty());

        let dip = feed(5, dec!(95));
        ctx.on_market_data(&dip);
        strategy.on_bar(&dip, &mut ctx).await.unwrap();
        let entry = router.0.lock().pop().unwrap();
        assert_eq!(entry.side, Side::Buy);

        let trade = TradeInfo::for_order(&entry, entry.quantity, dec!(95), Decimal::ZERO, dip.timestamp);
        ctx.apply_fill(&trade).unwrap();

        // window is now 101, 99, 100, 101, 95 with mean 99.2
        let revert = feed(6, dec!(99.2));
        ctx.on_market_data(&revert);
        strategy.on_bar(&revert, &mut ctx).await.unwrap();
        let exit = router.0.lock().pop().unwrap();
        assert_eq!(exit.side, Side::Sell);
        assert_eq!(exit.quantity, entry.quantity);
    }
}
