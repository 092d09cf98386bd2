//! Strategy Trait
//!
//! Hooks a trading strategy implements. Every hook receives the
//! [`StrategyContext`] it trades through; returning `Err` hands control to
//! the restart policy of the owning [`ManagedStrategy`](crate::ManagedStrategy).

use async_trait::async_trait;
use meridian_core::{MarketData, OrderInfo, PositionInfo, TradeInfo};

use crate::context::StrategyContext;
use crate::error::StrategyError;

pub type HookResult = Result<(), StrategyError>;

/// Strategy trait - implement this for your trading strategy
#[async_trait]
pub trait Strategy: Send {
    /// Strategy name for logging
    fn name(&self) -> &str;

    /// Called on every transition into Running from a stopped state
    async fn on_start(&mut self, ctx: &mut StrategyContext) -> HookResult;

    /// Called when the strategy stops. Errors are logged only.
    async fn on_stop(&mut self, ctx: &mut StrategyContext) -> HookResult;

    /// Called for each tick on a subscribed symbol
    async fn on_tick(&mut self, data: &MarketData, ctx: &mut StrategyContext) -> HookResult;

    /// Called for each bar on a subscribed symbol
    async fn on_bar(&mut self, data: &MarketData, ctx: &mut StrategyContext) -> HookResult;

    async fn on_pause(&mut self, _ctx: &mut StrategyContext) -> HookResult {
        Ok(())
    }

    async fn on_resume(&mut self, _ctx: &mut StrategyContext) -> HookResult {
        Ok(())
    }

    /// Called when one of the strategy's orders changes status
    async fn on_order_update(&mut self, _order: &OrderInfo, _ctx: &mut StrategyContext) -> HookResult {
        Ok(())
    }

    async fn on_trade_update(&mut self, _trade: &TradeInfo, _ctx: &mut StrategyContext) -> HookResult {
        Ok(())
    }

    /// `position` is None once the symbol is flat
    async fn on_position_update(
        &mut self,
        _symbol: &str,
        _position: Option<&PositionInfo>,
        _ctx: &mut StrategyContext,
    ) -> HookResult {
        Ok(())
    }

    /// Called periodically by the snapshot timer (optional)
    async fn on_timer(&mut self, _ctx: &mut StrategyContext) -> HookResult {
        Ok(())
    }

    /// Called after a hook failed, before the restart policy runs
    async fn on_error(&mut self, _error: &StrategyError, _ctx: &mut StrategyContext) {}
}
