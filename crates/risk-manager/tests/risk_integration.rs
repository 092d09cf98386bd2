//! Integration test: Risk Manager over a running Engine
//!
//! 1. Concentration breach after a rally reduces the position, then resolves
//! 2. A stop-trading action pauses the strategy and blocks new entries
//! 3. Emergency stop liquidates and stops everything
//! 4. VaR from recorded equity history

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use meridian_core::{MarketData, OrderInfo, Side, TradeInfo};
use meridian_engine::{Engine, EngineConfig, EngineError};
use meridian_risk_manager::{
    Band, RiskAction, RiskConfig, RiskLimit, RiskManager, RiskMetric, RiskType, Severity,
};
use meridian_strategy::{
    HookResult, ManagedStrategy, Strategy, StrategyConfig, StrategyContext, StrategyState,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

/// Buys a fixed quantity on the first bar, if any
struct BuyOnce {
    quantity: Option<Decimal>,
}

#[async_trait]
impl Strategy for BuyOnce {
    fn name(&self) -> &str {
        "BuyOnce"
    }

    async fn on_start(&mut self, _ctx: &mut StrategyContext) -> HookResult {
        Ok(())
    }

    async fn on_stop(&mut self, _ctx: &mut StrategyContext) -> HookResult {
        Ok(())
    }

    async fn on_tick(&mut self, _data: &MarketData, _ctx: &mut StrategyContext) -> HookResult {
        Ok(())
    }

    async fn on_bar(&mut self, data: &MarketData, ctx: &mut StrategyContext) -> HookResult {
        if let Some(quantity) = self.quantity.take() {
            ctx.buy(&data.symbol, quantity, None)?;
        }
        Ok(())
    }
}

fn engine() -> Arc<Engine> {
    let config = EngineConfig {
        execution_latency_ms: 0,
        ..Default::default()
    };
    Arc::new(Engine::simulated(config))
}

fn managed(id: &str, quantity: Option<Decimal>) -> ManagedStrategy {
    let config = StrategyConfig::new(id, vec!["AAPL".to_string()]);
    ManagedStrategy::new(Box::new(BuyOnce { quantity }), config).unwrap()
}

fn bar(minute: i64, close: Decimal) -> MarketData {
    let ts = Utc.with_ymd_and_hms(2024, 5, 1, 14, 0, 0).unwrap() + ChronoDuration::minutes(minute);
    MarketData::bar("AAPL", ts, close, close, close, close, dec!(1000000))
}

async fn position(engine: &Engine, id: &str) -> Decimal {
    engine
        .snapshot(id)
        .await
        .map(|s| s.positions.iter().map(|p| p.quantity).sum())
        .unwrap_or(Decimal::ZERO)
}

async fn wait_for_position(engine: &Engine, id: &str, expected: Decimal) -> bool {
    for _ in 0..200 {
        if position(engine, id).await == expected {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

async fn wait_for_processed(engine: &Engine, count: u64) -> bool {
    for _ in 0..200 {
        if engine.stats().await.data_processed >= count {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn test_concentration_breach_reduces_then_resolves() {
    let _ = env_logger::builder().is_test(true).try_init();
    let engine = engine();
    let risk = RiskManager::new(RiskConfig::default(), engine.clone()).unwrap();
    engine.add_strategy(managed("holder", Some(dec!(200)))).unwrap();
    engine.start().unwrap();
    engine.start_all().await;

    engine.feed_data(bar(0, dec!(100))).unwrap();
    assert!(wait_for_position(&engine, "holder", dec!(200)).await);

    // 20,000 of 99,970 equity: elevated, no event
    assert!(risk.check_limits().await.is_empty());
    let snapshot = risk.snapshot();
    let concentration = snapshot
        .limits
        .iter()
        .find(|l| l.name == "concentration:holder")
        .unwrap();
    assert_eq!(concentration.band, Band::Elevated);

    // rally to 130: 26,000 of 105,970 is 98% of the 25% limit
    engine.feed_data(bar(1, dec!(130))).unwrap();
    assert!(wait_for_processed(&engine, 2).await);
    let events = risk.check_limits().await;
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.severity, Severity::Critical);
    assert_eq!(event.action, RiskAction::ReducePosition);
    assert_eq!(event.strategy_id.as_deref(), Some("holder"));
    assert_eq!(event.symbol.as_deref(), Some("AAPL"));
    assert_eq!(risk.active_events().len(), 1);

    // half the position is sold
    assert!(wait_for_position(&engine, "holder", dec!(100)).await);

    assert!(risk.check_limits().await.is_empty());
    assert!(risk.active_events().is_empty());
    let history = risk.event_history();
    assert_eq!(history.len(), 1);
    assert!(history[0].resolved_at.is_some());

    let report = risk.report();
    assert!(report.contains("concentration:holder"));
    engine.stop().await;
}

#[tokio::test]
async fn test_stop_trading_blocks_entries() {
    let engine = engine();
    let risk = RiskManager::new(RiskConfig::default(), engine.clone()).unwrap();
    risk.add_limit(RiskLimit::new(
        "exposure_cap",
        RiskType::Market,
        RiskMetric::TotalExposure,
        0.1,
        RiskAction::StopTrading,
    ))
    .unwrap();
    engine.add_strategy(managed("capped", Some(dec!(200)))).unwrap();
    engine.start().unwrap();
    engine.start_all().await;

    engine.feed_data(bar(0, dec!(100))).unwrap();
    assert!(wait_for_position(&engine, "capped", dec!(200)).await);

    let events = risk.check_limits().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].limit_name, "exposure_cap");
    assert_eq!(events[0].action, RiskAction::StopTrading);
    assert_eq!(
        engine.strategy_state("capped").await.unwrap(),
        StrategyState::Paused
    );
    assert_eq!(risk.snapshot().blocked, vec!["capped".to_string()]);

    // unresolved events are not raised again
    assert!(risk.check_limits().await.is_empty());

    let entry = OrderInfo::market("capped", "AAPL", Side::Buy, dec!(10));
    match engine.place_order(entry, None).await {
        Err(EngineError::OrderRejected(reason)) => assert!(reason.contains("trading stopped")),
        other => panic!("expected a risk rejection, got {:?}", other.map(|_| ())),
    }

    risk.reset_halt();
    let entry = OrderInfo::market("capped", "AAPL", Side::Buy, dec!(10));
    assert!(engine.place_order(entry, None).await.is_ok());
    engine.stop().await;
}

#[tokio::test]
async fn test_emergency_stop_liquidates_everything() {
    let engine = engine();
    let risk = RiskManager::new(RiskConfig::default(), engine.clone()).unwrap();
    engine.add_strategy(managed("a", Some(dec!(100)))).unwrap();
    engine.add_strategy(managed("b", Some(dec!(50)))).unwrap();
    engine.start().unwrap();
    engine.start_all().await;

    engine.feed_data(bar(0, dec!(100))).unwrap();
    assert!(wait_for_position(&engine, "a", dec!(100)).await);
    assert!(wait_for_position(&engine, "b", dec!(50)).await);

    risk.emergency_stop("manual").await;
    assert!(risk.is_halted());
    for id in ["a", "b"] {
        assert_eq!(engine.strategy_state(id).await.unwrap(), StrategyState::Stopped);
        assert!(wait_for_position(&engine, id, Decimal::ZERO).await);
    }
    engine.stop().await;
}

#[tokio::test]
async fn test_var_from_equity_history() {
    let engine = engine();
    let risk = RiskManager::new(RiskConfig::default(), engine.clone()).unwrap();
    let shared = engine.add_strategy(managed("var", None)).unwrap();

    {
        let mut guard = shared.lock().await;
        guard.start().await.unwrap();
        let order = OrderInfo::market("var", "AAPL", Side::Buy, dec!(100));
        guard.track_order(order.clone());
        let fill = TradeInfo::for_order(&order, dec!(100), dec!(100), Decimal::ZERO, Utc::now());
        guard.handle_fill(&fill).await.unwrap();

        for i in 0..30i64 {
            let swing = if i % 2 == 0 { dec!(1) } else { dec!(-1) };
            let close = dec!(100) + swing * Decimal::from(i % 5);
            let data = bar(i, close);
            guard.handle_market_data(&data).await;
            guard.record_equity(data.timestamp);
        }
    }

    risk.refresh_var().await;
    let estimate = risk.var("var").unwrap();
    assert_eq!(estimate.observations, 29);
    assert!(estimate.var < 0.0);
    assert!(estimate.cvar <= estimate.var);
    assert!(risk.var("missing").is_none());
}
