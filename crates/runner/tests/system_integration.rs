//! Integration test: StrategySystem end to end
//!
//! 1. A JSON config with a standalone strategy and a weighted group runs live
//! 2. Group creation is all-or-nothing
//! 3. Provider replay feeds every validated bar in timestamp order
//! 4. Backtests run from a registered kind
//! 5. Removed strategies keep their performance history
//! 6. The synthetic feed drives a live engine

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use meridian_backtest::BacktestConfig;
use meridian_core::MarketData;
use meridian_engine::EngineError;
use meridian_ports::InMemoryDataProvider;
use meridian_runner::{
    FeedConfig, GroupConfig, GroupMember, GroupState, StrategySystem, StrategySystemBuilder,
    SyntheticFeed, SystemConfig, SystemError,
};
use meridian_strategy::{
    HookResult, MovingAverageCross, Strategy, StrategyConfig, StrategyContext, StrategyState,
};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

/// Buys `quantity` (a config parameter, default 10) on the first bar
struct BuyOnce {
    quantity: Option<Decimal>,
}

impl BuyOnce {
    fn from_config(config: &StrategyConfig) -> meridian_strategy::Result<Box<dyn Strategy>> {
        let quantity = Decimal::from_f64(config.parameter("quantity", 10.0));
        Ok(Box::new(BuyOnce { quantity }))
    }
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

const CONFIG: &str = r#"{
    "engine": { "execution_latency_ms": 0 },
    "strategies": [
        { "kind": "buy_once", "config": { "id": "solo", "symbols": ["AAPL"] } },
        { "kind": "buy_once", "auto_start": false,
          "config": { "id": "idle", "symbols": ["AAPL"] } }
    ],
    "groups": [
        { "name": "pair", "total_capital": 40000, "auto_start": true,
          "members": [
            { "kind": "buy_once", "weight": 3,
              "config": { "id": "pair-a", "symbols": ["AAPL"] } },
            { "kind": "buy_once",
              "config": { "id": "pair-b", "symbols": ["AAPL"], "parameters": { "quantity": 5 } } }
          ] }
    ]
}"#;

fn builder() -> StrategySystemBuilder {
    StrategySystem::builder().register("buy_once", BuyOnce::from_config)
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, 20, 0, 0).unwrap()
}

fn bar(symbol: &str, day: i64, close: Decimal) -> MarketData {
    let ts = t0() + ChronoDuration::days(day);
    MarketData::bar(symbol, ts, close, close, close, close, dec!(1000000))
}

async fn position(system: &StrategySystem, id: &str) -> Decimal {
    system
        .snapshot(id)
        .await
        .map(|s| s.positions.iter().map(|p| p.quantity).sum())
        .unwrap_or(Decimal::ZERO)
}

async fn wait_for_position(system: &StrategySystem, id: &str, expected: Decimal) -> bool {
    for _ in 0..200 {
        if position(system, id).await == expected {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

async fn wait_for_processed(system: &StrategySystem, count: u64) -> bool {
    for _ in 0..200 {
        if system.engine().stats().await.data_processed >= count {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn test_config_driven_system() {
    let _ = env_logger::builder().is_test(true).try_init();
    let config = SystemConfig::from_json(CONFIG).unwrap();
    let system = StrategySystem::from_config_with(&config, builder())
        .await
        .unwrap();
    assert_eq!(system.strategies(), vec!["idle", "pair-a", "pair-b", "solo"]);

    let group = system.group("pair").unwrap();
    assert_eq!(group.state, GroupState::Created);
    assert_eq!(
        group.allocations,
        vec![
            ("pair-a".to_string(), dec!(30000)),
            ("pair-b".to_string(), dec!(10000))
        ]
    );
    assert_eq!(
        system.snapshot("pair-b").await.unwrap().initial_capital,
        dec!(10000)
    );

    system.start().await.unwrap();
    assert!(system.is_running());
    assert_eq!(system.groups()[0].state, GroupState::Running);
    assert_eq!(
        system.strategy_state("idle").await.unwrap(),
        StrategyState::Initialized
    );

    system.feed(bar("AAPL", 0, dec!(100))).unwrap();
    assert!(wait_for_position(&system, "solo", dec!(10)).await);
    assert!(wait_for_position(&system, "pair-a", dec!(10)).await);
    assert!(wait_for_position(&system, "pair-b", dec!(5)).await);
    assert_eq!(position(&system, "idle").await, Decimal::ZERO);

    system.feed(bar("AAPL", 1, dec!(104))).unwrap();
    assert!(wait_for_processed(&system, 2).await);
    assert_eq!(system.refresh_performance().await, 4);

    let metrics = system.metrics("solo").unwrap();
    assert!(metrics.final_equity > 0.0);
    assert!(system.performance_report("solo").unwrap().contains("solo"));
    assert!(system.active_risk_events().is_empty());
    assert!(!system.risk_snapshot().halted);
    assert!(!system.risk_report().is_empty());

    let reports = system.stop().await;
    assert_eq!(reports.len(), 4);
    assert!(!system.is_running());
    assert_eq!(system.groups()[0].state, GroupState::Stopped);
    assert_eq!(
        system.strategy_state("solo").await.unwrap(),
        StrategyState::Stopped
    );

    // the final sample was taken after the strategies stopped
    let curve = system.equity_curve("pair-a").unwrap();
    assert!(!curve.is_empty());
    let comparison = system.compare(&[]).unwrap();
    assert_eq!(comparison.strategy_ids.len(), 4);
    assert!(matches!(
        system.metrics("missing"),
        Err(SystemError::Performance(_))
    ));
}

fn group(name: &str, members: Vec<(&str, &str)>) -> GroupConfig {
    GroupConfig {
        name: name.to_string(),
        total_capital: dec!(20000),
        members: members
            .into_iter()
            .map(|(kind, id)| {
                GroupMember::new(kind, StrategyConfig::new(id, vec!["AAPL".to_string()]), 1.0)
            })
            .collect(),
        auto_start: false,
    }
}

#[tokio::test]
async fn test_group_creation_is_atomic() {
    let system = builder().build().unwrap();
    system
        .add_strategy("buy_once", StrategyConfig::new("taken", vec!["AAPL".to_string()]))
        .unwrap();

    // unknown kind: nothing registered
    let result = system
        .create_group(group("g", vec![("buy_once", "g-a"), ("nope", "g-b")]))
        .await;
    assert!(matches!(result, Err(SystemError::UnknownKind(kind)) if kind == "nope"));
    assert_eq!(system.strategies(), vec!["taken"]);

    // id clash on the second member: the first is rolled back
    let result = system
        .create_group(group("g", vec![("buy_once", "g-a"), ("buy_once", "taken")]))
        .await;
    assert!(matches!(
        result,
        Err(SystemError::Engine(EngineError::DuplicateStrategy(_)))
    ));
    assert_eq!(system.strategies(), vec!["taken"]);

    let created = system
        .create_group(group("g", vec![("buy_once", "g-a"), ("buy_once", "g-b")]))
        .await
        .unwrap();
    assert_eq!(created.member_ids(), vec!["g-a", "g-b"]);
    assert!(matches!(
        system.create_group(group("g", vec![("buy_once", "g-c")])).await,
        Err(SystemError::GroupExists(_))
    ));
    assert!(matches!(
        system.start_group("other").await,
        Err(SystemError::UnknownGroup(_))
    ));

    system.engine().start().unwrap();
    system.start_group("g").await.unwrap();
    assert_eq!(
        system.strategy_state("g-a").await.unwrap(),
        StrategyState::Running
    );
    let reports = system.stop_group("g").await.unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(system.group("g").unwrap().state, GroupState::Stopped);
    system.stop().await;
}

#[tokio::test]
async fn test_replay_from_provider() {
    let system = builder()
        .engine_config(meridian_engine::EngineConfig {
            execution_latency_ms: 0,
            data_queue_capacity: 2,
            ..Default::default()
        })
        .build()
        .unwrap();
    system
        .add_strategy("buy_once", StrategyConfig::new("r", vec!["AAPL".to_string()]))
        .unwrap();
    system.start().await.unwrap();
    system.start_strategy("r").await.unwrap();

    let mut bars = Vec::new();
    for day in 0..5 {
        bars.push(bar("AAPL", day, dec!(100) + Decimal::from(day)));
        bars.push(bar("MSFT", day, dec!(400)));
    }
    // invalid row is dropped by validation
    bars.push(MarketData::bar(
        "AAPL",
        t0() + ChronoDuration::days(9),
        dec!(10),
        dec!(9),
        dec!(11),
        dec!(10),
        dec!(1),
    ));
    let provider = InMemoryDataProvider::from_bars(bars);

    // more records than the queue holds: replay waits instead of dropping
    let fed = system
        .replay_from_provider(
            &provider,
            &["AAPL".to_string(), "MSFT".to_string()],
            t0(),
            t0() + ChronoDuration::days(10),
        )
        .await
        .unwrap();
    assert_eq!(fed, 10);
    assert!(wait_for_processed(&system, 10).await);
    let stats = system.engine().stats().await;
    assert_eq!(stats.data_dropped, 0);
    assert!(wait_for_position(&system, "r", dec!(10)).await);
    system.stop().await;
}

#[tokio::test]
async fn test_backtest_from_registered_kind() {
    let system = builder().build().unwrap();
    let bars: Vec<MarketData> = (0..120)
        .map(|day| {
            let close = 100.0 + 10.0 * (day as f64 / 6.0).sin();
            bar("AAPL", day, Decimal::from_f64(close).unwrap().round_dp(2))
        })
        .collect();
    let provider = Arc::new(InMemoryDataProvider::from_bars(bars));
    let config = BacktestConfig::new(
        t0() - ChronoDuration::days(1),
        t0() + ChronoDuration::days(120),
    )
    .frictionless();
    let strategy_config = StrategyConfig::new("bt", vec!["AAPL".to_string()])
        .with_parameter("fast_period", 3.0)
        .with_parameter("slow_period", 10.0);

    let result = system
        .backtest(
            MovingAverageCross::KIND,
            strategy_config.clone(),
            config.clone(),
            provider.clone(),
        )
        .await
        .unwrap();
    assert_eq!(result.strategy_id, "bt");
    assert_eq!(result.bars_processed, 120);
    assert_eq!(result.equity_curve.len(), 121);
    assert!(result.fills > 0);

    // the live engine is untouched
    assert!(system.strategies().is_empty());

    assert!(matches!(
        system
            .backtest("nope", strategy_config, config, provider)
            .await,
        Err(SystemError::UnknownKind(_))
    ));
}

#[tokio::test]
async fn test_removed_strategy_keeps_history() {
    let system = builder()
        .engine_config(meridian_engine::EngineConfig {
            execution_latency_ms: 0,
            ..Default::default()
        })
        .build()
        .unwrap();
    system
        .add_strategy("buy_once", StrategyConfig::new("gone", vec!["AAPL".to_string()]))
        .unwrap();
    system.start().await.unwrap();
    system.start_strategy("gone").await.unwrap();
    system.feed(bar("AAPL", 0, dec!(100))).unwrap();
    assert!(wait_for_position(&system, "gone", dec!(10)).await);
    system.refresh_performance().await;

    let report = system.remove_strategy("gone").await.unwrap();
    assert_eq!(report.id, "gone");
    assert!(system.strategies().is_empty());
    assert!(system.equity_curve("gone").is_ok());
    assert!(matches!(
        system.start_strategy("gone").await,
        Err(SystemError::Engine(EngineError::UnknownStrategy(_)))
    ));
    system.stop().await;
}

#[tokio::test]
async fn test_synthetic_feed_drives_engine() {
    let system = builder()
        .engine_config(meridian_engine::EngineConfig {
            execution_latency_ms: 0,
            ..Default::default()
        })
        .build()
        .unwrap();
    system
        .add_strategy(
            MovingAverageCross::KIND,
            StrategyConfig::new("sma", vec!["AAPL".to_string()])
                .with_parameter("fast_period", 3.0)
                .with_parameter("slow_period", 8.0),
        )
        .unwrap();
    system.start().await.unwrap();
    system.start_strategy("sma").await.unwrap();

    let mut feed = SyntheticFeed::with_seed(FeedConfig::default(), 11);
    let fed = feed
        .run(system.engine(), 50, Duration::ZERO)
        .await
        .unwrap();
    assert_eq!(fed, 100);
    assert!(wait_for_processed(&system, 100).await);
    assert_eq!(
        system.engine().prices().price("MSFT"),
        feed.price("MSFT")
    );

    system.refresh_performance().await;
    assert!(system.metrics("sma").is_ok());
    system.stop().await;
}
