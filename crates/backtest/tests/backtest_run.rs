//! Integration test: full replays through the Backtest Engine
//!
//! 1. Limit orders below the range never fill; inside the range they fill
//!    at no worse than the limit
//! 2. Fills the account cannot pay for are rejected
//! 3. A failing hook restarts immediately and the replay continues
//! 4. A moving average crossover over a synthetic cycle, with benchmark
//! 5. Parameter sweep over the same factory

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use meridian_backtest::{BacktestConfig, BacktestEngine, BacktestError, CommissionModel};
use meridian_core::MarketData;
use meridian_ports::InMemoryDataProvider;
use meridian_strategy::{
    HookResult, MovingAverageCross, Strategy, StrategyConfig, StrategyContext, StrategyError,
    builtin,
};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal_macros::dec;
use std::sync::Arc;

#[derive(Clone, Copy)]
enum FirstBar {
    BuyLimit(Decimal),
    BuyMarket(Decimal),
    Fail,
}

/// Acts once, on the first bar it sees
struct Scripted {
    action: Option<FirstBar>,
}

impl Scripted {
    fn new(action: FirstBar) -> Box<Self> {
        Box::new(Self {
            action: Some(action),
        })
    }
}

#[async_trait]
impl Strategy for Scripted {
    fn name(&self) -> &str {
        "Scripted"
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
        match self.action.take() {
            Some(FirstBar::BuyLimit(price)) => {
                ctx.buy(&data.symbol, dec!(10), Some(price))?;
            }
            Some(FirstBar::BuyMarket(quantity)) => {
                ctx.buy(&data.symbol, quantity, None)?;
            }
            Some(FirstBar::Fail) => return Err(StrategyError::hook("boom")),
            None => {}
        }
        Ok(())
    }
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 2, 21, 0, 0).unwrap()
}

fn bar(
    symbol: &str,
    day: i64,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
) -> MarketData {
    MarketData::bar(symbol, t0() + Duration::days(day), open, high, low, close, dec!(1000000))
}

/// Five flat days: open/close 100, range 98..102
fn flat_days() -> Vec<MarketData> {
    (0..5)
        .map(|day| bar("AAPL", day, dec!(100), dec!(102), dec!(98), dec!(100)))
        .collect()
}

fn engine(bars: Vec<MarketData>, config: BacktestConfig) -> BacktestEngine {
    BacktestEngine::new(config, Arc::new(InMemoryDataProvider::from_bars(bars))).unwrap()
}

fn window() -> BacktestConfig {
    BacktestConfig::new(t0() - Duration::days(1), t0() + Duration::days(400))
}

fn scripted_config() -> StrategyConfig {
    StrategyConfig::new("scripted", vec!["AAPL".to_string()])
}

#[tokio::test]
async fn test_buy_limit_below_low_never_fills() {
    let _ = env_logger::builder().is_test(true).try_init();
    let engine = engine(flat_days(), window().frictionless());
    let result = engine
        .run(Scripted::new(FirstBar::BuyLimit(dec!(97.99))), scripted_config())
        .await
        .unwrap();

    assert_eq!(result.fills, 0);
    assert_eq!(result.unfilled_orders, 1);
    assert_eq!(result.bars_processed, 5);
    assert_eq!(result.final_equity, dec!(100000));
    // one point per timestamp plus the starting capital
    assert_eq!(result.equity_curve.len(), 6);
}

#[tokio::test]
async fn test_buy_limit_inside_range_fills_at_or_below_limit() {
    let engine = engine(flat_days(), window().frictionless());
    for limit in [dec!(98), dec!(99), dec!(101)] {
        let result = engine
            .run(Scripted::new(FirstBar::BuyLimit(limit)), scripted_config())
            .await
            .unwrap();
        assert_eq!(result.fills, 1);
        let price = result.trades[0].price;
        assert!(price <= limit.min(dec!(100)));
        assert_eq!(result.unfilled_orders, 0);
    }
}

#[tokio::test]
async fn test_unaffordable_fill_is_rejected() {
    // closes at 100 but opened at 200: the market order fills at the open
    let mut bars = vec![bar("AAPL", 0, dec!(200), dec!(200), dec!(100), dec!(100))];
    bars.extend((1..3).map(|day| bar("AAPL", day, dec!(100), dec!(101), dec!(99), dec!(100))));
    let engine = engine(bars, window().frictionless());
    let mut config = scripted_config();
    config.max_position_fraction = Decimal::ONE;

    let result = engine
        .run(Scripted::new(FirstBar::BuyMarket(dec!(900))), config)
        .await
        .unwrap();
    assert_eq!(result.rejected_orders, 1);
    assert_eq!(result.fills, 0);
    assert_eq!(result.final_equity, dec!(100000));
}

#[tokio::test]
async fn test_hook_failure_restarts_immediately() {
    let engine = engine(flat_days(), window());
    let result = engine
        .run(Scripted::new(FirstBar::Fail), scripted_config())
        .await
        .unwrap();
    assert_eq!(result.restarts, 1);
    assert_eq!(result.bars_processed, 5);
}

fn cycle(symbol: &str, days: i64, amplitude: f64) -> Vec<MarketData> {
    let mut previous = 100.0;
    (0..days)
        .map(|day| {
            let close = 100.0 + 0.05 * day as f64 + amplitude * (day as f64 / 6.0).sin();
            let open = previous;
            previous = close;
            let high = open.max(close) + 0.5;
            let low = open.min(close) - 0.5;
            let d = |v: f64| Decimal::from_f64(v).unwrap().round_dp(4);
            bar(symbol, day, d(open), d(high), d(low), d(close))
        })
        .collect()
}

#[tokio::test]
async fn test_moving_average_cross_with_benchmark() {
    let mut bars = cycle("AAPL", 150, 8.0);
    bars.extend(cycle("SPY", 150, 2.0));
    let config = window().with_benchmark("SPY");
    let engine = engine(bars, config);

    let strategy_config = StrategyConfig::new("sma", vec!["AAPL".to_string()])
        .with_parameter("fast_period", 5.0)
        .with_parameter("slow_period", 20.0);
    let strategy = MovingAverageCross::from_config(&strategy_config).unwrap();
    let result = engine.run(Box::new(strategy), strategy_config).await.unwrap();

    assert_eq!(result.bars_processed, 150);
    assert_eq!(result.equity_curve.len(), 151);
    assert!(result.fills >= 2);
    assert!(result.total_trades >= 1);
    assert!(result.total_commission > Decimal::ZERO);
    assert!(result.slippage_cost > Decimal::ZERO);
    assert!(result.benchmark_return.is_some());
    assert!(result.metrics.benchmark.is_some());
    assert_eq!(result.metrics.periods, 150);
    assert!(result.max_drawdown >= 0.0 && result.max_drawdown < 1.0);
    assert!(result.to_string().contains("Backtest sma"));
}

#[tokio::test]
async fn test_sweep_reports_each_configuration() {
    let mut config = window();
    config.commission = CommissionModel::Fixed { amount: dec!(1) };
    let engine = engine(cycle("AAPL", 120, 8.0), config);

    let factory = |c: &StrategyConfig| builtin(MovingAverageCross::KIND, c);
    let configs = vec![
        StrategyConfig::new("fast", vec!["AAPL".to_string()])
            .with_parameter("fast_period", 3.0)
            .with_parameter("slow_period", 12.0),
        StrategyConfig::new("broken", vec!["AAPL".to_string()])
            .with_parameter("fast_period", 30.0)
            .with_parameter("slow_period", 10.0),
    ];
    let results = engine.run_sweep(&factory, configs).await;

    assert_eq!(results.len(), 2);
    assert!(results[0].1.is_ok());
    assert!(matches!(
        results[1].1,
        Err(BacktestError::Strategy(StrategyError::InvalidConfig(_)))
    ));
}

#[tokio::test]
async fn test_no_data_in_window() {
    let config = BacktestConfig::new(t0() + Duration::days(100), t0() + Duration::days(200));
    let engine = engine(flat_days(), config);
    let result = engine.run(Scripted::new(FirstBar::Fail), scripted_config()).await;
    assert!(matches!(result, Err(BacktestError::NoData { .. })));
}
