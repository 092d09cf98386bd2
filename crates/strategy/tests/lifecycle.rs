//! Integration test: strategy lifecycle and restart policy
//!
//! Drives a ManagedStrategy the way the Engine does:
//! 1. Start through the shared runtime (timer armed)
//! 2. Deliver bars and fills under the strategy mutex
//! 3. Hook failures restart after the backoff, then crash once the budget is spent

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use meridian_core::{MarketData, OrderInfo, Side, TradeInfo};
use meridian_strategy::{
    ExposureView, HookResult, ManagedStrategy, OrderRouter, Result, StrategyConfig,
    StrategyContext, StrategyError, StrategyState, Strategy, follow_up, start_shared,
};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

#[derive(Default)]
struct HookCounts {
    starts: AtomicU32,
    stops: AtomicU32,
    bars: AtomicU32,
    trades: AtomicU32,
    errors: AtomicU32,
    fail_bars: AtomicBool,
}

/// Buys once on the first bar, fails bars on demand
struct Counting {
    counts: Arc<HookCounts>,
    bought: bool,
}

#[async_trait]
impl Strategy for Counting {
    fn name(&self) -> &str {
        "Counting"
    }

    async fn on_start(&mut self, _ctx: &mut StrategyContext) -> HookResult {
        self.counts.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn on_stop(&mut self, _ctx: &mut StrategyContext) -> HookResult {
        self.counts.stops.fetch_add(1, Ordering::SeqCst);
        Err(StrategyError::hook("stop hooks may fail"))
    }

    async fn on_tick(&mut self, _data: &MarketData, _ctx: &mut StrategyContext) -> HookResult {
        Ok(())
    }

    async fn on_bar(&mut self, data: &MarketData, ctx: &mut StrategyContext) -> HookResult {
        self.counts.bars.fetch_add(1, Ordering::SeqCst);
        if self.counts.fail_bars.load(Ordering::SeqCst) {
            return Err(StrategyError::hook("bad bar"));
        }
        if !self.bought {
            self.bought = true;
            ctx.buy(&data.symbol, dec!(100), None)?;
        }
        Ok(())
    }

    async fn on_trade_update(&mut self, _trade: &TradeInfo, _ctx: &mut StrategyContext) -> HookResult {
        self.counts.trades.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn on_error(&mut self, _error: &StrategyError, _ctx: &mut StrategyContext) {
        self.counts.errors.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct Capture(Mutex<Vec<OrderInfo>>);

impl OrderRouter for Capture {
    fn route(&self, order: OrderInfo, _view: &ExposureView) -> Result<()> {
        self.0.lock().push(order);
        Ok(())
    }
}

fn setup(max_retries: u32) -> (ManagedStrategy, Arc<HookCounts>, Arc<Capture>) {
    let mut config = StrategyConfig::new("counter", vec!["AAPL".to_string()]);
    config.max_position_fraction = dec!(0.5);
    config.restart.max_retries = max_retries;
    config.restart.backoff_ms = 100;

    let counts = Arc::new(HookCounts::default());
    let strategy = Counting {
        counts: counts.clone(),
        bought: false,
    };
    let mut managed = ManagedStrategy::new(Box::new(strategy), config).unwrap();
    let router = Arc::new(Capture::default());
    managed.attach(router.clone());
    (managed, counts, router)
}

fn bar(day: i64, close: Decimal) -> MarketData {
    let ts = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap() + ChronoDuration::days(day);
    MarketData::bar("AAPL", ts, close, close, close, close, dec!(1000000))
}

#[tokio::test]
async fn test_lifecycle_transitions() {
    let _ = env_logger::builder().is_test(true).try_init();
    let (mut managed, counts, _router) = setup(3);
    assert_eq!(managed.state(), StrategyState::Initialized);

    managed.start().await.unwrap();
    managed.start().await.unwrap();
    assert_eq!(managed.state(), StrategyState::Running);
    assert_eq!(counts.starts.load(Ordering::SeqCst), 1);

    managed.pause().await.unwrap();
    managed.handle_market_data(&bar(0, dec!(50))).await;
    assert_eq!(counts.bars.load(Ordering::SeqCst), 0);
    // paused strategies are still marked
    assert_eq!(managed.context().last_price("AAPL"), Some(dec!(50)));

    managed.resume().await.unwrap();
    managed.handle_market_data(&bar(1, dec!(50))).await;
    assert_eq!(counts.bars.load(Ordering::SeqCst), 1);

    // on_stop failure is logged, not escalated
    let report = managed.stop().await.unwrap();
    assert_eq!(managed.state(), StrategyState::Stopped);
    assert_eq!(managed.error_count(), 0);
    assert_eq!(report.orders, 1);

    managed.start().await.unwrap();
    assert_eq!(managed.state(), StrategyState::Running);
    assert_eq!(counts.starts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_fills_update_ledger_and_hooks() {
    let (mut managed, counts, router) = setup(3);
    managed.start().await.unwrap();
    managed.handle_market_data(&bar(0, dec!(50))).await;

    let order = router.0.lock().pop().unwrap();
    assert_eq!(order.side, Side::Buy);
    assert!(managed.is_order_live(&order.id));

    let first = TradeInfo::for_order(&order, dec!(60), dec!(50), Decimal::ZERO, Utc::now());
    let second = TradeInfo::for_order(&order, dec!(40), dec!(50), Decimal::ZERO, Utc::now());
    managed.handle_fill(&first).await.unwrap();
    managed.handle_fill(&second).await.unwrap();

    assert!(!managed.is_order_live(&order.id));
    assert_eq!(counts.trades.load(Ordering::SeqCst), 2);

    let snapshot = managed.snapshot();
    assert_eq!(snapshot.positions.len(), 1);
    assert_eq!(snapshot.positions[0].quantity, dec!(100));
    assert_eq!(snapshot.cash, dec!(95000));
    assert_eq!(snapshot.equity, dec!(100000));
    assert_eq!(snapshot.trade_count, 2);

    // an overfill is refused and leaves the ledger untouched
    let extra = TradeInfo::for_order(&order, dec!(1), dec!(50), Decimal::ZERO, Utc::now());
    assert!(managed.handle_fill(&extra).await.is_err());
    assert_eq!(managed.snapshot().cash, dec!(95000));
}

#[tokio::test]
async fn test_rejected_order_is_cancelled() {
    let (mut managed, _counts, router) = setup(3);
    managed.start().await.unwrap();
    managed.handle_market_data(&bar(0, dec!(50))).await;
    let order = router.0.lock().pop().unwrap();

    managed.handle_order_rejected(&order.id, "no liquidity").await;
    assert!(!managed.is_order_live(&order.id));
    assert_eq!(managed.snapshot().open_orders, 0);
    assert_eq!(managed.context().cash(), dec!(100000));
}

#[tokio::test(start_paused = true)]
async fn test_restart_after_backoff_then_crash() {
    let (managed, counts, _router) = setup(1);
    let shared = managed.into_shared();
    start_shared(&shared).await.unwrap();
    assert!(shared.lock().await.has_timer());

    counts.fail_bars.store(true, Ordering::SeqCst);
    {
        let mut guard = shared.lock().await;
        guard.handle_market_data(&bar(0, dec!(50))).await;
        assert_eq!(guard.state(), StrategyState::Stopped);
        assert_eq!(guard.error_count(), 1);
        follow_up(&shared, &mut guard);
    }

    tokio::time::sleep(Duration::from_millis(150)).await;
    {
        let mut guard = shared.lock().await;
        assert_eq!(guard.state(), StrategyState::Running);
        assert_eq!(guard.restart_count(), 1);
        assert!(guard.has_timer());

        // retry budget of one is spent
        guard.handle_market_data(&bar(1, dec!(50))).await;
        assert_eq!(guard.state(), StrategyState::Crashed);
        assert!(!guard.has_timer());
        assert!(guard.take_pending_restart().is_none());
    }

    assert_eq!(counts.errors.load(Ordering::SeqCst), 2);
    assert_eq!(counts.starts.load(Ordering::SeqCst), 2);

    let mut guard = shared.lock().await;
    assert!(guard.start().await.is_err());
    assert!(guard.stop().await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_explicit_stop_cancels_pending_restart() {
    let (managed, counts, _router) = setup(3);
    let shared = managed.into_shared();
    start_shared(&shared).await.unwrap();

    counts.fail_bars.store(true, Ordering::SeqCst);
    {
        let mut guard = shared.lock().await;
        guard.handle_market_data(&bar(0, dec!(50))).await;
        follow_up(&shared, &mut guard);
        guard.stop().await.unwrap();
    }

    tokio::time::sleep(Duration::from_millis(500)).await;
    let guard = shared.lock().await;
    assert_eq!(guard.state(), StrategyState::Stopped);
    assert_eq!(guard.restart_count(), 0);
    assert_eq!(counts.starts.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_timer_records_equity() {
    let (managed, _counts, _router) = setup(3);
    let shared = managed.into_shared();
    start_shared(&shared).await.unwrap();

    // default monitoring interval is one minute
    tokio::time::sleep(Duration::from_secs(181)).await;
    let guard = shared.lock().await;
    assert_eq!(guard.context().ledger().equity_history().len(), 3);
}
