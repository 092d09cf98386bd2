//! Backtest Engine: replays historical bars through one strategy
//!
//! Per timestamp, every symbol's bar is delivered to the strategy first;
//! then resting orders for those symbols are resolved against the same bar
//! (see [`fill_price`]), slipped, charged commission and checked against
//! cash and position before they reach the ledger. One equity point is
//! recorded per timestamp. Live Engine state is never touched.

use chrono::{DateTime, Utc};
use meridian_core::{
    ClosedTrade, EquityPoint, MarketData, OrderInfo, Price, Quantity, Side, Symbol, TradeInfo,
};
use meridian_performance::{EquitySample, EquitySeries, MetricParams, PerformanceMetrics};
use meridian_ports::DataProvider;
use meridian_strategy::{ManagedStrategy, Strategy, StrategyConfig};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::collections::HashSet;
use std::sync::Arc;

use crate::config::BacktestConfig;
use crate::error::{BacktestError, Result};
use crate::fills::{PendingOrder, fill_price};
use crate::loader::{Timeline, load_timeline};
use crate::result::BacktestResult;
use crate::router::BacktestRouter;

/// Builds a fresh strategy for a configuration, used by parameter sweeps
pub type StrategyFactory =
    dyn Fn(&StrategyConfig) -> meridian_strategy::Result<Box<dyn Strategy>> + Send + Sync;

pub struct BacktestEngine {
    config: BacktestConfig,
    provider: Arc<dyn DataProvider>,
}

/// Mutable state of one run
struct Replay<'a> {
    config: &'a BacktestConfig,
    managed: ManagedStrategy,
    router: BacktestRouter,
    pending: Vec<PendingOrder>,
    trades: Vec<TradeInfo>,
    closed: Vec<ClosedTrade>,
    equity: Vec<EquityPoint>,
    slippage_cost: Decimal,
    rejected: usize,
}

impl Replay<'_> {
    /// Move routed orders into the pending book and honour restart requests
    async fn settle(&mut self) {
        self.pending
            .extend(self.router.drain().into_iter().map(PendingOrder::new));
        if self.managed.take_pending_restart().is_some() {
            if let Err(e) = self.managed.restart_after_backoff().await {
                log::error!("[Backtest] Restart of {} failed: {}", self.managed.id(), e);
            }
            self.pending
                .extend(self.router.drain().into_iter().map(PendingOrder::new));
        }
    }

    fn check_affordable(
        &self,
        order: &OrderInfo,
        quantity: Quantity,
        price: Price,
        commission: Decimal,
    ) -> std::result::Result<(), String> {
        let ledger = self.managed.context().ledger();
        match order.side {
            Side::Buy => {
                let cost = quantity * price + commission;
                let mut available = ledger.cash();
                if self.config.use_margin {
                    let equity = ledger.equity().max(Decimal::ZERO);
                    available += equity * (Decimal::ONE / self.config.margin_ratio - Decimal::ONE);
                }
                if cost > available {
                    return Err(format!(
                        "insufficient cash: need {}, available {}",
                        cost.round_dp(2),
                        available.round_dp(2)
                    ));
                }
            }
            Side::Sell if !self.config.allow_short => {
                let held = ledger.signed_quantity(&order.symbol).max(Decimal::ZERO);
                if quantity > held {
                    return Err(format!(
                        "insufficient position: selling {} of {} with {} held",
                        quantity, order.symbol, held
                    ));
                }
            }
            Side::Sell => {}
        }
        Ok(())
    }

    /// Resolve resting orders against the bars of one timestamp
    async fn resolve(&mut self, bars: &[MarketData]) {
        let mut resting = Vec::new();
        for mut pending in std::mem::take(&mut self.pending) {
            let id = pending.order.id;
            if !self.managed.is_order_live(&id) {
                continue;
            }
            let Some(bar) = bars.iter().find(|b| b.symbol == pending.order.symbol) else {
                resting.push(pending);
                continue;
            };
            let Some(base) = fill_price(&mut pending, bar) else {
                resting.push(pending);
                continue;
            };

            let order = &pending.order;
            let quantity = order.remaining_quantity();
            let price = self.config.slippage.apply(order.side, base, quantity, bar);
            let commission = self.config.commission.commission(quantity * price);

            if let Err(reason) = self.check_affordable(order, quantity, price, commission) {
                self.rejected += 1;
                self.managed.handle_order_rejected(&id, &reason).await;
                self.settle().await;
                continue;
            }

            let trade = TradeInfo::for_order(order, quantity, price, commission, bar.timestamp);
            match self.managed.handle_fill(&trade).await {
                Ok(outcome) => {
                    self.slippage_cost += (price - base).abs() * quantity;
                    self.closed.extend(outcome.closed);
                    self.trades.push(trade);
                }
                Err(e) => log::warn!("[Backtest] Fill for order {} not applied: {}", id, e),
            }
            self.settle().await;
        }
        // orders routed during resolution wait for the next bar
        resting.append(&mut self.pending);
        self.pending = resting;
    }

    fn record_equity(&mut self, timestamp: DateTime<Utc>) {
        self.managed.record_equity(timestamp);
        let ledger = self.managed.context().ledger();
        self.equity
            .push(EquityPoint::new(timestamp, ledger.equity(), ledger.cash()));
    }
}

impl BacktestEngine {
    pub fn new(config: BacktestConfig, provider: Arc<dyn DataProvider>) -> Result<Self> {
        config.validate().map_err(BacktestError::InvalidConfig)?;
        Ok(Self { config, provider })
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Replay the configured window through one strategy
    pub async fn run(
        &self,
        strategy: Box<dyn Strategy>,
        strategy_config: StrategyConfig,
    ) -> Result<BacktestResult> {
        let mut strategy_config = strategy_config;
        strategy_config.initial_capital = self.config.initial_capital;
        strategy_config.allow_short = self.config.allow_short;
        strategy_config.mode.backtest = true;
        let strategy_id = strategy_config.id.clone();

        let traded: HashSet<Symbol> = strategy_config.symbols.iter().cloned().collect();
        let mut symbols = strategy_config.symbols.clone();
        if let Some(benchmark) = &self.config.benchmark
            && !traded.contains(benchmark)
        {
            symbols.push(benchmark.clone());
        }

        let timeline =
            load_timeline(self.provider.as_ref(), &symbols, self.config.start, self.config.end)
                .await?;
        log::info!(
            "[Backtest] {}: {} bars over {} timestamps (dropped: {})",
            strategy_id,
            timeline.bar_count,
            timeline.len(),
            timeline.dropped
        );

        let mut managed = ManagedStrategy::new(strategy, strategy_config)?;
        let router = BacktestRouter::new();
        managed.attach(Arc::new(router.clone()));
        managed.start().await?;

        let mut replay = Replay {
            config: &self.config,
            managed,
            router,
            pending: Vec::new(),
            trades: Vec::new(),
            closed: Vec::new(),
            equity: Vec::new(),
            slippage_cost: Decimal::ZERO,
            rejected: 0,
        };
        replay.settle().await;

        let mut bars_processed = 0usize;
        for (timestamp, bars) in &timeline.slices {
            for bar in bars.iter().filter(|b| traded.contains(&b.symbol)) {
                replay.managed.handle_market_data(bar).await;
                bars_processed += 1;
                replay.settle().await;
            }
            replay.resolve(bars).await;
            replay.record_equity(*timestamp);
        }

        let unfilled = replay.pending.len();
        for pending in std::mem::take(&mut replay.pending) {
            replay
                .managed
                .handle_order_rejected(&pending.order.id, "backtest data exhausted")
                .await;
        }
        replay.router.drain();
        if let Err(e) = replay.managed.stop().await {
            log::warn!("[Backtest] {} did not stop cleanly: {}", strategy_id, e);
        }

        let result = self.derive_result(strategy_id, &timeline, replay, bars_processed, unfilled);
        log::info!(
            "[Backtest] {} finished: return {:+.2}%, sharpe {:.2}, max drawdown {:.2}%",
            result.strategy_id,
            result.total_return * 100.0,
            result.sharpe_ratio,
            result.max_drawdown * 100.0
        );
        Ok(result)
    }

    /// Build the strategy with `factory` and run it
    pub async fn run_with(
        &self,
        factory: &StrategyFactory,
        strategy_config: StrategyConfig,
    ) -> Result<BacktestResult> {
        let strategy = factory(&strategy_config)?;
        self.run(strategy, strategy_config).await
    }

    /// Run the same factory once per configuration, in order
    pub async fn run_sweep(
        &self,
        factory: &StrategyFactory,
        configs: Vec<StrategyConfig>,
    ) -> Vec<(StrategyConfig, Result<BacktestResult>)> {
        let mut results = Vec::with_capacity(configs.len());
        for config in configs {
            let result = self.run_with(factory, config.clone()).await;
            if let Err(e) = &result {
                log::warn!("[Backtest] Sweep run {} failed: {}", config.id, e);
            }
            results.push((config, result));
        }
        results
    }

    fn derive_result(
        &self,
        strategy_id: String,
        timeline: &Timeline,
        replay: Replay<'_>,
        bars_processed: usize,
        unfilled: usize,
    ) -> BacktestResult {
        let mut equity_curve = Vec::with_capacity(replay.equity.len() + 1);
        if let Some(first) = replay.equity.first() {
            let origin = if self.config.start < first.timestamp {
                self.config.start
            } else {
                first.timestamp - self.config.bar_frequency.duration()
            };
            equity_curve.push(EquityPoint::new(
                origin,
                self.config.initial_capital,
                self.config.initial_capital,
            ));
        }
        equity_curve.extend(replay.equity.iter().copied());

        let benchmark_series = self.config.benchmark.as_ref().map(|symbol| {
            let mut series = EquitySeries::new(timeline.len().max(2));
            for (timestamp, close) in timeline.closes(symbol) {
                series.push(timestamp, close);
            }
            series
        });
        let benchmark_returns = benchmark_series.as_ref().map(EquitySeries::returns);
        let benchmark_return = benchmark_series.as_ref().and_then(|series| {
            match (series.first(), series.last()) {
                (Some(first), Some(last)) if series.len() > 1 && first.equity > 0.0 => {
                    Some(last.equity / first.equity - 1.0)
                }
                _ => None,
            }
        });

        let params = MetricParams {
            periods_per_year: self.config.bar_frequency.periods_per_year(),
            risk_free_rate: self.config.risk_free_rate,
            var_confidence: self.config.var_confidence,
        };
        let samples: Vec<EquitySample> = equity_curve.iter().map(EquitySample::from).collect();
        let metrics = PerformanceMetrics::compute(
            &samples,
            &replay.closed,
            benchmark_returns.as_deref(),
            &params,
        );

        let final_equity = replay
            .equity
            .last()
            .map(|p| p.equity)
            .unwrap_or(self.config.initial_capital);
        let total_commission = replay.trades.iter().map(|t| t.commission).sum();
        let stats = &metrics.trades;

        BacktestResult {
            strategy_id,
            start: self.config.start,
            end: self.config.end,
            initial_capital: self.config.initial_capital,
            final_equity,
            total_return: ((final_equity - self.config.initial_capital)
                / self.config.initial_capital)
                .to_f64()
                .unwrap_or(0.0),
            annual_return: metrics.annual_return,
            volatility: metrics.volatility,
            sharpe_ratio: metrics.sharpe_ratio,
            sortino_ratio: metrics.sortino_ratio,
            max_drawdown: metrics.max_drawdown,
            max_drawdown_duration: metrics.max_drawdown_duration,
            win_rate: stats.win_rate,
            profit_factor: stats.profit_factor,
            avg_win: stats.avg_win,
            avg_loss: stats.avg_loss,
            largest_win: stats.largest_win,
            largest_loss: stats.largest_loss,
            total_trades: stats.total_trades,
            winning_trades: stats.winning_trades,
            losing_trades: stats.losing_trades,
            fills: replay.trades.len(),
            total_commission,
            slippage_cost: replay.slippage_cost,
            rejected_orders: replay.rejected,
            unfilled_orders: unfilled,
            bars_processed,
            dropped_rows: timeline.dropped.total(),
            restarts: replay.managed.restart_count(),
            benchmark_return,
            equity_curve,
            trades: replay.trades,
            closed_trades: replay.closed,
            metrics,
        }
    }
}
