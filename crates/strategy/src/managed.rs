//! Managed Strategy
//!
//! Wraps a [`Strategy`] with its context, lifecycle state and restart policy.
//! Hook failures never escape: they are counted, routed to `on_error` and
//! either schedule a restart or crash the strategy.
//!
//! The Engine shares each instance as a [`SharedStrategy`]; every callback
//! into one strategy is serialized by that mutex.

use chrono::{DateTime, Utc};
use meridian_core::{MarketData, OrderId, OrderInfo, TradeInfo};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::config::StrategyConfig;
use crate::context::StrategyContext;
use crate::error::{Result, StrategyError};
use crate::ledger::FillOutcome;
use crate::report::{StrategyReport, StrategySnapshot};
use crate::router::OrderRouter;
use crate::state::StrategyState;
use crate::strategy::{HookResult, Strategy};

pub type SharedStrategy = Arc<tokio::sync::Mutex<ManagedStrategy>>;

pub struct ManagedStrategy {
    strategy: Box<dyn Strategy>,
    ctx: StrategyContext,
    state: StrategyState,
    error_count: u32,
    restart_count: u32,
    last_error: Option<String>,
    started_at: Option<DateTime<Utc>>,
    run_trades_base: u64,
    run_orders_base: u64,
    timer: Option<JoinHandle<()>>,
    /// Bumped whenever the timer is cancelled; stale timer tasks exit
    timer_epoch: u64,
    in_timer: bool,
    pending_restart: Option<Duration>,
    awaiting_restart: bool,
    last_report: Option<StrategyReport>,
}

impl ManagedStrategy {
    pub fn new(strategy: Box<dyn Strategy>, config: StrategyConfig) -> Result<Self> {
        config.validate()?;
        let id = config.id.clone();
        let mut managed = Self {
            strategy,
            ctx: StrategyContext::new(config),
            state: StrategyState::Initializing,
            error_count: 0,
            restart_count: 0,
            last_error: None,
            started_at: None,
            run_trades_base: 0,
            run_orders_base: 0,
            timer: None,
            timer_epoch: 0,
            in_timer: false,
            pending_restart: None,
            awaiting_restart: false,
            last_report: None,
        };
        managed.transition(StrategyState::Initialized)?;
        log::debug!("[{}] Initialized ({})", id, managed.strategy.name());
        Ok(managed)
    }

    pub fn into_shared(self) -> SharedStrategy {
        Arc::new(tokio::sync::Mutex::new(self))
    }

    pub fn id(&self) -> &str {
        self.ctx.id()
    }

    pub fn name(&self) -> &str {
        self.strategy.name()
    }

    pub fn state(&self) -> StrategyState {
        self.state
    }

    pub fn config(&self) -> &StrategyConfig {
        self.ctx.config()
    }

    pub fn context(&self) -> &StrategyContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut StrategyContext {
        &mut self.ctx
    }

    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    pub fn restart_count(&self) -> u32 {
        self.restart_count
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn last_report(&self) -> Option<&StrategyReport> {
        self.last_report.as_ref()
    }

    pub fn attach(&mut self, router: Arc<dyn OrderRouter>) {
        self.ctx.attach(router);
    }

    fn transition(&mut self, next: StrategyState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(StrategyError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        log::trace!("[{}] {} -> {}", self.ctx.id(), self.state, next);
        self.state = next;
        Ok(())
    }

    /// Start or restart. A no-op when already running.
    pub async fn start(&mut self) -> Result<()> {
        match self.state {
            StrategyState::Running | StrategyState::Starting => return Ok(()),
            StrategyState::Initialized | StrategyState::Stopped => {}
            other => {
                return Err(StrategyError::InvalidTransition {
                    from: other,
                    to: StrategyState::Starting,
                });
            }
        }
        self.transition(StrategyState::Starting)?;
        self.awaiting_restart = false;
        self.started_at = Some(Utc::now());
        self.run_trades_base = self.ctx.ledger().trade_count();
        self.run_orders_base = self.ctx.orders_submitted();

        let result = self.strategy.on_start(&mut self.ctx).await;
        match result {
            Ok(()) => {
                self.transition(StrategyState::Running)?;
                log::info!("[{}] Started ({})", self.ctx.id(), self.strategy.name());
                Ok(())
            }
            Err(e) => {
                self.handle_error(e.clone()).await;
                Err(e)
            }
        }
    }

    /// Stop and produce the final report. Cancels any scheduled restart.
    pub async fn stop(&mut self) -> Result<StrategyReport> {
        self.awaiting_restart = false;
        self.pending_restart = None;
        self.stop_inner().await
    }

    async fn stop_inner(&mut self) -> Result<StrategyReport> {
        match self.state {
            StrategyState::Stopped => {
                if let Some(report) = &self.last_report {
                    return Ok(report.clone());
                }
                return Ok(self.report());
            }
            StrategyState::Initialized
            | StrategyState::Running
            | StrategyState::Paused
            | StrategyState::Error => {}
            other => {
                return Err(StrategyError::InvalidTransition {
                    from: other,
                    to: StrategyState::Stopping,
                });
            }
        }

        self.cancel_timer();
        self.transition(StrategyState::Stopping)?;
        let result = self.strategy.on_stop(&mut self.ctx).await;
        if let Err(e) = result {
            log::error!("[{}] on_stop failed: {}", self.ctx.id(), e);
        }
        self.transition(StrategyState::Stopped)?;

        let report = self.report();
        log::info!(
            "[{}] Stopped: equity {}, {} trades",
            self.ctx.id(),
            report.final_equity.round_dp(2),
            report.trades
        );
        self.last_report = Some(report.clone());
        Ok(report)
    }

    pub async fn pause(&mut self) -> Result<()> {
        if self.state == StrategyState::Paused {
            return Ok(());
        }
        self.transition(StrategyState::Pausing)?;
        let result = self.strategy.on_pause(&mut self.ctx).await;
        if let Err(e) = result {
            self.handle_error(e.clone()).await;
            return Err(e);
        }
        self.transition(StrategyState::Paused)?;
        log::info!("[{}] Paused", self.ctx.id());
        Ok(())
    }

    pub async fn resume(&mut self) -> Result<()> {
        if self.state == StrategyState::Running {
            return Ok(());
        }
        if self.state != StrategyState::Paused {
            return Err(StrategyError::InvalidTransition {
                from: self.state,
                to: StrategyState::Running,
            });
        }
        self.transition(StrategyState::Running)?;
        let result = self.strategy.on_resume(&mut self.ctx).await;
        if let Err(e) = result {
            self.handle_error(e.clone()).await;
            return Err(e);
        }
        log::info!("[{}] Resumed", self.ctx.id());
        Ok(())
    }

    /// Deliver one market data record. Running strategies see the hook,
    /// paused ones are only marked to market.
    pub async fn handle_market_data(&mut self, data: &MarketData) {
        match self.state {
            StrategyState::Running => {}
            StrategyState::Paused => {
                self.ctx.observe(data);
                return;
            }
            _ => return,
        }

        self.ctx.on_market_data(data);
        let result = if data.is_bar() {
            self.strategy.on_bar(data, &mut self.ctx).await
        } else {
            self.strategy.on_tick(data, &mut self.ctx).await
        };
        if let Err(e) = result {
            self.handle_error(e).await;
        }
    }

    /// Apply an execution. The ledger is updated in every state; hooks run
    /// only while running or paused.
    pub async fn handle_fill(&mut self, trade: &TradeInfo) -> Result<FillOutcome> {
        let outcome = self.ctx.apply_fill(trade)?;
        if matches!(self.state, StrategyState::Running | StrategyState::Paused) {
            let result = self.notify_fill(trade, &outcome).await;
            if let Err(e) = result {
                self.handle_error(e).await;
            }
        }
        Ok(outcome)
    }

    async fn notify_fill(&mut self, trade: &TradeInfo, outcome: &FillOutcome) -> HookResult {
        if let Some(order) = &outcome.order {
            self.strategy.on_order_update(order, &mut self.ctx).await?;
        }
        self.strategy.on_trade_update(trade, &mut self.ctx).await?;
        self.strategy
            .on_position_update(&trade.symbol, outcome.position.as_ref(), &mut self.ctx)
            .await
    }

    /// Cancel an order the executor refused and notify the strategy
    pub async fn handle_order_rejected(&mut self, id: &OrderId, reason: &str) {
        let Some(order) = self.ctx.order_rejected(id, reason) else {
            return;
        };
        log::warn!(
            "[{}] Order {} {} {} rejected: {}",
            self.ctx.id(),
            order.side,
            order.quantity,
            order.symbol,
            reason
        );
        if matches!(self.state, StrategyState::Running | StrategyState::Paused) {
            let result = self.strategy.on_order_update(&order, &mut self.ctx).await;
            if let Err(e) = result {
                self.handle_error(e).await;
            }
        }
    }

    /// Snapshot timer callback: record equity, then `on_timer`
    pub async fn handle_timer(&mut self) {
        if self.state != StrategyState::Running {
            return;
        }
        self.in_timer = true;
        self.ctx.record_equity(Utc::now());
        let result = self.strategy.on_timer(&mut self.ctx).await;
        if let Err(e) = result {
            self.handle_error(e).await;
        }
        self.in_timer = false;
    }

    pub fn record_equity(&mut self, timestamp: DateTime<Utc>) {
        self.ctx.record_equity(timestamp);
    }

    /// Register an externally placed order so its fills can be applied
    pub fn track_order(&mut self, order: OrderInfo) {
        self.ctx.track_external(order);
    }

    /// Drop an externally placed order that never reached the executor
    pub fn untrack_order(&mut self, id: &OrderId, reason: &str) {
        self.ctx.order_rejected(id, reason);
    }

    /// Whether the order is still pending in this strategy's ledger
    pub fn is_order_live(&self, id: &OrderId) -> bool {
        self.ctx
            .ledger()
            .order(id)
            .is_some_and(|o| o.status.is_active())
    }

    async fn handle_error(&mut self, error: StrategyError) {
        self.error_count += 1;
        self.last_error = Some(error.to_string());
        log::error!(
            "[{}] {} (error #{})",
            self.ctx.id(),
            error,
            self.error_count
        );
        self.strategy.on_error(&error, &mut self.ctx).await;

        if self.transition(StrategyState::Error).is_err() {
            return;
        }

        let policy = self.ctx.config().restart;
        if policy.auto_restart && self.restart_count < policy.max_retries {
            if let Err(e) = self.stop_inner().await {
                log::error!("[{}] Stop before restart failed: {}", self.ctx.id(), e);
            }
            self.pending_restart = Some(policy.backoff());
            self.awaiting_restart = true;
            log::warn!(
                "[{}] Restarting in {}ms (attempt {}/{})",
                self.ctx.id(),
                policy.backoff_ms,
                self.restart_count + 1,
                policy.max_retries
            );
        } else {
            self.cancel_timer();
            self.state = StrategyState::Crashed;
            log::error!(
                "[{}] Crashed after {} errors and {} restarts",
                self.ctx.id(),
                self.error_count,
                self.restart_count
            );
        }
    }

    /// Backoff requested by the last failure, consumed by the driver
    pub fn take_pending_restart(&mut self) -> Option<Duration> {
        self.pending_restart.take()
    }

    /// Restart once the backoff has elapsed. Does nothing if the strategy
    /// was stopped explicitly in the meantime.
    pub async fn restart_after_backoff(&mut self) -> Result<()> {
        if !self.awaiting_restart || self.state != StrategyState::Stopped {
            return Ok(());
        }
        self.awaiting_restart = false;
        self.restart_count += 1;
        log::info!(
            "[{}] Restart attempt {}",
            self.ctx.id(),
            self.restart_count
        );
        self.start().await
    }

    pub fn has_timer(&self) -> bool {
        self.timer.is_some()
    }

    pub fn timer_epoch(&self) -> u64 {
        self.timer_epoch
    }

    pub fn set_timer(&mut self, handle: JoinHandle<()>) {
        self.cancel_timer();
        self.timer = Some(handle);
    }

    /// Stop the snapshot timer. From inside the timer callback the task is
    /// left to exit on its next tick.
    pub fn cancel_timer(&mut self) {
        self.timer_epoch += 1;
        if let Some(handle) = self.timer.take()
            && !self.in_timer
        {
            handle.abort();
        }
    }

    pub fn snapshot(&self) -> StrategySnapshot {
        let ledger = self.ctx.ledger();
        let config = self.ctx.config();
        StrategySnapshot {
            id: config.id.clone(),
            name: config.display_name().to_string(),
            category: config.category,
            state: self.state,
            symbols: config.symbols.clone(),
            initial_capital: ledger.initial_capital(),
            cash: ledger.cash(),
            equity: ledger.equity(),
            realized_pnl: ledger.realized_pnl(),
            unrealized_pnl: ledger.unrealized_pnl(),
            commission: ledger.total_commission(),
            gross_exposure: ledger.gross_exposure(),
            positions: ledger.positions().cloned().collect(),
            open_orders: ledger.open_orders().count(),
            trade_count: ledger.trade_count(),
            error_count: self.error_count,
            restart_count: self.restart_count,
            halted: self.ctx.is_halted(),
            max_position_fraction: config.max_position_fraction,
            timestamp: Utc::now(),
        }
    }

    pub fn report(&self) -> StrategyReport {
        let ledger = self.ctx.ledger();
        let initial = ledger.initial_capital();
        let equity = ledger.equity();
        StrategyReport {
            id: self.ctx.id().to_string(),
            name: self.ctx.config().display_name().to_string(),
            state: self.state,
            initial_capital: initial,
            final_equity: equity,
            total_return: if initial.is_zero() {
                rust_decimal::Decimal::ZERO
            } else {
                (equity - initial) / initial
            },
            realized_pnl: ledger.realized_pnl(),
            unrealized_pnl: ledger.unrealized_pnl(),
            commission: ledger.total_commission(),
            trades: ledger.trade_count() - self.run_trades_base,
            orders: self.ctx.orders_submitted() - self.run_orders_base,
            error_count: self.error_count,
            restart_count: self.restart_count,
            started_at: self.started_at,
            stopped_at: Utc::now(),
        }
    }
}

impl Drop for ManagedStrategy {
    fn drop(&mut self) {
        if let Some(handle) = self.timer.take() {
            handle.abort();
        }
    }
}
