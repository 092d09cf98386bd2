//! Risk Manager
//!
//! Active risk management over the Engine's strategies:
//! - Recomputes global and per-strategy limit values on a fixed interval
//! - Raises deduplicated events in the warning/critical bands and executes
//!   the escalating action
//! - Serves as the Engine's synchronous pre-trade gate
//! - Keeps historical VaR/CVaR per strategy and runs stress scenarios

use chrono::{DateTime, NaiveDate, Utc};
use meridian_core::{OrderInfo, StrategyId, Symbol};
use meridian_engine::Engine;
use meridian_stats::{historical_cvar, historical_var, simple_returns};
use meridian_strategy::{ExposureView, RiskCheck, StrategySnapshot};
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Write as _;
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;

use crate::config::RiskConfig;
use crate::error::{Result, RiskError};
use crate::event::RiskEvent;
use crate::gate::{ExposureCache, GateLimits, RiskGate};
use crate::limits::{Band, RiskAction, RiskLimit, RiskMetric, RiskScope, Severity};
use crate::stress::{StressInput, StressResult, run_scenarios};

const BOOK_KEY: &str = "*";

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// Figures a limit can be measured against, for the book or one strategy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExposureFigures {
    pub equity: f64,
    pub capital: f64,
    pub cash: f64,
    pub gross_exposure: f64,
    pub net_exposure: f64,
    pub daily_loss: f64,
    pub drawdown: f64,
    /// Largest single position over equity
    pub concentration: f64,
    pub largest_symbol: Option<Symbol>,
}

impl ExposureFigures {
    /// Gross exposure over current equity; unbounded once equity is gone
    pub fn gross_over_equity(&self) -> f64 {
        if self.equity > 0.0 {
            self.gross_exposure / self.equity
        } else if self.gross_exposure > 0.0 {
            f64::INFINITY
        } else {
            0.0
        }
    }

    pub fn value(&self, metric: RiskMetric) -> f64 {
        match metric {
            RiskMetric::TotalExposure | RiskMetric::Leverage => self.gross_over_equity(),
            RiskMetric::DailyLoss | RiskMetric::StrategyDailyLoss => self.daily_loss,
            RiskMetric::Drawdown => self.drawdown,
            RiskMetric::CashRatio => {
                if self.equity > 0.0 {
                    self.cash / self.equity
                } else {
                    0.0
                }
            }
            RiskMetric::PositionConcentration => self.concentration,
        }
    }
}

/// Current value of one limit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitStatus {
    pub name: String,
    pub scope: RiskScope,
    pub metric: RiskMetric,
    pub value: f64,
    pub limit: f64,
    pub utilisation: f64,
    pub band: Band,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarEstimate {
    pub strategy_id: StrategyId,
    pub confidence: f64,
    /// Return at the `1 - confidence` percentile (negative for a loss)
    pub var: f64,
    pub cvar: f64,
    pub observations: usize,
}

/// Point-in-time view of the risk state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskSnapshot {
    pub timestamp: Option<DateTime<Utc>>,
    pub book: ExposureFigures,
    pub strategies: HashMap<StrategyId, ExposureFigures>,
    pub limits: Vec<LimitStatus>,
    pub active_events: usize,
    pub var: Vec<VarEstimate>,
    pub stress: Vec<StressResult>,
    pub halted: bool,
    pub blocked: Vec<StrategyId>,
}

#[derive(Default)]
struct Measures {
    book: ExposureFigures,
    strategies: HashMap<StrategyId, ExposureFigures>,
}

impl Measures {
    fn for_scope(&self, scope: &RiskScope) -> Option<&ExposureFigures> {
        match scope {
            RiskScope::Global => Some(&self.book),
            RiskScope::Strategy(id) => self.strategies.get(id),
        }
    }
}

#[derive(Default)]
struct RiskState {
    active: HashMap<String, RiskEvent>,
    history: VecDeque<RiskEvent>,
    day: Option<NaiveDate>,
    day_open: HashMap<String, f64>,
    peaks: HashMap<String, f64>,
    var: HashMap<StrategyId, VarEstimate>,
    statuses: Vec<LimitStatus>,
    book: ExposureFigures,
    strategies: HashMap<StrategyId, ExposureFigures>,
    stress: Vec<StressResult>,
    last_check: Option<DateTime<Utc>>,
}

impl RiskState {
    fn archive(&mut self, event: RiskEvent, retention: usize) {
        self.history.push_back(event);
        while self.history.len() > retention {
            self.history.pop_front();
        }
    }

    /// Day-open equity for the key, seeded on first sight
    fn day_loss(&mut self, key: &str, equity: f64) -> f64 {
        let open = *self.day_open.entry(key.to_string()).or_insert(equity);
        ratio(open - equity, open).max(0.0)
    }

    fn drawdown(&mut self, key: &str, equity: f64) -> f64 {
        let peak = self.peaks.entry(key.to_string()).or_insert(equity);
        if equity > *peak {
            *peak = equity;
        }
        ratio(*peak - equity, *peak).max(0.0)
    }
}

pub struct RiskManager {
    config: RiskConfig,
    engine: Arc<Engine>,
    limits: RwLock<Vec<RiskLimit>>,
    state: RwLock<RiskState>,
    cache: Arc<RwLock<ExposureCache>>,
    gate: Arc<RiskGate>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl RiskManager {
    /// Create the manager and install its gate on the engine
    pub fn new(config: RiskConfig, engine: Arc<Engine>) -> Result<Self> {
        let limits = config.global_limits();
        for limit in &limits {
            limit.validate()?;
        }

        let cache = Arc::new(RwLock::new(ExposureCache::default()));
        let gate = Arc::new(RiskGate::new(
            GateLimits {
                max_total_exposure: config.max_total_exposure,
                max_order_volume_ratio: config.max_order_volume_ratio,
            },
            engine.prices().clone(),
            cache.clone(),
        ));
        engine.set_order_gate(gate.clone());

        Ok(Self {
            config,
            engine,
            limits: RwLock::new(limits),
            state: RwLock::new(RiskState::default()),
            cache,
            gate,
            tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    pub fn gate(&self) -> Arc<RiskGate> {
        self.gate.clone()
    }

    // ============ Limits ============

    pub fn limits(&self) -> Vec<RiskLimit> {
        self.limits.read().clone()
    }

    /// Add a limit, replacing any limit with the same name
    pub fn add_limit(&self, limit: RiskLimit) -> Result<()> {
        limit.validate()?;
        let mut limits = self.limits.write();
        limits.retain(|l| l.name != limit.name);
        log::info!("[RISK] Limit {} set to {}", limit.name, limit.limit);
        limits.push(limit);
        Ok(())
    }

    pub fn remove_limit(&self, name: &str) -> Result<RiskLimit> {
        let mut limits = self.limits.write();
        let index = limits
            .iter()
            .position(|l| l.name == name)
            .ok_or_else(|| RiskError::UnknownLimit(name.to_string()))?;
        Ok(limits.remove(index))
    }

    pub fn set_limit_enabled(&self, name: &str, enabled: bool) -> Result<()> {
        let mut limits = self.limits.write();
        let limit = limits
            .iter_mut()
            .find(|l| l.name == name)
            .ok_or_else(|| RiskError::UnknownLimit(name.to_string()))?;
        limit.enabled = enabled;
        Ok(())
    }

    /// Derive per-strategy limits for new strategies and drop those of
    /// strategies no longer registered
    fn sync_strategy_limits(&self, snapshots: &[StrategySnapshot]) {
        let live: HashSet<&str> = snapshots.iter().map(|s| s.id.as_str()).collect();
        let mut limits = self.limits.write();
        limits.retain(|l| l.strategy_id().is_none_or(|id| live.contains(id.as_str())));

        for snapshot in snapshots {
            let fraction = to_f64(snapshot.max_position_fraction);
            for limit in self.config.strategy_limits(&snapshot.id, fraction) {
                let known = limits.iter().any(|l| l.name == limit.name);
                if !known && limit.validate().is_ok() {
                    limits.push(limit);
                }
            }
        }
    }

    // ============ Pre-trade ============

    /// Synchronous pre-trade check, identical to the installed engine gate
    pub fn check_order_risk(&self, order: &OrderInfo, view: &ExposureView) -> RiskCheck {
        self.gate.check(order, view)
    }

    // ============ Evaluation ============

    /// One evaluation cycle: measure, classify, raise events, act
    pub async fn check_limits(&self) -> Vec<RiskEvent> {
        let now = Utc::now();
        let snapshots = self.engine.snapshots().await;
        self.sync_strategy_limits(&snapshots);
        self.refresh_var().await;

        let measures = self.measure(&snapshots, now);
        {
            let mut cache = self.cache.write();
            cache.gross_exposure = Decimal::from_f64(measures.book.gross_exposure).unwrap_or_default();
            cache.total_equity = Decimal::from_f64(measures.book.equity).unwrap_or_default();
        }

        let triggered = self.evaluate(&measures, now);
        for event in &triggered {
            self.execute(event).await;
        }
        triggered
    }

    fn measure(&self, snapshots: &[StrategySnapshot], now: DateTime<Utc>) -> Measures {
        let mut state = self.state.write();
        let today = now.date_naive();
        if state.day != Some(today) {
            if state.day.is_some() {
                log::info!("[RISK] New trading day {}, resetting daily loss", today);
            }
            state.day = Some(today);
            state.day_open.clear();
        }

        let mut measures = Measures::default();
        for snapshot in snapshots {
            let equity = to_f64(snapshot.equity);
            let largest = snapshot
                .positions
                .iter()
                .max_by(|a, b| a.market_value.abs().cmp(&b.market_value.abs()));
            let largest_value = largest.map(|p| to_f64(p.market_value.abs())).unwrap_or(0.0);
            let figures = ExposureFigures {
                equity,
                capital: to_f64(snapshot.initial_capital),
                cash: to_f64(snapshot.cash),
                gross_exposure: to_f64(snapshot.gross_exposure),
                net_exposure: snapshot
                    .positions
                    .iter()
                    .map(|p| to_f64(p.signed_market_value()))
                    .sum(),
                daily_loss: state.day_loss(&snapshot.id, equity),
                drawdown: state.drawdown(&snapshot.id, equity),
                concentration: if equity > 0.0 {
                    largest_value / equity
                } else if largest_value > 0.0 {
                    f64::INFINITY
                } else {
                    0.0
                },
                largest_symbol: largest.map(|p| p.symbol.clone()),
            };

            let book = &mut measures.book;
            book.equity += figures.equity;
            book.capital += figures.capital;
            book.cash += figures.cash;
            book.gross_exposure += figures.gross_exposure;
            book.net_exposure += figures.net_exposure;
            if figures.concentration > book.concentration {
                book.concentration = figures.concentration;
                book.largest_symbol = figures.largest_symbol.clone();
            }
            measures.strategies.insert(snapshot.id.clone(), figures);
        }

        let equity = measures.book.equity;
        measures.book.daily_loss = state.day_loss(BOOK_KEY, equity);
        measures.book.drawdown = state.drawdown(BOOK_KEY, equity);

        state.book = measures.book.clone();
        state.strategies = measures.strategies.clone();
        measures
    }

    fn evaluate(&self, measures: &Measures, now: DateTime<Utc>) -> Vec<RiskEvent> {
        let limits = self.limits.read().clone();
        let retention = self.config.event_retention;
        let mut state = self.state.write();
        let mut statuses = Vec::with_capacity(limits.len());
        let mut triggered = Vec::new();

        for limit in limits.iter().filter(|l| l.enabled) {
            let Some(figures) = measures.for_scope(&limit.scope) else {
                continue;
            };
            let value = figures.value(limit.metric);
            let band = limit.classify(value);
            statuses.push(LimitStatus {
                name: limit.name.clone(),
                scope: limit.scope.clone(),
                metric: limit.metric,
                value,
                limit: limit.limit,
                utilisation: limit.utilisation(value),
                band,
            });

            if let Some(active_severity) = state.active.get(&limit.name).map(|e| e.severity) {
                if limit.recovered(value) {
                    if let Some(mut event) = state.active.remove(&limit.name) {
                        event.resolve(now);
                        log::info!("[RISK] Resolved: {}", event);
                        state.archive(event, retention);
                    }
                    continue;
                }
                match band.severity() {
                    Some(severity) if severity > active_severity => {
                        if let Some(mut event) = state.active.remove(&limit.name) {
                            event.resolve(now);
                            state.archive(event, retention);
                        }
                    }
                    _ => continue,
                }
            }

            match band.severity() {
                Some(severity) => {
                    let symbol = match limit.metric {
                        RiskMetric::PositionConcentration => figures.largest_symbol.clone(),
                        _ => None,
                    };
                    let event = RiskEvent::new(limit, severity, value, symbol, now);
                    match severity {
                        Severity::Warning => log::warn!("[RISK] {}", event),
                        Severity::Critical => log::error!("[RISK] {}", event),
                    }
                    state.active.insert(limit.name.clone(), event.clone());
                    triggered.push(event);
                }
                None if band == Band::Elevated => {
                    log::info!(
                        "[RISK] {} elevated: {:.4} of {:.4} ({:.1}%)",
                        limit.name,
                        value,
                        limit.limit,
                        limit.utilisation(value) * 100.0
                    );
                }
                None => {}
            }
        }

        // events of removed or disabled limits cannot recover on their own
        let enabled: HashSet<&str> = limits
            .iter()
            .filter(|l| l.enabled)
            .map(|l| l.name.as_str())
            .collect();
        let orphaned: Vec<String> = state
            .active
            .keys()
            .filter(|name| !enabled.contains(name.as_str()))
            .cloned()
            .collect();
        for name in orphaned {
            if let Some(mut event) = state.active.remove(&name) {
                event.resolve(now);
                state.archive(event, retention);
            }
        }

        state.statuses = statuses;
        state.last_check = Some(now);
        triggered
    }

    // ============ Actions ============

    async fn execute(&self, event: &RiskEvent) {
        let targets: Vec<StrategyId> = match &event.strategy_id {
            Some(id) => vec![id.clone()],
            None => self.engine.strategy_ids(),
        };

        match event.action {
            RiskAction::None => {}
            RiskAction::Warning => {
                log::warn!("[RISK] Warning only: {}", event);
            }
            RiskAction::ReducePosition => {
                let ratio = Decimal::from_f64(self.config.reduce_ratio)
                    .unwrap_or(Decimal::ONE)
                    .clamp(Decimal::ZERO, Decimal::ONE);
                for id in &targets {
                    self.close_positions(id, ratio).await;
                }
            }
            RiskAction::ClosePosition => {
                for id in &targets {
                    self.close_positions(id, Decimal::ONE).await;
                }
            }
            RiskAction::StopTrading => {
                self.cache.write().blocked.extend(targets.iter().cloned());
                for id in &targets {
                    log::warn!("[RISK] Stopping trading for {}", id);
                    if let Err(e) = self.engine.pause_strategy(id).await {
                        log::warn!("[RISK] Could not pause {}: {}", id, e);
                    }
                }
            }
            RiskAction::EmergencyStop => {
                self.emergency_stop(&event.to_string()).await;
            }
        }
    }

    /// Close `ratio` of every position the strategy holds
    async fn close_positions(&self, id: &str, ratio: Decimal) {
        if ratio <= Decimal::ZERO {
            return;
        }
        let Some(shared) = self.engine.strategy(id) else {
            return;
        };
        let mut guard = shared.lock().await;
        let symbols: Vec<Symbol> = guard
            .context()
            .ledger()
            .positions()
            .map(|p| p.symbol.clone())
            .collect();
        for symbol in symbols {
            match guard.context_mut().close_position(&symbol, ratio) {
                Ok(Some(order_id)) => log::info!(
                    "[RISK] Closing {}% of {} for {} (order {})",
                    (ratio * Decimal::ONE_HUNDRED).round_dp(0),
                    symbol,
                    id,
                    order_id
                ),
                Ok(None) => {}
                Err(e) => log::warn!("[RISK] Could not close {} for {}: {}", symbol, id, e),
            }
        }
    }

    /// Liquidate and stop every registered strategy, blocking new positions
    pub async fn emergency_stop(&self, reason: &str) {
        log::error!("[RISK] EMERGENCY STOP: {}", reason);
        self.cache.write().halted = true;
        for id in self.engine.strategy_ids() {
            self.close_positions(&id, Decimal::ONE).await;
            if let Err(e) = self.engine.stop_strategy(&id).await {
                log::warn!("[RISK] Could not stop {}: {}", id, e);
            }
        }
    }

    /// Manual intervention: lift the emergency halt and per-strategy blocks
    pub fn reset_halt(&self) {
        let mut cache = self.cache.write();
        if cache.halted || !cache.blocked.is_empty() {
            log::info!("[RISK] Trading re-enabled");
        }
        cache.halted = false;
        cache.blocked.clear();
    }

    pub fn is_halted(&self) -> bool {
        self.cache.read().halted
    }

    /// Restart daily loss measurement from current equity
    pub fn reset_daily(&self) {
        let mut state = self.state.write();
        log::info!("[RISK] Daily reset");
        state.day_open.clear();
    }

    // ============ VaR / stress ============

    /// Recompute historical VaR/CVaR from each strategy's equity history
    pub async fn refresh_var(&self) {
        let confidence = self.config.var_confidence;
        let window = self.config.var_window.max(2);
        let mut estimates = HashMap::new();

        for id in self.engine.strategy_ids() {
            let Some(shared) = self.engine.strategy(&id) else {
                continue;
            };
            let equity: Vec<f64> = {
                let guard = shared.lock().await;
                let history = guard.context().ledger().equity_history();
                let skip = history.len().saturating_sub(window);
                history.iter().skip(skip).map(|p| to_f64(p.equity)).collect()
            };
            let returns = simple_returns(&equity);
            if returns.len() < 2 {
                continue;
            }
            if let (Some(var), Some(cvar)) = (
                historical_var(&returns, confidence),
                historical_cvar(&returns, confidence),
            ) {
                estimates.insert(
                    id.clone(),
                    VarEstimate {
                        strategy_id: id,
                        confidence,
                        var,
                        cvar,
                        observations: returns.len(),
                    },
                );
            }
        }

        self.state.write().var = estimates;
    }

    pub fn var(&self, strategy_id: &str) -> Option<VarEstimate> {
        self.state.read().var.get(strategy_id).cloned()
    }

    /// Run the stress scenarios against the current book. Logging only.
    pub async fn run_stress_tests(&self) -> Vec<StressResult> {
        let snapshots = self.engine.snapshots().await;
        let inputs: Vec<StressInput> = {
            let state = self.state.read();
            snapshots
                .iter()
                .map(|s| StressInput {
                    equity: to_f64(s.equity),
                    cash: to_f64(s.cash),
                    net_exposure: s.positions.iter().map(|p| to_f64(p.signed_market_value())).sum(),
                    gross_exposure: to_f64(s.gross_exposure),
                    var: state.var.get(&s.id).map(|v| v.var),
                })
                .collect()
        };

        let results = run_scenarios(&inputs, &self.config, Utc::now());
        for result in &results {
            if result.breached {
                log::warn!("[RISK] Stress {}", result);
            } else {
                log::info!("[RISK] Stress {}", result);
            }
        }
        self.state.write().stress = results.clone();
        results
    }

    // ============ Read model ============

    pub fn snapshot(&self) -> RiskSnapshot {
        let state = self.state.read();
        let cache = self.cache.read();
        let mut var: Vec<VarEstimate> = state.var.values().cloned().collect();
        var.sort_by(|a, b| a.strategy_id.cmp(&b.strategy_id));
        let mut blocked: Vec<StrategyId> = cache.blocked.iter().cloned().collect();
        blocked.sort();
        RiskSnapshot {
            timestamp: state.last_check,
            book: state.book.clone(),
            strategies: state.strategies.clone(),
            limits: state.statuses.clone(),
            active_events: state.active.len(),
            var,
            stress: state.stress.clone(),
            halted: cache.halted,
            blocked,
        }
    }

    /// Unresolved events, oldest first
    pub fn active_events(&self) -> Vec<RiskEvent> {
        let mut events: Vec<RiskEvent> = self.state.read().active.values().cloned().collect();
        events.sort_by_key(|e| e.created_at);
        events
    }

    /// Retained resolved events followed by the active ones
    pub fn event_history(&self) -> Vec<RiskEvent> {
        let state = self.state.read();
        let mut events: Vec<RiskEvent> = state.history.iter().cloned().collect();
        let mut active: Vec<RiskEvent> = state.active.values().cloned().collect();
        active.sort_by_key(|e| e.created_at);
        events.extend(active);
        events
    }

    pub fn report(&self) -> String {
        let snapshot = self.snapshot();
        let mut out = String::new();
        let _ = writeln!(out, "=== Risk Report ===");
        match snapshot.timestamp {
            Some(ts) => {
                let _ = writeln!(out, "As of: {}", ts.format("%Y-%m-%d %H:%M:%S UTC"));
            }
            None => {
                let _ = writeln!(out, "As of: never evaluated");
            }
        }
        let book = &snapshot.book;
        let _ = writeln!(out, "Equity: {:.2}  Cash: {:.2}", book.equity, book.cash);
        let _ = writeln!(
            out,
            "Gross exposure: {:.2}  Net exposure: {:.2}",
            book.gross_exposure, book.net_exposure
        );
        let _ = writeln!(
            out,
            "Daily loss: {:.2}%  Drawdown: {:.2}%",
            book.daily_loss * 100.0,
            book.drawdown * 100.0
        );
        if snapshot.halted {
            let _ = writeln!(out, "TRADING HALTED");
        }
        if !snapshot.blocked.is_empty() {
            let _ = writeln!(out, "Stopped strategies: {}", snapshot.blocked.join(", "));
        }

        let _ = writeln!(out, "\n--- Limits ---");
        for status in &snapshot.limits {
            let _ = writeln!(
                out,
                "{:<28} {:>10.4} / {:<10.4} {:>6.1}%  {:?}",
                status.name,
                status.value,
                status.limit,
                status.utilisation * 100.0,
                status.band
            );
        }

        let active = self.active_events();
        let _ = writeln!(out, "\n--- Active events ({}) ---", active.len());
        for event in &active {
            let _ = writeln!(out, "{}", event);
        }

        if !snapshot.var.is_empty() {
            let _ = writeln!(out, "\n--- VaR ---");
            for estimate in &snapshot.var {
                let _ = writeln!(
                    out,
                    "{:<20} VaR({:.0}%) {:.4}  CVaR {:.4}  n={}",
                    estimate.strategy_id,
                    estimate.confidence * 100.0,
                    estimate.var,
                    estimate.cvar,
                    estimate.observations
                );
            }
        }

        if !snapshot.stress.is_empty() {
            let _ = writeln!(out, "\n--- Stress tests ---");
            for result in &snapshot.stress {
                let _ = writeln!(out, "{}", result);
            }
        }
        out
    }

    // ============ Lifecycle ============

    /// Spawn the limit loop and the stress loop
    pub fn start(self: &Arc<Self>) -> Result<()> {
        let mut tasks = self.tasks.lock();
        if !tasks.is_empty() {
            return Err(RiskError::AlreadyStarted);
        }

        let limit_task = tokio::spawn(limit_loop(Arc::downgrade(self), self.config.check_interval()));
        let stress_task =
            tokio::spawn(stress_loop(Arc::downgrade(self), self.config.stress_interval()));
        tasks.extend([limit_task, stress_task]);
        log::info!(
            "[RISK] Started: limits every {}ms, stress every {}ms",
            self.config.check_interval_ms,
            self.config.stress_interval_ms
        );
        Ok(())
    }

    pub fn stop(&self) {
        let mut tasks = self.tasks.lock();
        for task in tasks.drain(..) {
            task.abort();
        }
        log::info!("[RISK] Stopped");
    }
}

impl Drop for RiskManager {
    fn drop(&mut self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}

async fn limit_loop(manager: Weak<RiskManager>, period: std::time::Duration) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        let Some(manager) = manager.upgrade() else {
            return;
        };
        manager.check_limits().await;
    }
}

async fn stress_loop(manager: Weak<RiskManager>, period: std::time::Duration) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        let Some(manager) = manager.upgrade() else {
            return;
        };
        manager.run_stress_tests().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_total_exposure_is_measured_against_equity() {
        // 80k gross on 100k capital after a 20k loss
        let figures = ExposureFigures {
            equity: 80_000.0,
            capital: 100_000.0,
            cash: 0.0,
            gross_exposure: 80_000.0,
            ..Default::default()
        };
        assert_relative_eq!(figures.value(RiskMetric::TotalExposure), 1.0);
        assert_relative_eq!(figures.value(RiskMetric::Leverage), 1.0);

        let limit = RiskLimit::new(
            "exposure",
            crate::limits::RiskType::Market,
            RiskMetric::TotalExposure,
            1.0,
            RiskAction::ReducePosition,
        );
        // against initial capital this would be 0.8, elevated only
        let exposure = figures.value(RiskMetric::TotalExposure);
        assert_eq!(limit.classify(exposure), Band::Critical);

        let wiped = ExposureFigures {
            equity: 0.0,
            gross_exposure: 10.0,
            ..Default::default()
        };
        assert!(wiped.value(RiskMetric::TotalExposure).is_infinite());
        assert_eq!(ExposureFigures::default().value(RiskMetric::TotalExposure), 0.0);
    }
}
