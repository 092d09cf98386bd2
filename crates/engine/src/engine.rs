//! Execution Engine
//!
//! Owns the strategy registry and the two bounded queues:
//!
//! ```text
//!  feed_data ──► [data queue] ──► data loop ──► join_all(subscribed strategies)
//!                                                     │ buy / sell
//!                                                     ▼
//!  place_order ─────────────────────────────► [order queue] ──► order loop
//!                                                                  │ BrokerAdapter
//!                                                                  ▼
//!                                                        fill ──► owning strategy
//! ```
//!
//! A supervisor task samples [`EngineStats`] and warns on backpressure.
//! Overflowing either queue drops the newest item.

use chrono::Utc;
use dashmap::DashMap;
use futures_util::future::join_all;
use meridian_core::{MarketData, OrderId, OrderInfo, StrategyId, Symbol, TradeInfo};
use meridian_ports::BrokerAdapter;
use meridian_strategy::{
    ExposureView, ManagedStrategy, OrderGate, SharedStrategy, StrategyReport, StrategySnapshot,
    StrategyState, follow_up, start_shared,
};
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use crate::broker::SimulatedBroker;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::price_cache::PriceCache;
use crate::router::{
    EngineOrderRouter, GateSlot, OrderCallback, OrderOutcome, QueuedOrder, gate_check,
};
use crate::stats::{EngineCounters, EngineStats};

type Registry = Arc<DashMap<StrategyId, SharedStrategy>>;
type Subscribers = Arc<DashMap<Symbol, HashSet<StrategyId>>>;

pub struct Engine {
    config: EngineConfig,
    strategies: Registry,
    subscribers: Subscribers,
    prices: PriceCache,
    broker: Arc<dyn BrokerAdapter>,
    gate: GateSlot,
    counters: Arc<EngineCounters>,
    data_tx: mpsc::Sender<MarketData>,
    data_rx: Mutex<Option<mpsc::Receiver<MarketData>>>,
    order_tx: mpsc::Sender<QueuedOrder>,
    order_rx: Mutex<Option<mpsc::Receiver<QueuedOrder>>>,
    last_stats: Arc<RwLock<EngineStats>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    running: AtomicBool,
}

impl Engine {
    /// Engine with an explicit broker. `prices` is updated by the data loop.
    pub fn new(config: EngineConfig, broker: Arc<dyn BrokerAdapter>, prices: PriceCache) -> Self {
        let (data_tx, data_rx) = mpsc::channel(config.data_queue_capacity.max(1));
        let (order_tx, order_rx) = mpsc::channel(config.order_queue_capacity.max(1));
        Self {
            config,
            strategies: Arc::new(DashMap::new()),
            subscribers: Arc::new(DashMap::new()),
            prices,
            broker,
            gate: Arc::new(RwLock::new(None)),
            counters: Arc::new(EngineCounters::default()),
            data_tx,
            data_rx: Mutex::new(Some(data_rx)),
            order_tx,
            order_rx: Mutex::new(Some(order_rx)),
            last_stats: Arc::new(RwLock::new(EngineStats::default())),
            tasks: Mutex::new(Vec::new()),
            running: AtomicBool::new(false),
        }
    }

    /// Engine backed by the in-process simulated broker
    pub fn simulated(config: EngineConfig) -> Self {
        let prices = PriceCache::new();
        let broker = Arc::new(SimulatedBroker::new(config.broker.clone(), prices.clone()));
        Self::new(config, broker, prices)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn prices(&self) -> &PriceCache {
        &self.prices
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Install the pre-trade gate consulted before orders are queued
    pub fn set_order_gate(&self, gate: Arc<dyn OrderGate>) {
        *self.gate.write() = Some(gate);
    }

    // ============ Registry ============

    /// Register a strategy and attach it to the order queue
    pub fn add_strategy(&self, mut managed: ManagedStrategy) -> Result<SharedStrategy> {
        let id = managed.id().to_string();
        if self.strategies.contains_key(&id) {
            return Err(EngineError::DuplicateStrategy(id));
        }

        let router = EngineOrderRouter::new(
            self.order_tx.clone(),
            self.gate.clone(),
            self.counters.clone(),
        );
        managed.attach(Arc::new(router));
        let symbols = managed.config().symbols.clone();
        let shared = managed.into_shared();

        self.strategies.insert(id.clone(), shared.clone());
        for symbol in symbols {
            self.subscribers
                .entry(symbol)
                .or_default()
                .insert(id.clone());
        }
        log::info!("[Engine] Registered strategy {}", id);
        Ok(shared)
    }

    /// Unregister a strategy, stopping it first
    pub async fn remove_strategy(&self, id: &str) -> Result<StrategyReport> {
        let (_, shared) = self
            .strategies
            .remove(id)
            .ok_or_else(|| EngineError::UnknownStrategy(id.to_string()))?;
        for mut entry in self.subscribers.iter_mut() {
            entry.value_mut().remove(id);
        }
        self.subscribers.retain(|_, ids| !ids.is_empty());

        let mut guard = shared.lock().await;
        let report = match guard.stop().await {
            Ok(report) => report,
            Err(_) => guard.report(),
        };
        guard.context_mut().detach();
        log::info!("[Engine] Removed strategy {}", id);
        Ok(report)
    }

    pub fn strategy(&self, id: &str) -> Option<SharedStrategy> {
        self.strategies.get(id).map(|s| s.value().clone())
    }

    fn require(&self, id: &str) -> Result<SharedStrategy> {
        self.strategy(id)
            .ok_or_else(|| EngineError::UnknownStrategy(id.to_string()))
    }

    pub fn strategy_ids(&self) -> Vec<StrategyId> {
        let mut ids: Vec<StrategyId> = self.strategies.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn strategy_count(&self) -> usize {
        self.strategies.len()
    }

    fn shared_strategies(&self) -> Vec<SharedStrategy> {
        self.strategies.iter().map(|e| e.value().clone()).collect()
    }

    pub async fn start_strategy(&self, id: &str) -> Result<()> {
        let shared = self.require(id)?;
        start_shared(&shared).await?;
        Ok(())
    }

    pub async fn stop_strategy(&self, id: &str) -> Result<StrategyReport> {
        let shared = self.require(id)?;
        let mut guard = shared.lock().await;
        Ok(guard.stop().await?)
    }

    pub async fn pause_strategy(&self, id: &str) -> Result<()> {
        let shared = self.require(id)?;
        let mut guard = shared.lock().await;
        let result = guard.pause().await;
        follow_up(&shared, &mut guard);
        Ok(result?)
    }

    pub async fn resume_strategy(&self, id: &str) -> Result<()> {
        let shared = self.require(id)?;
        let mut guard = shared.lock().await;
        let result = guard.resume().await;
        follow_up(&shared, &mut guard);
        Ok(result?)
    }

    pub async fn strategy_state(&self, id: &str) -> Result<StrategyState> {
        let shared = self.require(id)?;
        let state = shared.lock().await.state();
        Ok(state)
    }

    pub async fn snapshot(&self, id: &str) -> Result<StrategySnapshot> {
        let shared = self.require(id)?;
        let snapshot = shared.lock().await.snapshot();
        Ok(snapshot)
    }

    /// Snapshot of every registered strategy, sorted by id
    pub async fn snapshots(&self) -> Vec<StrategySnapshot> {
        let mut snapshots = Vec::with_capacity(self.strategies.len());
        for shared in self.shared_strategies() {
            snapshots.push(shared.lock().await.snapshot());
        }
        snapshots.sort_by(|a, b| a.id.cmp(&b.id));
        snapshots
    }

    // ============ Ingestion ============

    /// Validate and enqueue one record. A full queue drops it.
    pub fn feed_data(&self, data: MarketData) -> Result<()> {
        data.validate()?;
        match self.data_tx.try_send(data) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(data)) => {
                EngineCounters::incr(&self.counters.data_dropped);
                log::warn!(
                    "[Engine] Data queue full ({}), dropping {} @ {}",
                    self.config.data_queue_capacity,
                    data.symbol,
                    data.timestamp
                );
                Err(EngineError::QueueFull { queue: "data" })
            }
            Err(TrySendError::Closed(_)) => Err(EngineError::QueueClosed { queue: "data" }),
        }
    }

    /// Enqueue one record, waiting for room instead of dropping. Used by replays.
    pub async fn feed_data_wait(&self, data: MarketData) -> Result<()> {
        data.validate()?;
        self.data_tx
            .send(data)
            .await
            .map_err(|_| EngineError::QueueClosed { queue: "data" })
    }

    /// Submit an order on behalf of a registered strategy, bypassing its
    /// pre-trade checks but not the risk gate
    pub async fn place_order(
        &self,
        order: OrderInfo,
        callback: Option<OrderCallback>,
    ) -> Result<OrderId> {
        order.validate()?;
        let shared = self.require(&order.strategy_id)?;
        // held until the order is queued so the order loop sees it registered
        let mut guard = shared.lock().await;
        let view: ExposureView = guard.context().exposure_view();
        gate_check(&self.gate, &order, &view).map_err(EngineError::OrderRejected)?;

        let id = order.id;
        guard.track_order(order.clone());
        match self.order_tx.try_send(QueuedOrder { order, callback }) {
            Ok(()) => {
                EngineCounters::incr(&self.counters.orders_queued);
                Ok(id)
            }
            Err(TrySendError::Full(_)) => {
                EngineCounters::incr(&self.counters.orders_dropped);
                guard.untrack_order(&id, "order queue full");
                log::warn!("[Engine] Order queue full, dropping order {}", id);
                Err(EngineError::QueueFull { queue: "order" })
            }
            Err(TrySendError::Closed(_)) => {
                guard.untrack_order(&id, "order queue closed");
                Err(EngineError::QueueClosed { queue: "order" })
            }
        }
    }

    // ============ Lifecycle ============

    /// Spawn the data loop, order loop and supervisor
    pub fn start(&self) -> Result<()> {
        let data_rx = self.data_rx.lock().take();
        let order_rx = self.order_rx.lock().take();
        let (Some(data_rx), Some(order_rx)) = (data_rx, order_rx) else {
            return Err(EngineError::AlreadyStarted);
        };

        let data_task = tokio::spawn(run_data_loop(
            data_rx,
            self.strategies.clone(),
            self.subscribers.clone(),
            self.prices.clone(),
            self.counters.clone(),
        ));
        let order_task = tokio::spawn(run_order_loop(
            order_rx,
            self.strategies.clone(),
            self.broker.clone(),
            self.counters.clone(),
            self.config.clone(),
        ));
        let supervisor = Supervisor {
            config: self.config.clone(),
            strategies: self.strategies.clone(),
            counters: self.counters.clone(),
            data_tx: self.data_tx.clone(),
            order_tx: self.order_tx.clone(),
            last_stats: self.last_stats.clone(),
        };
        let supervisor_task = tokio::spawn(supervisor.run());

        self.tasks
            .lock()
            .extend([data_task, order_task, supervisor_task]);
        self.running.store(true, Ordering::SeqCst);
        log::info!(
            "[Engine] Started with {} strategies via {} broker",
            self.strategies.len(),
            self.broker.name()
        );
        Ok(())
    }

    /// Start every registered strategy, returning the ids that failed
    pub async fn start_all(&self) -> Vec<(StrategyId, EngineError)> {
        let mut failures = Vec::new();
        for id in self.strategy_ids() {
            if let Err(e) = self.start_strategy(&id).await {
                log::error!("[Engine] Failed to start {}: {}", id, e);
                failures.push((id, e));
            }
        }
        failures
    }

    /// Abort the engine tasks and stop every strategy
    pub async fn stop(&self) -> Vec<StrategyReport> {
        self.running.store(false, Ordering::SeqCst);
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }

        let mut reports = Vec::new();
        for shared in self.shared_strategies() {
            let mut guard = shared.lock().await;
            match guard.stop().await {
                Ok(report) => reports.push(report),
                Err(_) => reports.push(guard.report()),
            }
        }
        log::info!("[Engine] Stopped, {} strategies", reports.len());
        reports
    }

    /// Fresh statistics (the supervisor keeps a periodic copy)
    pub async fn stats(&self) -> EngineStats {
        let supervisor = Supervisor {
            config: self.config.clone(),
            strategies: self.strategies.clone(),
            counters: self.counters.clone(),
            data_tx: self.data_tx.clone(),
            order_tx: self.order_tx.clone(),
            last_stats: self.last_stats.clone(),
        };
        supervisor.collect().await
    }

    /// Statistics from the last supervisor cycle
    pub fn last_stats(&self) -> EngineStats {
        self.last_stats.read().clone()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}

async fn run_data_loop(
    mut data_rx: mpsc::Receiver<MarketData>,
    strategies: Registry,
    subscribers: Subscribers,
    prices: PriceCache,
    counters: Arc<EngineCounters>,
) {
    log::info!("[Engine] Data loop started");
    while let Some(data) = data_rx.recv().await {
        prices.update(&data);

        let targets: Vec<SharedStrategy> = subscribers
            .get(&data.symbol)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| strategies.get(id).map(|s| s.value().clone()))
                    .collect()
            })
            .unwrap_or_default();

        let deliveries = targets.iter().map(|shared| {
            let data = &data;
            async move {
                let mut guard = shared.lock().await;
                guard.handle_market_data(data).await;
                follow_up(shared, &mut guard);
            }
        });
        join_all(deliveries).await;

        EngineCounters::incr(&counters.data_processed);
    }
    log::info!("[Engine] Data loop finished");
}

async fn run_order_loop(
    mut order_rx: mpsc::Receiver<QueuedOrder>,
    strategies: Registry,
    broker: Arc<dyn BrokerAdapter>,
    counters: Arc<EngineCounters>,
    config: EngineConfig,
) {
    log::info!("[Engine] Order loop started");
    let latency = config.execution_latency();

    while let Some(QueuedOrder { order, callback }) = order_rx.recv().await {
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let owner = strategies
            .get(&order.strategy_id)
            .map(|s| s.value().clone());

        if let Some(shared) = &owner {
            let live = {
                let guard = shared.lock().await;
                guard
                    .context()
                    .ledger()
                    .order(&order.id)
                    .is_none_or(|o| o.status.is_active())
            };
            if !live {
                log::debug!("[Engine] Skipping cancelled order {}", order.id);
                if let Some(callback) = callback {
                    callback(OrderOutcome::Rejected {
                        order,
                        reason: "cancelled before execution".to_string(),
                    });
                }
                continue;
            }
        }

        match broker.execute(&order).await {
            Ok(report) => {
                EngineCounters::incr(&counters.orders_executed);
                let trade = TradeInfo::for_order(
                    &order,
                    report.quantity,
                    report.price,
                    report.commission,
                    report.timestamp,
                );
                if let Some(shared) = &owner {
                    let mut guard = shared.lock().await;
                    if let Err(e) = guard.handle_fill(&trade).await {
                        log::error!("[Engine] Fill for order {} not applied: {}", order.id, e);
                    }
                    follow_up(shared, &mut guard);
                }
                if let Some(callback) = callback {
                    callback(OrderOutcome::Filled(trade));
                }
            }
            Err(e) => {
                EngineCounters::incr(&counters.orders_rejected);
                let reason = e.to_string();
                log::warn!(
                    "[Engine] Order {} ({} {} {}) rejected: {}",
                    order.id,
                    order.side,
                    order.quantity,
                    order.symbol,
                    reason
                );
                if let Some(shared) = &owner {
                    let mut guard = shared.lock().await;
                    guard.handle_order_rejected(&order.id, &reason).await;
                    follow_up(shared, &mut guard);
                }
                if let Some(callback) = callback {
                    callback(OrderOutcome::Rejected { order, reason });
                }
            }
        }
    }
    log::info!("[Engine] Order loop finished");
}

struct Supervisor {
    config: EngineConfig,
    strategies: Registry,
    counters: Arc<EngineCounters>,
    data_tx: mpsc::Sender<MarketData>,
    order_tx: mpsc::Sender<QueuedOrder>,
    last_stats: Arc<RwLock<EngineStats>>,
}

impl Supervisor {
    async fn run(self) {
        let mut interval = tokio::time::interval(self.config.supervisor_interval());
        loop {
            interval.tick().await;
            let stats = self.collect().await;

            let threshold = self.config.backpressure_threshold;
            if stats.data_utilisation() > threshold {
                log::warn!(
                    "[Engine] Data queue at {:.0}% ({}/{})",
                    stats.data_utilisation() * 100.0,
                    stats.data_queue_len,
                    stats.data_queue_capacity
                );
            }
            if stats.order_utilisation() > threshold {
                log::warn!(
                    "[Engine] Order queue at {:.0}% ({}/{})",
                    stats.order_utilisation() * 100.0,
                    stats.order_queue_len,
                    stats.order_queue_capacity
                );
            }
            if stats.crashed > 0 {
                log::warn!("[Engine] {} strategies crashed", stats.crashed);
            }
            log::debug!(
                "[Engine] running={} processed={} dropped={} executed={} rejected={}",
                stats.running,
                stats.data_processed,
                stats.data_dropped,
                stats.orders_executed,
                stats.orders_rejected
            );
            *self.last_stats.write() = stats;
        }
    }

    async fn collect(&self) -> EngineStats {
        let mut stats = EngineStats {
            data_queue_capacity: self.data_tx.max_capacity(),
            data_queue_len: self.data_tx.max_capacity() - self.data_tx.capacity(),
            order_queue_capacity: self.order_tx.max_capacity(),
            order_queue_len: self.order_tx.max_capacity() - self.order_tx.capacity(),
            data_processed: EngineCounters::get(&self.counters.data_processed),
            data_dropped: EngineCounters::get(&self.counters.data_dropped),
            orders_queued: EngineCounters::get(&self.counters.orders_queued),
            orders_executed: EngineCounters::get(&self.counters.orders_executed),
            orders_rejected: EngineCounters::get(&self.counters.orders_rejected),
            orders_dropped: EngineCounters::get(&self.counters.orders_dropped),
            timestamp: Some(Utc::now()),
            ..Default::default()
        };

        let shared: Vec<SharedStrategy> = self.strategies.iter().map(|e| e.value().clone()).collect();
        stats.total_strategies = shared.len();
        for strategy in shared {
            match strategy.lock().await.state() {
                StrategyState::Running => stats.running += 1,
                StrategyState::Paused | StrategyState::Pausing => stats.paused += 1,
                StrategyState::Error => stats.errored += 1,
                StrategyState::Crashed => stats.crashed += 1,
                _ => stats.stopped += 1,
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    #[test]
    fn test_full_data_queue_drops_newest() {
        let config = EngineConfig {
            data_queue_capacity: 10,
            ..Default::default()
        };
        let engine = Engine::simulated(config);
        let start = Utc::now();

        let results: Vec<Result<()>> = (0..11)
            .map(|i| {
                let ts = start + Duration::seconds(i);
                engine.feed_data(MarketData::tick("AAPL", ts, dec!(100), dec!(10)))
            })
            .collect();

        assert!(results[..10].iter().all(|r| r.is_ok()));
        assert_eq!(results[10], Err(EngineError::QueueFull { queue: "data" }));
        assert_eq!(EngineCounters::get(&engine.counters.data_dropped), 1);
        assert_eq!(engine.data_tx.max_capacity() - engine.data_tx.capacity(), 10);
    }

    #[test]
    fn test_invalid_record_is_not_queued() {
        let engine = Engine::simulated(EngineConfig::default());
        let bad = MarketData::tick("AAPL", Utc::now(), dec!(-1), dec!(10));
        assert!(matches!(engine.feed_data(bad), Err(EngineError::Invalid(_))));
        assert_eq!(engine.data_tx.max_capacity(), engine.data_tx.capacity());
    }

    #[tokio::test]
    async fn test_start_twice() {
        let engine = Engine::simulated(EngineConfig::default());
        engine.start().unwrap();
        assert_eq!(engine.start(), Err(EngineError::AlreadyStarted));
        engine.stop().await;
        assert!(!engine.is_running());
    }
}
