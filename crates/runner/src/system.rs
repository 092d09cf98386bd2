//! StrategySystem: the single root object of a running deployment
//!
//! Owns one Engine, one Risk Manager and one Performance Analyzer and
//! exposes the control surface callers (a CLI, an HTTP layer) drive.

use chrono::{DateTime, Utc};
use meridian_backtest::{
    BacktestConfig, BacktestEngine, BacktestResult, StrategyFactory, load_timeline,
};
use meridian_core::{MarketData, StrategyId, Symbol};
use meridian_engine::{Engine, EngineConfig, PriceCache};
use meridian_performance::{
    EquitySample, PerformanceAnalyzer, PerformanceConfig, PerformanceMetrics, StrategyComparison,
};
use meridian_ports::{BrokerAdapter, DataProvider};
use meridian_risk_manager::{RiskConfig, RiskEvent, RiskManager, RiskSnapshot};
use meridian_strategy::{
    ManagedStrategy, SharedStrategy, Strategy, StrategyConfig, StrategyReport, StrategySnapshot,
    StrategyState,
};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::SystemConfig;
use crate::error::{Result, SystemError};
use crate::group::{GroupConfig, GroupState, StrategyGroup};
use crate::registry::StrategyRegistry;

/// Assembles a [`StrategySystem`]. Strategy kinds are registered here
/// explicitly; the bundled strategies are always available.
pub struct StrategySystemBuilder {
    engine: EngineConfig,
    risk: RiskConfig,
    performance: PerformanceConfig,
    registry: StrategyRegistry,
    broker: Option<Arc<dyn BrokerAdapter>>,
}

impl Default for StrategySystemBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StrategySystemBuilder {
    pub fn new() -> Self {
        Self {
            engine: EngineConfig::default(),
            risk: RiskConfig::default(),
            performance: PerformanceConfig::default(),
            registry: StrategyRegistry::with_builtins(),
            broker: None,
        }
    }

    pub fn engine_config(mut self, config: EngineConfig) -> Self {
        self.engine = config;
        self
    }

    pub fn risk_config(mut self, config: RiskConfig) -> Self {
        self.risk = config;
        self
    }

    pub fn performance_config(mut self, config: PerformanceConfig) -> Self {
        self.performance = config;
        self
    }

    /// Route orders to `broker` instead of the in-process simulator
    pub fn broker(mut self, broker: Arc<dyn BrokerAdapter>) -> Self {
        self.broker = Some(broker);
        self
    }

    pub fn register<F>(mut self, kind: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&StrategyConfig) -> meridian_strategy::Result<Box<dyn Strategy>>
            + Send
            + Sync
            + 'static,
    {
        self.registry.register(kind, factory);
        self
    }

    pub fn build(self) -> Result<StrategySystem> {
        let engine = Arc::new(match self.broker {
            Some(broker) => Engine::new(self.engine, broker, PriceCache::new()),
            None => Engine::simulated(self.engine),
        });
        let risk = Arc::new(RiskManager::new(self.risk, engine.clone())?);
        let performance = Arc::new(PerformanceAnalyzer::new(self.performance, engine.clone()));
        log::info!(
            "[System] Built with strategy kinds: {}",
            self.registry.kinds().join(", ")
        );

        Ok(StrategySystem {
            engine,
            risk,
            performance,
            registry: self.registry,
            groups: RwLock::new(HashMap::new()),
            autostart: Mutex::new(Vec::new()),
            autostart_groups: Mutex::new(Vec::new()),
            running: AtomicBool::new(false),
        })
    }
}

pub struct StrategySystem {
    engine: Arc<Engine>,
    risk: Arc<RiskManager>,
    performance: Arc<PerformanceAnalyzer>,
    registry: StrategyRegistry,
    groups: RwLock<HashMap<String, StrategyGroup>>,
    /// Strategies started by [`StrategySystem::start`]
    autostart: Mutex<Vec<StrategyId>>,
    autostart_groups: Mutex<Vec<String>>,
    running: AtomicBool,
}

impl StrategySystem {
    pub fn builder() -> StrategySystemBuilder {
        StrategySystemBuilder::new()
    }

    /// Build a system and register every strategy and group in `config`
    pub async fn from_config(config: &SystemConfig) -> Result<Self> {
        Self::from_config_with(config, StrategySystemBuilder::new()).await
    }

    /// Like [`from_config`](Self::from_config) with extra kinds or a broker
    /// already set on `builder`. The config's sections replace the builder's.
    pub async fn from_config_with(
        config: &SystemConfig,
        builder: StrategySystemBuilder,
    ) -> Result<Self> {
        config.validate()?;
        let system = builder
            .engine_config(config.engine.clone())
            .risk_config(config.risk.clone())
            .performance_config(config.performance.clone())
            .build()?;

        for entry in &config.strategies {
            system.add_strategy(&entry.kind, entry.config.clone())?;
            if entry.auto_start {
                system.autostart.lock().push(entry.config.id.clone());
            }
        }
        for group in &config.groups {
            system.create_group(group.clone()).await?;
            if group.auto_start {
                system.autostart_groups.lock().push(group.name.clone());
            }
        }
        Ok(system)
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    pub fn risk_manager(&self) -> &Arc<RiskManager> {
        &self.risk
    }

    pub fn performance(&self) -> &Arc<PerformanceAnalyzer> {
        &self.performance
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    // ============ Lifecycle ============

    /// Start the engine, the periodic risk and performance loops, then the
    /// strategies and groups marked for auto-start
    pub async fn start(&self) -> Result<()> {
        self.engine.start()?;
        self.risk.start()?;
        self.performance.start()?;
        self.running.store(true, Ordering::SeqCst);

        let ids = std::mem::take(&mut *self.autostart.lock());
        for id in ids {
            if let Err(e) = self.engine.start_strategy(&id).await {
                log::error!("[System] Failed to start {}: {}", id, e);
            }
        }
        let groups = std::mem::take(&mut *self.autostart_groups.lock());
        for name in groups {
            if let Err(e) = self.start_group(&name).await {
                log::error!("[System] Failed to start group {}: {}", name, e);
            }
        }
        log::info!(
            "[System] Started with {} strategies",
            self.engine.strategy_count()
        );
        Ok(())
    }

    /// Stop the loops and every strategy. A final performance sample is
    /// taken after the strategies have stopped.
    pub async fn stop(&self) -> Vec<StrategyReport> {
        self.risk.stop();
        self.performance.stop();
        let reports = self.engine.stop().await;
        self.performance.refresh().await;
        for group in self.groups.write().values_mut() {
            group.state = GroupState::Stopped;
        }
        self.running.store(false, Ordering::SeqCst);
        log::info!("[System] Stopped ({} reports)", reports.len());
        reports
    }

    // ============ Strategies ============

    /// Build a registered kind and add it to the engine (not started)
    pub fn add_strategy(&self, kind: &str, config: StrategyConfig) -> Result<SharedStrategy> {
        let strategy = self.registry.build(kind, &config)?;
        self.add_custom(strategy, config)
    }

    /// Add an already-built strategy (not started)
    pub fn add_custom(
        &self,
        strategy: Box<dyn Strategy>,
        config: StrategyConfig,
    ) -> Result<SharedStrategy> {
        let managed = ManagedStrategy::new(strategy, config)?;
        Ok(self.engine.add_strategy(managed)?)
    }

    /// Stop and unregister a strategy. Its performance history is kept.
    pub async fn remove_strategy(&self, id: &str) -> Result<StrategyReport> {
        let report = self.engine.remove_strategy(id).await?;
        for group in self.groups.read().values() {
            if group.allocations.iter().any(|(member, _)| member == id) {
                log::warn!("[System] Removed {} is a member of group {}", id, group.name);
            }
        }
        Ok(report)
    }

    pub async fn start_strategy(&self, id: &str) -> Result<()> {
        Ok(self.engine.start_strategy(id).await?)
    }

    pub async fn stop_strategy(&self, id: &str) -> Result<StrategyReport> {
        Ok(self.engine.stop_strategy(id).await?)
    }

    pub async fn pause_strategy(&self, id: &str) -> Result<()> {
        Ok(self.engine.pause_strategy(id).await?)
    }

    pub async fn resume_strategy(&self, id: &str) -> Result<()> {
        Ok(self.engine.resume_strategy(id).await?)
    }

    /// Registered strategy ids, sorted
    pub fn strategies(&self) -> Vec<StrategyId> {
        self.engine.strategy_ids()
    }

    pub async fn strategy_state(&self, id: &str) -> Result<StrategyState> {
        Ok(self.engine.strategy_state(id).await?)
    }

    pub async fn snapshot(&self, id: &str) -> Result<StrategySnapshot> {
        Ok(self.engine.snapshot(id).await?)
    }

    pub async fn snapshots(&self) -> Vec<StrategySnapshot> {
        self.engine.snapshots().await
    }

    // ============ Market data ============

    /// Feed one record. A full data queue drops it with an error.
    pub fn feed(&self, data: MarketData) -> Result<()> {
        Ok(self.engine.feed_data(data)?)
    }

    /// Fetch `symbols` over `[start, end]` from `provider` and feed the bars
    /// in timestamp order, waiting for queue room rather than dropping.
    /// Returns the number of records fed.
    pub async fn replay_from_provider(
        &self,
        provider: &dyn DataProvider,
        symbols: &[Symbol],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<usize> {
        let timeline = load_timeline(provider, symbols, start, end).await?;
        let mut fed = 0usize;
        for bars in timeline.slices.into_values() {
            for bar in bars {
                self.engine.feed_data_wait(bar).await?;
                fed += 1;
            }
        }
        log::info!(
            "[System] Replayed {} records from provider ({} dropped by validation: {})",
            fed,
            timeline.dropped.total(),
            timeline.dropped
        );
        Ok(fed)
    }

    // ============ Performance ============

    /// Sample every strategy's equity now
    pub async fn refresh_performance(&self) -> usize {
        self.performance.refresh().await
    }

    pub fn metrics(&self, id: &str) -> Result<PerformanceMetrics> {
        Ok(self.performance.metrics(id)?)
    }

    pub fn equity_curve(&self, id: &str) -> Result<Vec<EquitySample>> {
        Ok(self.performance.equity_curve(id)?)
    }

    pub fn performance_report(&self, id: &str) -> Result<String> {
        Ok(self.performance.report(id)?)
    }

    /// Compare strategies (all tracked strategies when `ids` is empty)
    pub fn compare(&self, ids: &[StrategyId]) -> Result<StrategyComparison> {
        Ok(self.performance.compare(ids)?)
    }

    // ============ Risk ============

    pub fn risk_snapshot(&self) -> RiskSnapshot {
        self.risk.snapshot()
    }

    pub fn active_risk_events(&self) -> Vec<RiskEvent> {
        self.risk.active_events()
    }

    pub fn risk_report(&self) -> String {
        self.risk.report()
    }

    // ============ Groups ============

    /// Register every member with its share of the group's capital. Either
    /// all members are added or none are.
    pub async fn create_group(&self, config: GroupConfig) -> Result<StrategyGroup> {
        config.validate()?;
        if self.groups.read().contains_key(&config.name) {
            return Err(SystemError::GroupExists(config.name));
        }

        let mut built = Vec::with_capacity(config.members.len());
        for (kind, member_config) in config.member_configs() {
            let strategy = self.registry.build(&kind, &member_config)?;
            built.push(ManagedStrategy::new(strategy, member_config)?);
        }

        let mut added: Vec<StrategyId> = Vec::with_capacity(built.len());
        for managed in built {
            let id = managed.id().to_string();
            if let Err(e) = self.engine.add_strategy(managed) {
                for id in &added {
                    if let Err(rollback) = self.engine.remove_strategy(id).await {
                        log::warn!(
                            "[System] Rollback of {} for group {} failed: {}",
                            id,
                            config.name,
                            rollback
                        );
                    }
                }
                return Err(e.into());
            }
            added.push(id);
        }

        let group = StrategyGroup::from_config(&config);
        log::info!("[System] Created group {}", group);
        self.groups.write().insert(config.name, group.clone());
        Ok(group)
    }

    fn group_members(&self, name: &str) -> Result<Vec<StrategyId>> {
        self.groups
            .read()
            .get(name)
            .map(StrategyGroup::member_ids)
            .ok_or_else(|| SystemError::UnknownGroup(name.to_string()))
    }

    fn set_group_state(&self, name: &str, state: GroupState) {
        if let Some(group) = self.groups.write().get_mut(name) {
            group.state = state;
        }
    }

    /// Start every member of the group
    pub async fn start_group(&self, name: &str) -> Result<()> {
        for id in self.group_members(name)? {
            self.engine.start_strategy(&id).await?;
        }
        self.set_group_state(name, GroupState::Running);
        log::info!("[System] Group {} running", name);
        Ok(())
    }

    /// Stop every member of the group, returning their final reports
    pub async fn stop_group(&self, name: &str) -> Result<Vec<StrategyReport>> {
        let mut reports = Vec::new();
        for id in self.group_members(name)? {
            match self.engine.stop_strategy(&id).await {
                Ok(report) => reports.push(report),
                Err(e) => log::warn!("[System] Group {}: {} did not stop: {}", name, id, e),
            }
        }
        self.set_group_state(name, GroupState::Stopped);
        log::info!("[System] Group {} stopped", name);
        Ok(reports)
    }

    pub fn group(&self, name: &str) -> Option<StrategyGroup> {
        self.groups.read().get(name).cloned()
    }

    /// Groups sorted by name
    pub fn groups(&self) -> Vec<StrategyGroup> {
        let mut groups: Vec<StrategyGroup> = self.groups.read().values().cloned().collect();
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        groups
    }

    // ============ Backtesting ============

    /// Backtest a registered kind. Runs independently of the live engine.
    pub async fn backtest(
        &self,
        kind: &str,
        strategy_config: StrategyConfig,
        config: BacktestConfig,
        provider: Arc<dyn DataProvider>,
    ) -> Result<BacktestResult> {
        let factory = self.registry.factory(kind)?;
        self.backtest_with(factory.as_ref(), strategy_config, config, provider)
            .await
    }

    /// Backtest a strategy built by `factory`
    pub async fn backtest_with(
        &self,
        factory: &StrategyFactory,
        strategy_config: StrategyConfig,
        config: BacktestConfig,
        provider: Arc<dyn DataProvider>,
    ) -> Result<BacktestResult> {
        let engine = BacktestEngine::new(config, provider)?;
        Ok(engine.run_with(factory, strategy_config).await?)
    }
}
