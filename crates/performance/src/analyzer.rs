//! Performance Analyzer: samples strategy equity from the Engine and keeps
//! per-strategy metrics current. It only reads trading state.

use chrono::{DateTime, Utc};
use meridian_core::{ClosedTrade, StrategyId};
use meridian_engine::Engine;
use parking_lot::{Mutex, RwLock};
use rust_decimal::prelude::ToPrimitive;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;

use crate::compare::{ComparisonInput, StrategyComparison, compare};
use crate::config::PerformanceConfig;
use crate::error::{PerformanceError, Result};
use crate::metrics::{MetricParams, PerformanceMetrics};
use crate::report::render_report;
use crate::series::{EquitySample, EquitySeries};

#[derive(Debug, Clone)]
struct Tracked {
    series: EquitySeries,
    trades: Vec<ClosedTrade>,
    metrics: PerformanceMetrics,
}

pub struct PerformanceAnalyzer {
    config: PerformanceConfig,
    params: MetricParams,
    engine: Arc<Engine>,
    tracked: RwLock<HashMap<StrategyId, Tracked>>,
    benchmark: RwLock<Option<EquitySeries>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl PerformanceAnalyzer {
    pub fn new(config: PerformanceConfig, engine: Arc<Engine>) -> Self {
        let params = MetricParams::from(&config);
        Self {
            config,
            params,
            engine,
            tracked: RwLock::new(HashMap::new()),
            benchmark: RwLock::new(None),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &PerformanceConfig {
        &self.config
    }

    /// Sample every registered strategy now and recompute its metrics
    pub async fn refresh(&self) -> usize {
        self.refresh_at(Utc::now()).await
    }

    /// Sample every registered strategy at `timestamp`. Returns the number of
    /// strategies sampled.
    pub async fn refresh_at(&self, timestamp: DateTime<Utc>) -> usize {
        let mut samples = Vec::new();
        for id in self.engine.strategy_ids() {
            let Some(shared) = self.engine.strategy(&id) else {
                continue;
            };
            let guard = shared.lock().await;
            let ledger = guard.context().ledger();
            let equity = ledger.equity().to_f64().unwrap_or(0.0);
            let trades: Vec<ClosedTrade> = ledger.closed_trades().iter().cloned().collect();
            samples.push((id, equity, trades));
        }

        let sampled = samples.len();
        for (id, equity, trades) in samples {
            self.record_sample(&id, timestamp, equity);
            if let Some(tracked) = self.tracked.write().get_mut(&id) {
                tracked.trades = trades;
            }
            self.recompute(&id);
        }
        log::debug!("[Performance] Refreshed {} strategies", sampled);
        sampled
    }

    /// Append an equity observation for a strategy without recomputing
    pub fn record_sample(&self, strategy_id: &str, timestamp: DateTime<Utc>, equity: f64) -> bool {
        let limit = self.config.history_limit;
        let mut tracked = self.tracked.write();
        let entry = tracked
            .entry(strategy_id.to_string())
            .or_insert_with(|| Tracked {
                series: EquitySeries::new(limit),
                trades: Vec::new(),
                metrics: PerformanceMetrics::default(),
            });
        let accepted = entry.series.push(timestamp, equity);
        if !accepted {
            log::trace!(
                "[Performance] Ignored out-of-order sample for {} at {}",
                strategy_id,
                timestamp
            );
        }
        accepted
    }

    /// Recompute metrics for one strategy from its current series
    pub fn recompute(&self, strategy_id: &str) -> Option<PerformanceMetrics> {
        let benchmark = self.benchmark.read().as_ref().map(|b| b.returns());
        let mut tracked = self.tracked.write();
        let entry = tracked.get_mut(strategy_id)?;
        let samples: Vec<EquitySample> = entry.series.samples().iter().copied().collect();
        entry.metrics =
            PerformanceMetrics::compute(&samples, &entry.trades, benchmark.as_deref(), &self.params);
        Some(entry.metrics.clone())
    }

    pub fn tracked_strategies(&self) -> Vec<StrategyId> {
        let mut ids: Vec<StrategyId> = self.tracked.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn metrics(&self, strategy_id: &str) -> Result<PerformanceMetrics> {
        self.tracked
            .read()
            .get(strategy_id)
            .map(|t| t.metrics.clone())
            .ok_or_else(|| PerformanceError::UnknownStrategy(strategy_id.to_string()))
    }

    pub fn equity_curve(&self, strategy_id: &str) -> Result<Vec<EquitySample>> {
        self.tracked
            .read()
            .get(strategy_id)
            .map(|t| t.series.samples().iter().copied().collect())
            .ok_or_else(|| PerformanceError::UnknownStrategy(strategy_id.to_string()))
    }

    pub fn returns(&self, strategy_id: &str) -> Result<Vec<f64>> {
        self.tracked
            .read()
            .get(strategy_id)
            .map(|t| t.series.returns())
            .ok_or_else(|| PerformanceError::UnknownStrategy(strategy_id.to_string()))
    }

    pub fn drawdowns(&self, strategy_id: &str) -> Result<Vec<f64>> {
        self.tracked
            .read()
            .get(strategy_id)
            .map(|t| t.series.drawdowns())
            .ok_or_else(|| PerformanceError::UnknownStrategy(strategy_id.to_string()))
    }

    /// Replace the benchmark with a level series (prices or index values)
    pub fn set_benchmark(&self, levels: impl IntoIterator<Item = (DateTime<Utc>, f64)>) {
        let mut series = EquitySeries::new(self.config.history_limit);
        for (timestamp, level) in levels {
            series.push(timestamp, level);
        }
        log::info!("[Performance] Benchmark set with {} observations", series.len());
        *self.benchmark.write() = Some(series);
    }

    pub fn update_benchmark(&self, timestamp: DateTime<Utc>, level: f64) {
        let limit = self.config.history_limit;
        self.benchmark
            .write()
            .get_or_insert_with(|| EquitySeries::new(limit))
            .push(timestamp, level);
    }

    pub fn clear_benchmark(&self) {
        *self.benchmark.write() = None;
    }

    /// Compare the given strategies, or every tracked strategy when empty
    pub fn compare(&self, strategy_ids: &[StrategyId]) -> Result<StrategyComparison> {
        let tracked = self.tracked.read();
        let ids: Vec<StrategyId> = if strategy_ids.is_empty() {
            let mut all: Vec<StrategyId> = tracked.keys().cloned().collect();
            all.sort();
            all
        } else {
            strategy_ids.to_vec()
        };

        let mut entries = Vec::with_capacity(ids.len());
        for id in &ids {
            let entry = tracked
                .get(id)
                .ok_or_else(|| PerformanceError::UnknownStrategy(id.clone()))?;
            entries.push((id.as_str(), &entry.metrics, entry.series.returns()));
        }
        let inputs: Vec<ComparisonInput<'_>> = entries
            .iter()
            .map(|(id, metrics, returns)| ComparisonInput {
                strategy_id: id,
                metrics,
                returns,
            })
            .collect();
        Ok(compare(&inputs))
    }

    pub fn report(&self, strategy_id: &str) -> Result<String> {
        let metrics = self.metrics(strategy_id)?;
        Ok(render_report(strategy_id, &metrics))
    }

    /// Drop the series of a strategy
    pub fn forget(&self, strategy_id: &str) -> bool {
        self.tracked.write().remove(strategy_id).is_some()
    }

    pub fn start(self: &Arc<Self>) -> Result<()> {
        let mut tasks = self.tasks.lock();
        if !tasks.is_empty() {
            return Err(PerformanceError::AlreadyStarted);
        }
        tasks.push(tokio::spawn(refresh_loop(
            Arc::downgrade(self),
            self.config.refresh_interval(),
        )));
        log::info!(
            "[Performance] Started: refresh every {}ms",
            self.config.refresh_interval_ms
        );
        Ok(())
    }

    pub fn stop(&self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        log::info!("[Performance] Stopped");
    }
}

impl Drop for PerformanceAnalyzer {
    fn drop(&mut self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}

async fn refresh_loop(analyzer: Weak<PerformanceAnalyzer>, period: std::time::Duration) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        let Some(analyzer) = analyzer.upgrade() else {
            return;
        };
        analyzer.refresh().await;
    }
}
