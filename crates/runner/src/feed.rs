//! Synthetic market data feed
//!
//! Generates OHLCV bars from a geometric random walk per symbol, for demos
//! and soak tests of a running system. Seeded feeds are reproducible.

use chrono::{DateTime, TimeZone, Utc};
use meridian_core::{BarFrequency, MarketData, Symbol};
use meridian_engine::{Engine, EngineError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::broadcast;

/// Smallest price the walk may reach
const PRICE_FLOOR: Decimal = dec!(0.0001);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Starting price per symbol
    pub initial_prices: BTreeMap<Symbol, Decimal>,
    /// Standard deviation of the per-bar log return
    #[serde(default = "default_volatility")]
    pub volatility: f64,
    /// Mean per-bar log return
    #[serde(default)]
    pub drift: f64,
    #[serde(default = "default_base_volume")]
    pub base_volume: Decimal,
    #[serde(default = "default_bar_frequency")]
    pub bar_frequency: BarFrequency,
    /// Timestamp of the first bar (defaults to now)
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    /// Wall-clock pause between bars (ms)
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Bars to emit per symbol when run from the binary
    #[serde(default = "default_ticks")]
    pub ticks: usize,
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_volatility() -> f64 {
    0.01
}

fn default_base_volume() -> Decimal {
    dec!(1_000_000)
}

fn default_bar_frequency() -> BarFrequency {
    BarFrequency::Minute1
}

fn default_interval_ms() -> u64 {
    100
}

fn default_ticks() -> usize {
    500
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            initial_prices: BTreeMap::from([
                ("AAPL".to_string(), dec!(190)),
                ("MSFT".to_string(), dec!(410)),
            ]),
            volatility: default_volatility(),
            drift: 0.0,
            base_volume: default_base_volume(),
            bar_frequency: default_bar_frequency(),
            start: None,
            interval_ms: default_interval_ms(),
            ticks: default_ticks(),
            seed: None,
        }
    }
}

impl FeedConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn symbols(&self) -> Vec<Symbol> {
        self.initial_prices.keys().cloned().collect()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.initial_prices.is_empty() {
            return Err("feed needs at least one symbol".to_string());
        }
        let non_positive = self.initial_prices.iter().find(|(_, p)| **p <= Decimal::ZERO);
        if let Some((symbol, price)) = non_positive {
            return Err(format!("initial price {} for {} must be positive", price, symbol));
        }
        if !self.volatility.is_finite() || self.volatility < 0.0 {
            return Err(format!("volatility {} must be non-negative", self.volatility));
        }
        if !self.drift.is_finite() {
            return Err("drift must be finite".to_string());
        }
        if self.base_volume < Decimal::ZERO {
            return Err("base volume must be non-negative".to_string());
        }
        Ok(())
    }
}

/// Random-walk bar generator
pub struct SyntheticFeed {
    config: FeedConfig,
    /// Last close per symbol
    prices: BTreeMap<Symbol, Decimal>,
    next_timestamp: DateTime<Utc>,
    bar_tx: broadcast::Sender<MarketData>,
    rng: StdRng,
}

impl SyntheticFeed {
    /// Seeded from `config.seed` when present, otherwise from entropy
    pub fn new(config: FeedConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(config, rng)
    }

    pub fn with_seed(config: FeedConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: FeedConfig, rng: StdRng) -> Self {
        let (bar_tx, _) = broadcast::channel(1000);
        let start = config.start.unwrap_or_else(|| {
            let now = Utc::now();
            Utc.timestamp_opt(now.timestamp(), 0).single().unwrap_or(now)
        });
        Self {
            prices: config.initial_prices.clone(),
            next_timestamp: start,
            config,
            bar_tx,
            rng,
        }
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// Receive every generated bar
    pub fn subscribe(&self) -> broadcast::Receiver<MarketData> {
        self.bar_tx.subscribe()
    }

    pub fn price(&self, symbol: &str) -> Option<Decimal> {
        self.prices.get(symbol).copied()
    }

    fn decimal(value: f64) -> Decimal {
        Decimal::from_f64(value)
            .map(|d| d.round_dp(4))
            .unwrap_or(PRICE_FLOOR)
            .max(PRICE_FLOOR)
    }

    fn normal(&mut self) -> f64 {
        self.rng.sample(StandardNormal)
    }

    /// One bar per symbol at the next timestamp
    pub fn next_bars(&mut self) -> Vec<MarketData> {
        let timestamp = self.next_timestamp;
        self.next_timestamp = timestamp + self.config.bar_frequency.duration();

        let sigma = self.config.volatility;
        let drift = self.config.drift;
        let symbols: Vec<Symbol> = self.prices.keys().cloned().collect();
        let mut bars = Vec::with_capacity(symbols.len());

        for symbol in symbols {
            let Some(open) = self.prices.get(&symbol).copied() else {
                continue;
            };
            let open_f = open.to_f64().unwrap_or(0.0);
            let shock = self.normal();
            let close = Self::decimal(open_f * (drift + sigma * shock).exp());

            let wick_up = self.normal().abs() * sigma / 2.0;
            let wick_down = self.normal().abs() * sigma / 2.0;
            let body_high = open.max(close);
            let body_low = open.min(close);
            let high = Self::decimal(body_high.to_f64().unwrap_or(0.0) * (1.0 + wick_up))
                .max(body_high);
            let low = Self::decimal(body_low.to_f64().unwrap_or(0.0) * (1.0 - wick_down))
                .min(body_low);

            let activity = 1.0 + shock.abs() / 2.0;
            let volume = (self.config.base_volume
                * Decimal::from_f64(activity).unwrap_or(Decimal::ONE))
            .round_dp(0);

            self.prices.insert(symbol.clone(), close);
            bars.push(MarketData::bar(symbol, timestamp, open, high, low, close, volume));
        }

        bars
    }

    /// Generate and broadcast the next bars
    pub fn tick(&mut self) -> Vec<MarketData> {
        let bars = self.next_bars();
        for bar in &bars {
            // no subscribers is fine
            let _ = self.bar_tx.send(bar.clone());
        }
        bars
    }

    /// Feed `ticks` rounds of bars into the engine, pausing `interval`
    /// between rounds. Records dropped by a full queue are counted and
    /// skipped. Returns the number of records accepted.
    pub async fn run(
        &mut self,
        engine: &Engine,
        ticks: usize,
        interval: Duration,
    ) -> meridian_engine::Result<usize> {
        let mut accepted = 0usize;
        let mut dropped = 0usize;
        for _ in 0..ticks {
            for bar in self.tick() {
                match engine.feed_data(bar) {
                    Ok(()) => accepted += 1,
                    Err(EngineError::QueueFull { .. }) => dropped += 1,
                    Err(e) => return Err(e),
                }
            }
            if !interval.is_zero() {
                tokio::time::sleep(interval).await;
            } else {
                tokio::task::yield_now().await;
            }
        }
        if dropped > 0 {
            log::warn!("[Feed] {} records dropped by a full data queue", dropped);
        }
        log::info!("[Feed] Fed {} records over {} rounds", accepted, ticks);
        Ok(accepted)
    }
}
