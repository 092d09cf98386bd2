//! Strategy configuration
//!
//! Immutable once a strategy is constructed. Loadable from JSON with every
//! field except `id` and `symbols` optional.

use meridian_core::{BarFrequency, StrategyId, Symbol};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{Result, StrategyError};

/// Broad family a strategy belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyCategory {
    TrendFollowing,
    MeanReversion,
    Momentum,
    Arbitrage,
    MarketMaking,
    Custom,
}

/// Which environments the strategy may run in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingMode {
    #[serde(default)]
    pub backtest: bool,
    #[serde(default = "default_true")]
    pub paper: bool,
    #[serde(default)]
    pub live: bool,
}

impl Default for TradingMode {
    fn default() -> Self {
        Self {
            backtest: true,
            paper: true,
            live: false,
        }
    }
}

/// What happens after a hook fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartPolicy {
    /// Restart attempts before the strategy is declared crashed
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_true")]
    pub auto_restart: bool,
    /// Fixed delay between stop and restart (ms)
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            auto_restart: true,
            backoff_ms: default_backoff_ms(),
        }
    }
}

impl RestartPolicy {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

/// Configuration of one strategy instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Unique id within a system
    pub id: StrategyId,
    /// Display name (defaults to the id)
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_category")]
    pub category: StrategyCategory,
    /// Symbols the strategy subscribes to and may trade
    pub symbols: Vec<Symbol>,
    #[serde(default = "default_timeframes")]
    pub timeframes: Vec<BarFrequency>,
    #[serde(default = "default_initial_capital")]
    pub initial_capital: Decimal,
    /// Largest single position as a fraction of equity
    #[serde(default = "default_max_position_fraction")]
    pub max_position_fraction: Decimal,
    /// Buying power multiple of equity (1 = cash only)
    #[serde(default = "default_max_leverage")]
    pub max_leverage: Decimal,
    /// Loss from initial capital that triggers liquidation and a halt
    #[serde(default = "default_max_drawdown_fraction")]
    pub max_drawdown_fraction: Decimal,
    /// Close a position once its unrealized return falls below -stop_loss
    #[serde(default)]
    pub stop_loss_fraction: Option<Decimal>,
    /// Close a position once its unrealized return exceeds take_profit
    #[serde(default)]
    pub take_profit_fraction: Option<Decimal>,
    #[serde(default = "default_commission_rate")]
    pub commission_rate: Decimal,
    #[serde(default = "default_slippage_rate")]
    pub slippage_rate: Decimal,
    #[serde(default)]
    pub mode: TradingMode,
    /// Permit sells beyond the current long position
    #[serde(default)]
    pub allow_short: bool,
    #[serde(default)]
    pub restart: RestartPolicy,
    /// Snapshot timer period (ms)
    #[serde(default = "default_monitoring_interval_ms")]
    pub monitoring_interval_ms: u64,
    /// Retention bound for trade log, closed legs and equity history
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    /// Free-form numeric parameters read by the strategy implementation
    #[serde(default)]
    pub parameters: HashMap<String, f64>,
}

fn default_true() -> bool {
    true
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    1_000
}

fn default_category() -> StrategyCategory {
    StrategyCategory::Custom
}

fn default_timeframes() -> Vec<BarFrequency> {
    vec![BarFrequency::Daily]
}

fn default_initial_capital() -> Decimal {
    dec!(100_000)
}

fn default_max_position_fraction() -> Decimal {
    dec!(0.25)
}

fn default_max_leverage() -> Decimal {
    Decimal::ONE
}

fn default_max_drawdown_fraction() -> Decimal {
    dec!(0.20)
}

fn default_commission_rate() -> Decimal {
    dec!(0.001)
}

fn default_slippage_rate() -> Decimal {
    dec!(0.0005)
}

fn default_monitoring_interval_ms() -> u64 {
    60_000
}

fn default_history_limit() -> usize {
    10_000
}

impl StrategyConfig {
    /// Config with default risk settings for the given symbols
    pub fn new(id: impl Into<StrategyId>, symbols: Vec<Symbol>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            category: default_category(),
            symbols,
            timeframes: default_timeframes(),
            initial_capital: default_initial_capital(),
            max_position_fraction: default_max_position_fraction(),
            max_leverage: default_max_leverage(),
            max_drawdown_fraction: default_max_drawdown_fraction(),
            stop_loss_fraction: None,
            take_profit_fraction: None,
            commission_rate: default_commission_rate(),
            slippage_rate: default_slippage_rate(),
            mode: TradingMode::default(),
            allow_short: false,
            restart: RestartPolicy::default(),
            monitoring_interval_ms: default_monitoring_interval_ms(),
            history_limit: default_history_limit(),
            parameters: HashMap::new(),
        }
    }

    pub fn with_capital(mut self, capital: Decimal) -> Self {
        self.initial_capital = capital;
        self
    }

    pub fn with_category(mut self, category: StrategyCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: f64) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    /// Display name, falling back to the id
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }

    /// Numeric parameter with a fallback
    pub fn parameter(&self, name: &str, default: f64) -> f64 {
        self.parameters.get(name).copied().unwrap_or(default)
    }

    pub fn monitoring_interval(&self) -> Duration {
        Duration::from_millis(self.monitoring_interval_ms.max(1))
    }

    pub fn trades(&self, symbol: &str) -> bool {
        self.symbols.iter().any(|s| s == symbol)
    }

    /// Reject malformed configs before a strategy is built from them
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(StrategyError::InvalidConfig(msg));

        if self.id.trim().is_empty() {
            return invalid("id must not be empty".to_string());
        }
        if self.symbols.is_empty() {
            return invalid(format!("{}: at least one symbol required", self.id));
        }
        if self.symbols.iter().any(|s| s.trim().is_empty()) {
            return invalid(format!("{}: empty symbol", self.id));
        }
        if self.initial_capital <= Decimal::ZERO {
            return invalid(format!(
                "{}: initial capital must be positive, got {}",
                self.id, self.initial_capital
            ));
        }
        for (name, value) in [
            ("max_position_fraction", self.max_position_fraction),
            ("max_drawdown_fraction", self.max_drawdown_fraction),
        ] {
            if value <= Decimal::ZERO || value > Decimal::ONE {
                return invalid(format!("{}: {} must be in (0, 1], got {}", self.id, name, value));
            }
        }
        if self.max_leverage < Decimal::ONE {
            return invalid(format!(
                "{}: max_leverage must be >= 1, got {}",
                self.id, self.max_leverage
            ));
        }
        for (name, value) in [
            ("stop_loss_fraction", self.stop_loss_fraction),
            ("take_profit_fraction", self.take_profit_fraction),
        ] {
            if let Some(v) = value
                && v <= Decimal::ZERO
            {
                return invalid(format!("{}: {} must be positive, got {}", self.id, name, v));
            }
        }
        if self.commission_rate < Decimal::ZERO || self.slippage_rate < Decimal::ZERO {
            return invalid(format!("{}: rates must be non-negative", self.id));
        }
        if self.history_limit == 0 {
            return invalid(format!("{}: history_limit must be positive", self.id));
        }
        Ok(())
    }
}
