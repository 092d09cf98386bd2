use chrono::{DateTime, Utc};
use meridian_core::{BarFrequency, Symbol};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::costs::{CommissionModel, SlippageModel};

/// Configuration for one backtest run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default = "default_initial_capital")]
    pub initial_capital: Decimal,
    #[serde(default)]
    pub bar_frequency: BarFrequency,
    #[serde(default)]
    pub commission: CommissionModel,
    #[serde(default)]
    pub slippage: SlippageModel,
    #[serde(default)]
    pub allow_short: bool,
    /// Allow buying beyond cash up to `equity / margin_ratio`
    #[serde(default)]
    pub use_margin: bool,
    #[serde(default = "default_margin_ratio")]
    pub margin_ratio: Decimal,
    /// Symbol whose closes form the benchmark series
    #[serde(default)]
    pub benchmark: Option<Symbol>,
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: f64,
    #[serde(default = "default_var_confidence")]
    pub var_confidence: f64,
}

fn default_initial_capital() -> Decimal {
    Decimal::new(100_000, 0)
}

fn default_margin_ratio() -> Decimal {
    Decimal::new(5, 1)
}

fn default_risk_free_rate() -> f64 {
    0.02
}

fn default_var_confidence() -> f64 {
    0.95
}

impl BacktestConfig {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            initial_capital: default_initial_capital(),
            bar_frequency: BarFrequency::default(),
            commission: CommissionModel::default(),
            slippage: SlippageModel::default(),
            allow_short: false,
            use_margin: false,
            margin_ratio: default_margin_ratio(),
            benchmark: None,
            risk_free_rate: default_risk_free_rate(),
            var_confidence: default_var_confidence(),
        }
    }

    /// Zero commission and slippage
    pub fn frictionless(mut self) -> Self {
        self.commission = CommissionModel::Fixed {
            amount: Decimal::ZERO,
        };
        self.slippage = SlippageModel::None;
        self
    }

    pub fn with_capital(mut self, capital: Decimal) -> Self {
        self.initial_capital = capital;
        self
    }

    pub fn with_benchmark(mut self, symbol: impl Into<Symbol>) -> Self {
        self.benchmark = Some(symbol.into());
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.start >= self.end {
            return Err(format!("start {} is not before end {}", self.start, self.end));
        }
        if self.initial_capital <= Decimal::ZERO {
            return Err("initial_capital must be positive".to_string());
        }
        if self.use_margin && (self.margin_ratio <= Decimal::ZERO || self.margin_ratio > Decimal::ONE)
        {
            return Err("margin_ratio must be in (0, 1]".to_string());
        }
        if !(self.var_confidence > 0.0 && self.var_confidence < 1.0) {
            return Err("var_confidence must be in (0, 1)".to_string());
        }
        self.commission.validate()?;
        self.slippage.validate()?;
        Ok(())
    }
}
