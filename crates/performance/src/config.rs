use meridian_core::BarFrequency;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the Performance Analyzer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    /// Equity sampling and metric refresh cadence (ms)
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,
    /// Annual risk-free rate used by Sharpe and Sortino
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: f64,
    /// Sampling frequency of the equity series, sets periods per year
    #[serde(default)]
    pub bar_frequency: BarFrequency,
    /// Equity observations kept per strategy
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default = "default_var_confidence")]
    pub var_confidence: f64,
}

fn default_refresh_interval_ms() -> u64 {
    60_000
}

fn default_risk_free_rate() -> f64 {
    0.02
}

fn default_history_limit() -> usize {
    10_000
}

fn default_var_confidence() -> f64 {
    0.95
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: default_refresh_interval_ms(),
            risk_free_rate: default_risk_free_rate(),
            bar_frequency: BarFrequency::default(),
            history_limit: default_history_limit(),
            var_confidence: default_var_confidence(),
        }
    }
}

impl PerformanceConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms.max(1))
    }

    pub fn periods_per_year(&self) -> f64 {
        self.bar_frequency.periods_per_year()
    }
}
