use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings of the in-process simulated broker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Commission as a fraction of notional
    #[serde(default = "default_commission_rate")]
    pub commission_rate: Decimal,
    /// Adverse price adjustment on market and stop fills
    #[serde(default)]
    pub slippage_rate: Decimal,
    /// Largest order as a share of the last record's volume (0 disables)
    #[serde(default = "default_max_volume_participation")]
    pub max_volume_participation: Decimal,
}

fn default_commission_rate() -> Decimal {
    dec!(0.001)
}

fn default_max_volume_participation() -> Decimal {
    dec!(0.1)
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            commission_rate: default_commission_rate(),
            slippage_rate: Decimal::ZERO,
            max_volume_participation: default_max_volume_participation(),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_data_queue_capacity")]
    pub data_queue_capacity: usize,
    #[serde(default = "default_order_queue_capacity")]
    pub order_queue_capacity: usize,
    /// Constant delay applied before each execution (ms)
    #[serde(default = "default_execution_latency_ms")]
    pub execution_latency_ms: u64,
    #[serde(default = "default_supervisor_interval_ms")]
    pub supervisor_interval_ms: u64,
    /// Queue occupancy above which the supervisor warns
    #[serde(default = "default_backpressure_threshold")]
    pub backpressure_threshold: f64,
    #[serde(default)]
    pub broker: BrokerConfig,
}

fn default_data_queue_capacity() -> usize {
    10_000
}

fn default_order_queue_capacity() -> usize {
    1_000
}

fn default_execution_latency_ms() -> u64 {
    1
}

fn default_supervisor_interval_ms() -> u64 {
    5_000
}

fn default_backpressure_threshold() -> f64 {
    0.8
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_queue_capacity: default_data_queue_capacity(),
            order_queue_capacity: default_order_queue_capacity(),
            execution_latency_ms: default_execution_latency_ms(),
            supervisor_interval_ms: default_supervisor_interval_ms(),
            backpressure_threshold: default_backpressure_threshold(),
            broker: BrokerConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn execution_latency(&self) -> Duration {
        Duration::from_millis(self.execution_latency_ms)
    }

    pub fn supervisor_interval(&self) -> Duration {
        Duration::from_millis(self.supervisor_interval_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EngineConfig = serde_json::from_str(
            r#"{"data_queue_capacity": 10, "broker": {"slippage_rate": "0.001"}}"#,
        )
        .unwrap();
        assert_eq!(config.data_queue_capacity, 10);
        assert_eq!(config.order_queue_capacity, 1_000);
        assert_eq!(config.execution_latency(), Duration::from_millis(1));
        assert_eq!(config.broker.slippage_rate, dec!(0.001));
        assert_eq!(config.broker.commission_rate, dec!(0.001));
    }

    #[test]
    fn test_zero_supervisor_interval_is_clamped() {
        let config = EngineConfig {
            supervisor_interval_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.supervisor_interval(), Duration::from_millis(1));
    }
}
