//! System configuration
//!
//! One JSON document describing the engine, risk and performance settings,
//! the strategies to register and optional groups and synthetic feed.
//!
//! ```json
//! {
//!   "engine": { "data_queue_capacity": 10000 },
//!   "risk": { "max_drawdown": 0.2 },
//!   "strategies": [
//!     { "kind": "moving_average_cross",
//!       "config": { "id": "sma-aapl", "symbols": ["AAPL"] } }
//!   ],
//!   "feed": { "initial_prices": { "AAPL": 190 }, "seed": 42 }
//! }
//! ```

use meridian_engine::EngineConfig;
use meridian_performance::PerformanceConfig;
use meridian_risk_manager::RiskConfig;
use meridian_strategy::StrategyConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::error::ConfigError;
use crate::feed::FeedConfig;
use crate::group::GroupConfig;

/// A standalone strategy to register at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyEntry {
    /// Registry kind, e.g. `moving_average_cross`
    pub kind: String,
    pub config: StrategyConfig,
    #[serde(default = "default_true")]
    pub auto_start: bool,
}

fn default_true() -> bool {
    true
}

impl StrategyEntry {
    pub fn new(kind: impl Into<String>, config: StrategyConfig) -> Self {
        Self {
            kind: kind.into(),
            config,
            auto_start: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub performance: PerformanceConfig,
    #[serde(default)]
    pub strategies: Vec<StrategyEntry>,
    #[serde(default)]
    pub groups: Vec<GroupConfig>,
    #[serde(default)]
    pub feed: Option<FeedConfig>,
}

impl SystemConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: SystemConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Strategy ids are unique across standalone entries and group members
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut ids = HashSet::new();
        let member_configs = self
            .groups
            .iter()
            .flat_map(|g| g.members.iter().map(|m| &m.config));
        for config in self.strategies.iter().map(|e| &e.config).chain(member_configs) {
            config
                .validate()
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
            if !ids.insert(config.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate strategy id {}",
                    config.id
                )));
            }
        }

        let mut groups = HashSet::new();
        for group in &self.groups {
            group
                .validate()
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
            if !groups.insert(group.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate group {}",
                    group.name
                )));
            }
        }

        if let Some(feed) = &self.feed {
            feed.validate().map_err(ConfigError::Invalid)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"{
        "engine": { "data_queue_capacity": 500, "execution_latency_ms": 0 },
        "performance": { "bar_frequency": "1m" },
        "strategies": [
            { "kind": "moving_average_cross",
              "config": { "id": "sma", "symbols": ["AAPL"],
                          "parameters": { "fast_period": 5, "slow_period": 20 } } },
            { "kind": "mean_reversion", "auto_start": false,
              "config": { "id": "mr", "symbols": ["MSFT"] } }
        ],
        "groups": [
            { "name": "pair", "total_capital": 50000,
              "members": [
                { "kind": "mean_reversion", "weight": 3,
                  "config": { "id": "pair-a", "symbols": ["AAPL"] } },
                { "kind": "mean_reversion",
                  "config": { "id": "pair-b", "symbols": ["MSFT"] } }
              ] }
        ],
        "feed": { "initial_prices": { "AAPL": 190, "MSFT": 410 }, "seed": 42 }
    }"#;

    #[test]
    fn test_parse_full_config() {
        let config = SystemConfig::from_json(CONFIG).unwrap();
        assert_eq!(config.engine.data_queue_capacity, 500);
        assert_eq!(config.engine.order_queue_capacity, 1000);
        assert_eq!(config.strategies.len(), 2);
        assert!(config.strategies[0].auto_start);
        assert!(!config.strategies[1].auto_start);
        assert_eq!(config.groups[0].members[0].weight, 3.0);
        assert_eq!(config.groups[0].members[1].weight, 1.0);
        let feed = config.feed.unwrap();
        assert_eq!(feed.seed, Some(42));
        assert_eq!(feed.symbols(), vec!["AAPL".to_string(), "MSFT".to_string()]);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = SystemConfig::from_json("{}").unwrap();
        assert!(config.strategies.is_empty());
        assert!(config.feed.is_none());
        assert_eq!(config.engine.data_queue_capacity, 10_000);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let json = r#"{
            "strategies": [
                { "kind": "mean_reversion", "config": { "id": "x", "symbols": ["AAPL"] } }
            ],
            "groups": [
                { "name": "g", "total_capital": 1000,
                  "members": [ { "kind": "mean_reversion",
                                 "config": { "id": "x", "symbols": ["AAPL"] } } ] }
            ]
        }"#;
        match SystemConfig::from_json(json) {
            Err(ConfigError::Invalid(msg)) => assert!(msg.contains("duplicate strategy id x")),
            other => panic!("expected Invalid, got {:?}", other),
        }
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            SystemConfig::from_json("{ not json"),
            Err(ConfigError::Parse(_))
        ));
        match SystemConfig::from_file("/nonexistent/meridian.json") {
            Err(ConfigError::Io { path, .. }) => assert_eq!(path, "/nonexistent/meridian.json"),
            other => panic!("expected Io, got {:?}", other),
        }
    }

    #[test]
    fn test_json_round_trip() {
        let config = SystemConfig::from_json(CONFIG).unwrap();
        let again = SystemConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(again.strategies.len(), 2);
        assert_eq!(again.groups[0].name, "pair");
    }
}
