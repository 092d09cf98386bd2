//! System errors

use meridian_backtest::BacktestError;
use meridian_engine::EngineError;
use meridian_performance::PerformanceError;
use meridian_ports::PortError;
use meridian_risk_manager::RiskError;
use meridian_strategy::StrategyError;
use thiserror::Error;

/// Failure loading or validating a [`SystemConfig`](crate::SystemConfig)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {error}")]
    Io { path: String, error: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SystemError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Strategy(#[from] StrategyError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Risk(#[from] RiskError),

    #[error(transparent)]
    Performance(#[from] PerformanceError),

    #[error(transparent)]
    Backtest(#[from] BacktestError),

    #[error(transparent)]
    Data(#[from] PortError),

    #[error("Unknown strategy kind: {0}")]
    UnknownKind(String),

    #[error("Unknown strategy group: {0}")]
    UnknownGroup(String),

    #[error("Strategy group already exists: {0}")]
    GroupExists(String),

    #[error("Invalid strategy group {name}: {reason}")]
    InvalidGroup { name: String, reason: String },
}

pub type Result<T> = std::result::Result<T, SystemError>;
