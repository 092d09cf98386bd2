use meridian_ports::PortError;
use meridian_strategy::StrategyError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BacktestError {
    #[error("Invalid backtest configuration: {0}")]
    InvalidConfig(String),

    #[error("No usable bars in [{start}, {end}]")]
    NoData { start: String, end: String },

    #[error("Data load failed: {0}")]
    Data(#[from] PortError),

    #[error(transparent)]
    Strategy(#[from] StrategyError),
}

pub type Result<T> = std::result::Result<T, BacktestError>;
