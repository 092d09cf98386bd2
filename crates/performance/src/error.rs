use meridian_core::StrategyId;
use meridian_engine::EngineError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PerformanceError {
    #[error("No performance data for strategy: {0}")]
    UnknownStrategy(StrategyId),

    #[error("Not enough observations: need {required}, have {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("Performance analyzer already started")]
    AlreadyStarted,

    #[error(transparent)]
    Engine(#[from] EngineError),
}

pub type Result<T> = std::result::Result<T, PerformanceError>;
