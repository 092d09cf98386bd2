use meridian_engine::EngineError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RiskError {
    #[error("Unknown risk limit: {0}")]
    UnknownLimit(String),

    #[error("Invalid risk limit {name}: {reason}")]
    InvalidLimit { name: String, reason: String },

    #[error("Risk manager already started")]
    AlreadyStarted,

    #[error(transparent)]
    Engine(#[from] EngineError),
}

pub type Result<T> = std::result::Result<T, RiskError>;
