//! Engine errors

use meridian_core::ValidationError;
use meridian_strategy::StrategyError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Strategy already registered: {0}")]
    DuplicateStrategy(String),

    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),

    /// Bounded queue at capacity; the item was dropped
    #[error("{queue} queue full, item dropped")]
    QueueFull { queue: &'static str },

    #[error("{queue} queue closed")]
    QueueClosed { queue: &'static str },

    #[error("Engine already started")]
    AlreadyStarted,

    #[error("Order rejected: {0}")]
    OrderRejected(String),

    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Strategy(#[from] StrategyError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
