//! Strategy errors

use meridian_core::{OrderId, ValidationError};
use thiserror::Error;

use crate::state::StrategyState;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StrategyError {
    #[error("Invalid strategy configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition {
        from: StrategyState,
        to: StrategyState,
    },

    /// Pre-trade check or risk gate refused the order
    #[error("Order rejected: {reason}")]
    Rejected { reason: String },

    #[error("Strategy is not attached to an order router")]
    Detached,

    #[error("Routing failed: {0}")]
    Routing(String),

    #[error("Unknown order: {0}")]
    UnknownOrder(OrderId),

    /// Failure raised by a strategy hook
    #[error("Strategy hook failed: {0}")]
    Hook(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl StrategyError {
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    pub fn hook(message: impl Into<String>) -> Self {
        Self::Hook(message.into())
    }

    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

pub type Result<T> = std::result::Result<T, StrategyError>;
