use rust_decimal::Decimal;
use thiserror::Error;

/// Failures reported by data providers and broker adapters
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortError {
    #[error("No data for {0}")]
    NoData(String),

    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("Insufficient liquidity for {symbol}: requested={requested}, available={available}")]
    InsufficientLiquidity {
        symbol: String,
        requested: Decimal,
        available: Decimal,
    },

    #[error("Order rejected: {0}")]
    Rejected(String),

    #[error("Data source error: {0}")]
    Source(String),
}

pub type PortResult<T> = std::result::Result<T, PortError>;
