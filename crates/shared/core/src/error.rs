use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Boundary validation failures. Anything carrying one of these never
/// enters the trading pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{symbol}: non-positive {field} price")]
    NonPositivePrice { symbol: String, field: &'static str },

    #[error("{symbol}: OHLC ordering violated ({detail})")]
    OhlcViolation { symbol: String, detail: String },

    #[error("{symbol}: negative volume")]
    NegativeVolume { symbol: String },

    #[error("Quantity must be positive, got {0}")]
    NonPositiveQuantity(Decimal),

    #[error("{order_type} order requires a {field} price")]
    MissingPrice {
        order_type: String,
        field: &'static str,
    },

    #[error("Order {0} is terminal")]
    OrderTerminal(Uuid),

    #[error("Order {order_id} overfilled: requested={requested}, filled={filled}")]
    Overfill {
        order_id: Uuid,
        requested: Decimal,
        filled: Decimal,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
