//! Meridian Core Domain
//!
//! Pure domain types for the Meridian execution core: market data records,
//! orders, executions, positions and equity observations.
//! This crate contains no async, no I/O, and is 100% unit testable.

pub mod entities;
pub mod error;
pub mod values;

// Re-export commonly used types at crate root
pub use entities::{
    BarFrequency,
    // Executions
    ClosedTrade,
    DataKind,
    EquityPoint,
    // Market data
    MarketData,
    OrderId,
    // Orders
    OrderInfo,
    OrderStatus,
    OrderType,
    // Positions
    PositionInfo,
    PositionSide,
    Side,
    TradeId,
    TradeInfo,
};
pub use error::ValidationError;
pub use values::{Price, Quantity, StrategyId, Symbol, Timestamp};
