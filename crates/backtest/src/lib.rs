//! Meridian Backtest Engine
//!
//! Replays historical bars from a [`DataProvider`] through a strategy using
//! the same [`ManagedStrategy`] runtime the live Engine drives:
//!
//! - **Loader**: per-symbol fetch, validation (invalid rows dropped and
//!   counted), merge into one timeline
//! - **Fill rules**: market at the open, limit/stop/stop-limit against the
//!   bar's range
//! - **Costs**: fixed, percentage and tiered commission; fixed, percentage,
//!   volume-based and square-root impact slippage
//! - **Results**: headline figures plus the full [`PerformanceMetrics`]
//!
//! [`DataProvider`]: meridian_ports::DataProvider
//! [`ManagedStrategy`]: meridian_strategy::ManagedStrategy
//! [`PerformanceMetrics`]: meridian_performance::PerformanceMetrics

pub mod config;
pub mod costs;
pub mod engine;
pub mod error;
pub mod fills;
pub mod loader;
pub mod result;
pub mod router;

pub use config::BacktestConfig;
pub use costs::{CommissionModel, CommissionTier, SlippageModel};
pub use engine::{BacktestEngine, StrategyFactory};
pub use error::{BacktestError, Result};
pub use fills::{PendingOrder, fill_price};
pub use loader::{DroppedRows, Timeline, load_timeline, validate_bars};
pub use result::BacktestResult;
pub use router::BacktestRouter;
