//! Meridian Strategy Framework
//!
//! Provides the infrastructure for building trading strategies:
//! - Lifecycle state machine with restart policy
//! - Per-strategy ledger (cash, weighted-average positions, trade log)
//! - Trading primitives with pre-trade checks and drawdown halt
//! - Built-in trend-following and mean reversion strategies
//!
//! ## Architecture
//!
//! ```text
//!   MarketData ─────► ManagedStrategy ──(hooks)──► Strategy impl
//!                         │    ▲                        │
//!                         │    │ fills                  │ buy / sell / close
//!                         ▼    │                        ▼
//!                      Ledger ◄┴──────────────── StrategyContext
//!                                                       │ pre-trade check
//!                                                       ▼
//!                                     OrderRouter (Engine or Backtest)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use meridian_strategy::{ManagedStrategy, MovingAverageCross, StrategyConfig};
//!
//! let config = StrategyConfig::new("sma-aapl", vec!["AAPL".to_string()])
//!     .with_parameter("fast_period", 10.0)
//!     .with_parameter("slow_period", 30.0);
//! let strategy = MovingAverageCross::from_config(&config)?;
//! let managed = ManagedStrategy::new(Box::new(strategy), config)?;
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod ledger;
pub mod managed;
pub mod report;
pub mod router;
pub mod runtime;
pub mod state;
pub mod strategies;
pub mod strategy;

// Re-export main types
pub use config::{RestartPolicy, StrategyCategory, StrategyConfig, TradingMode};
pub use context::StrategyContext;
pub use error::{Result, StrategyError};
pub use ledger::{FillOutcome, Ledger};
pub use managed::{ManagedStrategy, SharedStrategy};
pub use report::{StrategyReport, StrategySnapshot};
pub use router::{ExposureView, OrderGate, OrderRouter, RiskCheck};
pub use runtime::{follow_up, start_shared};
pub use state::StrategyState;
pub use strategies::{BUILTIN_KINDS, MeanReversion, MeanReversionParams, MovingAverageCross, builtin};
pub use strategy::{HookResult, Strategy};
