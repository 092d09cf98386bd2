//! Meridian Risk Manager
//!
//! Real-time risk management for the execution engine:
//!
//! - **Limits**: global (exposure, daily loss, drawdown, leverage, cash ratio)
//!   and per-strategy (concentration, daily loss) with warning/critical bands
//! - **Actions**: warning, reduce-position, close-position, stop-trading,
//!   emergency-stop, executed when an event is raised or escalates
//! - **Pre-trade gate**: sizing, aggregate exposure and volume checks before
//!   an order is queued
//! - **VaR / stress**: historical VaR/CVaR per strategy, market, volatility
//!   and liquidity scenarios (alerting only)
//!
//! ## Architecture
//!
//! ```text
//!                 ┌───────────────────────────────────────────┐
//!  Engine ──────► │  limit loop: snapshots ─► figures ─► bands │ ──► RiskEvent
//!  snapshots      │                                   │       │
//!                 │                                   ▼       │
//!                 │                        actions (pause/close/stop)
//!                 │  stress loop: scenarios ─► log            │
//!                 └──────────────┬────────────────────────────┘
//!                                │ ExposureCache
//!                                ▼
//!  order ──────────────────► RiskGate (Engine OrderGate) ──► order queue
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod gate;
pub mod limits;
pub mod manager;
pub mod stress;

pub use config::RiskConfig;
pub use error::{Result, RiskError};
pub use event::RiskEvent;
pub use gate::{ExposureCache, GateLimits, RiskGate};
pub use limits::{Band, RiskAction, RiskLimit, RiskMetric, RiskScope, RiskType, Severity};
pub use manager::{ExposureFigures, LimitStatus, RiskManager, RiskSnapshot, VarEstimate};
pub use stress::{StressInput, StressResult, StressScenario, run_scenarios};
