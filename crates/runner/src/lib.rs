//! Meridian Runner
//!
//! The root of a deployment:
//!
//! - **StrategySystem**: owns one Engine, Risk Manager and Performance
//!   Analyzer and exposes the control surface
//! - **Registry**: explicit kind-name to factory mapping used by configs
//! - **Groups**: named sets of strategies sharing a capital pool by weight
//! - **Config**: one JSON document for the whole system
//! - **Synthetic feed**: seeded random-walk bars for demos and soak runs
//!
//! ## Architecture
//!
//! ```text
//!   SystemConfig (JSON) ──► StrategySystemBuilder ──► StrategySystem
//!                                 │ registry                │
//!                                 ▼                         ├──► Engine ◄── RiskGate
//!                        kind ──► factory ──► Strategy      ├──► RiskManager
//!                                                           ├──► PerformanceAnalyzer
//!                                                           └──► BacktestEngine (per run)
//!   SyntheticFeed / DataProvider ──► feed / replay ──► Engine data queue
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use meridian_runner::{StrategySystem, SystemConfig};
//!
//! let config = SystemConfig::from_file("meridian.json")?;
//! let system = StrategySystem::from_config(&config).await?;
//! system.start().await?;
//! system.feed(bar)?;
//! println!("{}", system.performance_report("sma-aapl")?);
//! ```

pub mod config;
pub mod error;
pub mod feed;
pub mod group;
pub mod registry;
pub mod system;

pub use config::{StrategyEntry, SystemConfig};
pub use error::{ConfigError, Result, SystemError};
pub use feed::{FeedConfig, SyntheticFeed};
pub use group::{GroupConfig, GroupMember, GroupState, StrategyGroup};
pub use registry::StrategyRegistry;
pub use system::{StrategySystem, StrategySystemBuilder};
