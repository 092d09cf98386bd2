//! Meridian Execution Engine
//!
//! Runs registered strategies against live (or replayed) market data:
//! - **Scheduler**: delivers each record to every subscribed strategy concurrently
//! - **Bounded queues**: data and order queues drop the newest item when full
//! - **Execution**: orders pass an optional risk gate, then a [`BrokerAdapter`]
//! - **Supervisor**: periodic health statistics and backpressure warnings
//!
//! ## Usage
//!
//! ```rust,ignore
//! use meridian_engine::{Engine, EngineConfig};
//!
//! let engine = Engine::simulated(EngineConfig::default());
//! engine.add_strategy(managed)?;
//! engine.start()?;
//! engine.start_all().await;
//! engine.feed_data(bar)?;
//! ```
//!
//! [`BrokerAdapter`]: meridian_ports::BrokerAdapter

pub mod broker;
pub mod config;
pub mod engine;
pub mod error;
pub mod price_cache;
pub mod router;
pub mod stats;

pub use broker::SimulatedBroker;
pub use config::{BrokerConfig, EngineConfig};
pub use engine::Engine;
pub use error::{EngineError, Result};
pub use price_cache::PriceCache;
pub use router::{EngineOrderRouter, GateSlot, OrderCallback, OrderOutcome};
pub use stats::{EngineCounters, EngineStats};
