//! Meridian Ports
//!
//! Port definitions (traits) for the Meridian execution core.
//! These define the boundaries between trading logic and the outside world:
//! where historical/live bars come from and where orders get executed.

mod broker;
mod data;
mod error;
mod memory;

pub use broker::{BrokerAdapter, ExecutionReport};
pub use data::DataProvider;
pub use error::{PortError, PortResult};
pub use memory::InMemoryDataProvider;
