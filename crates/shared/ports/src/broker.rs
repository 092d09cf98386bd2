use async_trait::async_trait;
use chrono::{DateTime, Utc};
use meridian_core::{OrderId, OrderInfo, Price, Quantity, Symbol};
use rust_decimal::Decimal;

use crate::PortResult;

/// A fill returned by a broker for one order
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionReport {
    pub order_id: OrderId,
    pub symbol: Symbol,
    pub quantity: Quantity,
    pub price: Price,
    pub commission: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Executes orders against a venue (simulated in-process or real).
///
/// Returns a fill or an explicit rejection. A real adapter enforces its own
/// timeouts and reports them as rejections.
#[async_trait]
pub trait BrokerAdapter: Send + Sync {
    /// Adapter name for logging
    fn name(&self) -> &str;

    async fn execute(&self, order: &OrderInfo) -> PortResult<ExecutionReport>;
}
