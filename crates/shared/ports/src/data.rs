use async_trait::async_trait;
use meridian_core::{MarketData, Timestamp};

use crate::PortResult;

/// Source of OHLCV rows.
///
/// Used identically by live feed ingestion and by the backtest loader.
/// Rows come back in timestamp order and cover `[start, end]` inclusive.
#[async_trait]
pub trait DataProvider: Send + Sync {
    async fn fetch_bars(
        &self,
        symbol: &str,
        start: Timestamp,
        end: Timestamp,
    ) -> PortResult<Vec<MarketData>>;
}
