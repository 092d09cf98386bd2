use async_trait::async_trait;
use meridian_core::{MarketData, Symbol, Timestamp};
use std::collections::HashMap;

use crate::{DataProvider, PortError, PortResult};

/// Data provider backed by bars held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryDataProvider {
    bars: HashMap<Symbol, Vec<MarketData>>,
}

impl InMemoryDataProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from an unordered collection of records
    pub fn from_bars(bars: impl IntoIterator<Item = MarketData>) -> Self {
        let mut provider = Self::new();
        provider.extend(bars);
        provider
    }

    pub fn insert(&mut self, bar: MarketData) {
        self.bars.entry(bar.symbol.clone()).or_default().push(bar);
    }

    pub fn extend(&mut self, bars: impl IntoIterator<Item = MarketData>) {
        for bar in bars {
            self.insert(bar);
        }
    }

    pub fn symbols(&self) -> Vec<Symbol> {
        self.bars.keys().cloned().collect()
    }

    pub fn len(&self, symbol: &str) -> usize {
        self.bars.get(symbol).map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.bars.values().all(Vec::is_empty)
    }
}

#[async_trait]
impl DataProvider for InMemoryDataProvider {
    async fn fetch_bars(
        &self,
        symbol: &str,
        start: Timestamp,
        end: Timestamp,
    ) -> PortResult<Vec<MarketData>> {
        let rows = self
            .bars
            .get(symbol)
            .ok_or_else(|| PortError::NoData(symbol.to_string()))?;

        let mut selected: Vec<MarketData> = rows
            .iter()
            .filter(|bar| bar.timestamp >= start && bar.timestamp <= end)
            .cloned()
            .collect();
        selected.sort_by_key(|bar| bar.timestamp);
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn bar_at(symbol: &str, day: i64) -> MarketData {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(day);
        MarketData::bar(symbol, ts, dec!(10), dec!(11), dec!(9), dec!(10), dec!(100))
    }

    #[tokio::test]
    async fn test_fetch_filters_and_sorts() {
        let provider =
            InMemoryDataProvider::from_bars(vec![bar_at("A", 3), bar_at("A", 1), bar_at("A", 5)]);

        let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 4, 0, 0, 0).unwrap();
        let rows = provider.fetch_bars("A", start, end).await.unwrap();

        assert_eq!(rows.len(), 2);
        assert!(rows[0].timestamp < rows[1].timestamp);
    }

    #[tokio::test]
    async fn test_unknown_symbol() {
        let provider = InMemoryDataProvider::new();
        let err = provider
            .fetch_bars("ZZZ", Utc::now(), Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err, PortError::NoData("ZZZ".to_string()));
    }
}
