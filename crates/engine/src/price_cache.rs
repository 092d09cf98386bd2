//! Latest market data per symbol, shared between the data loop, the
//! simulated broker and synchronous readers.

use meridian_core::{MarketData, Price};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct PriceCache {
    latest: Arc<RwLock<HashMap<String, MarketData>>>,
}

impl PriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep the record unless a newer one is already cached
    pub fn update(&self, data: &MarketData) {
        let mut latest = self.latest.write();
        match latest.get(&data.symbol) {
            Some(current) if current.timestamp > data.timestamp => {}
            _ => {
                latest.insert(data.symbol.clone(), data.clone());
            }
        }
    }

    pub fn latest(&self, symbol: &str) -> Option<MarketData> {
        self.latest.read().get(symbol).cloned()
    }

    pub fn price(&self, symbol: &str) -> Option<Price> {
        self.latest.read().get(symbol).map(MarketData::last_price)
    }

    pub fn symbols(&self) -> Vec<String> {
        self.latest.read().keys().cloned().collect()
    }
}
