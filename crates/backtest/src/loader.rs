//! Historical bar loading and validation

use chrono::{DateTime, Utc};
use meridian_core::{MarketData, Symbol};
use meridian_ports::{DataProvider, PortError};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::AddAssign;

use crate::error::{BacktestError, Result};

/// Rows removed while loading, by cause
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DroppedRows {
    /// Rows for a different symbol than requested
    pub foreign: usize,
    pub out_of_window: usize,
    /// Rows failing OHLC validation
    pub invalid: usize,
    /// Later rows sharing a timestamp with a kept one
    pub duplicate: usize,
}

impl DroppedRows {
    pub fn total(&self) -> usize {
        self.foreign + self.out_of_window + self.invalid + self.duplicate
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

impl AddAssign for DroppedRows {
    fn add_assign(&mut self, other: Self) {
        self.foreign += other.foreign;
        self.out_of_window += other.out_of_window;
        self.invalid += other.invalid;
        self.duplicate += other.duplicate;
    }
}

impl fmt::Display for DroppedRows {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} invalid, {} duplicate, {} outside window, {} other symbol",
            self.invalid, self.duplicate, self.out_of_window, self.foreign
        )
    }
}

/// Bars grouped by timestamp, in the order the symbols were requested
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    pub slices: BTreeMap<DateTime<Utc>, Vec<MarketData>>,
    /// Rows removed while loading, across all symbols
    pub dropped: DroppedRows,
    pub bar_count: usize,
}

impl Timeline {
    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    /// Closes of one symbol at every timestamp it traded
    pub fn closes(&self, symbol: &str) -> Vec<(DateTime<Utc>, f64)> {
        use rust_decimal::prelude::ToPrimitive;
        self.slices
            .iter()
            .filter_map(|(ts, bars)| {
                bars.iter()
                    .find(|b| b.symbol == symbol)
                    .and_then(|b| b.close.to_f64())
                    .map(|close| (*ts, close))
            })
            .collect()
    }
}

/// Keep valid bars of `symbol` inside the window, sorted, one per timestamp.
/// Returns the kept rows and what was dropped.
pub fn validate_bars(
    symbol: &str,
    rows: Vec<MarketData>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> (Vec<MarketData>, DroppedRows) {
    let mut dropped = DroppedRows::default();
    let mut kept: Vec<MarketData> = Vec::with_capacity(rows.len());
    for bar in rows {
        if bar.symbol != symbol {
            dropped.foreign += 1;
        } else if bar.timestamp < start || bar.timestamp > end {
            dropped.out_of_window += 1;
        } else if let Err(e) = bar.validate() {
            log::trace!("[Backtest] Dropping {} bar at {}: {}", symbol, bar.timestamp, e);
            dropped.invalid += 1;
        } else {
            kept.push(bar);
        }
    }
    kept.sort_by_key(|bar| bar.timestamp);
    let before = kept.len();
    kept.dedup_by_key(|bar| bar.timestamp);
    dropped.duplicate = before - kept.len();
    (kept, dropped)
}

/// Fetch and validate every symbol, then merge them into one timeline
pub async fn load_timeline(
    provider: &dyn DataProvider,
    symbols: &[Symbol],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Timeline> {
    let mut timeline = Timeline::default();
    for symbol in symbols {
        let rows = match provider.fetch_bars(symbol, start, end).await {
            Ok(rows) => rows,
            Err(PortError::NoData(_)) => {
                log::warn!("[Backtest] No data for {}", symbol);
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        let (bars, dropped) = validate_bars(symbol, rows, start, end);
        if !dropped.is_empty() {
            log::warn!("[Backtest] Dropped {} rows for {}: {}", dropped.total(), symbol, dropped);
        }
        log::debug!("[Backtest] Loaded {} bars for {}", bars.len(), symbol);
        timeline.dropped += dropped;
        timeline.bar_count += bars.len();
        for bar in bars {
            timeline.slices.entry(bar.timestamp).or_default().push(bar);
        }
    }

    if timeline.is_empty() {
        return Err(BacktestError::NoData {
            start: start.to_rfc3339(),
            end: end.to_rfc3339(),
        });
    }
    Ok(timeline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use meridian_ports::InMemoryDataProvider;
    use rust_decimal_macros::dec;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()
    }

    fn bar(symbol: &str, day: i64) -> MarketData {
        MarketData::bar(
            symbol,
            t0() + Duration::days(day),
            dec!(10),
            dec!(11),
            dec!(9),
            dec!(10),
            dec!(100),
        )
    }

    #[test]
    fn test_validate_drops_and_sorts() {
        let mut broken = bar("A", 1);
        broken.high = dec!(8);
        let rows = vec![
            bar("A", 3),
            broken,
            bar("A", 0),
            bar("A", 3),
            bar("B", 2),
            bar("A", 20),
        ];
        let (kept, dropped) = validate_bars("A", rows, t0(), t0() + Duration::days(10));
        assert_eq!(kept.len(), 2);
        assert!(kept[0].timestamp < kept[1].timestamp);
        assert_eq!(
            dropped,
            DroppedRows {
                foreign: 1,
                out_of_window: 1,
                invalid: 1,
                duplicate: 1,
            }
        );
        assert_eq!(dropped.total(), 4);
        assert_eq!(
            dropped.to_string(),
            "1 invalid, 1 duplicate, 1 outside window, 1 other symbol"
        );
    }

    #[tokio::test]
    async fn test_timeline_merges_symbols() {
        let provider = InMemoryDataProvider::from_bars(vec![
            bar("A", 0),
            bar("A", 1),
            bar("B", 1),
            bar("B", 2),
        ]);
        let symbols = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        let timeline = load_timeline(&provider, &symbols, t0(), t0() + Duration::days(5))
            .await
            .unwrap();
        assert_eq!(timeline.len(), 3);
        assert_eq!(timeline.bar_count, 4);
        let day1 = &timeline.slices[&(t0() + Duration::days(1))];
        assert_eq!(day1.len(), 2);
        assert_eq!(day1[0].symbol, "A");
        assert_eq!(timeline.closes("B").len(), 2);
    }

    #[tokio::test]
    async fn test_empty_window() {
        let provider = InMemoryDataProvider::from_bars(vec![bar("A", 0)]);
        let result = load_timeline(
            &provider,
            &["A".to_string()],
            t0() + Duration::days(1),
            t0() + Duration::days(2),
        )
        .await;
        assert!(matches!(result, Err(BacktestError::NoData { .. })));
    }
}
