use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::ValidationError;
use crate::values::{Price, Quantity, Symbol};

/// Whether a record is an aggregated bar or a single tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataKind {
    Bar,
    Tick,
}

/// One OHLCV bar or tick for a symbol.
///
/// Produced by an external data source and consumed read-only by strategies.
/// Ticks carry the trade price in all four OHLC fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketData {
    pub symbol: Symbol,
    pub timestamp: DateTime<Utc>,
    pub kind: DataKind,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub volume: Quantity,
    pub bid: Option<Price>,
    pub ask: Option<Price>,
    pub bid_size: Option<Quantity>,
    pub ask_size: Option<Quantity>,
    /// Indicator values computed upstream (e.g. "sma_20")
    #[serde(default)]
    pub indicators: HashMap<String, f64>,
}

impl MarketData {
    /// Create an OHLCV bar
    #[allow(clippy::too_many_arguments)]
    pub fn bar(
        symbol: impl Into<Symbol>,
        timestamp: DateTime<Utc>,
        open: Price,
        high: Price,
        low: Price,
        close: Price,
        volume: Quantity,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            timestamp,
            kind: DataKind::Bar,
            open,
            high,
            low,
            close,
            volume,
            bid: None,
            ask: None,
            bid_size: None,
            ask_size: None,
            indicators: HashMap::new(),
        }
    }

    /// Create a tick at a single traded price
    pub fn tick(
        symbol: impl Into<Symbol>,
        timestamp: DateTime<Utc>,
        price: Price,
        volume: Quantity,
    ) -> Self {
        Self {
            kind: DataKind::Tick,
            ..Self::bar(symbol, timestamp, price, price, price, price, volume)
        }
    }

    /// Attach top-of-book quote
    pub fn with_quote(
        mut self,
        bid: Price,
        ask: Price,
        bid_size: Quantity,
        ask_size: Quantity,
    ) -> Self {
        self.bid = Some(bid);
        self.ask = Some(ask);
        self.bid_size = Some(bid_size);
        self.ask_size = Some(ask_size);
        self
    }

    /// Attach a precomputed indicator value
    pub fn with_indicator(mut self, name: impl Into<String>, value: f64) -> Self {
        self.indicators.insert(name.into(), value);
        self
    }

    pub fn indicator(&self, name: &str) -> Option<f64> {
        self.indicators.get(name).copied()
    }

    pub fn is_bar(&self) -> bool {
        self.kind == DataKind::Bar
    }

    /// Last traded price
    pub fn last_price(&self) -> Price {
        self.close
    }

    /// Mid of the quote if present, otherwise the close
    pub fn mid_price(&self) -> Price {
        match (self.bid, self.ask) {
            (Some(bid), Some(ask)) => (bid + ask) / Decimal::TWO,
            _ => self.close,
        }
    }

    /// Reject non-positive prices and OHLC ordering violations
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
        ] {
            if value <= Decimal::ZERO {
                return Err(ValidationError::NonPositivePrice {
                    symbol: self.symbol.clone(),
                    field,
                });
            }
        }

        if self.high < self.low {
            return Err(self.ohlc_violation(format!("high {} < low {}", self.high, self.low)));
        }
        if self.open > self.high || self.open < self.low {
            return Err(self.ohlc_violation(format!(
                "open {} outside [{}, {}]",
                self.open, self.low, self.high
            )));
        }
        if self.close > self.high || self.close < self.low {
            return Err(self.ohlc_violation(format!(
                "close {} outside [{}, {}]",
                self.close, self.low, self.high
            )));
        }

        if self.volume < Decimal::ZERO {
            return Err(ValidationError::NegativeVolume {
                symbol: self.symbol.clone(),
            });
        }

        if let (Some(bid), Some(ask)) = (self.bid, self.ask)
            && bid > ask
        {
            return Err(self.ohlc_violation(format!("crossed quote bid {} > ask {}", bid, ask)));
        }

        Ok(())
    }

    fn ohlc_violation(&self, detail: String) -> ValidationError {
        ValidationError::OhlcViolation {
            symbol: self.symbol.clone(),
            detail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_bar() -> MarketData {
        MarketData::bar(
            "AAPL",
            Utc::now(),
            dec!(100),
            dec!(105),
            dec!(99),
            dec!(104),
            dec!(10000),
        )
    }

    #[test]
    fn test_valid_bar() {
        assert!(sample_bar().validate().is_ok());
    }

    #[test]
    fn test_non_positive_price_rejected() {
        let mut bar = sample_bar();
        bar.low = dec!(0);
        assert!(matches!(
            bar.validate(),
            Err(ValidationError::NonPositivePrice { field: "low", .. })
        ));
    }

    #[test]
    fn test_ohlc_violation_rejected() {
        let mut bar = sample_bar();
        bar.close = dec!(106);
        assert!(matches!(
            bar.validate(),
            Err(ValidationError::OhlcViolation { .. })
        ));
    }

    #[test]
    fn test_tick_and_mid() {
        let tick = MarketData::tick("AAPL", Utc::now(), dec!(50), dec!(1))
            .with_quote(dec!(49.9), dec!(50.1), dec!(10), dec!(12))
            .with_indicator("rsi_14", 55.0);

        assert!(!tick.is_bar());
        assert_eq!(tick.high, dec!(50));
        assert_eq!(tick.mid_price(), dec!(50));
        assert_eq!(tick.indicator("rsi_14"), Some(55.0));
        assert!(tick.validate().is_ok());
    }
}
