use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// One observation on an equity curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: Decimal,
    pub cash: Decimal,
}

impl EquityPoint {
    pub fn new(timestamp: DateTime<Utc>, equity: Decimal, cash: Decimal) -> Self {
        Self {
            timestamp,
            equity,
            cash,
        }
    }

    /// Equity as f64 for statistics
    pub fn equity_f64(&self) -> f64 {
        self.equity.to_f64().unwrap_or(0.0)
    }
}
