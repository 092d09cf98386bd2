//! Bounded equity series per strategy

use chrono::{DateTime, Utc};
use meridian_core::EquityPoint;
use meridian_stats::{drawdown_series, simple_returns};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One sampled equity observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquitySample {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
}

impl From<&EquityPoint> for EquitySample {
    fn from(point: &EquityPoint) -> Self {
        Self {
            timestamp: point.timestamp,
            equity: point.equity.to_f64().unwrap_or(0.0),
        }
    }
}

/// Append-only, time-ordered equity series with a retention limit.
///
/// A sample at the timestamp of the last one replaces it; older samples
/// are ignored.
#[derive(Debug, Clone)]
pub struct EquitySeries {
    samples: VecDeque<EquitySample>,
    limit: usize,
}

impl EquitySeries {
    pub fn new(limit: usize) -> Self {
        Self {
            samples: VecDeque::new(),
            limit: limit.max(2),
        }
    }

    /// Returns false if the sample was older than the last one
    pub fn push(&mut self, timestamp: DateTime<Utc>, equity: f64) -> bool {
        if !equity.is_finite() {
            return false;
        }
        match self.samples.back_mut() {
            Some(last) if timestamp < last.timestamp => return false,
            Some(last) if timestamp == last.timestamp => {
                last.equity = equity;
                return true;
            }
            _ => {}
        }
        self.samples.push_back(EquitySample { timestamp, equity });
        while self.samples.len() > self.limit {
            self.samples.pop_front();
        }
        true
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &VecDeque<EquitySample> {
        &self.samples
    }

    pub fn first(&self) -> Option<&EquitySample> {
        self.samples.front()
    }

    pub fn last(&self) -> Option<&EquitySample> {
        self.samples.back()
    }

    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.equity).collect()
    }

    pub fn returns(&self) -> Vec<f64> {
        simple_returns(&self.values())
    }

    pub fn drawdowns(&self) -> Vec<f64> {
        drawdown_series(&self.values())
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::Duration;

    #[test]
    fn test_push_orders_and_bounds() {
        let t0 = Utc::now();
        let mut series = EquitySeries::new(3);
        assert!(series.push(t0, 100.0));
        assert!(series.push(t0 + Duration::minutes(1), 110.0));
        // same timestamp replaces
        assert!(series.push(t0 + Duration::minutes(1), 105.0));
        assert_eq!(series.len(), 2);
        // out of order is ignored
        assert!(!series.push(t0, 90.0));

        series.push(t0 + Duration::minutes(2), 99.75);
        series.push(t0 + Duration::minutes(3), 120.0);
        assert_eq!(series.len(), 3);
        assert_relative_eq!(series.first().unwrap().equity, 105.0);

        let returns = series.returns();
        assert_relative_eq!(returns[0], -0.05);
        let drawdowns = series.drawdowns();
        assert_relative_eq!(drawdowns[1], 0.05);
        assert_relative_eq!(drawdowns[2], 0.0);
    }

    #[test]
    fn test_non_finite_rejected() {
        let mut series = EquitySeries::new(10);
        assert!(!series.push(Utc::now(), f64::NAN));
        assert!(series.is_empty());
    }
}
