use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Trading days per year used for annualisation
const TRADING_DAYS: f64 = 252.0;
/// Regular-session minutes per trading day
const SESSION_MINUTES: f64 = 390.0;

/// Bar interval of a data series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BarFrequency {
    #[serde(rename = "1m")]
    Minute1,
    #[serde(rename = "5m")]
    Minute5,
    #[serde(rename = "15m")]
    Minute15,
    #[serde(rename = "30m")]
    Minute30,
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "4h")]
    Hour4,
    #[serde(rename = "1d")]
    Daily,
    #[serde(rename = "1w")]
    Weekly,
    #[serde(rename = "1M")]
    Monthly,
}

impl BarFrequency {
    /// Number of bars per year, used to annualise returns and volatility
    pub fn periods_per_year(&self) -> f64 {
        match self {
            BarFrequency::Minute1 => TRADING_DAYS * SESSION_MINUTES,
            BarFrequency::Minute5 => TRADING_DAYS * SESSION_MINUTES / 5.0,
            BarFrequency::Minute15 => TRADING_DAYS * SESSION_MINUTES / 15.0,
            BarFrequency::Minute30 => TRADING_DAYS * SESSION_MINUTES / 30.0,
            BarFrequency::Hour1 => TRADING_DAYS * SESSION_MINUTES / 60.0,
            BarFrequency::Hour4 => TRADING_DAYS * SESSION_MINUTES / 240.0,
            BarFrequency::Daily => TRADING_DAYS,
            BarFrequency::Weekly => 52.0,
            BarFrequency::Monthly => 12.0,
        }
    }

    /// Wall-clock length of one bar
    pub fn duration(&self) -> Duration {
        match self {
            BarFrequency::Minute1 => Duration::minutes(1),
            BarFrequency::Minute5 => Duration::minutes(5),
            BarFrequency::Minute15 => Duration::minutes(15),
            BarFrequency::Minute30 => Duration::minutes(30),
            BarFrequency::Hour1 => Duration::hours(1),
            BarFrequency::Hour4 => Duration::hours(4),
            BarFrequency::Daily => Duration::days(1),
            BarFrequency::Weekly => Duration::weeks(1),
            BarFrequency::Monthly => Duration::days(30),
        }
    }
}

impl Default for BarFrequency {
    fn default() -> Self {
        Self::Daily
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_periods_per_year() {
        assert_eq!(BarFrequency::Daily.periods_per_year(), 252.0);
        assert_eq!(BarFrequency::Hour1.periods_per_year(), 1638.0);
        assert_eq!(BarFrequency::Weekly.periods_per_year(), 52.0);
    }

    #[test]
    fn test_serde_short_names() {
        let freq: BarFrequency = serde_json::from_str("\"5m\"").unwrap();
        assert_eq!(freq, BarFrequency::Minute5);
        assert_eq!(
            serde_json::to_string(&BarFrequency::Daily).unwrap(),
            "\"1d\""
        );
    }
}
