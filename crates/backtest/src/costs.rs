//! Commission and slippage models

use meridian_core::{MarketData, Price, Quantity, Side};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};

/// One notional bracket of a tiered commission schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionTier {
    /// Lowest notional the rate applies to
    pub min_notional: Decimal,
    pub rate: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommissionModel {
    /// Flat amount per fill
    Fixed { amount: Decimal },
    /// Share of notional with a minimum per fill
    Percentage { rate: Decimal, minimum: Decimal },
    /// Rate of the highest bracket the notional reaches
    Tiered { tiers: Vec<CommissionTier> },
}

impl Default for CommissionModel {
    fn default() -> Self {
        CommissionModel::Percentage {
            rate: Decimal::new(1, 3),
            minimum: Decimal::ONE,
        }
    }
}

impl CommissionModel {
    pub fn commission(&self, notional: Decimal) -> Decimal {
        let notional = notional.abs();
        match self {
            CommissionModel::Fixed { amount } => *amount,
            CommissionModel::Percentage { rate, minimum } => (notional * rate).max(*minimum),
            CommissionModel::Tiered { tiers } => tiers
                .iter()
                .filter(|t| notional >= t.min_notional)
                .max_by(|a, b| a.min_notional.cmp(&b.min_notional))
                .map(|t| notional * t.rate)
                .unwrap_or(Decimal::ZERO),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        match self {
            CommissionModel::Fixed { amount } if *amount < Decimal::ZERO => {
                Err("fixed commission must not be negative".to_string())
            }
            CommissionModel::Percentage { rate, minimum }
                if *rate < Decimal::ZERO || *minimum < Decimal::ZERO =>
            {
                Err("commission rate and minimum must not be negative".to_string())
            }
            CommissionModel::Tiered { tiers } if tiers.is_empty() => {
                Err("tiered commission needs at least one tier".to_string())
            }
            CommissionModel::Tiered { tiers } if tiers.iter().any(|t| t.rate < Decimal::ZERO) => {
                Err("tier rates must not be negative".to_string())
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlippageModel {
    None,
    /// Constant price offset
    Fixed { amount: Decimal },
    /// Share of price
    Percentage { rate: Decimal },
    /// Base rate plus a term linear in the order's share of bar volume
    VolumeBased { base_rate: Decimal, volume_impact: Decimal },
    /// Square-root market impact: `coefficient * sqrt(quantity / volume)`
    MarketImpact { coefficient: f64 },
}

impl Default for SlippageModel {
    fn default() -> Self {
        SlippageModel::Percentage {
            rate: Decimal::new(5, 4),
        }
    }
}

impl SlippageModel {
    fn participation(quantity: Quantity, bar: &MarketData) -> Decimal {
        if bar.volume > Decimal::ZERO {
            quantity / bar.volume
        } else {
            Decimal::ONE
        }
    }

    /// Adverse price adjustment (always non-negative)
    pub fn slippage(&self, price: Price, quantity: Quantity, bar: &MarketData) -> Decimal {
        match self {
            SlippageModel::None => Decimal::ZERO,
            SlippageModel::Fixed { amount } => *amount,
            SlippageModel::Percentage { rate } => price * rate,
            SlippageModel::VolumeBased {
                base_rate,
                volume_impact,
            } => price * (base_rate + volume_impact * Self::participation(quantity, bar)),
            SlippageModel::MarketImpact { coefficient } => {
                let participation = Self::participation(quantity, bar).to_f64().unwrap_or(1.0);
                let impact = coefficient * participation.max(0.0).sqrt();
                price * Decimal::from_f64(impact).unwrap_or(Decimal::ZERO)
            }
        }
    }

    /// Move the price against the taker: up for buys, down for sells.
    /// Sells never slip below one minimal price increment.
    pub fn apply(&self, side: Side, price: Price, quantity: Quantity, bar: &MarketData) -> Price {
        let slip = self.slippage(price, quantity, bar).max(Decimal::ZERO);
        let adjusted = price + slip * side.sign();
        adjusted.max(Decimal::new(1, 8))
    }

    pub fn validate(&self) -> Result<(), String> {
        let negative = match self {
            SlippageModel::None => false,
            SlippageModel::Fixed { amount } => *amount < Decimal::ZERO,
            SlippageModel::Percentage { rate } => *rate < Decimal::ZERO,
            SlippageModel::VolumeBased {
                base_rate,
                volume_impact,
            } => *base_rate < Decimal::ZERO || *volume_impact < Decimal::ZERO,
            SlippageModel::MarketImpact { coefficient } => coefficient.is_nan() || *coefficient < 0.0,
        };
        if negative {
            Err("slippage parameters must not be negative".to_string())
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn bar(volume: Decimal) -> MarketData {
        MarketData::bar("AAPL", Utc::now(), dec!(100), dec!(101), dec!(99), dec!(100), volume)
    }

    #[test]
    fn test_commission_models() {
        assert_eq!(CommissionModel::Fixed { amount: dec!(5) }.commission(dec!(1000)), dec!(5));

        let pct = CommissionModel::Percentage {
            rate: dec!(0.001),
            minimum: dec!(1),
        };
        assert_eq!(pct.commission(dec!(10000)), dec!(10));
        assert_eq!(pct.commission(dec!(500)), dec!(1));

        let tiered = CommissionModel::Tiered {
            tiers: vec![
                CommissionTier {
                    min_notional: dec!(0),
                    rate: dec!(0.002),
                },
                CommissionTier {
                    min_notional: dec!(50000),
                    rate: dec!(0.001),
                },
            ],
        };
        assert_eq!(tiered.commission(dec!(10000)), dec!(20));
        assert_eq!(tiered.commission(dec!(100000)), dec!(100));
    }

    #[test]
    fn test_slippage_is_directional() {
        let model = SlippageModel::Percentage { rate: dec!(0.001) };
        let bar = bar(dec!(10000));
        assert_eq!(model.apply(Side::Buy, dec!(100), dec!(10), &bar), dec!(100.1));
        assert_eq!(model.apply(Side::Sell, dec!(100), dec!(10), &bar), dec!(99.9));

        let fixed = SlippageModel::Fixed { amount: dec!(0.05) };
        assert_eq!(fixed.apply(Side::Sell, dec!(100), dec!(10), &bar), dec!(99.95));
        assert_eq!(SlippageModel::None.apply(Side::Buy, dec!(100), dec!(10), &bar), dec!(100));
    }

    #[test]
    fn test_volume_models() {
        let bar = bar(dec!(10000));
        let linear = SlippageModel::VolumeBased {
            base_rate: dec!(0.0005),
            volume_impact: dec!(0.1),
        };
        // 1,000 of 10,000 volume: 0.0005 + 0.01
        assert_eq!(linear.slippage(dec!(100), dec!(1000), &bar), dec!(1.05));

        let sqrt = SlippageModel::MarketImpact { coefficient: 0.1 };
        // sqrt(0.01) * 0.1 = 1%
        let slip = sqrt.slippage(dec!(100), dec!(100), &bar);
        assert!((slip - dec!(1)).abs() < dec!(0.000001));
        assert!(sqrt.slippage(dec!(100), dec!(100), &self::bar(Decimal::ZERO)) > slip);
    }

    #[test]
    fn test_validation() {
        assert!(CommissionModel::Tiered { tiers: vec![] }.validate().is_err());
        assert!(SlippageModel::Percentage { rate: dec!(-0.1) }.validate().is_err());
        assert!(SlippageModel::MarketImpact { coefficient: f64::NAN }.validate().is_err());
        assert!(SlippageModel::default().validate().is_ok());
    }
}
