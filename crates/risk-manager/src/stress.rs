//! Stress scenarios. Results are for logging and alerting only; they never
//! trigger trading actions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::RiskConfig;

/// Per-strategy inputs to the stress scenarios
#[derive(Debug, Clone, Default)]
pub struct StressInput {
    pub equity: f64,
    pub cash: f64,
    /// Signed sum of position values
    pub net_exposure: f64,
    pub gross_exposure: f64,
    /// Historical VaR as a return (negative for a loss), if known
    pub var: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StressScenario {
    MarketShock { shock: f64 },
    VolatilityShock { multiplier: f64 },
    LiquidityCrisis { haircut: f64 },
}

impl fmt::Display for StressScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StressScenario::MarketShock { shock } => write!(f, "market shock {:+.0}%", shock * 100.0),
            StressScenario::VolatilityShock { multiplier } => {
                write!(f, "volatility x{:.1}", multiplier)
            }
            StressScenario::LiquidityCrisis { haircut } => {
                write!(f, "liquidity crisis ({:.0}% haircut)", haircut * 100.0)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressResult {
    pub scenario: StressScenario,
    /// Projected loss in currency
    pub loss: f64,
    /// Projected loss over total equity
    pub loss_ratio: f64,
    /// Scenario-specific figure compared against `threshold`
    pub metric: f64,
    pub threshold: f64,
    pub breached: bool,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for StressResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: loss {:.2} ({:.2}%), metric {:.4} vs {:.4}{}",
            self.scenario,
            self.loss,
            self.loss_ratio * 100.0,
            self.metric,
            self.threshold,
            if self.breached { " BREACHED" } else { "" }
        )
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// Run every configured scenario against the current book
pub fn run_scenarios(
    inputs: &[StressInput],
    config: &RiskConfig,
    timestamp: DateTime<Utc>,
) -> Vec<StressResult> {
    let equity: f64 = inputs.iter().map(|i| i.equity).sum();
    let cash: f64 = inputs.iter().map(|i| i.cash).sum();
    let net: f64 = inputs.iter().map(|i| i.net_exposure).sum();
    let gross: f64 = inputs.iter().map(|i| i.gross_exposure).sum();

    let mut results = Vec::with_capacity(config.market_shocks.len() + 2);

    for &shock in &config.market_shocks {
        let loss = -(net * shock);
        let loss_ratio = ratio(loss, equity);
        results.push(StressResult {
            scenario: StressScenario::MarketShock { shock },
            loss,
            loss_ratio,
            metric: loss_ratio,
            threshold: config.max_drawdown,
            breached: loss_ratio >= config.max_drawdown,
            timestamp,
        });
    }

    let multiplier = config.volatility_multiplier;
    let loss: f64 = inputs
        .iter()
        .filter_map(|i| i.var.map(|var| var.abs() * multiplier * i.equity))
        .sum();
    let loss_ratio = ratio(loss, equity);
    results.push(StressResult {
        scenario: StressScenario::VolatilityShock { multiplier },
        loss,
        loss_ratio,
        metric: loss_ratio,
        threshold: config.max_daily_loss,
        breached: loss_ratio >= config.max_daily_loss,
        timestamp,
    });

    let haircut = config.liquidity_haircut;
    let loss = gross * haircut;
    let stressed_equity = equity - loss;
    let cash_ratio = if stressed_equity > 0.0 {
        cash / stressed_equity
    } else {
        0.0
    };
    results.push(StressResult {
        scenario: StressScenario::LiquidityCrisis { haircut },
        loss,
        loss_ratio: ratio(loss, equity),
        metric: cash_ratio,
        threshold: config.min_cash_ratio,
        breached: cash_ratio < config.min_cash_ratio,
        timestamp,
    });

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_scenarios() {
        let inputs = vec![
            StressInput {
                equity: 100_000.0,
                cash: 20_000.0,
                net_exposure: 80_000.0,
                gross_exposure: 80_000.0,
                var: Some(-0.02),
            },
            StressInput {
                equity: 50_000.0,
                cash: 50_000.0,
                ..Default::default()
            },
        ];
        let config = RiskConfig::default();
        let results = run_scenarios(&inputs, &config, Utc::now());
        assert_eq!(results.len(), 4);

        // -10%: 8,000 on 150,000
        assert_relative_eq!(results[0].loss, 8_000.0);
        assert!(!results[0].breached);
        // -20%: 16,000 on 150,000 = 10.7% < 20%
        assert_relative_eq!(results[1].loss, 16_000.0);
        assert!(!results[1].breached);

        // 2% VaR x3 on 100,000 = 6,000 = 4% < 5%
        assert_relative_eq!(results[2].loss, 6_000.0, epsilon = 1e-9);
        assert!(!results[2].breached);

        // 70,000 cash over 142,000 stressed equity
        assert_relative_eq!(results[3].metric, 70_000.0 / 142_000.0);
        assert!(!results[3].breached);
    }

    #[test]
    fn test_leveraged_book_breaches() {
        let inputs = vec![StressInput {
            equity: 100_000.0,
            cash: 1_000.0,
            net_exposure: 250_000.0,
            gross_exposure: 250_000.0,
            var: Some(-0.03),
        }];
        let results = run_scenarios(&inputs, &RiskConfig::default(), Utc::now());
        assert!(results.iter().all(|r| r.breached));
    }

    #[test]
    fn test_empty_book() {
        let results = run_scenarios(&[], &RiskConfig::default(), Utc::now());
        assert!(results.iter().all(|r| r.loss == 0.0 && r.loss_ratio == 0.0));
    }
}
