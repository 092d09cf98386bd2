use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::limits::{RiskAction, RiskLimit, RiskMetric, RiskType};

/// Configuration for the Risk Manager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Limit evaluation cadence (ms)
    #[serde(default = "default_check_interval_ms")]
    pub check_interval_ms: u64,
    /// Stress test cadence (ms)
    #[serde(default = "default_stress_interval_ms")]
    pub stress_interval_ms: u64,
    /// Gross exposure over total equity
    #[serde(default = "default_max_total_exposure")]
    pub max_total_exposure: f64,
    #[serde(default = "default_max_daily_loss")]
    pub max_daily_loss: f64,
    #[serde(default = "default_max_drawdown")]
    pub max_drawdown: f64,
    #[serde(default = "default_max_leverage")]
    pub max_leverage: f64,
    #[serde(default = "default_min_cash_ratio")]
    pub min_cash_ratio: f64,
    #[serde(default = "default_max_strategy_daily_loss")]
    pub max_strategy_daily_loss: f64,
    /// Largest order as a share of the last record's volume
    #[serde(default = "default_max_order_volume_ratio")]
    pub max_order_volume_ratio: f64,
    /// Share of each position closed by a reduce-position action
    #[serde(default = "default_reduce_ratio")]
    pub reduce_ratio: f64,
    #[serde(default = "default_var_confidence")]
    pub var_confidence: f64,
    /// Equity observations used for VaR
    #[serde(default = "default_var_window")]
    pub var_window: usize,
    /// Parallel price shocks applied to every position
    #[serde(default = "default_market_shocks")]
    pub market_shocks: Vec<f64>,
    #[serde(default = "default_volatility_multiplier")]
    pub volatility_multiplier: f64,
    /// Discount on liquidating positions in the liquidity crisis scenario
    #[serde(default = "default_liquidity_haircut")]
    pub liquidity_haircut: f64,
    /// Resolved events kept in history
    #[serde(default = "default_event_retention")]
    pub event_retention: usize,
    /// Additional limits beyond the built-in set
    #[serde(default)]
    pub extra_limits: Vec<RiskLimit>,
}

fn default_check_interval_ms() -> u64 {
    1_000
}

fn default_stress_interval_ms() -> u64 {
    60_000
}

fn default_max_total_exposure() -> f64 {
    1.0
}

fn default_max_daily_loss() -> f64 {
    0.05
}

fn default_max_drawdown() -> f64 {
    0.20
}

fn default_max_leverage() -> f64 {
    2.0
}

fn default_min_cash_ratio() -> f64 {
    0.05
}

fn default_max_strategy_daily_loss() -> f64 {
    0.03
}

fn default_max_order_volume_ratio() -> f64 {
    0.1
}

fn default_reduce_ratio() -> f64 {
    0.5
}

fn default_var_confidence() -> f64 {
    0.95
}

fn default_var_window() -> usize {
    250
}

fn default_market_shocks() -> Vec<f64> {
    vec![-0.10, -0.20]
}

fn default_volatility_multiplier() -> f64 {
    3.0
}

fn default_liquidity_haircut() -> f64 {
    0.10
}

fn default_event_retention() -> usize {
    1_000
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            check_interval_ms: default_check_interval_ms(),
            stress_interval_ms: default_stress_interval_ms(),
            max_total_exposure: default_max_total_exposure(),
            max_daily_loss: default_max_daily_loss(),
            max_drawdown: default_max_drawdown(),
            max_leverage: default_max_leverage(),
            min_cash_ratio: default_min_cash_ratio(),
            max_strategy_daily_loss: default_max_strategy_daily_loss(),
            max_order_volume_ratio: default_max_order_volume_ratio(),
            reduce_ratio: default_reduce_ratio(),
            var_confidence: default_var_confidence(),
            var_window: default_var_window(),
            market_shocks: default_market_shocks(),
            volatility_multiplier: default_volatility_multiplier(),
            liquidity_haircut: default_liquidity_haircut(),
            event_retention: default_event_retention(),
            extra_limits: Vec::new(),
        }
    }
}

impl RiskConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms.max(1))
    }

    pub fn stress_interval(&self) -> Duration {
        Duration::from_millis(self.stress_interval_ms.max(1))
    }

    /// Book-wide limits every manager starts with
    pub fn global_limits(&self) -> Vec<RiskLimit> {
        let mut limits = vec![
            RiskLimit::new(
                "total_exposure",
                RiskType::Market,
                RiskMetric::TotalExposure,
                self.max_total_exposure,
                RiskAction::ReducePosition,
            ),
            RiskLimit::new(
                "daily_loss",
                RiskType::Market,
                RiskMetric::DailyLoss,
                self.max_daily_loss,
                RiskAction::StopTrading,
            ),
            RiskLimit::new(
                "max_drawdown",
                RiskType::Market,
                RiskMetric::Drawdown,
                self.max_drawdown,
                RiskAction::EmergencyStop,
            ),
            RiskLimit::new(
                "leverage",
                RiskType::Credit,
                RiskMetric::Leverage,
                self.max_leverage,
                RiskAction::ReducePosition,
            ),
            RiskLimit::new(
                "min_cash_ratio",
                RiskType::Liquidity,
                RiskMetric::CashRatio,
                self.min_cash_ratio,
                RiskAction::ReducePosition,
            ),
        ];
        limits.extend(self.extra_limits.iter().cloned());
        limits
    }

    /// Limits derived from a registered strategy's own settings
    pub fn strategy_limits(&self, strategy_id: &str, max_position_fraction: f64) -> Vec<RiskLimit> {
        vec![
            RiskLimit::new(
                concentration_limit_name(strategy_id),
                RiskType::Concentration,
                RiskMetric::PositionConcentration,
                max_position_fraction,
                RiskAction::ReducePosition,
            )
            .for_strategy(strategy_id),
            RiskLimit::new(
                strategy_daily_loss_limit_name(strategy_id),
                RiskType::Market,
                RiskMetric::StrategyDailyLoss,
                self.max_strategy_daily_loss,
                RiskAction::StopTrading,
            )
            .for_strategy(strategy_id),
        ]
    }
}

pub fn concentration_limit_name(strategy_id: &str) -> String {
    format!("concentration:{}", strategy_id)
}

pub fn strategy_daily_loss_limit_name(strategy_id: &str) -> String {
    format!("daily_loss:{}", strategy_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_with_extra_limit() {
        let config: RiskConfig = serde_json::from_str(
            r#"{
                "max_drawdown": 0.1,
                "market_shocks": [-0.05],
                "extra_limits": [{
                    "name": "tight_exposure",
                    "risk_type": "market",
                    "metric": "total_exposure",
                    "limit": 0.5,
                    "critical_action": "stop_trading",
                    "scope": "global"
                }]
            }"#,
        )
        .unwrap();
        assert_eq!(config.max_drawdown, 0.1);
        assert_eq!(config.market_shocks, vec![-0.05]);
        assert_eq!(config.check_interval_ms, default_check_interval_ms());

        let limits = config.global_limits();
        assert_eq!(limits.len(), 6);
        let extra = limits.iter().find(|l| l.name == "tight_exposure").unwrap();
        assert_eq!(extra.metric, RiskMetric::TotalExposure);
        assert_eq!(extra.critical_action, RiskAction::StopTrading);
        assert_eq!(extra.warning_action, RiskAction::Warning);
    }

    #[test]
    fn test_strategy_limits_are_scoped() {
        let limits = RiskConfig::default().strategy_limits("alpha", 0.25);
        assert_eq!(limits[0].name, "concentration:alpha");
        assert_eq!(limits[1].name, "daily_loss:alpha");
        assert!(limits.iter().all(|l| l.strategy_id().map(String::as_str) == Some("alpha")));
    }
}
