//! Risk limits and the warning/critical band rule
//!
//! A limit's utilisation is `current / limit`, or `limit / current` for floor
//! metrics such as the cash ratio. With warning ratio `w` and critical ratio
//! `c` the bands are:
//!
//! ```text
//!   u <  w                 Normal
//!   w <= u < c             Elevated   (logged, no event)
//!   c <= u < breach        Warning    -> warning_action
//!   u >= breach            Critical   -> critical_action
//!
//!   breach = c + (1 - c)(1 - w)      0.96 for w = 0.8, c = 0.95
//! ```

use meridian_core::StrategyId;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, RiskError};

/// Absorbs float noise so `0.095 / 0.1` lands in the 0.95 band
const BAND_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskType {
    Market,
    Liquidity,
    Concentration,
    Credit,
    Operational,
    Model,
}

/// Escalating response to a breached limit, ordered by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskAction {
    None,
    Warning,
    ReducePosition,
    ClosePosition,
    StopTrading,
    EmergencyStop,
}

impl fmt::Display for RiskAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RiskAction::None => "none",
            RiskAction::Warning => "warning",
            RiskAction::ReducePosition => "reduce-position",
            RiskAction::ClosePosition => "close-position",
            RiskAction::StopTrading => "stop-trading",
            RiskAction::EmergencyStop => "emergency-stop",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "WARNING"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Where a limit's value is measured
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskScope {
    Global,
    Strategy(StrategyId),
}

impl RiskScope {
    pub fn strategy_id(&self) -> Option<&StrategyId> {
        match self {
            RiskScope::Global => None,
            RiskScope::Strategy(id) => Some(id),
        }
    }
}

/// Quantity a limit is evaluated against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskMetric {
    /// Gross exposure over total equity
    TotalExposure,
    /// Loss since the first evaluation of the UTC day, as a fraction
    DailyLoss,
    /// Peak-to-current decline of total equity
    Drawdown,
    /// Gross exposure over current equity
    Leverage,
    /// Cash over equity (floor)
    CashRatio,
    /// Largest position over the strategy's equity
    PositionConcentration,
    StrategyDailyLoss,
}

impl RiskMetric {
    /// Floor metrics breach when the value falls below the limit
    pub fn is_floor(&self) -> bool {
        matches!(self, RiskMetric::CashRatio)
    }
}

/// Classification of a value against a limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    Normal,
    Elevated,
    Warning,
    Critical,
}

impl Band {
    pub fn severity(&self) -> Option<Severity> {
        match self {
            Band::Warning => Some(Severity::Warning),
            Band::Critical => Some(Severity::Critical),
            Band::Normal | Band::Elevated => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskLimit {
    pub name: String,
    pub risk_type: RiskType,
    pub metric: RiskMetric,
    pub limit: f64,
    #[serde(default = "default_warning_ratio")]
    pub warning_ratio: f64,
    #[serde(default = "default_critical_ratio")]
    pub critical_ratio: f64,
    #[serde(default = "default_warning_action")]
    pub warning_action: RiskAction,
    pub critical_action: RiskAction,
    pub scope: RiskScope,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_warning_ratio() -> f64 {
    0.8
}

fn default_critical_ratio() -> f64 {
    0.95
}

fn default_warning_action() -> RiskAction {
    RiskAction::Warning
}

fn default_enabled() -> bool {
    true
}

impl RiskLimit {
    pub fn new(
        name: impl Into<String>,
        risk_type: RiskType,
        metric: RiskMetric,
        limit: f64,
        critical_action: RiskAction,
    ) -> Self {
        Self {
            name: name.into(),
            risk_type,
            metric,
            limit,
            warning_ratio: default_warning_ratio(),
            critical_ratio: default_critical_ratio(),
            warning_action: default_warning_action(),
            critical_action,
            scope: RiskScope::Global,
            enabled: true,
        }
    }

    pub fn for_strategy(mut self, strategy_id: impl Into<StrategyId>) -> Self {
        self.scope = RiskScope::Strategy(strategy_id.into());
        self
    }

    pub fn with_ratios(mut self, warning_ratio: f64, critical_ratio: f64) -> Self {
        self.warning_ratio = warning_ratio;
        self.critical_ratio = critical_ratio;
        self
    }

    pub fn with_actions(mut self, warning_action: RiskAction, critical_action: RiskAction) -> Self {
        self.warning_action = warning_action;
        self.critical_action = critical_action;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| RiskError::InvalidLimit {
            name: self.name.clone(),
            reason,
        };
        if !self.limit.is_finite() || self.limit <= 0.0 {
            return Err(invalid(format!("limit must be positive, got {}", self.limit)));
        }
        let ratios_ok = self.warning_ratio > 0.0
            && self.warning_ratio <= self.critical_ratio
            && self.critical_ratio <= 1.0;
        if !ratios_ok {
            return Err(invalid(format!(
                "ratios must satisfy 0 < warning <= critical <= 1, got {}/{}",
                self.warning_ratio, self.critical_ratio
            )));
        }
        Ok(())
    }

    /// Utilisation above which a warning escalates to critical
    pub fn breach_ratio(&self) -> f64 {
        self.critical_ratio + (1.0 - self.critical_ratio) * (1.0 - self.warning_ratio)
    }

    pub fn utilisation(&self, current: f64) -> f64 {
        if self.limit <= 0.0 {
            return 0.0;
        }
        if self.metric.is_floor() {
            if current <= 0.0 {
                f64::INFINITY
            } else {
                self.limit / current
            }
        } else {
            current.max(0.0) / self.limit
        }
    }

    pub fn classify(&self, current: f64) -> Band {
        let u = self.utilisation(current) + BAND_EPSILON;
        if u >= self.breach_ratio() {
            Band::Critical
        } else if u >= self.critical_ratio {
            Band::Warning
        } else if u >= self.warning_ratio {
            Band::Elevated
        } else {
            Band::Normal
        }
    }

    /// Active events resolve once utilisation drops below this
    pub fn recovered(&self, current: f64) -> bool {
        self.utilisation(current) < 0.9
    }

    pub fn action_for(&self, severity: Severity) -> RiskAction {
        match severity {
            Severity::Warning => self.warning_action,
            Severity::Critical => self.critical_action,
        }
    }

    pub fn strategy_id(&self) -> Option<&StrategyId> {
        self.scope.strategy_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limit() -> RiskLimit {
        RiskLimit::new(
            "exposure",
            RiskType::Market,
            RiskMetric::TotalExposure,
            0.1,
            RiskAction::EmergencyStop,
        )
        .with_actions(RiskAction::ReducePosition, RiskAction::EmergencyStop)
    }

    #[test]
    fn test_band_thresholds() {
        let limit = limit();
        assert!((limit.breach_ratio() - 0.96).abs() < 1e-12);

        assert_eq!(limit.classify(0.05), Band::Normal);
        assert_eq!(limit.classify(0.09), Band::Elevated);
        assert_eq!(limit.classify(0.095), Band::Warning);
        assert_eq!(limit.classify(0.096), Band::Critical);
        assert_eq!(limit.classify(0.5), Band::Critical);

        assert_eq!(limit.classify(0.09).severity(), None);
        assert_eq!(
            limit.action_for(Severity::Warning),
            RiskAction::ReducePosition
        );
        assert_eq!(
            limit.action_for(Severity::Critical),
            RiskAction::EmergencyStop
        );
    }

    #[test]
    fn test_floor_metric() {
        let limit = RiskLimit::new(
            "cash",
            RiskType::Liquidity,
            RiskMetric::CashRatio,
            0.1,
            RiskAction::ReducePosition,
        );
        assert_eq!(limit.classify(0.5), Band::Normal);
        // 0.1 / 0.104 = 0.96
        assert_eq!(limit.classify(0.104), Band::Critical);
        assert_eq!(limit.classify(0.0), Band::Critical);
        assert!(limit.recovered(0.2));
        assert!(!limit.recovered(0.11));
    }

    #[test]
    fn test_validate() {
        assert!(limit().validate().is_ok());
        assert!(limit().with_ratios(0.9, 0.8).validate().is_err());

        let mut zero = limit();
        zero.limit = 0.0;
        assert!(matches!(zero.validate(), Err(RiskError::InvalidLimit { .. })));
    }

    #[test]
    fn test_action_ordering() {
        assert!(RiskAction::EmergencyStop > RiskAction::StopTrading);
        assert!(RiskAction::ReducePosition > RiskAction::Warning);
        assert!(Severity::Critical > Severity::Warning);
    }
}
