use chrono::{DateTime, Utc};
use meridian_core::{StrategyId, Symbol};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::limits::{RiskAction, RiskLimit, RiskType, Severity};

/// Record of a limit entering the warning or critical band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskEvent {
    pub id: Uuid,
    pub limit_name: String,
    pub risk_type: RiskType,
    pub severity: Severity,
    pub strategy_id: Option<StrategyId>,
    pub symbol: Option<Symbol>,
    pub value: f64,
    pub limit: f64,
    pub action: RiskAction,
    pub created_at: DateTime<Utc>,
    /// Set once the metric recovers below 90% of the limit
    pub resolved_at: Option<DateTime<Utc>>,
}

impl RiskEvent {
    pub fn new(
        limit: &RiskLimit,
        severity: Severity,
        value: f64,
        symbol: Option<Symbol>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            limit_name: limit.name.clone(),
            risk_type: limit.risk_type,
            severity,
            strategy_id: limit.strategy_id().cloned(),
            symbol,
            value,
            limit: limit.limit,
            action: limit.action_for(severity),
            created_at,
            resolved_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.resolved_at.is_none()
    }

    pub fn resolve(&mut self, timestamp: DateTime<Utc>) {
        if self.resolved_at.is_none() {
            self.resolved_at = Some(timestamp);
        }
    }
}

impl fmt::Display for RiskEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {:.4}/{:.4} action={}",
            self.severity, self.limit_name, self.value, self.limit, self.action
        )?;
        if let Some(id) = &self.strategy_id {
            write!(f, " strategy={}", id)?;
        }
        if let Some(symbol) = &self.symbol {
            write!(f, " symbol={}", symbol)?;
        }
        if let Some(resolved) = self.resolved_at {
            write!(f, " resolved={}", resolved.format("%Y-%m-%d %H:%M:%S"))?;
        }
        Ok(())
    }
}
