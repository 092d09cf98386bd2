//! Named strategy groups with proportional capital allocation

use meridian_core::StrategyId;
use meridian_strategy::StrategyConfig;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::error::{Result, SystemError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupState {
    Created,
    Running,
    Stopped,
}

impl fmt::Display for GroupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupState::Created => write!(f, "created"),
            GroupState::Running => write!(f, "running"),
            GroupState::Stopped => write!(f, "stopped"),
        }
    }
}

/// One strategy in a group. Its `initial_capital` is overwritten by the
/// group's allocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMember {
    pub kind: String,
    pub config: StrategyConfig,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

impl GroupMember {
    pub fn new(kind: impl Into<String>, config: StrategyConfig, weight: f64) -> Self {
        Self {
            kind: kind.into(),
            config,
            weight,
        }
    }
}

/// Group definition as it appears in a system config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupConfig {
    pub name: String,
    pub total_capital: Decimal,
    pub members: Vec<GroupMember>,
    /// Start the members as soon as the system starts
    #[serde(default)]
    pub auto_start: bool,
}

impl GroupConfig {
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| {
            Err(SystemError::InvalidGroup {
                name: self.name.clone(),
                reason,
            })
        };

        if self.name.trim().is_empty() {
            return invalid("name must not be empty".to_string());
        }
        if self.total_capital <= Decimal::ZERO {
            return invalid(format!("total capital {} must be positive", self.total_capital));
        }
        if self.members.is_empty() {
            return invalid("at least one member required".to_string());
        }
        let mut ids = HashSet::new();
        for member in &self.members {
            if !member.weight.is_finite() || member.weight <= 0.0 {
                return invalid(format!(
                    "member {} has non-positive weight {}",
                    member.config.id, member.weight
                ));
            }
            if !ids.insert(member.config.id.as_str()) {
                return invalid(format!("duplicate member {}", member.config.id));
            }
        }
        Ok(())
    }

    /// Capital per member: `total · weight / Σ weights`, in member order.
    /// Any rounding remainder goes to the last member so the parts sum to the total.
    pub fn allocations(&self) -> Vec<(StrategyId, Decimal)> {
        let total_weight: f64 = self.members.iter().map(|m| m.weight).sum();
        if self.members.is_empty() || total_weight <= 0.0 {
            return Vec::new();
        }

        let mut allocated = Decimal::ZERO;
        let last = self.members.len() - 1;
        self.members
            .iter()
            .enumerate()
            .map(|(i, member)| {
                let capital = if i == last {
                    self.total_capital - allocated
                } else {
                    let share = Decimal::from_f64(member.weight / total_weight)
                        .unwrap_or(Decimal::ZERO);
                    (self.total_capital * share).round_dp(2)
                };
                allocated += capital;
                (member.config.id.clone(), capital)
            })
            .collect()
    }

    /// Member configs with their allocated capital applied
    pub fn member_configs(&self) -> Vec<(String, StrategyConfig)> {
        self.allocations()
            .into_iter()
            .zip(&self.members)
            .map(|((_, capital), member)| {
                (member.kind.clone(), member.config.clone().with_capital(capital))
            })
            .collect()
    }
}

/// A created group as tracked by the system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyGroup {
    pub name: String,
    pub total_capital: Decimal,
    pub allocations: Vec<(StrategyId, Decimal)>,
    pub state: GroupState,
}

impl StrategyGroup {
    pub fn from_config(config: &GroupConfig) -> Self {
        Self {
            name: config.name.clone(),
            total_capital: config.total_capital,
            allocations: config.allocations(),
            state: GroupState::Created,
        }
    }

    pub fn member_ids(&self) -> Vec<StrategyId> {
        self.allocations.iter().map(|(id, _)| id.clone()).collect()
    }
}

impl fmt::Display for StrategyGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] capital {}:", self.name, self.state, self.total_capital)?;
        for (id, capital) in &self.allocations {
            write!(f, " {}={}", id, capital)?;
        }
        Ok(())
    }
}
