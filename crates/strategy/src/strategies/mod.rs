//! Built-in strategies

mod mean_reversion;
mod moving_average;

pub use mean_reversion::{MeanReversion, MeanReversionParams};
pub use moving_average::MovingAverageCross;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use crate::config::StrategyConfig;
use crate::context::StrategyContext;
use crate::error::{Result, StrategyError};
use crate::strategy::Strategy;

/// Kinds understood by [`builtin`]
pub const BUILTIN_KINDS: [&str; 2] = [MovingAverageCross::KIND, MeanReversion::KIND];

/// Build a bundled strategy by kind name
pub fn builtin(kind: &str, config: &StrategyConfig) -> Result<Box<dyn Strategy>> {
    match kind {
        MovingAverageCross::KIND => Ok(Box::new(MovingAverageCross::from_config(config)?)),
        MeanReversion::KIND => Ok(Box::new(MeanReversion::from_config(config)?)),
        other => Err(StrategyError::InvalidConfig(format!(
            "unknown strategy kind '{}'",
            other
        ))),
    }
}

/// Fraction of equity to commit per entry, capped by the position limit
fn entry_fraction(config: &StrategyConfig) -> Decimal {
    let cap = config.max_position_fraction;
    let default = cap * Decimal::new(9, 1);
    config
        .parameters
        .get("position_fraction")
        .and_then(|v| Decimal::from_f64(*v))
        .filter(|v| *v > Decimal::ZERO)
        .map(|v| v.min(cap))
        .unwrap_or(default)
}

/// Whole units affordable with `fraction` of current equity
fn entry_quantity(ctx: &StrategyContext, fraction: Decimal, price: Decimal) -> Decimal {
    if price <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (ctx.equity() * fraction / price).floor()
}

/// Risk rejections are routine for a signal strategy; anything else fails the hook
fn tolerate_rejection<T>(id: &str, result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_rejection() => {
            log::debug!("[{}] {}", id, e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
