//! Cross-strategy comparison

use meridian_core::StrategyId;
use meridian_stats::correlation;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::metrics::PerformanceMetrics;

/// One strategy's place in a ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedStrategy {
    pub strategy_id: StrategyId,
    pub score: f64,
    pub sharpe_ratio: f64,
    pub annual_return: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyComparison {
    /// Row and column order of `correlation`
    pub strategy_ids: Vec<StrategyId>,
    /// Pairwise correlation of period returns, aligned on the latest periods
    pub correlation: Vec<Vec<f64>>,
    /// Highest composite score first
    pub ranking: Vec<RankedStrategy>,
}

/// Inputs for one strategy
pub struct ComparisonInput<'a> {
    pub strategy_id: &'a str,
    pub metrics: &'a PerformanceMetrics,
    pub returns: &'a [f64],
}

fn aligned_correlation(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    correlation(&a[a.len() - n..], &b[b.len() - n..])
}

pub fn compare(inputs: &[ComparisonInput<'_>]) -> StrategyComparison {
    let strategy_ids: Vec<StrategyId> = inputs.iter().map(|i| i.strategy_id.to_string()).collect();

    let correlation = inputs
        .iter()
        .enumerate()
        .map(|(row, a)| {
            inputs
                .iter()
                .enumerate()
                .map(|(col, b)| {
                    if row == col {
                        1.0
                    } else {
                        aligned_correlation(a.returns, b.returns)
                    }
                })
                .collect()
        })
        .collect();

    let mut ranking: Vec<RankedStrategy> = inputs
        .iter()
        .map(|i| RankedStrategy {
            strategy_id: i.strategy_id.to_string(),
            score: i.metrics.composite_score(),
            sharpe_ratio: i.metrics.sharpe_ratio,
            annual_return: i.metrics.annual_return,
            max_drawdown: i.metrics.max_drawdown,
            win_rate: i.metrics.win_rate(),
        })
        .collect();
    ranking.sort_by(|a, b| b.score.total_cmp(&a.score));

    StrategyComparison {
        strategy_ids,
        correlation,
        ranking,
    }
}

impl StrategyComparison {
    pub fn correlation_between(&self, a: &str, b: &str) -> Option<f64> {
        let row = self.strategy_ids.iter().position(|id| id == a)?;
        let col = self.strategy_ids.iter().position(|id| id == b)?;
        Some(self.correlation[row][col])
    }

    pub fn best(&self) -> Option<&RankedStrategy> {
        self.ranking.first()
    }
}

impl fmt::Display for StrategyComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Strategy ranking")?;
        for (rank, entry) in self.ranking.iter().enumerate() {
            writeln!(
                f,
                "  {}. {:<20} score {:>8.4}  sharpe {:>6.2}  annual {:>7.2}%  maxDD {:>6.2}%  win {:>5.1}%",
                rank + 1,
                entry.strategy_id,
                entry.score,
                entry.sharpe_ratio,
                entry.annual_return * 100.0,
                entry.max_drawdown * 100.0,
                entry.win_rate * 100.0
            )?;
        }
        if self.strategy_ids.len() > 1 {
            writeln!(f, "Return correlation")?;
            for (id, row) in self.strategy_ids.iter().zip(&self.correlation) {
                let cells: Vec<String> = row.iter().map(|c| format!("{:>6.2}", c)).collect();
                writeln!(f, "  {:<20} {}", id, cells.join(" "))?;
            }
        }
        Ok(())
    }
}
