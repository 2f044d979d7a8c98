use chrono::NaiveDate;
use portfolio_manager::PortfolioWeightVector;
use serde::{Deserialize, Serialize};
use signal_core::RankedAssetScore;

use crate::config::EngineConfig;

/// What the portfolio was doing on a rebalance date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebalanceStatus {
    /// Holding the constructed portfolio.
    Invested,
    /// Signals existed but none of those assets had prices before the date.
    NoOverlap,
    /// No signal bundle survived for the date.
    EmptyUniverse,
}

/// Marks each daily return so a cash day is never mistaken for a flat market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnFlag {
    Invested,
    NoOverlap,
    EmptyUniverse,
}

impl From<RebalanceStatus> for ReturnFlag {
    fn from(status: RebalanceStatus) -> Self {
        match status {
            RebalanceStatus::Invested => ReturnFlag::Invested,
            RebalanceStatus::NoOverlap => ReturnFlag::NoOverlap,
            RebalanceStatus::EmptyUniverse => ReturnFlag::EmptyUniverse,
        }
    }
}

/// A single day of the return series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnPoint {
    pub date: NaiveDate,
    /// Net of `transaction_cost`.
    pub value: f64,
    pub flag: ReturnFlag,
    pub transaction_cost: f64,
}

/// Date-ordered daily returns. Only the simulator appends.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReturnSeries {
    points: Vec<ReturnPoint>,
}

impl ReturnSeries {
    pub(crate) fn push(&mut self, point: ReturnPoint) {
        debug_assert!(self.points.last().map_or(true, |p| p.date < point.date));
        self.points.push(point);
    }

    pub fn points(&self) -> &[ReturnPoint] {
        &self.points
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn count_flag(&self, flag: ReturnFlag) -> usize {
        self.points.iter().filter(|p| p.flag == flag).count()
    }

    pub fn total_cost(&self) -> f64 {
        self.points.iter().map(|p| p.transaction_cost).sum()
    }
}

/// Audit entry for one rebalance date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebalanceRecord {
    pub date: NaiveDate,
    pub status: RebalanceStatus,
    pub ranking: Vec<RankedAssetScore>,
    pub weights: PortfolioWeightVector,
    pub turnover: f64,
    /// Turnover exceeded the threshold, so this rebalance incurs one charge.
    pub cost_applied: bool,
    /// Trading days accrued until the next rebalance.
    pub holding_days: usize,
    pub assets_with_news: usize,
    pub propagated_targets: usize,
    /// Contract violations excluded from the ranking.
    pub rejected: Vec<String>,
}

/// Reduction of a return series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub cumulative_return: f64,
    pub sharpe_ratio: f64,
    /// Non-positive; `-0.25` is a 25% peak-to-trough loss.
    pub max_drawdown: f64,
    pub annualized_volatility: f64,
    pub sortino_ratio: Option<f64>,
    pub trading_days: usize,
    pub no_overlap_days: usize,
    pub empty_universe_days: usize,
    pub total_transaction_cost: f64,
    pub rebalance_count: usize,
    pub benchmark_cumulative_return: Option<f64>,
    pub excess_return: Option<f64>,
}

/// Complete output of one simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub label: String,
    pub config: EngineConfig,
    pub returns: ReturnSeries,
    /// Equal weight over the price universe, no costs.
    pub benchmark: ReturnSeries,
    pub rebalances: Vec<RebalanceRecord>,
    pub summary: PerformanceSummary,
}
