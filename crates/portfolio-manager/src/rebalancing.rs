use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::models::*;

/// One asset's move between two weight snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightChange {
    pub asset: String,
    pub previous_weight: f64,
    pub target_weight: f64,
    pub drift: f64,
}

pub struct RebalanceCalculator;

impl RebalanceCalculator {
    /// Aggregate absolute weight change, `sum |w_new - w_old|` over the union
    /// of both holdings.
    pub fn turnover(previous: &PortfolioWeightVector, target: &PortfolioWeightVector) -> f64 {
        Self::changes(previous, target)
            .iter()
            .map(|c| c.drift.abs())
            .sum()
    }

    /// Whether moving to `target` trades more than `threshold` in aggregate.
    pub fn needs_rebalance(
        previous: &PortfolioWeightVector,
        target: &PortfolioWeightVector,
        threshold: f64,
    ) -> bool {
        Self::turnover(previous, target) > threshold
    }

    /// Per-asset changes, ordered by asset. Unchanged assets are omitted.
    pub fn changes(
        previous: &PortfolioWeightVector,
        target: &PortfolioWeightVector,
    ) -> Vec<WeightChange> {
        let assets: BTreeSet<&str> = previous.assets().chain(target.assets()).collect();
        assets
            .into_iter()
            .filter_map(|asset| {
                let previous_weight = previous.weight(asset);
                let target_weight = target.weight(asset);
                let drift = target_weight - previous_weight;
                (drift != 0.0).then(|| WeightChange {
                    asset: asset.to_string(),
                    previous_weight,
                    target_weight,
                    drift,
                })
            })
            .collect()
    }
}
