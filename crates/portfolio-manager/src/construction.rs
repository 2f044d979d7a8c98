use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use signal_core::RankedAssetScore;

use crate::models::*;

pub struct PortfolioConstructor;

impl PortfolioConstructor {
    /// Build the weight vector for `date` from an already ordered ranking.
    ///
    /// Takes the first `top_n` distinct assets; a repeated asset keeps only
    /// its first row. A proportional split over scores that sum to zero falls
    /// back to equal weighting.
    pub fn construct(
        date: NaiveDate,
        ranked: &[RankedAssetScore],
        top_n: usize,
        method: AllocationMethod,
    ) -> PortfolioWeightVector {
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        let mut selected: Vec<&RankedAssetScore> = Vec::with_capacity(top_n.min(ranked.len()));
        for r in ranked {
            if selected.len() == top_n {
                break;
            }
            if seen.insert(r.asset.as_str()) {
                selected.push(r);
            } else {
                tracing::warn!(%date, asset = %r.asset, "Asset ranked twice, keeping its first row");
            }
        }
        if selected.is_empty() {
            return PortfolioWeightVector::cash(date);
        }

        let score_sum: f64 = selected.iter().map(|r| r.combined_score.max(0.0)).sum();
        let applied = match method {
            AllocationMethod::Proportional if score_sum <= 0.0 => {
                tracing::debug!(
                    %date,
                    selected = selected.len(),
                    "Selected scores sum to zero, falling back to equal weights"
                );
                AllocationMethod::Equal
            }
            m => m,
        };

        let weights: BTreeMap<String, f64> = match applied {
            AllocationMethod::Proportional => selected
                .iter()
                .map(|r| (r.asset.clone(), r.combined_score.max(0.0) / score_sum))
                .collect(),
            AllocationMethod::Equal => {
                let w = 1.0 / selected.len() as f64;
                selected.iter().map(|r| (r.asset.clone(), w)).collect()
            }
        };

        PortfolioWeightVector::new(date, applied, weights)
    }
}
