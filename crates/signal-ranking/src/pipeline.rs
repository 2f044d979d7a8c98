//! Per-date ranking: normalize, propagate, combine.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use sentiment_propagation::{RelationshipGraph, SentimentPropagator};
use serde::{Deserialize, Serialize};
use signal_core::{AssetSignalBundle, NewsScores, RankedAssetScore, SignalError};

use crate::combiner::SignalCombiner;
use crate::normalizer::{NormalizedPropagated, NormalizerConfig, SignalNormalizer};
use crate::weights::WeightVector;

/// Outcome of ranking one rebalance date
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateRanking {
    pub date: NaiveDate,
    pub ranking: Vec<RankedAssetScore>,
    /// Bundles excluded for contract violations.
    #[serde(skip)]
    pub rejected: Vec<SignalError>,
    pub assets_with_news: usize,
    pub propagated_targets: usize,
}

#[derive(Debug, Clone, Default)]
pub struct RankingPipeline {
    normalizer: SignalNormalizer,
    propagator: SentimentPropagator,
    combiner: SignalCombiner,
}

impl RankingPipeline {
    pub fn new(config: NormalizerConfig, max_tier: u8) -> Self {
        Self {
            normalizer: SignalNormalizer::new(config),
            propagator: SentimentPropagator::new(max_tier),
            combiner: SignalCombiner::new(),
        }
    }

    pub fn normalizer(&self) -> &SignalNormalizer {
        &self.normalizer
    }

    /// Rank every valid bundle for `date`. `graph` is only read.
    ///
    /// Only bundles that pass normalization act as propagation sources, so a
    /// rejected bundle cannot leak into its neighbours' scores. An asset with
    /// more than one bundle is rejected outright: none of its copies is
    /// ranked or propagated.
    pub fn rank(
        &self,
        date: NaiveDate,
        bundles: &[AssetSignalBundle],
        graph: &RelationshipGraph,
        weights: &WeightVector,
    ) -> DateRanking {
        let (unique, mut rejected) = split_duplicates(date, bundles);
        let (normalized, invalid) = self.normalizer.normalize_universe(&unique);
        rejected.extend(invalid);
        for err in &rejected {
            tracing::warn!(%date, error = %err, "Rejected signal bundle");
        }

        let valid: std::collections::HashSet<&str> =
            normalized.iter().map(|n| n.asset.as_str()).collect();
        let mut primaries: Vec<(String, NewsScores)> = unique
            .iter()
            .filter(|b| valid.contains(b.asset.as_str()))
            .filter_map(|b| b.news.map(|n| (b.asset.clone(), n)))
            .collect();
        primaries.sort_by(|a, b| a.0.cmp(&b.0));

        let propagated: BTreeMap<String, Vec<NormalizedPropagated>> = self
            .propagator
            .propagate_all(&primaries, graph)
            .into_iter()
            .map(|(target, signals)| {
                let list = signals
                    .iter()
                    .map(|s| self.normalizer.normalize_propagated(s))
                    .collect();
                (target, list)
            })
            .collect();

        let ranking = self.combiner.rank(date, &normalized, &propagated, weights);
        tracing::debug!(
            %date,
            ranked = ranking.len(),
            primaries = primaries.len(),
            propagated_targets = propagated.len(),
            "Ranked universe"
        );

        DateRanking {
            date,
            ranking,
            rejected,
            assets_with_news: primaries.len(),
            propagated_targets: propagated.len(),
        }
    }
}

/// Partition `bundles` into assets with exactly one bundle and one
/// `DuplicateBundle` error per asset that has several.
fn split_duplicates(
    date: NaiveDate,
    bundles: &[AssetSignalBundle],
) -> (Vec<AssetSignalBundle>, Vec<SignalError>) {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for b in bundles {
        *counts.entry(b.asset.as_str()).or_default() += 1;
    }
    let unique = bundles
        .iter()
        .filter(|b| counts.get(b.asset.as_str()) == Some(&1))
        .cloned()
        .collect();
    let duplicates = counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(asset, count)| SignalError::DuplicateBundle {
            asset: asset.to_string(),
            date,
            count,
        })
        .collect();
    (unique, duplicates)
}
