use std::collections::{BTreeMap, HashMap, VecDeque};

use rayon::prelude::*;
use signal_core::{NewsScores, PropagatedSignal, Relation, SignalOrigin};

use crate::graph::{RelationshipGraph, MAX_EDGE_TIER};

/// Spreads a primary asset's news scores to related assets with
/// multiplicative decay, bounded at `max_tier` hops.
#[derive(Debug, Clone)]
pub struct SentimentPropagator {
    max_tier: u8,
}

impl Default for SentimentPropagator {
    fn default() -> Self {
        Self { max_tier: MAX_EDGE_TIER }
    }
}

struct Frontier<'a> {
    asset: &'a str,
    tier: u8,
    cumulative_weight: f64,
}

impl SentimentPropagator {
    pub fn new(max_tier: u8) -> Self {
        Self {
            max_tier: max_tier.clamp(1, MAX_EDGE_TIER),
        }
    }

    pub fn max_tier(&self) -> u8 {
        self.max_tier
    }

    /// Breadth-first traversal from `primary_asset`.
    ///
    /// Each target appears at most once, at the lowest tier it can be
    /// reached. A target already reached at an equal or lower tier is never
    /// revisited. An asset with no graph entry yields an empty list.
    pub fn propagate(
        &self,
        primary_asset: &str,
        primary: &NewsScores,
        graph: &RelationshipGraph,
    ) -> Vec<PropagatedSignal> {
        if !graph.contains(primary_asset) {
            tracing::debug!(asset = primary_asset, "No graph entry, nothing to propagate");
            return Vec::new();
        }

        let mut best_tier: HashMap<&str, u8> = HashMap::new();
        best_tier.insert(primary_asset, 0);

        let mut found: Vec<PropagatedSignal> = Vec::new();
        let mut index: HashMap<&str, usize> = HashMap::new();

        let mut queue = VecDeque::new();
        queue.push_back(Frontier {
            asset: primary_asset,
            tier: 0,
            cumulative_weight: 1.0,
        });

        while let Some(node) = queue.pop_front() {
            for edge in graph.neighbors(node.asset) {
                let arrival = node.tier + edge.tier;
                if arrival > self.max_tier {
                    continue;
                }
                let target = edge.target.as_str();
                if best_tier.get(target).is_some_and(|&t| t <= arrival) {
                    continue;
                }
                best_tier.insert(target, arrival);

                let cumulative_weight = node.cumulative_weight * edge.weight_at(arrival);
                let signal = Self::derive(
                    primary_asset,
                    primary,
                    target,
                    arrival,
                    cumulative_weight,
                    edge.relation,
                );
                // A strictly closer path replaces the farther one found earlier.
                match index.get(target) {
                    Some(&i) => found[i] = signal,
                    None => {
                        index.insert(target, found.len());
                        found.push(signal);
                    }
                }

                if arrival < self.max_tier {
                    queue.push_back(Frontier {
                        asset: target,
                        tier: arrival,
                        cumulative_weight,
                    });
                }
            }
        }

        found.sort_by(|a, b| {
            a.tier
                .cmp(&b.tier)
                .then_with(|| a.target_asset.cmp(&b.target_asset))
        });
        found
    }

    /// Propagate every primary in parallel and group the results by target.
    /// Each target's list is ordered by source asset.
    pub fn propagate_all(
        &self,
        primaries: &[(String, NewsScores)],
        graph: &RelationshipGraph,
    ) -> BTreeMap<String, Vec<PropagatedSignal>> {
        let per_primary: Vec<Vec<PropagatedSignal>> = primaries
            .par_iter()
            .map(|(asset, scores)| self.propagate(asset, scores, graph))
            .collect();

        let mut by_target: BTreeMap<String, Vec<PropagatedSignal>> = BTreeMap::new();
        for signal in per_primary.into_iter().flatten() {
            by_target
                .entry(signal.target_asset.clone())
                .or_default()
                .push(signal);
        }
        for list in by_target.values_mut() {
            list.sort_by(|a, b| a.source_asset.cmp(&b.source_asset));
        }
        by_target
    }

    fn derive(
        source: &str,
        primary: &NewsScores,
        target: &str,
        tier: u8,
        cumulative_weight: f64,
        relation: Relation,
    ) -> PropagatedSignal {
        PropagatedSignal {
            target_asset: target.to_string(),
            source_asset: source.to_string(),
            sentiment_score: primary.sentiment_score * cumulative_weight,
            supply_chain_score: primary.supply_chain_score * cumulative_weight,
            tier,
            cumulative_weight,
            relation,
            provenance: SignalOrigin::Propagated,
        }
    }
}
