//! Relationship graph snapshot
//!
//! Directed supplier/customer/competitor edges keyed by asset identifier.
//! The graph is curated elsewhere; here it is only validated on load and
//! read during propagation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use signal_core::{Relation, SignalError};

/// Weight applied to a hop arriving at tier 2 that carries no weight information.
pub const DEFAULT_TIER2_DECAY: f64 = 0.2;
/// Weight applied to a hop arriving at tier 1 that carries no weight information.
pub const DEFAULT_TIER1_WEIGHT: f64 = 0.5;
pub const MAX_EDGE_TIER: u8 = 2;

/// Curation confidence, used when revenue concentration is not disclosed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
}

impl ConfidenceTier {
    pub fn edge_weight(self) -> f64 {
        match self {
            ConfidenceTier::High => 0.7,
            ConfidenceTier::Medium => 0.5,
            ConfidenceTier::Low => 0.3,
        }
    }
}

/// Edge weight from disclosed revenue concentration, given as a fraction
/// of the source's revenue (0.25 = 25%).
pub fn revenue_concentration_weight(share: f64) -> f64 {
    if share >= 0.20 {
        0.8
    } else if share >= 0.10 {
        0.5
    } else if share >= 0.05 {
        0.3
    } else {
        0.2
    }
}

/// One outgoing edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub target: String,
    pub relation: Relation,
    /// Distance this edge spans: 1 = direct, 2 = curated second-order link.
    pub tier: u8,
    /// Explicit weight; overrides the revenue and confidence policies.
    pub weight: Option<f64>,
    pub revenue_share: Option<f64>,
    pub confidence: Option<ConfidenceTier>,
}

impl Relationship {
    pub fn direct(target: impl Into<String>, relation: Relation, weight: f64) -> Self {
        Self {
            target: target.into(),
            relation,
            tier: 1,
            weight: Some(weight),
            revenue_share: None,
            confidence: None,
        }
    }

    /// Weight the edge itself carries: explicit, then revenue policy, then
    /// confidence policy. `None` when the edge has no weight information.
    pub fn explicit_weight(&self) -> Option<f64> {
        self.weight
            .or_else(|| self.revenue_share.map(revenue_concentration_weight))
            .or_else(|| self.confidence.map(ConfidenceTier::edge_weight))
    }

    /// Weight used when the traversal reaches this edge's target at
    /// `arrival_tier`. Edges without weight information take the default of
    /// the tier they land on, so every weightless second hop decays by 0.2.
    pub fn weight_at(&self, arrival_tier: u8) -> f64 {
        self.explicit_weight().unwrap_or(if arrival_tier >= 2 {
            DEFAULT_TIER2_DECAY
        } else {
            DEFAULT_TIER1_WEIGHT
        })
    }
}

/// Flat, serde-friendly edge record used when loading a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub relation: Relation,
    #[serde(default = "default_tier")]
    pub tier: u8,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub revenue_share: Option<f64>,
    #[serde(default)]
    pub confidence: Option<ConfidenceTier>,
}

fn default_tier() -> u8 {
    1
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelationshipGraph {
    edges: BTreeMap<String, Vec<Relationship>>,
}

impl RelationshipGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_edges<I>(edges: I) -> Result<Self, SignalError>
    where
        I: IntoIterator<Item = GraphEdge>,
    {
        let mut graph = Self::new();
        for e in edges {
            graph.add_edge(
                &e.source,
                Relationship {
                    target: e.target,
                    relation: e.relation,
                    tier: e.tier,
                    weight: e.weight,
                    revenue_share: e.revenue_share,
                    confidence: e.confidence,
                },
            )?;
        }
        Ok(graph)
    }

    /// Add an edge. A second edge with the same target and relation replaces
    /// the first. Neighbor lists stay sorted by (tier, target, relation) so
    /// traversal order does not depend on load order.
    pub fn add_edge(&mut self, source: &str, edge: Relationship) -> Result<(), SignalError> {
        if source == edge.target {
            return Err(SignalError::InvalidGraph(format!(
                "self-loop on {}",
                source
            )));
        }
        if edge.tier == 0 || edge.tier > MAX_EDGE_TIER {
            return Err(SignalError::InvalidGraph(format!(
                "edge {} -> {} has tier {}, expected 1..={}",
                source, edge.target, edge.tier, MAX_EDGE_TIER
            )));
        }
        if let Some(w) = edge.weight {
            if !(0.0..=1.0).contains(&w) {
                return Err(SignalError::InvalidGraph(format!(
                    "edge {} -> {} has weight {} outside [0, 1]",
                    source, edge.target, w
                )));
            }
        }
        if let Some(share) = edge.revenue_share {
            if !(0.0..=1.0).contains(&share) {
                return Err(SignalError::InvalidGraph(format!(
                    "edge {} -> {} has revenue share {} outside [0, 1]",
                    source, edge.target, share
                )));
            }
        }

        let list = self.edges.entry(source.to_string()).or_default();
        if let Some(existing) = list
            .iter_mut()
            .find(|r| r.target == edge.target && r.relation == edge.relation)
        {
            tracing::debug!(source, target = %edge.target, "Replacing duplicate edge");
            *existing = edge;
        } else {
            list.push(edge);
        }
        list.sort_by(|a, b| {
            a.tier
                .cmp(&b.tier)
                .then_with(|| a.target.cmp(&b.target))
                .then_with(|| a.relation.cmp(&b.relation))
        });
        Ok(())
    }

    pub fn neighbors(&self, asset: &str) -> &[Relationship] {
        self.edges.get(asset).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, asset: &str) -> bool {
        self.edges.contains_key(asset)
    }

    pub fn source_count(&self) -> usize {
        self.edges.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(Vec::len).sum()
    }
}
