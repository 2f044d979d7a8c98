//! Relationship-graph sentiment propagation
//!
//! A primary asset's news-derived scores are pushed to its suppliers,
//! customers and competitors, decaying multiplicatively with every hop.

pub mod graph;
pub mod propagator;

pub use graph::{
    revenue_concentration_weight, ConfidenceTier, GraphEdge, Relationship, RelationshipGraph,
    DEFAULT_TIER1_WEIGHT, DEFAULT_TIER2_DECAY, MAX_EDGE_TIER,
};
pub use propagator::SentimentPropagator;
