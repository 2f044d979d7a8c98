//! Signal Ranking Module
//!
//! Normalizes raw per-asset signals, blends them with relationship-graph
//! propagation under a weight vector, and orders the universe.

pub mod combiner;
pub mod normalizer;
pub mod pipeline;
pub mod weights;

pub use combiner::{SignalCombiner, NEUTRAL_SCORE};
pub use normalizer::{
    normalize_oscillator, normalize_volume, NormalizedPropagated, NormalizerConfig,
    SignalNormalizer,
};
pub use pipeline::{DateRanking, RankingPipeline};
pub use weights::{SignalKind, WeightConfig, WeightPreset, WeightVector};
