use std::collections::BTreeMap;

use chrono::NaiveDate;
use signal_core::{sort_ranking, NewsField, NormalizedSignalBundle, RankedAssetScore};

use crate::normalizer::NormalizedPropagated;
use crate::weights::{SignalKind, WeightVector};

/// Score assigned when every weight is zero.
pub const NEUTRAL_SCORE: f64 = 0.5;

/// Blends normalized direct and propagated signals into one rank score.
///
/// Every weighted signal contributes for every asset. A missing signal feeds
/// its sentinel instead of dropping out, so weights are never renormalized
/// per asset and scores stay comparable across the universe.
#[derive(Debug, Clone, Default)]
pub struct SignalCombiner;

impl SignalCombiner {
    pub fn new() -> Self {
        Self
    }

    pub fn combine(
        &self,
        asset: &str,
        date: NaiveDate,
        direct: &NormalizedSignalBundle,
        propagated: &[NormalizedPropagated],
        weights: &WeightVector,
    ) -> RankedAssetScore {
        let combined_score = match weights.normalized() {
            Some(w) => Self::weighted_sum(direct, propagated, &w),
            None => NEUTRAL_SCORE,
        };
        RankedAssetScore {
            asset: asset.to_string(),
            date,
            combined_score,
        }
    }

    /// Score and order a whole universe for one date.
    pub fn rank(
        &self,
        date: NaiveDate,
        direct: &[NormalizedSignalBundle],
        propagated: &BTreeMap<String, Vec<NormalizedPropagated>>,
        weights: &WeightVector,
    ) -> Vec<RankedAssetScore> {
        let normalized = weights.normalized();
        if normalized.is_none() {
            tracing::debug!(%date, "All signal weights are zero, every asset scores neutral");
        }

        let mut scores: Vec<RankedAssetScore> = direct
            .iter()
            .map(|bundle| {
                let props = propagated
                    .get(&bundle.asset)
                    .map(Vec::as_slice)
                    .unwrap_or(&[]);
                RankedAssetScore {
                    asset: bundle.asset.clone(),
                    date,
                    combined_score: match &normalized {
                        Some(w) => Self::weighted_sum(bundle, props, w),
                        None => NEUTRAL_SCORE,
                    },
                }
            })
            .collect();
        sort_ranking(&mut scores);
        scores
    }

    /// Input value of one signal for one asset.
    pub fn signal_input(
        kind: SignalKind,
        direct: &NormalizedSignalBundle,
        propagated: &[NormalizedPropagated],
    ) -> f64 {
        match kind {
            SignalKind::Momentum => direct.momentum,
            SignalKind::Volume => direct.volume,
            SignalKind::Oscillator => direct.oscillator,
            SignalKind::SupplyChain => direct.supply_chain.combiner_input(),
            SignalKind::Sentiment => direct.sentiment.combiner_input(),
            SignalKind::PropagatedSentiment => propagated_mean(propagated, |p| p.sentiment),
            SignalKind::PropagatedSupplyChain => propagated_mean(propagated, |p| p.supply_chain),
        }
    }

    fn weighted_sum(
        direct: &NormalizedSignalBundle,
        propagated: &[NormalizedPropagated],
        weights: &WeightVector,
    ) -> f64 {
        let score: f64 = weights
            .iter()
            .map(|(kind, w)| w * Self::signal_input(kind, direct, propagated))
            .sum();
        score.clamp(0.0, 1.0)
    }
}

/// Mean of the propagated values weighted by path strength; the absence
/// sentinel when nothing reached the asset.
fn propagated_mean<F>(propagated: &[NormalizedPropagated], value: F) -> f64
where
    F: Fn(&NormalizedPropagated) -> f64,
{
    let total_weight: f64 = propagated.iter().map(|p| p.cumulative_weight).sum();
    if total_weight <= 0.0 {
        return NewsField::ABSENT_SENTINEL;
    }
    propagated
        .iter()
        .map(|p| p.cumulative_weight * value(p))
        .sum::<f64>()
        / total_weight
}
