//! Signal normalization
//!
//! Maps every raw signal onto `[0, 1]` with a fixed curve per signal type.
//! Out-of-domain inputs are reported, never clamped.

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use signal_core::{
    AssetSignalBundle, NewsField, NormalizedSignalBundle, PropagatedSignal, SignalError,
};

const VOLUME_LOW_ANCHOR: f64 = 0.5; // maps to 0.0
const VOLUME_HIGH_ANCHOR: f64 = 3.0; // maps to 1.0
const OSCILLATOR_FLOOR: f64 = 30.0;
const OSCILLATOR_CEILING: f64 = 70.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizerConfig {
    /// Momentum is multiplied by this before the tanh squash.
    pub momentum_scale: f64,
    /// Sentiment magnitudes below this carry no signal.
    pub sentiment_epsilon: f64,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            momentum_scale: 5.0,
            sentiment_epsilon: 0.001,
        }
    }
}

/// A propagated signal rescaled for the combiner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPropagated {
    pub source_asset: String,
    pub tier: u8,
    pub cumulative_weight: f64,
    pub sentiment: f64,
    pub supply_chain: f64,
}

#[derive(Debug, Clone, Default)]
pub struct SignalNormalizer {
    config: NormalizerConfig,
}

impl SignalNormalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Normalize one bundle. Pure; safe to call concurrently.
    pub fn normalize(&self, bundle: &AssetSignalBundle) -> Result<NormalizedSignalBundle, SignalError> {
        let check = FieldCheck {
            asset: &bundle.asset,
            date: bundle.date,
        };

        let momentum_ratio = check.finite("momentum_ratio", bundle.momentum_ratio)?;
        let volume_ratio = check.range("volume_ratio", bundle.volume_ratio, 0.0, f64::INFINITY, "[0, inf)")?;
        let oscillator = check.range("oscillator_value", bundle.oscillator_value, 0.0, 100.0, "[0, 100]")?;

        let (supply_chain, sentiment, confidence) = match &bundle.news {
            None => (NewsField::Absent, NewsField::Absent, NewsField::Absent),
            Some(news) => {
                let sc = check.range("supply_chain_score", news.supply_chain_score, 0.0, 1.0, "[0, 1]")?;
                let s = check.range("sentiment_score", news.sentiment_score, -1.0, 1.0, "[-1, 1]")?;
                let c = check.range("confidence", news.confidence, 0.0, 1.0, "[0, 1]")?;
                (
                    NewsField::Measured { raw: sc, normalized: sc },
                    self.sentiment_field(s),
                    NewsField::Measured { raw: c, normalized: c },
                )
            }
        };

        Ok(NormalizedSignalBundle {
            asset: bundle.asset.clone(),
            date: bundle.date,
            momentum: self.normalize_momentum(momentum_ratio),
            volume: normalize_volume(volume_ratio),
            oscillator: normalize_oscillator(oscillator),
            supply_chain,
            sentiment,
            confidence,
        })
    }

    /// Normalize a universe in parallel. Valid bundles come back sorted by
    /// asset; contract violations are returned alongside instead of aborting.
    pub fn normalize_universe(
        &self,
        bundles: &[AssetSignalBundle],
    ) -> (Vec<NormalizedSignalBundle>, Vec<SignalError>) {
        let results: Vec<Result<NormalizedSignalBundle, SignalError>> =
            bundles.par_iter().map(|b| self.normalize(b)).collect();

        let mut ok = Vec::with_capacity(results.len());
        let mut rejected = Vec::new();
        for r in results {
            match r {
                Ok(n) => ok.push(n),
                Err(e) => rejected.push(e),
            }
        }
        ok.sort_by(|a, b| a.asset.cmp(&b.asset));
        (ok, rejected)
    }

    /// `0.5 + 0.5 * tanh(scale * ratio)`: flat momentum sits at the midpoint
    /// and large moves saturate.
    pub fn normalize_momentum(&self, ratio: f64) -> f64 {
        (0.5 + 0.5 * (ratio * self.config.momentum_scale).tanh()).clamp(0.0, 1.0)
    }

    /// Scalar sentiment rule: `|s| < epsilon` carries no signal and maps to
    /// 0.0; everything else maps affinely from `[-1, 1]`.
    pub fn normalize_sentiment_value(&self, sentiment: f64) -> f64 {
        if sentiment.abs() < self.config.sentiment_epsilon {
            return NewsField::ABSENT_SENTINEL;
        }
        affine_sentiment(sentiment)
    }

    fn sentiment_field(&self, raw: f64) -> NewsField {
        let normalized = affine_sentiment(raw);
        if raw.abs() < self.config.sentiment_epsilon {
            NewsField::Negligible { raw, normalized }
        } else {
            NewsField::Measured { raw, normalized }
        }
    }

    pub fn normalize_propagated(&self, signal: &PropagatedSignal) -> NormalizedPropagated {
        NormalizedPropagated {
            source_asset: signal.source_asset.clone(),
            tier: signal.tier,
            cumulative_weight: signal.cumulative_weight,
            sentiment: self.normalize_sentiment_value(signal.sentiment_score),
            supply_chain: signal.supply_chain_score.clamp(0.0, 1.0),
        }
    }
}

/// Piecewise log remap anchored at `0.5 -> 0.0`, `1.0 -> 0.5`, `3.0 -> 1.0`.
/// A ratio of exactly 1.0 (the upstream "no volume data" value) lands at 0.5.
pub fn normalize_volume(ratio: f64) -> f64 {
    if ratio <= 0.0 {
        return 0.0;
    }
    let ln = ratio.ln();
    let scaled = if ratio <= 1.0 {
        0.5 + 0.5 * ln / (1.0 / VOLUME_LOW_ANCHOR).ln()
    } else {
        0.5 + 0.5 * ln / VOLUME_HIGH_ANCHOR.ln()
    };
    scaled.clamp(0.0, 1.0)
}

/// Affine remap of a 0-100 oscillator: 30 and below -> 0.0, 70 and above -> 1.0.
pub fn normalize_oscillator(value: f64) -> f64 {
    ((value - OSCILLATOR_FLOOR) / (OSCILLATOR_CEILING - OSCILLATOR_FLOOR)).clamp(0.0, 1.0)
}

fn affine_sentiment(sentiment: f64) -> f64 {
    ((sentiment + 1.0) / 2.0).clamp(0.0, 1.0)
}

struct FieldCheck<'a> {
    asset: &'a str,
    date: NaiveDate,
}

impl FieldCheck<'_> {
    fn violation(&self, field: &'static str, value: f64, domain: &'static str) -> SignalError {
        SignalError::ContractViolation {
            asset: self.asset.to_string(),
            date: self.date,
            field,
            value,
            domain,
        }
    }

    fn finite(&self, field: &'static str, value: f64) -> Result<f64, SignalError> {
        if value.is_finite() {
            Ok(value)
        } else {
            Err(self.violation(field, value, "finite"))
        }
    }

    fn range(
        &self,
        field: &'static str,
        value: f64,
        lo: f64,
        hi: f64,
        domain: &'static str,
    ) -> Result<f64, SignalError> {
        if value.is_finite() && value >= lo && value <= hi {
            Ok(value)
        } else {
            Err(self.violation(field, value, domain))
        }
    }
}
