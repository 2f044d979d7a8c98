use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use signal_core::{AssetSignalBundle, PriceBar, SignalProvenance};
use statrs::statistics::Statistics;

use crate::indicators::{rsi, simple_return};

pub const DEFAULT_MOMENTUM: f64 = 0.0;
pub const DEFAULT_VOLUME_RATIO: f64 = 1.0;
pub const DEFAULT_OSCILLATOR: f64 = 50.0;

/// Lookback settings for raw technical signals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicalConfig {
    /// Bars required before any non-default signal is produced.
    pub min_observations: usize,
    pub momentum_lookback: usize,
    pub volume_lookback: usize,
    pub volume_recent_window: usize,
    pub rsi_period: usize,
}

impl Default for TechnicalConfig {
    fn default() -> Self {
        Self {
            min_observations: 5,
            momentum_lookback: 20,
            volume_lookback: 20,
            volume_recent_window: 5,
            rsi_period: 14,
        }
    }
}

/// Raw (pre-normalization) technical readings for one asset as of one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalSnapshot {
    pub momentum_ratio: f64,
    pub volume_ratio: f64,
    pub oscillator_value: f64,
    /// Number of bars strictly before the as-of date.
    pub observations: usize,
    pub price_through: Option<NaiveDate>,
    /// True when history was too short and the neutral defaults were used.
    pub defaulted: bool,
}

/// Computes raw technical signals from a price history, seeing only bars
/// dated strictly before the as-of date.
#[derive(Debug, Clone, Default)]
pub struct TechnicalExtractor {
    config: TechnicalConfig,
}

impl TechnicalExtractor {
    pub fn new(config: TechnicalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TechnicalConfig {
        &self.config
    }

    /// `history` must be sorted by date ascending. Bars on or after `as_of`
    /// are ignored, so passing a longer history never changes the result.
    pub fn snapshot(&self, history: &[PriceBar], as_of: NaiveDate) -> TechnicalSnapshot {
        let cutoff = history.partition_point(|b| b.date < as_of);
        let visible = &history[..cutoff];
        let price_through = visible.last().map(|b| b.date);

        if visible.len() < self.config.min_observations.max(2) {
            tracing::debug!(
                observations = visible.len(),
                %as_of,
                "Insufficient price history, using technical defaults"
            );
            return TechnicalSnapshot {
                momentum_ratio: DEFAULT_MOMENTUM,
                volume_ratio: DEFAULT_VOLUME_RATIO,
                oscillator_value: DEFAULT_OSCILLATOR,
                observations: visible.len(),
                price_through,
                defaulted: true,
            };
        }

        let closes: Vec<f64> = visible.iter().map(|b| b.close).collect();
        let volumes: Vec<f64> = visible.iter().map(|b| b.volume).collect();

        TechnicalSnapshot {
            momentum_ratio: self.momentum(&closes),
            volume_ratio: self.volume_ratio(&volumes),
            oscillator_value: rsi(&closes, self.config.rsi_period)
                .last()
                .copied()
                .unwrap_or(DEFAULT_OSCILLATOR),
            observations: visible.len(),
            price_through,
            defaulted: false,
        }
    }

    /// Build a technical-only bundle for `asset` as of `as_of`.
    pub fn bundle(&self, asset: &str, history: &[PriceBar], as_of: NaiveDate) -> AssetSignalBundle {
        let snap = self.snapshot(history, as_of);
        AssetSignalBundle::technical(
            asset,
            as_of,
            snap.momentum_ratio,
            snap.volume_ratio,
            snap.oscillator_value,
        )
        .with_provenance(SignalProvenance {
            price_through: snap.price_through,
            news_through: None,
        })
    }

    /// Bundles for a whole universe, computed in parallel. Output is sorted by asset.
    pub fn bundle_universe(
        &self,
        histories: &[(&str, &[PriceBar])],
        as_of: NaiveDate,
    ) -> Vec<AssetSignalBundle> {
        let mut bundles: Vec<AssetSignalBundle> = histories
            .par_iter()
            .map(|(asset, history)| self.bundle(asset, history, as_of))
            .collect();
        bundles.sort_by(|a, b| a.asset.cmp(&b.asset));
        bundles
    }

    fn momentum(&self, closes: &[f64]) -> f64 {
        let n = closes.len();
        let k = self.config.momentum_lookback.min(n - 1).max(1);
        simple_return(closes[n - 1 - k], closes[n - 1]).unwrap_or(DEFAULT_MOMENTUM)
    }

    fn volume_ratio(&self, volumes: &[f64]) -> f64 {
        let n = volumes.len();
        let recent_len = self.config.volume_recent_window.clamp(1, n);
        let trailing_len = self.config.volume_lookback.clamp(1, n);

        let recent = volumes[n - recent_len..].iter().mean();
        let trailing = volumes[n - trailing_len..].iter().mean();
        if trailing <= 0.0 || !trailing.is_finite() || !recent.is_finite() {
            return DEFAULT_VOLUME_RATIO;
        }
        recent / trailing
    }
}
