//! Signal assembly for a rebalance date.
//!
//! Everything handed to the simulator goes through [`SignalSource`]. The
//! point-in-time source reads prices strictly before the date and news from
//! the trailing window ending on it, so a store that keeps growing never
//! changes a past date's bundles.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use rayon::prelude::*;
use signal_core::{AssetSignalBundle, NewsScoreProvider, NewsWindow, SignalError};
use technical_analysis::TechnicalExtractor;

use crate::price_store::PriceStore;

/// Supplies the signal bundles for one rebalance date.
pub trait SignalSource: Send + Sync {
    /// Bundles for `date`, one per asset. Must not observe anything the
    /// cutoff rule forbids; the simulator rejects bundles that do.
    fn bundles(&self, date: NaiveDate) -> Result<Vec<AssetSignalBundle>, SignalError>;
}

/// Pre-materialized bundles keyed by date.
#[derive(Debug, Clone, Default)]
pub struct StaticSignalSource {
    by_date: BTreeMap<NaiveDate, Vec<AssetSignalBundle>>,
}

impl StaticSignalSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bundles<I>(bundles: I) -> Self
    where
        I: IntoIterator<Item = AssetSignalBundle>,
    {
        let mut source = Self::new();
        for b in bundles {
            source.insert(b);
        }
        source
    }

    /// Appends; a second bundle for the same asset and date is rejected at ranking.
    pub fn insert(&mut self, bundle: AssetSignalBundle) {
        self.by_date.entry(bundle.date).or_default().push(bundle);
    }
}

impl SignalSource for StaticSignalSource {
    fn bundles(&self, date: NaiveDate) -> Result<Vec<AssetSignalBundle>, SignalError> {
        Ok(self.by_date.get(&date).cloned().unwrap_or_default())
    }
}

/// Builds bundles from a price store and a news collaborator.
pub struct PointInTimeSignalSource {
    prices: Arc<PriceStore>,
    news: Arc<dyn NewsScoreProvider>,
    extractor: TechnicalExtractor,
    news_lookback_days: i64,
}

impl PointInTimeSignalSource {
    pub fn new(
        prices: Arc<PriceStore>,
        news: Arc<dyn NewsScoreProvider>,
        extractor: TechnicalExtractor,
        news_lookback_days: i64,
    ) -> Self {
        Self {
            prices,
            news,
            extractor,
            news_lookback_days,
        }
    }

    pub fn news_window(&self, date: NaiveDate) -> NewsWindow {
        NewsWindow::trailing(date, self.news_lookback_days)
    }
}

impl SignalSource for PointInTimeSignalSource {
    /// One bundle per asset with at least one close before `date`, sorted by asset.
    fn bundles(&self, date: NaiveDate) -> Result<Vec<AssetSignalBundle>, SignalError> {
        let histories: Vec<(&str, &[signal_core::PriceBar])> = self
            .prices
            .universe_before(date)
            .into_iter()
            .map(|asset| (asset, self.prices.history_before(asset, date)))
            .collect();
        let technical = self.extractor.bundle_universe(&histories, date);

        let window = self.news_window(date);
        let mut bundles = technical
            .into_par_iter()
            .map(|bundle| -> Result<AssetSignalBundle, SignalError> {
                let reading = self.news.scores(&bundle.asset, &window)?;
                Ok(match reading {
                    Some(r) => {
                        let mut provenance = bundle.provenance;
                        provenance.news_through = Some(r.latest_article);
                        bundle.with_news(r.scores).with_provenance(provenance)
                    }
                    None => bundle,
                })
            })
            .collect::<Result<Vec<AssetSignalBundle>, SignalError>>()?;
        bundles.sort_by(|a, b| a.asset.cmp(&b.asset));

        tracing::debug!(
            %date,
            assets = bundles.len(),
            with_news = bundles.iter().filter(|b| b.news.is_some()).count(),
            "Assembled point-in-time signals"
        );
        Ok(bundles)
    }
}
