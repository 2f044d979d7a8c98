use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use signal_core::{PriceBar, SignalError};
use technical_analysis::simple_return;

/// In-memory daily bars keyed by asset, each series sorted by date.
#[derive(Debug, Clone, Default)]
pub struct PriceStore {
    series: BTreeMap<String, Vec<PriceBar>>,
}

impl PriceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_series<I>(series: I) -> Result<Self, SignalError>
    where
        I: IntoIterator<Item = (String, Vec<PriceBar>)>,
    {
        let mut store = Self::new();
        for (asset, bars) in series {
            for bar in bars {
                store.insert(&asset, bar)?;
            }
        }
        Ok(store)
    }

    /// Insert a bar, replacing any existing bar for the same date.
    pub fn insert(&mut self, asset: &str, bar: PriceBar) -> Result<(), SignalError> {
        if !bar.close.is_finite() || bar.close <= 0.0 {
            return Err(SignalError::ContractViolation {
                asset: asset.to_string(),
                date: bar.date,
                field: "close",
                value: bar.close,
                domain: "(0, inf)",
            });
        }
        if !bar.volume.is_finite() || bar.volume < 0.0 {
            return Err(SignalError::ContractViolation {
                asset: asset.to_string(),
                date: bar.date,
                field: "volume",
                value: bar.volume,
                domain: "[0, inf)",
            });
        }

        let bars = self.series.entry(asset.to_string()).or_default();
        match bars.binary_search_by(|b| b.date.cmp(&bar.date)) {
            Ok(i) => bars[i] = bar,
            Err(i) => bars.insert(i, bar),
        }
        Ok(())
    }

    pub fn assets(&self) -> impl Iterator<Item = &str> + '_ {
        self.series.keys().map(String::as_str)
    }

    pub fn history(&self, asset: &str) -> &[PriceBar] {
        self.series.get(asset).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Bars dated strictly before `date`.
    pub fn history_before(&self, asset: &str, date: NaiveDate) -> &[PriceBar] {
        let bars = self.history(asset);
        &bars[..bars.partition_point(|b| b.date < date)]
    }

    pub fn has_history_before(&self, asset: &str, date: NaiveDate) -> bool {
        !self.history_before(asset, date).is_empty()
    }

    /// Assets with at least one close strictly before `date`.
    pub fn universe_before(&self, date: NaiveDate) -> Vec<&str> {
        self.assets()
            .filter(|a| self.has_history_before(a, date))
            .collect()
    }

    pub fn close_on(&self, asset: &str, date: NaiveDate) -> Option<f64> {
        let bars = self.history(asset);
        bars.binary_search_by(|b| b.date.cmp(&date))
            .ok()
            .map(|i| bars[i].close)
    }

    /// `close_t / previous close - 1`; zero when the asset has no bar on
    /// `date` or nothing earlier to compare with.
    pub fn daily_return(&self, asset: &str, date: NaiveDate) -> f64 {
        let bars = self.history(asset);
        match bars.binary_search_by(|b| b.date.cmp(&date)) {
            Ok(i) if i > 0 => simple_return(bars[i - 1].close, bars[i].close).unwrap_or(0.0),
            _ => 0.0,
        }
    }

    /// Sorted union of every asset's bar dates.
    pub fn calendar(&self) -> Vec<NaiveDate> {
        let dates: BTreeSet<NaiveDate> = self
            .series
            .values()
            .flat_map(|bars| bars.iter().map(|b| b.date))
            .collect();
        dates.into_iter().collect()
    }

    /// Calendar days in the half-open interval `(after, through]`.
    pub fn trading_days(&self, after: NaiveDate, through: NaiveDate) -> Vec<NaiveDate> {
        self.calendar()
            .into_iter()
            .filter(|d| *d > after && *d <= through)
            .collect()
    }

    pub fn truncated_through(&self, through: NaiveDate) -> PriceStore {
        PriceStore {
            series: self
                .series
                .iter()
                .map(|(asset, bars)| {
                    let kept: Vec<PriceBar> =
                        bars.iter().filter(|b| b.date <= through).copied().collect();
                    (asset.clone(), kept)
                })
                .filter(|(_, bars)| !bars.is_empty())
                .collect(),
        }
    }
}
