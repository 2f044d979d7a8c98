use std::cmp::Ordering;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily close/volume observation for one asset
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    pub fn new(date: NaiveDate, close: f64, volume: f64) -> Self {
        Self { date, close, volume }
    }
}

/// Health/sentiment pair produced by the LLM collaborator for one asset
/// over one news window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NewsScores {
    pub supply_chain_score: f64, // 0.0 to 1.0
    pub sentiment_score: f64,    // -1.0 to 1.0
    pub confidence: f64,         // 0.0 to 1.0
}

/// Latest observation timestamps that went into a bundle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalProvenance {
    /// Date of the most recent price bar used for the technical fields.
    pub price_through: Option<NaiveDate>,
    /// Date of the most recent article behind the news fields.
    pub news_through: Option<NaiveDate>,
}

/// Raw per-asset, per-date signals as handed over by upstream collaborators.
///
/// `news == None` means no news was found for the window. That is a distinct
/// state from news that scored neutral.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSignalBundle {
    pub asset: String,
    pub date: NaiveDate,
    pub momentum_ratio: f64,
    pub volume_ratio: f64,
    pub oscillator_value: f64,
    #[serde(default)]
    pub news: Option<NewsScores>,
    #[serde(default)]
    pub provenance: SignalProvenance,
}

impl AssetSignalBundle {
    /// Bundle with technical fields only.
    pub fn technical(
        asset: impl Into<String>,
        date: NaiveDate,
        momentum_ratio: f64,
        volume_ratio: f64,
        oscillator_value: f64,
    ) -> Self {
        Self {
            asset: asset.into(),
            date,
            momentum_ratio,
            volume_ratio,
            oscillator_value,
            news: None,
            provenance: SignalProvenance::default(),
        }
    }

    /// Bundle carrying the neutral technical defaults used when price history is too short.
    pub fn neutral(asset: impl Into<String>, date: NaiveDate) -> Self {
        Self::technical(asset, date, 0.0, 1.0, 50.0)
    }

    pub fn with_news(mut self, news: NewsScores) -> Self {
        self.news = Some(news);
        self
    }

    pub fn with_provenance(mut self, provenance: SignalProvenance) -> Self {
        self.provenance = provenance;
        self
    }
}

/// State of a news-derived field after normalization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum NewsField {
    /// No news for the window.
    Absent,
    /// News was scored, but the magnitude is too small to count as a signal.
    Negligible { raw: f64, normalized: f64 },
    Measured { raw: f64, normalized: f64 },
}

impl NewsField {
    /// Value used for absence in both the bundle and the combiner.
    pub const ABSENT_SENTINEL: f64 = 0.0;

    /// Bundle-level value: the sentinel when absent, otherwise the rescaled
    /// measurement (measured-neutral sentiment sits at 0.5).
    pub fn value(&self) -> f64 {
        match self {
            NewsField::Absent => Self::ABSENT_SENTINEL,
            NewsField::Negligible { normalized, .. } | NewsField::Measured { normalized, .. } => {
                *normalized
            }
        }
    }

    /// Value fed to the combiner. Negligible readings collapse to the sentinel.
    pub fn combiner_input(&self) -> f64 {
        match self {
            NewsField::Measured { normalized, .. } => *normalized,
            NewsField::Absent | NewsField::Negligible { .. } => Self::ABSENT_SENTINEL,
        }
    }

    pub fn raw(&self) -> Option<f64> {
        match self {
            NewsField::Absent => None,
            NewsField::Negligible { raw, .. } | NewsField::Measured { raw, .. } => Some(*raw),
        }
    }

    pub fn is_present(&self) -> bool {
        !matches!(self, NewsField::Absent)
    }
}

/// Same shape as [`AssetSignalBundle`] with every field on `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedSignalBundle {
    pub asset: String,
    pub date: NaiveDate,
    pub momentum: f64,
    pub volume: f64,
    pub oscillator: f64,
    pub supply_chain: NewsField,
    pub sentiment: NewsField,
    pub confidence: NewsField,
}

impl NormalizedSignalBundle {
    pub fn has_news(&self) -> bool {
        self.sentiment.is_present()
    }
}

/// Edge type in the relationship graph, read from the edge's source asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Supplier,
    Customer,
    Competitor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalOrigin {
    Direct,
    Propagated,
}

/// Score derived for a related asset from a primary asset's news.
/// Recomputed on every rebalance date, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropagatedSignal {
    pub target_asset: String,
    pub source_asset: String,
    pub sentiment_score: f64,
    pub supply_chain_score: f64,
    pub tier: u8,
    pub cumulative_weight: f64,
    /// Relation of the last hop into the target.
    pub relation: Relation,
    pub provenance: SignalOrigin,
}

/// One row of the per-date ranking table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedAssetScore {
    pub asset: String,
    pub date: NaiveDate,
    pub combined_score: f64, // 0.0 to 1.0
}

impl RankedAssetScore {
    /// Ranking order: score descending, then asset identifier ascending.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .combined_score
            .total_cmp(&self.combined_score)
            .then_with(|| self.asset.cmp(&other.asset))
    }
}

/// Sort a ranking table into its canonical order.
pub fn sort_ranking(scores: &mut [RankedAssetScore]) {
    scores.sort_by(RankedAssetScore::rank_cmp);
}
