use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{NewsScores, SignalError};

/// Inclusive date range of articles considered for one news query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl NewsWindow {
    /// Window of `lookback_days` ending at `end`.
    pub fn trailing(end: NaiveDate, lookback_days: i64) -> Self {
        Self {
            start: end - chrono::Duration::days(lookback_days),
            end,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// Scores for a window plus the date of the newest article behind them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NewsReading {
    pub scores: NewsScores,
    pub latest_article: NaiveDate,
}

/// Trait for the news/LLM collaborator.
///
/// `Ok(None)` is the explicit "no result" answer. Implementations must not
/// fabricate fallback scores.
pub trait NewsScoreProvider: Send + Sync {
    fn scores(&self, asset: &str, window: &NewsWindow) -> Result<Option<NewsReading>, SignalError>;
}
