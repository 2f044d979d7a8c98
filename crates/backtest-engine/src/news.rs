use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use signal_core::{NewsReading, NewsScoreProvider, NewsScores, NewsWindow, SignalError};

/// One scored article as handed over by the LLM collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredArticle {
    pub date: NaiveDate,
    pub supply_chain_score: f64,
    pub sentiment_score: f64,
    pub confidence: f64,
}

/// News provider over pre-scored articles held in memory.
///
/// A window's reading is the confidence-weighted mean of its articles'
/// scores. A window with no articles answers `None`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNewsProvider {
    articles: BTreeMap<String, Vec<ScoredArticle>>,
}

impl InMemoryNewsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, asset: &str, article: ScoredArticle) {
        let list = self.articles.entry(asset.to_string()).or_default();
        let at = list.partition_point(|a| a.date <= article.date);
        list.insert(at, article);
    }

    pub fn from_articles<I>(articles: I) -> Self
    where
        I: IntoIterator<Item = (String, Vec<ScoredArticle>)>,
    {
        let mut provider = Self::new();
        for (asset, list) in articles {
            for article in list {
                provider.insert(&asset, article);
            }
        }
        provider
    }

    pub fn article_count(&self) -> usize {
        self.articles.values().map(Vec::len).sum()
    }
}

impl NewsScoreProvider for InMemoryNewsProvider {
    fn scores(&self, asset: &str, window: &NewsWindow) -> Result<Option<NewsReading>, SignalError> {
        let Some(list) = self.articles.get(asset) else {
            return Ok(None);
        };
        let in_window: Vec<&ScoredArticle> =
            list.iter().filter(|a| window.contains(a.date)).collect();
        let Some(latest_article) = in_window.iter().map(|a| a.date).max() else {
            return Ok(None);
        };

        let n = in_window.len() as f64;
        let total_confidence: f64 = in_window.iter().map(|a| a.confidence).sum();
        let weighted = |field: fn(&ScoredArticle) -> f64| -> f64 {
            if total_confidence > 0.0 {
                in_window.iter().map(|a| a.confidence * field(a)).sum::<f64>() / total_confidence
            } else {
                in_window.iter().map(|a| field(a)).sum::<f64>() / n
            }
        };

        Ok(Some(NewsReading {
            scores: NewsScores {
                supply_chain_score: weighted(|a| a.supply_chain_score),
                sentiment_score: weighted(|a| a.sentiment_score),
                confidence: total_confidence / n,
            },
            latest_article,
        }))
    }
}
