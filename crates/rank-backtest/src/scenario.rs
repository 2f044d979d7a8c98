use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use backtest_engine::{
    weekly_schedule, EngineConfig, InMemoryNewsProvider, PointInTimeSignalSource, PriceStore,
    ScoredArticle,
};
use chrono::{NaiveDate, Weekday};
use sentiment_propagation::{GraphEdge, RelationshipGraph};
use serde::Deserialize;
use signal_core::PriceBar;
use technical_analysis::TechnicalExtractor;

/// Rebalance dates, either listed or generated weekly.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ScheduleSpec {
    Dates {
        rebalance_dates: Vec<NaiveDate>,
    },
    Weekly {
        start: NaiveDate,
        end: NaiveDate,
        #[serde(default = "default_weekday")]
        weekday: Weekday,
    },
}

fn default_weekday() -> Weekday {
    Weekday::Fri
}

impl ScheduleSpec {
    pub fn dates(&self) -> Result<Vec<NaiveDate>> {
        match self {
            ScheduleSpec::Dates { rebalance_dates } => Ok(rebalance_dates.clone()),
            ScheduleSpec::Weekly {
                start,
                end,
                weekday,
            } => Ok(weekly_schedule(*start, *end, *weekday)?),
        }
    }
}

/// Everything one backtest needs, as read from a JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub prices: BTreeMap<String, Vec<PriceBar>>,
    #[serde(default)]
    pub news: BTreeMap<String, Vec<ScoredArticle>>,
    #[serde(default)]
    pub graph: Vec<GraphEdge>,
    pub schedule: ScheduleSpec,
    /// Replaces the environment configuration when present.
    #[serde(default)]
    pub config: Option<EngineConfig>,
}

/// Materialized inputs ready for the simulator.
pub struct ScenarioInputs {
    pub config: EngineConfig,
    pub schedule: Vec<NaiveDate>,
    pub prices: Arc<PriceStore>,
    pub graph: RelationshipGraph,
    pub source: PointInTimeSignalSource,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("Invalid scenario {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("Failed to parse scenario JSON")
    }

    /// Build the store, news provider, graph and signal source. `fallback`
    /// is used when the scenario carries no config of its own.
    pub fn into_inputs(self, fallback: EngineConfig) -> Result<ScenarioInputs> {
        let config = self.config.unwrap_or(fallback);
        config.validate()?;

        let schedule = self.schedule.dates()?;
        let prices = Arc::new(PriceStore::from_series(self.prices).context("Invalid price data")?);
        let news = InMemoryNewsProvider::from_articles(self.news);
        let graph = RelationshipGraph::from_edges(self.graph).context("Invalid relationship graph")?;

        tracing::info!(
            assets = prices.assets().count(),
            articles = news.article_count(),
            graph_sources = graph.source_count(),
            graph_edges = graph.edge_count(),
            rebalances = schedule.len(),
            "Scenario loaded"
        );

        let source = PointInTimeSignalSource::new(
            prices.clone(),
            Arc::new(news),
            TechnicalExtractor::new(config.technical_config()),
            config.news_lookback_days,
        );

        Ok(ScenarioInputs {
            config,
            schedule,
            prices,
            graph,
            source,
        })
    }
}
