pub mod config;
pub mod models;
pub mod price_store;
pub mod news;
pub mod point_in_time;
pub mod schedule;
pub mod engine;
pub mod metrics;

#[cfg(test)]
mod tests;

pub use config::EngineConfig;
pub use models::*;
pub use price_store::PriceStore;
pub use news::{InMemoryNewsProvider, ScoredArticle};
pub use point_in_time::{PointInTimeSignalSource, SignalSource, StaticSignalSource};
pub use schedule::{validate_schedule, weekly_schedule};
pub use engine::{compare_presets, BacktestSimulator};
pub use metrics::PerformanceReporter;
