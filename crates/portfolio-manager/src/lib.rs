pub mod models;
pub mod construction;
pub mod rebalancing;

pub use models::*;
pub use construction::PortfolioConstructor;
pub use rebalancing::{RebalanceCalculator, WeightChange};
