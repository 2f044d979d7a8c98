use std::env;

use anyhow::{Context, Result};
use portfolio_manager::AllocationMethod;
use serde::{Deserialize, Serialize};
use signal_core::SignalError;
use signal_ranking::{NormalizerConfig, WeightConfig};
use technical_analysis::TechnicalConfig;

/// Every tunable of a backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // Portfolio construction
    pub top_n: usize,                  // 10
    pub allocation: AllocationMethod,  // proportional
    pub weights: WeightConfig,         // full_combined

    // Costs
    pub transaction_cost_rate: f64,    // 0.001 (10 bps)
    pub turnover_threshold: f64,       // 0.01 aggregate absolute change

    // Timing
    pub news_lookback_days: i64,       // 7
    pub holding_period_days: i64,      // 7, last period only

    // Propagation
    pub max_tier: u8,                  // 2

    // Normalization
    pub momentum_scale: f64,           // 5.0
    pub sentiment_epsilon: f64,        // 0.001

    // Technical extraction
    pub min_price_observations: usize, // 5
    pub momentum_lookback: usize,      // 20
    pub volume_lookback: usize,        // 20
    pub volume_recent_window: usize,   // 5
    pub rsi_period: usize,             // 14

    /// Abort the run on a contract violation instead of excluding the asset.
    pub strict_contracts: bool,
    /// Annual rate, subtracted from daily returns in Sharpe and Sortino.
    pub risk_free_rate: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            top_n: 10,
            allocation: AllocationMethod::Proportional,
            weights: WeightConfig::default(),
            transaction_cost_rate: 0.001,
            turnover_threshold: 0.01,
            news_lookback_days: 7,
            holding_period_days: 7,
            max_tier: 2,
            momentum_scale: 5.0,
            sentiment_epsilon: 0.001,
            min_price_observations: 5,
            momentum_lookback: 20,
            volume_lookback: 20,
            volume_recent_window: 5,
            rsi_period: 14,
            strict_contracts: false,
            risk_free_rate: 0.0,
        }
    }
}

impl EngineConfig {
    /// Read `RANK_*` environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`EngineConfig::from_env`] with an arbitrary key source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();
        let var = |key: &str, default: String| lookup(key).unwrap_or(default);

        let config = Self {
            top_n: var("RANK_TOP_N", d.top_n.to_string())
                .parse()
                .context("RANK_TOP_N")?,
            allocation: var("RANK_ALLOCATION", d.allocation.to_string()).parse()?,
            weights: var("RANK_WEIGHTS", d.weights.label()).parse()?,

            transaction_cost_rate: var("RANK_TRANSACTION_COST", d.transaction_cost_rate.to_string())
                .parse()
                .context("RANK_TRANSACTION_COST")?,
            turnover_threshold: var("RANK_TURNOVER_THRESHOLD", d.turnover_threshold.to_string())
                .parse()
                .context("RANK_TURNOVER_THRESHOLD")?,

            news_lookback_days: var("RANK_NEWS_LOOKBACK_DAYS", d.news_lookback_days.to_string())
                .parse()
                .context("RANK_NEWS_LOOKBACK_DAYS")?,
            holding_period_days: var("RANK_HOLDING_PERIOD_DAYS", d.holding_period_days.to_string())
                .parse()
                .context("RANK_HOLDING_PERIOD_DAYS")?,

            max_tier: var("RANK_MAX_TIER", d.max_tier.to_string())
                .parse()
                .context("RANK_MAX_TIER")?,

            momentum_scale: var("RANK_MOMENTUM_SCALE", d.momentum_scale.to_string())
                .parse()
                .context("RANK_MOMENTUM_SCALE")?,
            sentiment_epsilon: var("RANK_SENTIMENT_EPSILON", d.sentiment_epsilon.to_string())
                .parse()
                .context("RANK_SENTIMENT_EPSILON")?,

            min_price_observations: var("RANK_MIN_PRICE_OBSERVATIONS", d.min_price_observations.to_string())
                .parse()
                .context("RANK_MIN_PRICE_OBSERVATIONS")?,
            momentum_lookback: var("RANK_MOMENTUM_LOOKBACK", d.momentum_lookback.to_string())
                .parse()
                .context("RANK_MOMENTUM_LOOKBACK")?,
            volume_lookback: var("RANK_VOLUME_LOOKBACK", d.volume_lookback.to_string())
                .parse()
                .context("RANK_VOLUME_LOOKBACK")?,
            volume_recent_window: var("RANK_VOLUME_RECENT_WINDOW", d.volume_recent_window.to_string())
                .parse()
                .context("RANK_VOLUME_RECENT_WINDOW")?,
            rsi_period: var("RANK_RSI_PERIOD", d.rsi_period.to_string())
                .parse()
                .context("RANK_RSI_PERIOD")?,

            strict_contracts: var("RANK_STRICT_CONTRACTS", d.strict_contracts.to_string())
                .parse()
                .context("RANK_STRICT_CONTRACTS")?,
            risk_free_rate: var("RANK_RISK_FREE_RATE", d.risk_free_rate.to_string())
                .parse()
                .context("RANK_RISK_FREE_RATE")?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SignalError> {
        let invalid = |msg: String| Err(SignalError::InvalidConfig(msg));

        if self.top_n == 0 {
            return invalid("top_n must be at least 1".into());
        }
        for (name, value) in [
            ("transaction_cost_rate", self.transaction_cost_rate),
            ("turnover_threshold", self.turnover_threshold),
            ("sentiment_epsilon", self.sentiment_epsilon),
            ("risk_free_rate", self.risk_free_rate),
        ] {
            if !value.is_finite() || value < 0.0 {
                return invalid(format!("{} must be finite and non-negative, got {}", name, value));
            }
        }
        if !(1..=2).contains(&self.max_tier) {
            return invalid(format!("max_tier must be 1 or 2, got {}", self.max_tier));
        }
        if !self.momentum_scale.is_finite() || self.momentum_scale <= 0.0 {
            return invalid(format!("momentum_scale must be positive, got {}", self.momentum_scale));
        }
        if self.news_lookback_days < 0 {
            return invalid("news_lookback_days must not be negative".into());
        }
        if self.holding_period_days < 1 {
            return invalid("holding_period_days must be at least 1".into());
        }
        for (name, value) in [
            ("min_price_observations", self.min_price_observations),
            ("momentum_lookback", self.momentum_lookback),
            ("volume_lookback", self.volume_lookback),
            ("volume_recent_window", self.volume_recent_window),
            ("rsi_period", self.rsi_period),
        ] {
            if value == 0 {
                return invalid(format!("{} must be at least 1", name));
            }
        }
        Ok(())
    }

    pub fn technical_config(&self) -> TechnicalConfig {
        TechnicalConfig {
            min_observations: self.min_price_observations,
            momentum_lookback: self.momentum_lookback,
            volume_lookback: self.volume_lookback,
            volume_recent_window: self.volume_recent_window,
            rsi_period: self.rsi_period,
        }
    }

    pub fn normalizer_config(&self) -> NormalizerConfig {
        NormalizerConfig {
            momentum_scale: self.momentum_scale,
            sentiment_epsilon: self.sentiment_epsilon,
        }
    }
}
