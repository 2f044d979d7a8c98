use std::collections::{BTreeMap, HashSet};

use chrono::{Duration, NaiveDate};
use portfolio_manager::{PortfolioConstructor, PortfolioWeightVector, RebalanceCalculator};
use sentiment_propagation::RelationshipGraph;
use signal_core::{AssetSignalBundle, RankedAssetScore, SignalError};
use signal_ranking::{RankingPipeline, WeightConfig, WeightPreset, WeightVector};

use crate::config::EngineConfig;
use crate::metrics::PerformanceReporter;
use crate::models::*;
use crate::point_in_time::SignalSource;
use crate::price_store::PriceStore;
use crate::schedule::validate_schedule;

/// Weekly rebalancing simulator with point-in-time signals.
///
/// Weights set on a rebalance date earn nothing on that date; they apply to
/// the trading days after it, up to and including the next rebalance date.
/// A weight change above the turnover threshold costs one flat charge on the
/// first of those days. If the period has no trading day the charge carries
/// over to the first day of the next period that has one.
pub struct BacktestSimulator {
    config: EngineConfig,
    weights: WeightVector,
    label: String,
    pipeline: RankingPipeline,
}

impl BacktestSimulator {
    pub fn new(config: EngineConfig) -> Result<Self, SignalError> {
        config.validate()?;
        let weights = config.weights.resolve();
        let label = config.weights.label();
        let pipeline = RankingPipeline::new(config.normalizer_config(), config.max_tier);
        Ok(Self {
            config,
            weights,
            label,
            pipeline,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run the schedule to completion. Any lookahead breach aborts the run.
    pub fn run(
        &self,
        schedule: &[NaiveDate],
        source: &dyn SignalSource,
        prices: &PriceStore,
        graph: &RelationshipGraph,
    ) -> Result<BacktestResult, SignalError> {
        validate_schedule(schedule)?;

        let mut returns = ReturnSeries::default();
        let mut benchmark = ReturnSeries::default();
        let mut rebalances: Vec<RebalanceRecord> = Vec::with_capacity(schedule.len());
        let mut current = PortfolioWeightVector::cash(schedule[0]);
        // Charges not yet booked because their holding period had no trading day.
        let mut pending_charges: u32 = 0;

        for (i, &date) in schedule.iter().enumerate() {
            let period_end = schedule
                .get(i + 1)
                .copied()
                .unwrap_or(date + Duration::days(self.config.holding_period_days));

            let bundles = source.bundles(date)?;
            self.check_cutoffs(date, &bundles)?;

            let ranked = self.pipeline.rank(date, &bundles, graph, &self.weights);
            if self.config.strict_contracts {
                if let Some(err) = ranked.rejected.first() {
                    return Err(err.clone());
                }
            }

            let price_universe: HashSet<&str> = prices.universe_before(date).into_iter().collect();
            let eligible: Vec<RankedAssetScore> = ranked
                .ranking
                .iter()
                .filter(|r| price_universe.contains(r.asset.as_str()))
                .cloned()
                .collect();

            let status = if ranked.ranking.is_empty() {
                tracing::debug!(%date, "Empty signal universe, holding cash");
                RebalanceStatus::EmptyUniverse
            } else if eligible.is_empty() {
                tracing::warn!(
                    %date,
                    signal_assets = ranked.ranking.len(),
                    price_assets = price_universe.len(),
                    "Signal and price universes do not overlap, holding cash"
                );
                RebalanceStatus::NoOverlap
            } else {
                RebalanceStatus::Invested
            };

            let target = match status {
                RebalanceStatus::Invested => PortfolioConstructor::construct(
                    date,
                    &eligible,
                    self.config.top_n,
                    self.config.allocation,
                ),
                _ => PortfolioWeightVector::cash(date),
            };

            let turnover = RebalanceCalculator::turnover(&current, &target);
            let cost_due =
                RebalanceCalculator::needs_rebalance(&current, &target, self.config.turnover_threshold);
            if cost_due {
                pending_charges += 1;
            }

            let days = prices.trading_days(date, period_end);
            let flag = ReturnFlag::from(status);
            let mut benchmark_assets: Vec<&str> = price_universe.iter().copied().collect();
            benchmark_assets.sort_unstable();

            for (j, &day) in days.iter().enumerate() {
                let gross: f64 = target
                    .iter()
                    .map(|(asset, w)| w * prices.daily_return(asset, day))
                    .sum();
                let transaction_cost = if j == 0 {
                    self.config.transaction_cost_rate * pending_charges as f64
                } else {
                    0.0
                };
                returns.push(ReturnPoint {
                    date: day,
                    value: gross - transaction_cost,
                    flag,
                    transaction_cost,
                });
                benchmark.push(Self::benchmark_point(prices, &benchmark_assets, day));
            }

            if days.is_empty() {
                if pending_charges > 0 {
                    tracing::debug!(%date, %period_end, pending_charges, "No trading day in holding period, cost deferred");
                }
            } else {
                pending_charges = 0;
            }

            tracing::info!(
                %date,
                status = ?status,
                selected = target.len(),
                turnover,
                cost_applied = cost_due,
                holding_days = days.len(),
                "Rebalanced"
            );

            rebalances.push(RebalanceRecord {
                date,
                status,
                ranking: ranked.ranking,
                weights: target.clone(),
                turnover,
                cost_applied: cost_due,
                holding_days: days.len(),
                assets_with_news: ranked.assets_with_news,
                propagated_targets: ranked.propagated_targets,
                rejected: ranked.rejected.iter().map(|e| e.to_string()).collect(),
            });
            current = target;
        }

        if pending_charges > 0 {
            tracing::warn!(pending_charges, "Run ended before deferred transaction costs could be booked");
        }

        let summary = PerformanceReporter::summarize(
            &returns,
            Some(&benchmark),
            rebalances.len(),
            self.config.risk_free_rate,
        );
        tracing::info!(
            label = %self.label,
            cumulative_return = summary.cumulative_return,
            sharpe = summary.sharpe_ratio,
            max_drawdown = summary.max_drawdown,
            "Backtest complete"
        );

        Ok(BacktestResult {
            label: self.label.clone(),
            config: self.config.clone(),
            returns,
            benchmark,
            rebalances,
            summary,
        })
    }

    /// Reject any bundle that is not dated `date` or whose underlying data
    /// breaks the cutoff rule.
    pub fn check_cutoffs(&self, date: NaiveDate, bundles: &[AssetSignalBundle]) -> Result<(), SignalError> {
        let news_floor = date - Duration::days(self.config.news_lookback_days);
        for b in bundles {
            let breach = |stream: &'static str, observed: NaiveDate| SignalError::Lookahead {
                asset: b.asset.clone(),
                date,
                stream,
                observed,
            };
            if b.date != date {
                return Err(breach("bundle", b.date));
            }
            if let Some(p) = b.provenance.price_through {
                if p >= date {
                    return Err(breach("price", p));
                }
            }
            if let Some(n) = b.provenance.news_through {
                if n > date || n < news_floor {
                    return Err(breach("news", n));
                }
            }
        }
        Ok(())
    }

    fn benchmark_point(prices: &PriceStore, assets: &[&str], day: NaiveDate) -> ReturnPoint {
        if assets.is_empty() {
            return ReturnPoint {
                date: day,
                value: 0.0,
                flag: ReturnFlag::EmptyUniverse,
                transaction_cost: 0.0,
            };
        }
        let value = assets.iter().map(|a| prices.daily_return(a, day)).sum::<f64>()
            / assets.len() as f64;
        ReturnPoint {
            date: day,
            value,
            flag: ReturnFlag::Invested,
            transaction_cost: 0.0,
        }
    }
}

/// Run the simulator once per named preset over identical inputs.
pub fn compare_presets(
    config: &EngineConfig,
    schedule: &[NaiveDate],
    source: &dyn SignalSource,
    prices: &PriceStore,
    graph: &RelationshipGraph,
) -> Result<BTreeMap<WeightPreset, BacktestResult>, SignalError> {
    let mut results = BTreeMap::new();
    for preset in WeightPreset::ALL {
        let preset_config = EngineConfig {
            weights: WeightConfig::Preset(preset),
            ..config.clone()
        };
        let result = BacktestSimulator::new(preset_config)?.run(schedule, source, prices, graph)?;
        results.insert(preset, result);
    }
    Ok(results)
}
