use std::collections::BTreeMap;
use std::sync::Arc;

use approx::assert_relative_eq;
use chrono::{Duration, NaiveDate, Weekday};
use sentiment_propagation::{Relationship, RelationshipGraph};
use signal_core::{
    AssetSignalBundle, NewsScores, PriceBar, Relation, SignalError, SignalProvenance,
};
use signal_ranking::{SignalKind, WeightConfig, WeightPreset, WeightVector};
use technical_analysis::TechnicalExtractor;

use crate::config::EngineConfig;
use crate::engine::{compare_presets, BacktestSimulator};
use crate::models::*;
use crate::news::{InMemoryNewsProvider, ScoredArticle};
use crate::point_in_time::{PointInTimeSignalSource, SignalSource, StaticSignalSource};
use crate::price_store::PriceStore;
use crate::schedule::weekly_schedule;

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// Helper: a price store from `(asset, date, close)` rows.
fn prices(rows: &[(&str, &str, f64)]) -> PriceStore {
    let mut store = PriceStore::new();
    for (asset, date, close) in rows {
        store
            .insert(asset, PriceBar::new(d(date), *close, 1_000_000.0))
            .unwrap();
    }
    store
}

/// Helper: a technical-only bundle with a valid price cutoff.
fn bundle(asset: &str, date: &str, momentum: f64) -> AssetSignalBundle {
    let date = d(date);
    AssetSignalBundle::technical(asset, date, momentum, 1.0, 50.0).with_provenance(
        SignalProvenance {
            price_through: Some(date - Duration::days(1)),
            news_through: None,
        },
    )
}

/// Helper: weights with a single non-zero signal.
fn only(kind: SignalKind) -> WeightConfig {
    let mut map = BTreeMap::new();
    map.insert(kind, 1.0);
    WeightConfig::Custom(WeightVector::new(map).unwrap())
}

fn config(top_n: usize, weights: WeightConfig) -> EngineConfig {
    EngineConfig {
        top_n,
        weights,
        ..EngineConfig::default()
    }
}

/// Momentum ratio whose normalized value is 0.8 (tanh(ln 2) = 0.6).
fn momentum_for_0_8() -> f64 {
    2.0_f64.ln() / 5.0
}

fn two_asset_week() -> PriceStore {
    prices(&[
        ("X", "2024-01-04", 100.0),
        ("X", "2024-01-05", 100.0),
        ("X", "2024-01-08", 102.0),
        ("Y", "2024-01-04", 100.0),
        ("Y", "2024-01-05", 100.0),
        ("Y", "2024-01-08", 99.0),
    ])
}

// =============================================================================
// Test 1: End-to-end: momentum-only ranking, top 1, first rebalance pays cost
// =============================================================================

#[test]
fn test_end_to_end_single_rebalance() {
    let source = StaticSignalSource::from_bundles(vec![
        bundle("X", "2024-01-05", momentum_for_0_8()),
        bundle("Y", "2024-01-05", -momentum_for_0_8()),
    ]);
    let sim = BacktestSimulator::new(config(1, only(SignalKind::Momentum))).unwrap();
    let result = sim
        .run(&[d("2024-01-05")], &source, &two_asset_week(), &RelationshipGraph::new())
        .unwrap();

    let record = &result.rebalances[0];
    assert_eq!(record.status, RebalanceStatus::Invested);
    assert_eq!(record.ranking[0].asset, "X");
    assert_relative_eq!(record.ranking[0].combined_score, 0.8, epsilon = 1e-12);
    assert_relative_eq!(record.ranking[1].combined_score, 0.2, epsilon = 1e-12);
    assert_eq!(record.weights.weight("X"), 1.0);
    assert_eq!(record.weights.len(), 1);
    assert!(record.cost_applied);

    assert_eq!(result.returns.len(), 1);
    let point = &result.returns.points()[0];
    assert_eq!(point.date, d("2024-01-08"));
    assert_relative_eq!(point.value, 0.019, epsilon = 1e-12);
    assert_relative_eq!(point.transaction_cost, 0.001, epsilon = 1e-15);
    assert_eq!(point.flag, ReturnFlag::Invested);

    assert_relative_eq!(result.summary.cumulative_return, 0.019, epsilon = 1e-12);
    // Benchmark holds X and Y equally without costs
    assert_relative_eq!(result.benchmark.points()[0].value, 0.005, epsilon = 1e-12);
    assert_relative_eq!(result.summary.excess_return.unwrap(), 0.014, epsilon = 1e-12);
}

// =============================================================================
// Test 2: Weights act prospectively: the rebalance day's own move is not earned
// =============================================================================

#[test]
fn test_rebalance_day_return_not_earned() {
    let store = prices(&[
        ("X", "2024-01-04", 100.0),
        ("X", "2024-01-05", 200.0),
        ("X", "2024-01-08", 204.0),
    ]);
    let source = StaticSignalSource::from_bundles(vec![bundle("X", "2024-01-05", 0.1)]);
    let sim = BacktestSimulator::new(config(1, only(SignalKind::Momentum))).unwrap();
    let result = sim
        .run(&[d("2024-01-05")], &source, &store, &RelationshipGraph::new())
        .unwrap();

    let dates: Vec<NaiveDate> = result.returns.points().iter().map(|p| p.date).collect();
    assert_eq!(dates, vec![d("2024-01-08")]);
    assert_relative_eq!(result.returns.points()[0].value, 0.019, epsilon = 1e-12);
}

// =============================================================================
// Test 3: Cost is charged once per changed rebalance, never when unchanged
// =============================================================================

#[test]
fn test_cost_charged_once_and_only_on_change() {
    let store = prices(&[
        ("X", "2024-01-04", 100.0),
        ("X", "2024-01-05", 100.0),
        ("X", "2024-01-08", 102.0),
        ("X", "2024-01-09", 103.0),
        ("X", "2024-01-12", 104.0),
        ("X", "2024-01-15", 105.0),
        ("Y", "2024-01-04", 50.0),
        ("Y", "2024-01-15", 50.0),
    ]);
    let source = StaticSignalSource::from_bundles(vec![
        bundle("X", "2024-01-05", 0.1),
        bundle("Y", "2024-01-05", 0.2),
        bundle("X", "2024-01-12", 0.1),
        bundle("Y", "2024-01-12", 0.2),
    ]);
    let sim = BacktestSimulator::new(config(2, only(SignalKind::Momentum))).unwrap();
    let result = sim
        .run(
            &[d("2024-01-05"), d("2024-01-12")],
            &source,
            &store,
            &RelationshipGraph::new(),
        )
        .unwrap();

    assert!(result.rebalances[0].cost_applied);
    assert!(!result.rebalances[1].cost_applied);
    assert_eq!(result.rebalances[1].turnover, 0.0);
    assert_eq!(result.rebalances[0].holding_days, 3);
    assert_eq!(result.rebalances[1].holding_days, 1);

    let costs: Vec<f64> = result
        .returns
        .points()
        .iter()
        .map(|p| p.transaction_cost)
        .collect();
    assert_eq!(costs, vec![0.001, 0.0, 0.0, 0.0]);
    assert_relative_eq!(result.summary.total_transaction_cost, 0.001, epsilon = 1e-15);

    // Historical snapshots stay inspectable
    assert_eq!(result.rebalances[0].weights.date(), d("2024-01-05"));
    assert_eq!(result.rebalances[1].weights.date(), d("2024-01-12"));
    assert_eq!(
        result.rebalances[0].weights.as_map(),
        result.rebalances[1].weights.as_map()
    );
}

#[test]
fn test_cost_deferred_past_empty_period() {
    // Nothing trades in (01-05, 01-06]
    let store = prices(&[
        ("X", "2024-01-04", 100.0),
        ("X", "2024-01-08", 101.0),
        ("X", "2024-01-09", 102.0),
        ("Y", "2024-01-04", 50.0),
        ("Y", "2024-01-08", 50.0),
        ("Y", "2024-01-09", 50.5),
    ]);
    let source = StaticSignalSource::from_bundles(vec![
        bundle("X", "2024-01-05", 0.1),
        bundle("Y", "2024-01-05", 0.2),
        bundle("X", "2024-01-06", 0.1),
        bundle("Y", "2024-01-06", 0.2),
    ]);
    let sim = BacktestSimulator::new(config(2, only(SignalKind::Momentum))).unwrap();
    let result = sim
        .run(
            &[d("2024-01-05"), d("2024-01-06")],
            &source,
            &store,
            &RelationshipGraph::new(),
        )
        .unwrap();

    assert_eq!(result.rebalances[0].holding_days, 0);
    assert!(result.rebalances[0].cost_applied);
    assert!(!result.rebalances[1].cost_applied);
    assert_eq!(result.rebalances[1].turnover, 0.0);

    let points = result.returns.points();
    assert_eq!(points.len(), 2);
    assert_eq!(points[0].date, d("2024-01-08"));
    assert_relative_eq!(points[0].transaction_cost, 0.001, epsilon = 1e-15);
    assert_eq!(points[1].transaction_cost, 0.0);
    assert_relative_eq!(result.summary.total_transaction_cost, 0.001, epsilon = 1e-15);
}

// =============================================================================
// Test 4: Disjoint signal and price universes surface as no-overlap
// =============================================================================

#[test]
fn test_no_overlap_is_flagged() {
    let source = StaticSignalSource::from_bundles(vec![bundle("Z", "2024-01-05", 0.3)]);
    let sim = BacktestSimulator::new(EngineConfig::default()).unwrap();
    let result = sim
        .run(&[d("2024-01-05")], &source, &two_asset_week(), &RelationshipGraph::new())
        .unwrap();

    let record = &result.rebalances[0];
    assert_eq!(record.status, RebalanceStatus::NoOverlap);
    assert!(record.weights.is_empty());
    assert!(!record.cost_applied);
    assert_eq!(record.ranking.len(), 1);

    assert!(!result.returns.is_empty());
    assert!(result
        .returns
        .points()
        .iter()
        .all(|p| p.flag == ReturnFlag::NoOverlap && p.value == 0.0));
    assert_eq!(result.summary.no_overlap_days, result.returns.len());
}

#[test]
fn test_empty_universe_is_flagged() {
    let sim = BacktestSimulator::new(EngineConfig::default()).unwrap();
    let result = sim
        .run(
            &[d("2024-01-05")],
            &StaticSignalSource::new(),
            &two_asset_week(),
            &RelationshipGraph::new(),
        )
        .unwrap();
    assert_eq!(result.rebalances[0].status, RebalanceStatus::EmptyUniverse);
    assert_eq!(result.summary.empty_universe_days, 1);
    assert_eq!(result.returns.points()[0].flag, ReturnFlag::EmptyUniverse);
}

// =============================================================================
// Test 5: Cutoff breaches are fatal
// =============================================================================

#[test]
fn test_price_lookahead_is_fatal() {
    let date = d("2024-01-05");
    let leaked = AssetSignalBundle::technical("X", date, 0.1, 1.0, 50.0).with_provenance(
        SignalProvenance {
            price_through: Some(date),
            news_through: None,
        },
    );
    let source = StaticSignalSource::from_bundles(vec![leaked]);
    let sim = BacktestSimulator::new(EngineConfig::default()).unwrap();
    let err = sim
        .run(&[date], &source, &two_asset_week(), &RelationshipGraph::new())
        .unwrap_err();
    match err {
        SignalError::Lookahead {
            asset,
            date: at,
            stream,
            observed,
        } => {
            assert_eq!(asset, "X");
            assert_eq!(at, date);
            assert_eq!(stream, "price");
            assert_eq!(observed, date);
        }
        other => panic!("expected lookahead, got {:?}", other),
    }
}

#[test]
fn test_news_outside_window_is_fatal() {
    let date = d("2024-01-05");
    let sim = BacktestSimulator::new(EngineConfig::default()).unwrap();
    for news_through in [d("2024-01-06"), d("2023-12-28")] {
        let b = bundle("X", "2024-01-05", 0.0).with_provenance(SignalProvenance {
            price_through: Some(d("2024-01-04")),
            news_through: Some(news_through),
        });
        let err = sim.check_cutoffs(date, &[b]).unwrap_err();
        assert!(matches!(err, SignalError::Lookahead { stream: "news", .. }));
    }
    // Window edges are inclusive
    for news_through in [d("2024-01-05"), d("2023-12-29")] {
        let b = bundle("X", "2024-01-05", 0.0).with_provenance(SignalProvenance {
            price_through: Some(d("2024-01-04")),
            news_through: Some(news_through),
        });
        assert!(sim.check_cutoffs(date, &[b]).is_ok());
    }
}

#[test]
fn test_misdated_bundle_is_fatal() {
    let sim = BacktestSimulator::new(EngineConfig::default()).unwrap();
    let err = sim
        .check_cutoffs(d("2024-01-05"), &[bundle("X", "2024-01-12", 0.0)])
        .unwrap_err();
    assert!(matches!(err, SignalError::Lookahead { stream: "bundle", .. }));
}

// =============================================================================
// Test 6: No-lookahead: future prices and articles never change a past signal
// =============================================================================

fn long_store() -> PriceStore {
    let mut store = PriceStore::new();
    let start = d("2024-01-01");
    for i in 0..60 {
        let date = start + Duration::days(i);
        let wiggle = (i % 5) as f64 - 2.0;
        store
            .insert("AAA", PriceBar::new(date, 100.0 + i as f64 + wiggle, 1_000.0 + (i * 13 % 7) as f64 * 100.0))
            .unwrap();
        store
            .insert("BBB", PriceBar::new(date, 200.0 - i as f64 * 0.7 - wiggle, 5_000.0))
            .unwrap();
        store
            .insert("CCC", PriceBar::new(date, 50.0 + wiggle * 0.3, 800.0 + i as f64))
            .unwrap();
    }
    store
}

fn article(date: &str, sentiment: f64) -> ScoredArticle {
    ScoredArticle {
        date: d(date),
        supply_chain_score: 0.6,
        sentiment_score: sentiment,
        confidence: 0.8,
    }
}

#[test]
fn test_no_lookahead_property() {
    let as_of = d("2024-02-10");
    let full = long_store();
    let truncated = full.truncated_through(as_of - Duration::days(1));
    assert!(truncated.calendar().len() < full.calendar().len());

    let mut past_news = InMemoryNewsProvider::new();
    past_news.insert("AAA", article("2024-02-06", 0.4));
    let mut all_news = past_news.clone();
    all_news.insert("AAA", article("2024-02-12", -0.9));
    all_news.insert("BBB", article("2024-02-20", 0.9));

    let with_future = PointInTimeSignalSource::new(
        Arc::new(full),
        Arc::new(all_news),
        TechnicalExtractor::default(),
        7,
    );
    let without_future = PointInTimeSignalSource::new(
        Arc::new(truncated),
        Arc::new(past_news),
        TechnicalExtractor::default(),
        7,
    );

    let a = with_future.bundles(as_of).unwrap();
    let b = without_future.bundles(as_of).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.len(), 3);
    assert!(a.iter().all(|x| x.provenance.price_through < Some(as_of)));
}

// =============================================================================
// Test 7: Contract violations exclude the asset, or abort in strict mode
// =============================================================================

fn with_bad_bundle() -> StaticSignalSource {
    let bad = bundle("Y", "2024-01-05", 0.0).with_news(NewsScores {
        supply_chain_score: 0.5,
        sentiment_score: 1.5,
        confidence: 0.9,
    });
    StaticSignalSource::from_bundles(vec![bundle("X", "2024-01-05", 0.1), bad])
}

#[test]
fn test_contract_violation_excludes_asset() {
    let sim = BacktestSimulator::new(config(5, WeightConfig::default())).unwrap();
    let result = sim
        .run(&[d("2024-01-05")], &with_bad_bundle(), &two_asset_week(), &RelationshipGraph::new())
        .unwrap();
    let record = &result.rebalances[0];
    assert_eq!(record.rejected.len(), 1);
    assert!(record.rejected[0].contains("sentiment_score"));
    assert_eq!(record.ranking.len(), 1);
    assert_eq!(record.weights.weight("Y"), 0.0);
    assert_eq!(record.weights.weight("X"), 1.0);
}

#[test]
fn test_strict_contracts_abort() {
    let strict = EngineConfig {
        strict_contracts: true,
        ..EngineConfig::default()
    };
    let err = BacktestSimulator::new(strict)
        .unwrap()
        .run(&[d("2024-01-05")], &with_bad_bundle(), &two_asset_week(), &RelationshipGraph::new())
        .unwrap_err();
    assert!(matches!(
        err,
        SignalError::ContractViolation { field: "sentiment_score", .. }
    ));
}

fn with_duplicate_bundle() -> StaticSignalSource {
    StaticSignalSource::from_bundles(vec![
        bundle("X", "2024-01-05", 0.1),
        bundle("X", "2024-01-05", 0.3),
        bundle("Y", "2024-01-05", 0.2),
    ])
}

#[test]
fn test_duplicate_bundles_excluded() {
    let sim = BacktestSimulator::new(config(2, only(SignalKind::Momentum))).unwrap();
    let result = sim
        .run(
            &[d("2024-01-05")],
            &with_duplicate_bundle(),
            &two_asset_week(),
            &RelationshipGraph::new(),
        )
        .unwrap();
    let record = &result.rebalances[0];
    assert_eq!(record.rejected.len(), 1);
    assert!(record.rejected[0].contains("Duplicate"));
    let ranked: Vec<&str> = record.ranking.iter().map(|r| r.asset.as_str()).collect();
    assert_eq!(ranked, vec!["Y"]);
    assert_eq!(record.weights.weight("X"), 0.0);
    assert_relative_eq!(record.weights.weight("Y"), 1.0, epsilon = 1e-12);
}

#[test]
fn test_strict_contracts_abort_on_duplicate() {
    let strict = EngineConfig {
        strict_contracts: true,
        ..config(2, only(SignalKind::Momentum))
    };
    let err = BacktestSimulator::new(strict)
        .unwrap()
        .run(
            &[d("2024-01-05")],
            &with_duplicate_bundle(),
            &two_asset_week(),
            &RelationshipGraph::new(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        SignalError::DuplicateBundle { ref asset, count: 2, .. } if asset == "X"
    ));
}

// =============================================================================
// Test 8: Degenerate weights give neutral scores and an equal split
// =============================================================================

#[test]
fn test_all_zero_weights() {
    let mut map = BTreeMap::new();
    map.insert(SignalKind::Momentum, 0.0);
    let zero = WeightConfig::Custom(WeightVector::new(map).unwrap());
    let source = StaticSignalSource::from_bundles(vec![
        bundle("X", "2024-01-05", 0.3),
        bundle("Y", "2024-01-05", -0.3),
    ]);
    let result = BacktestSimulator::new(config(2, zero))
        .unwrap()
        .run(&[d("2024-01-05")], &source, &two_asset_week(), &RelationshipGraph::new())
        .unwrap();
    let record = &result.rebalances[0];
    assert!(record.ranking.iter().all(|r| r.combined_score == 0.5));
    assert_eq!(record.ranking[0].asset, "X");
    assert_relative_eq!(record.weights.weight("X"), 0.5, epsilon = 1e-12);
    assert_relative_eq!(record.weights.weight("Y"), 0.5, epsilon = 1e-12);
}

// =============================================================================
// Test 9: Propagated sentiment drives selection through the full loop
// =============================================================================

#[test]
fn test_propagation_drives_selection() {
    let date = "2024-01-05";
    let store = prices(&[
        ("A", "2024-01-04", 10.0),
        ("B", "2024-01-04", 20.0),
        ("C", "2024-01-04", 30.0),
        ("B", "2024-01-08", 21.0),
    ]);
    let primary = bundle("A", date, 0.0)
        .with_news(NewsScores {
            supply_chain_score: 0.5,
            sentiment_score: 0.8,
            confidence: 0.9,
        })
        .with_provenance(SignalProvenance {
            price_through: Some(d("2024-01-04")),
            news_through: Some(d("2024-01-03")),
        });
    let source = StaticSignalSource::from_bundles(vec![
        primary,
        bundle("B", date, 0.0),
        bundle("C", date, 0.0),
    ]);

    let mut graph = RelationshipGraph::new();
    graph
        .add_edge("A", Relationship::direct("B", Relation::Supplier, 0.7))
        .unwrap();
    graph
        .add_edge("B", Relationship::direct("C", Relation::Supplier, 0.5))
        .unwrap();

    let result = BacktestSimulator::new(config(1, only(SignalKind::PropagatedSentiment)))
        .unwrap()
        .run(&[d(date)], &source, &store, &graph)
        .unwrap();
    let record = &result.rebalances[0];
    let order: Vec<&str> = record.ranking.iter().map(|r| r.asset.as_str()).collect();
    assert_eq!(order, vec!["B", "C", "A"]);
    // 0.56 and 0.28 after affine rescaling
    assert_relative_eq!(record.ranking[0].combined_score, 0.78, epsilon = 1e-12);
    assert_relative_eq!(record.ranking[1].combined_score, 0.64, epsilon = 1e-12);
    assert_eq!(record.ranking[2].combined_score, 0.0);
    assert_eq!(record.weights.weight("B"), 1.0);
    assert_eq!(record.assets_with_news, 1);
    assert_eq!(record.propagated_targets, 2);
    assert_relative_eq!(result.returns.points()[0].value, 0.05 - 0.001, epsilon = 1e-12);
}

// =============================================================================
// Test 10: Full point-in-time run and preset comparison
// =============================================================================

#[test]
fn test_point_in_time_weekly_run() {
    let store = Arc::new(long_store());
    let mut news = InMemoryNewsProvider::new();
    news.insert("AAA", article("2024-01-20", 0.5));
    news.insert("CCC", article("2024-02-01", -0.4));
    let source = PointInTimeSignalSource::new(
        store.clone(),
        Arc::new(news),
        TechnicalExtractor::default(),
        7,
    );
    let schedule = weekly_schedule(d("2024-01-08"), d("2024-02-19"), Weekday::Mon).unwrap();
    let result = BacktestSimulator::new(config(2, WeightConfig::default()))
        .unwrap()
        .run(&schedule, &source, &store, &RelationshipGraph::new())
        .unwrap();

    assert_eq!(result.rebalances.len(), schedule.len());
    assert_eq!(result.returns.len(), result.benchmark.len());
    assert!(result
        .rebalances
        .iter()
        .all(|r| r.status == RebalanceStatus::Invested && r.weights.len() == 2));
    assert!(result
        .returns
        .points()
        .windows(2)
        .all(|w| w[0].date < w[1].date));
    // First date after the first rebalance, last within the final holding period
    assert_eq!(result.returns.points()[0].date, d("2024-01-09"));
    assert!(result.returns.points().last().unwrap().date <= d("2024-02-26"));
    assert!(result.summary.sharpe_ratio.is_finite());
    assert!(result.summary.max_drawdown <= 0.0);
}

#[test]
fn test_compare_presets() {
    let store = Arc::new(long_store());
    let mut news = InMemoryNewsProvider::new();
    news.insert("BBB", article("2024-01-30", 0.9));
    let source = PointInTimeSignalSource::new(
        store.clone(),
        Arc::new(news),
        TechnicalExtractor::default(),
        7,
    );
    let schedule = weekly_schedule(d("2024-01-15"), d("2024-02-12"), Weekday::Mon).unwrap();
    let results = compare_presets(
        &config(1, WeightConfig::default()),
        &schedule,
        &source,
        &store,
        &RelationshipGraph::new(),
    )
    .unwrap();

    assert_eq!(results.len(), 3);
    for (preset, result) in &results {
        assert_eq!(result.label, preset.name());
        assert_eq!(result.config.weights, WeightConfig::Preset(*preset));
        assert_eq!(result.rebalances.len(), schedule.len());
    }
    assert!(results.contains_key(&WeightPreset::NewsOnly));
}

#[test]
fn test_rejects_unordered_schedule() {
    let sim = BacktestSimulator::new(EngineConfig::default()).unwrap();
    let err = sim
        .run(
            &[d("2024-01-12"), d("2024-01-05")],
            &StaticSignalSource::new(),
            &two_asset_week(),
            &RelationshipGraph::new(),
        )
        .unwrap_err();
    assert!(matches!(err, SignalError::InvalidSchedule(_)));
}
