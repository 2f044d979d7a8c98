use statrs::statistics::Statistics;

use crate::models::*;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Deviations at or below this are treated as a flat series.
const ZERO_VARIANCE: f64 = 1e-12;

/// Pure reductions over a finished return series.
pub struct PerformanceReporter;

impl PerformanceReporter {
    pub fn summarize(
        returns: &ReturnSeries,
        benchmark: Option<&ReturnSeries>,
        rebalance_count: usize,
        risk_free_rate: f64,
    ) -> PerformanceSummary {
        let values = returns.values();
        let cumulative = Self::cumulative_return(&values);
        let benchmark_cumulative = benchmark.map(|b| Self::cumulative_return(&b.values()));

        PerformanceSummary {
            cumulative_return: cumulative,
            sharpe_ratio: Self::sharpe_ratio(&values, risk_free_rate),
            max_drawdown: Self::max_drawdown(&values),
            annualized_volatility: Self::annualized_volatility(&values),
            sortino_ratio: Self::sortino_ratio(&values, risk_free_rate),
            trading_days: returns.len(),
            no_overlap_days: returns.count_flag(ReturnFlag::NoOverlap),
            empty_universe_days: returns.count_flag(ReturnFlag::EmptyUniverse),
            total_transaction_cost: returns.total_cost(),
            rebalance_count,
            benchmark_cumulative_return: benchmark_cumulative,
            excess_return: benchmark_cumulative.map(|b| cumulative - b),
        }
    }

    /// `prod(1 + r) - 1`; zero for an empty series.
    pub fn cumulative_return(returns: &[f64]) -> f64 {
        returns.iter().fold(1.0, |acc, r| acc * (1.0 + r)) - 1.0
    }

    /// `(mean(r - rf) * 252) / (stdev(r) * sqrt(252))` with the sample
    /// deviation. Zero when fewer than two returns or no variance.
    pub fn sharpe_ratio(returns: &[f64], risk_free_rate: f64) -> f64 {
        if returns.len() < 2 {
            return 0.0;
        }
        let std = returns.iter().std_dev();
        if !std.is_finite() || std <= ZERO_VARIANCE {
            tracing::debug!(n = returns.len(), "Zero-variance return series, Sharpe is 0");
            return 0.0;
        }
        let excess = returns.iter().mean() - risk_free_rate / TRADING_DAYS_PER_YEAR;
        (excess * TRADING_DAYS_PER_YEAR) / (std * TRADING_DAYS_PER_YEAR.sqrt())
    }

    /// Like Sharpe but only downside deviation below the risk-free rate
    /// counts. `None` when nothing fell below it.
    pub fn sortino_ratio(returns: &[f64], risk_free_rate: f64) -> Option<f64> {
        if returns.len() < 2 {
            return None;
        }
        let rf_daily = risk_free_rate / TRADING_DAYS_PER_YEAR;
        let downside_sq: f64 = returns
            .iter()
            .map(|r| (r - rf_daily).min(0.0).powi(2))
            .sum::<f64>()
            / returns.len() as f64;
        let downside = downside_sq.sqrt();
        if downside <= ZERO_VARIANCE {
            return None;
        }
        let excess = returns.iter().mean() - rf_daily;
        Some((excess * TRADING_DAYS_PER_YEAR) / (downside * TRADING_DAYS_PER_YEAR.sqrt()))
    }

    /// Minimum of `(c_t - peak_t) / peak_t` over the compounded curve.
    pub fn max_drawdown(returns: &[f64]) -> f64 {
        let mut cumulative = 1.0;
        let mut peak = f64::NEG_INFINITY;
        let mut worst: f64 = 0.0;
        for r in returns {
            cumulative *= 1.0 + r;
            peak = peak.max(cumulative);
            if peak > 0.0 {
                worst = worst.min((cumulative - peak) / peak);
            }
        }
        worst
    }

    pub fn annualized_volatility(returns: &[f64]) -> f64 {
        if returns.len() < 2 {
            return 0.0;
        }
        let std = returns.iter().std_dev();
        if std.is_finite() {
            std * TRADING_DAYS_PER_YEAR.sqrt()
        } else {
            0.0
        }
    }
}
