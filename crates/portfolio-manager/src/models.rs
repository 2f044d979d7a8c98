use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use signal_core::SignalError;

/// How selected scores become portfolio weights.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationMethod {
    /// weight = score / sum(selected scores)
    #[default]
    Proportional,
    /// weight = 1 / selected count
    Equal,
}

impl AllocationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllocationMethod::Proportional => "proportional",
            AllocationMethod::Equal => "equal",
        }
    }
}

impl fmt::Display for AllocationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AllocationMethod {
    type Err = SignalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "proportional" | "score" => Ok(AllocationMethod::Proportional),
            "equal" | "equal_weight" => Ok(AllocationMethod::Equal),
            other => Err(SignalError::InvalidConfig(format!(
                "unknown allocation method '{}'",
                other
            ))),
        }
    }
}

/// Immutable asset -> weight snapshot for one rebalance date.
///
/// Weights are non-negative and sum to 1.0 whenever any asset is held.
/// An empty vector means the portfolio sits in cash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioWeightVector {
    date: NaiveDate,
    /// Method actually applied, after any zero-score fallback.
    method: AllocationMethod,
    weights: BTreeMap<String, f64>,
}

impl PortfolioWeightVector {
    pub(crate) fn new(
        date: NaiveDate,
        method: AllocationMethod,
        weights: BTreeMap<String, f64>,
    ) -> Self {
        Self {
            date,
            method,
            weights,
        }
    }

    /// No holdings.
    pub fn cash(date: NaiveDate) -> Self {
        Self::new(date, AllocationMethod::Equal, BTreeMap::new())
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn method(&self) -> AllocationMethod {
        self.method
    }

    pub fn weight(&self, asset: &str) -> f64 {
        self.weights.get(asset).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.weights.iter().map(|(a, w)| (a.as_str(), *w))
    }

    pub fn assets(&self) -> impl Iterator<Item = &str> + '_ {
        self.weights.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn sum(&self) -> f64 {
        self.weights.values().sum()
    }

    pub fn as_map(&self) -> &BTreeMap<String, f64> {
        &self.weights
    }
}
