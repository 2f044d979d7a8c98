//! Signal weight vectors and named presets

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use signal_core::SignalError;

/// Every signal the combiner knows how to weigh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Momentum,
    Volume,
    Oscillator,
    SupplyChain,
    Sentiment,
    PropagatedSentiment,
    PropagatedSupplyChain,
}

impl SignalKind {
    pub const ALL: [SignalKind; 7] = [
        SignalKind::Momentum,
        SignalKind::Volume,
        SignalKind::Oscillator,
        SignalKind::SupplyChain,
        SignalKind::Sentiment,
        SignalKind::PropagatedSentiment,
        SignalKind::PropagatedSupplyChain,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Momentum => "momentum",
            SignalKind::Volume => "volume",
            SignalKind::Oscillator => "oscillator",
            SignalKind::SupplyChain => "supply_chain",
            SignalKind::Sentiment => "sentiment",
            SignalKind::PropagatedSentiment => "propagated_sentiment",
            SignalKind::PropagatedSupplyChain => "propagated_supply_chain",
        }
    }
}

impl FromStr for SignalKind {
    type Err = SignalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SignalKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| SignalError::InvalidWeights(format!("unknown signal '{}'", s)))
    }
}

/// Named weight profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightPreset {
    TechnicalOnly,
    NewsOnly,
    FullCombined,
}

impl WeightPreset {
    pub const ALL: [WeightPreset; 3] = [
        WeightPreset::TechnicalOnly,
        WeightPreset::NewsOnly,
        WeightPreset::FullCombined,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            WeightPreset::TechnicalOnly => "technical_only",
            WeightPreset::NewsOnly => "news_only",
            WeightPreset::FullCombined => "full_combined",
        }
    }

    pub fn weights(&self) -> WeightVector {
        use SignalKind::*;
        let entries: &[(SignalKind, f64)] = match self {
            WeightPreset::TechnicalOnly => &[(Momentum, 0.5), (Volume, 0.25), (Oscillator, 0.25)],
            WeightPreset::NewsOnly => &[
                (SupplyChain, 0.4),
                (Sentiment, 0.4),
                (PropagatedSentiment, 0.1),
                (PropagatedSupplyChain, 0.1),
            ],
            WeightPreset::FullCombined => &[
                (Momentum, 0.2),
                (Volume, 0.1),
                (Oscillator, 0.1),
                (SupplyChain, 0.25),
                (Sentiment, 0.2),
                (PropagatedSentiment, 0.1),
                (PropagatedSupplyChain, 0.05),
            ],
        };
        WeightVector {
            weights: entries.iter().copied().collect(),
        }
    }
}

impl fmt::Display for WeightPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WeightPreset {
    type Err = SignalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "technical_only" | "technical" => Ok(WeightPreset::TechnicalOnly),
            "news_only" | "news" => Ok(WeightPreset::NewsOnly),
            "full_combined" | "combined" | "full" => Ok(WeightPreset::FullCombined),
            other => Err(SignalError::InvalidWeights(format!("unknown preset '{}'", other))),
        }
    }
}

/// Non-negative weight per signal. Signals not listed weigh zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<SignalKind, f64>", into = "BTreeMap<SignalKind, f64>")]
pub struct WeightVector {
    weights: BTreeMap<SignalKind, f64>,
}

impl WeightVector {
    pub fn new(weights: BTreeMap<SignalKind, f64>) -> Result<Self, SignalError> {
        for (kind, w) in &weights {
            if !w.is_finite() || *w < 0.0 {
                return Err(SignalError::InvalidWeights(format!(
                    "{} has weight {}, expected a finite non-negative number",
                    kind.as_str(),
                    w
                )));
            }
        }
        Ok(Self { weights })
    }

    pub fn get(&self, kind: SignalKind) -> f64 {
        self.weights.get(&kind).copied().unwrap_or(0.0)
    }

    pub fn total(&self) -> f64 {
        self.weights.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SignalKind, f64)> + '_ {
        self.weights.iter().map(|(k, w)| (*k, *w))
    }

    /// Rescaled to sum to 1.0, or `None` when every weight is zero.
    pub fn normalized(&self) -> Option<WeightVector> {
        let total = self.total();
        if total <= 0.0 {
            return None;
        }
        Some(WeightVector {
            weights: self.weights.iter().map(|(k, w)| (*k, w / total)).collect(),
        })
    }

    /// Every weight multiplied by `factor` (must be finite and non-negative).
    pub fn scaled(&self, factor: f64) -> Result<WeightVector, SignalError> {
        WeightVector::new(self.weights.iter().map(|(k, w)| (*k, w * factor)).collect())
    }
}

impl TryFrom<BTreeMap<SignalKind, f64>> for WeightVector {
    type Error = SignalError;

    fn try_from(map: BTreeMap<SignalKind, f64>) -> Result<Self, Self::Error> {
        WeightVector::new(map)
    }
}

impl From<WeightVector> for BTreeMap<SignalKind, f64> {
    fn from(v: WeightVector) -> Self {
        v.weights
    }
}

/// Weight selection as it appears in configuration: a preset name or an
/// explicit map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WeightConfig {
    Preset(WeightPreset),
    Custom(WeightVector),
}

impl Default for WeightConfig {
    fn default() -> Self {
        WeightConfig::Preset(WeightPreset::FullCombined)
    }
}

impl WeightConfig {
    pub fn resolve(&self) -> WeightVector {
        match self {
            WeightConfig::Preset(p) => p.weights(),
            WeightConfig::Custom(v) => v.clone(),
        }
    }

    pub fn label(&self) -> String {
        match self {
            WeightConfig::Preset(p) => p.name().to_string(),
            WeightConfig::Custom(_) => "custom".to_string(),
        }
    }
}

impl FromStr for WeightConfig {
    type Err = SignalError;

    /// Accepts a preset name or `kind=weight` pairs separated by commas,
    /// e.g. `momentum=0.6,sentiment=0.4`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !s.contains('=') {
            return s.parse::<WeightPreset>().map(WeightConfig::Preset);
        }
        let mut map = BTreeMap::new();
        for pair in s.split(',').filter(|p| !p.trim().is_empty()) {
            let (k, v) = pair
                .split_once('=')
                .ok_or_else(|| SignalError::InvalidWeights(format!("malformed pair '{}'", pair)))?;
            let kind: SignalKind = k.parse()?;
            let weight: f64 = v.trim().parse().map_err(|_| {
                SignalError::InvalidWeights(format!("weight for {} is not a number: '{}'", k, v))
            })?;
            map.insert(kind, weight);
        }
        WeightVector::new(map).map(WeightConfig::Custom)
    }
}
