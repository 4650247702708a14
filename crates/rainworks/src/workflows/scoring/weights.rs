use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Named scoring criteria. Bid-only criteria need a quoted price to evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    Capacity,
    Rpi,
    CostBand,
    Distance,
    SlaHistory,
    Price,
    Timeline,
    Warranty,
}

impl Criterion {
    pub const ALL: [Criterion; 8] = [
        Criterion::Capacity,
        Criterion::Rpi,
        Criterion::CostBand,
        Criterion::Distance,
        Criterion::SlaHistory,
        Criterion::Price,
        Criterion::Timeline,
        Criterion::Warranty,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Criterion::Capacity => "capacity",
            Criterion::Rpi => "rpi",
            Criterion::CostBand => "cost_band",
            Criterion::Distance => "distance",
            Criterion::SlaHistory => "sla_history",
            Criterion::Price => "price",
            Criterion::Timeline => "timeline",
            Criterion::Warranty => "warranty",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|criterion| criterion.name() == normalized)
    }

    pub const fn requires_quote(self) -> bool {
        matches!(
            self,
            Criterion::Price | Criterion::Timeline | Criterion::Warranty
        )
    }
}

pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Rejections raised while building a weight vector.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvalidWeights {
    #[error("weight vector is empty")]
    Empty,
    #[error("unknown criterion '{0}'")]
    UnknownCriterion(String),
    #[error("weight for {criterion} must be finite and non-negative (found {value})")]
    OutOfRange { criterion: &'static str, value: f64 },
    #[error("weights must sum to 1.0 (found {sum:.6})")]
    Sum { sum: f64 },
    #[error("custom weights are required for the user_choice policy")]
    Missing,
    #[error("criterion {0} needs a bid quote and cannot drive allocation")]
    QuoteOnly(&'static str),
}

/// Validated weight vector: non-negative, finite, summing to 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<Criterion, f64>",
    into = "BTreeMap<Criterion, f64>"
)]
pub struct Weights(BTreeMap<Criterion, f64>);

impl Weights {
    pub fn new(weights: BTreeMap<Criterion, f64>) -> Result<Self, InvalidWeights> {
        if weights.is_empty() {
            return Err(InvalidWeights::Empty);
        }

        for (criterion, value) in &weights {
            if !value.is_finite() || *value < 0.0 {
                return Err(InvalidWeights::OutOfRange {
                    criterion: criterion.name(),
                    value: *value,
                });
            }
        }

        let sum: f64 = weights.values().sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(InvalidWeights::Sum { sum });
        }

        Ok(Self(weights))
    }

    /// Build from caller-supplied names such as `"sla_history"`.
    pub fn from_named<I, S>(entries: I) -> Result<Self, InvalidWeights>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        let mut weights = BTreeMap::new();
        for (name, value) in entries {
            let criterion = Criterion::from_name(name.as_ref())
                .ok_or_else(|| InvalidWeights::UnknownCriterion(name.as_ref().to_string()))?;
            weights.insert(criterion, value);
        }
        Self::new(weights)
    }

    /// Weights favoring reliability and SLA history.
    pub fn gov_optimized() -> Self {
        Self::preset(&[
            (Criterion::Capacity, 0.20),
            (Criterion::Rpi, 0.30),
            (Criterion::CostBand, 0.20),
            (Criterion::Distance, 0.15),
            (Criterion::SlaHistory, 0.15),
        ])
    }

    /// Weights favoring idle capacity so work spreads across installers.
    pub fn equitable() -> Self {
        Self::preset(&[
            (Criterion::Capacity, 0.50),
            (Criterion::Rpi, 0.15),
            (Criterion::CostBand, 0.10),
            (Criterion::Distance, 0.10),
            (Criterion::SlaHistory, 0.15),
        ])
    }

    /// Bid scoring: the quoted price replaces the installer's pricing band.
    pub fn bidding() -> Self {
        Self::preset(&[
            (Criterion::Price, 0.35),
            (Criterion::Rpi, 0.20),
            (Criterion::Timeline, 0.15),
            (Criterion::Warranty, 0.10),
            (Criterion::SlaHistory, 0.10),
            (Criterion::Distance, 0.10),
        ])
    }

    fn preset(entries: &[(Criterion, f64)]) -> Self {
        Self(entries.iter().copied().collect())
    }

    pub fn get(&self, criterion: Criterion) -> f64 {
        self.0.get(&criterion).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Criterion, f64)> + '_ {
        self.0.iter().map(|(criterion, weight)| (*criterion, *weight))
    }

    /// First criterion that only makes sense for a quoted bid, if any carries weight.
    pub fn quote_only_criterion(&self) -> Option<Criterion> {
        self.iter()
            .find(|(criterion, weight)| criterion.requires_quote() && *weight > 0.0)
            .map(|(criterion, _)| criterion)
    }
}

impl TryFrom<BTreeMap<Criterion, f64>> for Weights {
    type Error = InvalidWeights;

    fn try_from(value: BTreeMap<Criterion, f64>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Weights> for BTreeMap<Criterion, f64> {
    fn from(value: Weights) -> Self {
        value.0
    }
}
