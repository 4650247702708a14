//! Weighted multi-criteria scoring shared by allocation and bidding.

mod criteria;
mod weights;

pub use weights::{Criterion, InvalidWeights, Weights, WEIGHT_SUM_TOLERANCE};

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::registry::{DistanceEstimator, GreatCircleDistance, Installer, Job};

/// Scores within this many points are treated as tied.
pub const TIE_TOLERANCE: f64 = 0.01;

/// Quoted terms attached to a bid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidQuote {
    pub price: u64,
    pub timeline_days: u32,
    pub warranty_months: u32,
}

/// Composite score on a 0-100 scale plus the contribution of every weighted criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCard {
    pub total: f64,
    pub breakdown: BTreeMap<Criterion, f64>,
}

impl ScoreCard {
    /// Criteria ordered by contribution, largest first.
    pub fn dominant_criteria(&self) -> Vec<(Criterion, f64)> {
        let mut contributions: Vec<(Criterion, f64)> = self
            .breakdown
            .iter()
            .map(|(criterion, value)| (*criterion, *value))
            .collect();
        contributions.sort_by(|left, right| right.1.total_cmp(&left.1).then(left.0.cmp(&right.0)));
        contributions
    }
}

/// Pure scoring over an (installer, job) pair; distance is an injected capability.
#[derive(Clone)]
pub struct ScoringFunction {
    distance: Arc<dyn DistanceEstimator>,
}

impl Default for ScoringFunction {
    fn default() -> Self {
        Self::new(Arc::new(GreatCircleDistance))
    }
}

impl ScoringFunction {
    pub fn new(distance: Arc<dyn DistanceEstimator>) -> Self {
        Self { distance }
    }

    /// Returns `None` when the installer does not serve the job's region: that is a hard
    /// exclusion, never a low score.
    pub fn score(
        &self,
        installer: &Installer,
        job: &Job,
        weights: &Weights,
        quote: Option<&BidQuote>,
    ) -> Option<ScoreCard> {
        if !installer.serves(&job.region) {
            return None;
        }

        let km = self
            .distance
            .distance_km(installer.service_centroid, job.location);

        let breakdown: BTreeMap<Criterion, f64> = weights
            .iter()
            .map(|(criterion, weight)| {
                let value = normalized(criterion, installer, job, km, quote);
                (criterion, weight * value * 100.0)
            })
            .collect();
        let total = breakdown.values().sum();

        Some(ScoreCard { total, breakdown })
    }
}

fn normalized(
    criterion: Criterion,
    installer: &Installer,
    job: &Job,
    km: f64,
    quote: Option<&BidQuote>,
) -> f64 {
    match criterion {
        Criterion::Capacity => criteria::capacity(installer.capacity_available()),
        Criterion::Rpi => criteria::percentage(installer.rpi),
        Criterion::CostBand => criteria::cost_band(
            installer.price_band.map(|band| band.midpoint()),
            job.estimated_cost,
        ),
        Criterion::Distance => criteria::distance(km),
        Criterion::SlaHistory => criteria::percentage(installer.sla_compliance_pct),
        Criterion::Price => quote
            .map(|quote| criteria::price(quote.price, job.estimated_cost))
            .unwrap_or(0.0),
        Criterion::Timeline => quote
            .map(|quote| criteria::timeline(quote.timeline_days))
            .unwrap_or(0.0),
        Criterion::Warranty => quote
            .map(|quote| criteria::warranty(quote.warranty_months))
            .unwrap_or(0.0),
    }
}

/// Order by score descending. Runs of scores within [`TIE_TOLERANCE`] of the run's
/// leader are re-ordered by `tiebreak`, so arrival order never decides a tie.
pub(crate) fn order_by_score<T, S, K>(items: &mut [T], score: S, tiebreak: K)
where
    S: Fn(&T) -> f64,
    K: Fn(&T, &T) -> Ordering,
{
    items.sort_by(|left, right| {
        score(right)
            .total_cmp(&score(left))
            .then_with(|| tiebreak(left, right))
    });

    let mut start = 0;
    while start < items.len() {
        let leader = score(&items[start]);
        let mut end = start + 1;
        while end < items.len() && leader - score(&items[end]) <= TIE_TOLERANCE {
            end += 1;
        }
        items[start..end].sort_by(&tiebreak);
        start = end;
    }
}
