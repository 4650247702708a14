use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::registry::{InstallerId, Job, JobId};
use crate::workflows::scoring::{Criterion, InvalidWeights, Weights};

/// Identifier wrapper for allocation decisions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AllocationId(pub String);

/// Decision policy selecting which weight vector drives the ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationPolicy {
    GovOptimized,
    Equitable,
    UserChoice,
}

impl AllocationPolicy {
    pub const fn label(self) -> &'static str {
        match self {
            AllocationPolicy::GovOptimized => "gov_optimized",
            AllocationPolicy::Equitable => "equitable",
            AllocationPolicy::UserChoice => "user_choice",
        }
    }

    /// Weights the policy runs with. Presets ignore `custom`; `user_choice` requires it.
    pub fn resolve_weights(self, custom: Option<Weights>) -> Result<Weights, InvalidWeights> {
        match self {
            AllocationPolicy::GovOptimized => Ok(Weights::gov_optimized()),
            AllocationPolicy::Equitable => Ok(Weights::equitable()),
            AllocationPolicy::UserChoice => {
                let weights = custom.ok_or(InvalidWeights::Missing)?;
                if let Some(criterion) = weights.quote_only_criterion() {
                    return Err(InvalidWeights::QuoteOnly(criterion.name()));
                }
                Ok(weights)
            }
        }
    }
}

/// Runner-up installer and its score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedAlternative {
    pub installer_id: InstallerId,
    pub score: f64,
}

/// Immutable allocation decision. New runs append new records; nothing is overwritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationRecord {
    pub id: AllocationId,
    pub job_id: JobId,
    pub job: Job,
    pub installer_id: InstallerId,
    pub score: f64,
    pub weights: Weights,
    pub breakdown: BTreeMap<Criterion, f64>,
    pub alternatives: Vec<RankedAlternative>,
    pub justification: String,
    pub policy: AllocationPolicy,
    /// Fingerprint of (job, policy, weights, eligible pool) used as the idempotency key.
    pub input_digest: String,
    pub created_at: DateTime<Utc>,
}
