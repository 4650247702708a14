use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::workflows::clock::{Clock, SystemClock};
use crate::workflows::locks::{hold, KeyedLocks};
use crate::workflows::registry::{
    check_eligibility, Installer, InstallerRegistry, Job, JobId, RegistryError,
};
use crate::workflows::scoring::{
    order_by_score, Criterion, InvalidWeights, ScoreCard, ScoringFunction, Weights,
};
use crate::workflows::store::RepositoryError;

use super::domain::{AllocationId, AllocationPolicy, AllocationRecord, RankedAlternative};
use super::repository::AllocationRepository;

/// Selects an installer for a job under a policy and records the decision.
pub struct AllocationEngine<R, G> {
    repository: Arc<R>,
    registry: Arc<G>,
    scoring: ScoringFunction,
    clock: Arc<dyn Clock>,
    locks: KeyedLocks<JobId>,
}

static ALLOCATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_allocation_id() -> AllocationId {
    let id = ALLOCATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    AllocationId(format!("alloc-{id:08}"))
}

struct Candidate {
    installer: Installer,
    card: ScoreCard,
}

impl<R, G> AllocationEngine<R, G>
where
    R: AllocationRepository + 'static,
    G: InstallerRegistry + 'static,
{
    pub fn new(repository: Arc<R>, registry: Arc<G>) -> Self {
        Self::with_parts(
            repository,
            registry,
            ScoringFunction::default(),
            Arc::new(SystemClock),
        )
    }

    pub fn with_parts(
        repository: Arc<R>,
        registry: Arc<G>,
        scoring: ScoringFunction,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            registry,
            scoring,
            clock,
            locks: KeyedLocks::default(),
        }
    }

    /// Rank eligible installers for `job` and record the winner.
    ///
    /// When the newest record for this job and policy was computed from the same job,
    /// weight vector, and eligible pool, that record is returned instead of appending a
    /// duplicate. Any other run appends, even if an older record shares its inputs.
    pub fn allocate(
        &self,
        job: &Job,
        policy: AllocationPolicy,
        weights: Option<Weights>,
    ) -> Result<AllocationRecord, AllocationError> {
        let weights = policy.resolve_weights(weights)?;

        let slot = self.locks.slot(&job.id);
        let _held = hold(&slot);

        let snapshot = self.registry.snapshot()?;
        let considered = snapshot.len();

        let mut candidates: Vec<Candidate> = snapshot
            .into_iter()
            .filter(|installer| check_eligibility(installer, job).is_ok())
            .filter_map(|installer| {
                let card = self.scoring.score(&installer, job, &weights, None)?;
                Some(Candidate { installer, card })
            })
            .collect();

        order_by_score(
            &mut candidates,
            |candidate| candidate.card.total,
            |left, right| left.installer.id.cmp(&right.installer.id),
        );

        let digest = input_digest(job, policy, &weights, &candidates)?;
        if let Some(latest) = self.repository.latest(&job.id, policy)? {
            if latest.input_digest == digest {
                debug!(job_id = %job.id.0, allocation_id = %latest.id.0, "allocation inputs unchanged");
                return Ok(latest);
            }
        }

        let mut ranked = candidates.into_iter();
        let Some(winner) = ranked.next() else {
            warn!(job_id = %job.id.0, considered, policy = policy.label(), "no eligible installer");
            return Err(AllocationError::NoEligibleInstaller {
                job_id: job.id.0.clone(),
                considered,
            });
        };
        let justification = justify(&winner, policy, ranked.as_slice().first());
        let alternatives = ranked
            .map(|candidate| RankedAlternative {
                installer_id: candidate.installer.id,
                score: candidate.card.total,
            })
            .collect();

        let record = AllocationRecord {
            id: next_allocation_id(),
            job_id: job.id.clone(),
            job: job.clone(),
            installer_id: winner.installer.id.clone(),
            score: winner.card.total,
            weights,
            breakdown: winner.card.breakdown,
            alternatives,
            justification,
            policy,
            input_digest: digest,
            created_at: self.clock.now(),
        };

        let stored = self.repository.append(record)?;
        info!(
            job_id = %stored.job_id.0,
            installer_id = %stored.installer_id.0,
            score = stored.score,
            policy = policy.label(),
            "allocation recorded"
        );
        Ok(stored)
    }

    /// Every decision recorded for a job, oldest first. The newest record per policy is
    /// the engine's current decision for that policy.
    pub fn history(&self, job_id: &JobId) -> Result<Vec<AllocationRecord>, AllocationError> {
        Ok(self.repository.history(job_id)?)
    }
}

#[derive(Serialize)]
struct DigestInput<'a> {
    job: &'a Job,
    policy: AllocationPolicy,
    weights: &'a Weights,
    pool: Vec<&'a Installer>,
}

fn input_digest(
    job: &Job,
    policy: AllocationPolicy,
    weights: &Weights,
    candidates: &[Candidate],
) -> Result<String, serde_json::Error> {
    let mut pool: Vec<&Installer> = candidates
        .iter()
        .map(|candidate| &candidate.installer)
        .collect();
    pool.sort_by(|left, right| left.id.cmp(&right.id));

    let canonical = serde_json::to_vec(&DigestInput {
        job,
        policy,
        weights,
        pool,
    })?;
    Ok(hex::encode(Sha256::digest(canonical)))
}

/// Names the largest contributors, and the criterion that opened the gap to the runner-up.
fn justify(
    winner: &Candidate,
    policy: AllocationPolicy,
    runner_up: Option<&Candidate>,
) -> String {
    let dominant = winner.card.dominant_criteria();
    let mut drivers = Vec::new();
    if let Some((first, first_value)) = dominant.first() {
        drivers.push(format!("{} ({:.1})", first.name(), first_value));
        if let Some((second, second_value)) = dominant.get(1) {
            if *second_value > 0.0 && *second_value >= first_value * 0.5 {
                drivers.push(format!("{} ({:.1})", second.name(), second_value));
            }
        }
    }
    let drivers = if drivers.is_empty() {
        "no weighted criteria".to_string()
    } else {
        drivers.join(" and ")
    };

    let comparison = match runner_up {
        Some(other) => {
            let margin = winner.card.total - other.card.total;
            match deciding_criterion(&winner.card, &other.card) {
                Some((criterion, edge)) => format!(
                    "leads {} by {:.2} points, decided by {} (+{:.1})",
                    other.installer.id.0,
                    margin,
                    criterion.name(),
                    edge
                ),
                None => format!("leads {} by {:.2} points", other.installer.id.0, margin),
            }
        }
        None => "only eligible installer".to_string(),
    };

    format!(
        "Selected {} ({}) with score {:.2} under {} policy; driven by {}; {}",
        winner.installer.name,
        winner.installer.company,
        winner.card.total,
        policy.label(),
        drivers,
        comparison
    )
}

fn deciding_criterion(winner: &ScoreCard, other: &ScoreCard) -> Option<(Criterion, f64)> {
    winner
        .breakdown
        .iter()
        .map(|(criterion, value)| {
            let theirs = other.breakdown.get(criterion).copied().unwrap_or(0.0);
            (*criterion, value - theirs)
        })
        .filter(|(_, edge)| *edge > 0.0)
        .max_by(|left, right| left.1.total_cmp(&right.1).then(right.0.cmp(&left.0)))
}

/// Error raised by the allocation engine.
#[derive(Debug, thiserror::Error)]
pub enum AllocationError {
    #[error("invalid weights: {0}")]
    InvalidWeights(#[from] InvalidWeights),
    #[error("no eligible installer for job {job_id} ({considered} installers considered)")]
    NoEligibleInstaller { job_id: String, considered: usize },
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("failed to fingerprint allocation inputs: {0}")]
    Fingerprint(#[from] serde_json::Error),
}

impl AllocationError {
    /// Stable machine-readable code for API consumers.
    pub fn kind(&self) -> &'static str {
        match self {
            AllocationError::InvalidWeights(_) => "invalid_weights",
            AllocationError::NoEligibleInstaller { .. } => "no_eligible_installer",
            AllocationError::Registry(_) => "registry_unavailable",
            AllocationError::Repository(_) => "repository_error",
            AllocationError::Fingerprint(_) => "fingerprint_failed",
        }
    }
}
