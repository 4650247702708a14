use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use crate::workflows::clock::{Clock, SystemClock};
use crate::workflows::locks::{hold, KeyedLocks};
use crate::workflows::registry::JobId;
use crate::workflows::store::RepositoryError;

use super::domain::{
    EscrowEvent, Milestone, MilestoneId, MilestoneStatus, Payment, PaymentId, PaymentRequest,
    PaymentStatus,
};
use super::gateway::{GatewayError, PaymentGateway};
use super::repository::PaymentRepository;

/// Custodial ledger driving payments through funding and staged milestone release.
pub struct EscrowLedger<R, P> {
    repository: Arc<R>,
    gateway: Arc<P>,
    clock: Arc<dyn Clock>,
    job_locks: KeyedLocks<JobId>,
    payment_locks: KeyedLocks<PaymentId>,
}

static PAYMENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static MILESTONE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_payment_id() -> PaymentId {
    let id = PAYMENT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    PaymentId(format!("pay-{id:08}"))
}

fn next_milestone_id() -> MilestoneId {
    let id = MILESTONE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    MilestoneId(format!("ms-{id:08}"))
}

impl<R, P> EscrowLedger<R, P>
where
    R: PaymentRepository + 'static,
    P: PaymentGateway + 'static,
{
    pub fn new(repository: Arc<R>, gateway: Arc<P>) -> Self {
        Self::with_clock(repository, gateway, Arc::new(SystemClock))
    }

    pub fn with_clock(repository: Arc<R>, gateway: Arc<P>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository,
            gateway,
            clock,
            job_locks: KeyedLocks::default(),
            payment_locks: KeyedLocks::default(),
        }
    }

    /// Create a payment and its milestone schedule. Repeating an identical request for
    /// the same job returns the payment already on file.
    pub fn create_payment(&self, request: PaymentRequest) -> Result<Payment, EscrowError> {
        validate_plan(&request)?;

        let slot = self.job_locks.slot(&request.job_id);
        let _held = hold(&slot);

        if let Some(existing) = self.repository.for_job(&request.job_id)? {
            if existing.matches(&request) {
                return Ok(existing);
            }
            return Err(EscrowError::PaymentAlreadyExists {
                job_id: request.job_id.0,
                payment_id: existing.id.0,
            });
        }

        let payment_id = next_payment_id();
        let milestones = request
            .milestones
            .iter()
            .enumerate()
            .map(|(index, item)| Milestone {
                id: next_milestone_id(),
                payment_id: payment_id.clone(),
                name: item.name.clone(),
                amount: item.amount,
                sequence: index as u32 + 1,
                status: MilestoneStatus::Pending,
                started_at: None,
                completed_at: None,
                verified_at: None,
                released_at: None,
            })
            .collect();

        let payment = Payment {
            id: payment_id,
            job_id: request.job_id,
            installer_id: request.installer_id,
            total_amount: request.total_amount,
            escrow_balance: request.total_amount,
            released_amount: 0,
            status: PaymentStatus::Created,
            milestones,
            created_at: self.clock.now(),
            funded_at: None,
            closed_at: None,
        };

        let stored = self.repository.insert(payment)?;
        info!(
            payment_id = %stored.id.0,
            job_id = %stored.job_id.0,
            total = stored.total_amount,
            milestones = stored.milestones.len(),
            "payment created"
        );
        Ok(stored)
    }

    /// Record that the buyer's funds were captured into escrow.
    pub fn fund_escrow(&self, payment_id: &PaymentId) -> Result<Payment, EscrowError> {
        let slot = self.payment_locks.slot(payment_id);
        let _held = hold(&slot);

        let current = self.load(payment_id)?;
        if current.is_funded() {
            return Ok(current);
        }

        let mut next = current.clone();
        next.status = PaymentStatus::Escrow;
        next.funded_at = Some(self.clock.now());

        let events = vec![EscrowEvent::Funded {
            payment_id: next.id.clone(),
            job_id: next.job_id.clone(),
            amount: next.total_amount,
        }];
        self.commit(&current, &next, events)?;

        info!(payment_id = %next.id.0, amount = next.total_amount, "escrow funded");
        Ok(next)
    }

    pub fn start_milestone(&self, milestone_id: &MilestoneId) -> Result<Milestone, EscrowError> {
        self.transition(milestone_id, |payment, index, now| {
            require_funded(payment)?;
            let milestone = &mut payment.milestones[index];
            if milestone.status >= MilestoneStatus::InProgress {
                return Ok(Vec::new());
            }
            milestone.status = MilestoneStatus::InProgress;
            milestone.started_at = Some(now);
            Ok(Vec::new())
        })
    }

    /// Mark work done. The previous milestone must already be completed.
    pub fn complete_milestone(&self, milestone_id: &MilestoneId) -> Result<Milestone, EscrowError> {
        self.transition(milestone_id, |payment, index, now| {
            if payment.milestones[index].status >= MilestoneStatus::Completed {
                return Ok(Vec::new());
            }
            require_funded(payment)?;
            if index > 0 && payment.milestones[index - 1].status < MilestoneStatus::Completed {
                let milestone = &payment.milestones[index];
                return Err(EscrowError::PriorMilestoneIncomplete {
                    milestone_id: milestone.id.0.clone(),
                    sequence: milestone.sequence,
                    prior_status: payment.milestones[index - 1].status,
                });
            }

            let milestone = &mut payment.milestones[index];
            if milestone.started_at.is_none() {
                milestone.started_at = Some(now);
            }
            milestone.status = MilestoneStatus::Completed;
            milestone.completed_at = Some(now);
            Ok(Vec::new())
        })
    }

    /// Inspector sign-off on completed work.
    pub fn verify_milestone(&self, milestone_id: &MilestoneId) -> Result<Milestone, EscrowError> {
        self.transition(milestone_id, |payment, index, now| {
            let milestone = &mut payment.milestones[index];
            match milestone.status {
                MilestoneStatus::Verified | MilestoneStatus::Released => Ok(Vec::new()),
                MilestoneStatus::Completed => {
                    milestone.status = MilestoneStatus::Verified;
                    milestone.verified_at = Some(now);
                    Ok(Vec::new())
                }
                from => Err(EscrowError::InvalidMilestoneTransition {
                    milestone_id: milestone.id.0.clone(),
                    from,
                    to: MilestoneStatus::Verified,
                }),
            }
        })
    }

    /// Move a verified milestone's amount from escrow to the installer.
    pub fn release_milestone(&self, milestone_id: &MilestoneId) -> Result<Milestone, EscrowError> {
        self.transition(milestone_id, |payment, index, now| {
            let status = payment.milestones[index].status;
            match status {
                MilestoneStatus::Released => return Ok(Vec::new()),
                MilestoneStatus::Verified => {}
                from => {
                    return Err(EscrowError::InvalidMilestoneTransition {
                        milestone_id: payment.milestones[index].id.0.clone(),
                        from,
                        to: MilestoneStatus::Released,
                    })
                }
            }

            let amount = payment.milestones[index].amount;
            if payment.escrow_balance < amount {
                return Err(EscrowError::InsufficientEscrowBalance {
                    payment_id: payment.id.0.clone(),
                    required: amount,
                    available: payment.escrow_balance,
                });
            }
            payment.escrow_balance -= amount;
            payment.released_amount += amount;

            let milestone = &mut payment.milestones[index];
            milestone.status = MilestoneStatus::Released;
            milestone.released_at = Some(now);

            let mut events = vec![EscrowEvent::MilestoneReleased {
                payment_id: payment.id.clone(),
                milestone_id: payment.milestones[index].id.clone(),
                installer_id: payment.installer_id.clone(),
                amount,
            }];

            let all_released = payment
                .milestones
                .iter()
                .all(|milestone| milestone.status == MilestoneStatus::Released);
            if all_released {
                payment.status = PaymentStatus::Released;
                events.push(EscrowEvent::PaymentReleased {
                    payment_id: payment.id.clone(),
                    installer_id: payment.installer_id.clone(),
                    total_amount: payment.total_amount,
                });
            } else {
                payment.status = PaymentStatus::PartiallyReleased;
            }
            Ok(events)
        })
    }

    /// Close a fully released payment.
    pub fn close_payment(&self, payment_id: &PaymentId) -> Result<Payment, EscrowError> {
        let slot = self.payment_locks.slot(payment_id);
        let _held = hold(&slot);

        let current = self.load(payment_id)?;
        match current.status {
            PaymentStatus::Closed => Ok(current),
            PaymentStatus::Released => {
                let mut next = current.clone();
                next.status = PaymentStatus::Closed;
                next.closed_at = Some(self.clock.now());
                self.repository.update(next.clone())?;
                info!(payment_id = %next.id.0, "payment closed");
                Ok(next)
            }
            status => Err(EscrowError::PaymentNotReleased {
                payment_id: payment_id.0.clone(),
                status,
            }),
        }
    }

    pub fn get(&self, payment_id: &PaymentId) -> Result<Payment, EscrowError> {
        self.load(payment_id)
    }

    pub fn milestone(&self, milestone_id: &MilestoneId) -> Result<Milestone, EscrowError> {
        let payment_id = self.parent_of(milestone_id)?;
        let payment = self.load(&payment_id)?;
        payment
            .milestone(milestone_id)
            .cloned()
            .ok_or_else(|| EscrowError::MilestoneNotFound {
                milestone_id: milestone_id.0.clone(),
            })
    }

    /// Runs `apply` against a copy of the parent payment under the payment's lock and
    /// persists the copy only when it succeeds.
    fn transition<F>(&self, milestone_id: &MilestoneId, apply: F) -> Result<Milestone, EscrowError>
    where
        F: FnOnce(&mut Payment, usize, chrono::DateTime<chrono::Utc>) -> Result<Vec<EscrowEvent>, EscrowError>,
    {
        let payment_id = self.parent_of(milestone_id)?;
        let slot = self.payment_locks.slot(&payment_id);
        let _held = hold(&slot);

        let current = self.load(&payment_id)?;
        let index = current
            .position(milestone_id)
            .ok_or_else(|| EscrowError::MilestoneNotFound {
                milestone_id: milestone_id.0.clone(),
            })?;

        let mut next = current.clone();
        let events = apply(&mut next, index, self.clock.now())?;
        if next == current {
            return Ok(current.milestones[index].clone());
        }
        if !next.is_balanced() {
            return Err(EscrowError::InsufficientEscrowBalance {
                payment_id: next.id.0.clone(),
                required: next.total_amount,
                available: next.escrow_balance,
            });
        }

        self.commit(&current, &next, events)?;

        let milestone = next.milestones[index].clone();
        info!(
            payment_id = %next.id.0,
            milestone_id = %milestone.id.0,
            sequence = milestone.sequence,
            status = milestone.status.label(),
            escrow_balance = next.escrow_balance,
            released = next.released_amount,
            "milestone updated"
        );
        Ok(milestone)
    }

    /// Persist `next`, then hand the gateway every event of the change as one batch.
    /// A rejected batch restores `previous`, so ledger and gateway never diverge.
    fn commit(
        &self,
        previous: &Payment,
        next: &Payment,
        events: Vec<EscrowEvent>,
    ) -> Result<(), EscrowError> {
        self.repository.update(next.clone())?;
        if events.is_empty() {
            return Ok(());
        }
        if let Err(error) = self.gateway.publish(&events) {
            warn!(
                payment_id = %previous.id.0,
                events = events.len(),
                %error,
                "gateway rejected escrow events; rolling back"
            );
            self.repository.update(previous.clone())?;
            return Err(EscrowError::Gateway(error));
        }
        Ok(())
    }

    fn load(&self, payment_id: &PaymentId) -> Result<Payment, EscrowError> {
        self.repository
            .fetch(payment_id)?
            .ok_or_else(|| EscrowError::PaymentNotFound {
                payment_id: payment_id.0.clone(),
            })
    }

    fn parent_of(&self, milestone_id: &MilestoneId) -> Result<PaymentId, EscrowError> {
        self.repository
            .payment_for_milestone(milestone_id)?
            .ok_or_else(|| EscrowError::MilestoneNotFound {
                milestone_id: milestone_id.0.clone(),
            })
    }
}

fn validate_plan(request: &PaymentRequest) -> Result<(), EscrowError> {
    if request.total_amount == 0 {
        return Err(EscrowError::InvalidMilestonePlan(
            "total amount must be greater than zero".to_string(),
        ));
    }
    if request.milestones.is_empty() {
        return Err(EscrowError::InvalidMilestonePlan(
            "at least one milestone is required".to_string(),
        ));
    }
    if let Some(item) = request.milestones.iter().find(|item| item.amount == 0) {
        return Err(EscrowError::InvalidMilestonePlan(format!(
            "milestone '{}' has no amount",
            item.name
        )));
    }

    let planned: u128 = request
        .milestones
        .iter()
        .map(|item| u128::from(item.amount))
        .sum();
    if planned != u128::from(request.total_amount) {
        return Err(EscrowError::MilestoneAmountMismatch {
            total: request.total_amount,
            planned,
        });
    }
    Ok(())
}

fn require_funded(payment: &Payment) -> Result<(), EscrowError> {
    if payment.is_funded() {
        Ok(())
    } else {
        Err(EscrowError::EscrowNotFunded {
            payment_id: payment.id.0.clone(),
        })
    }
}

/// Error raised by the escrow ledger.
#[derive(Debug, thiserror::Error)]
pub enum EscrowError {
    #[error("invalid milestone plan: {0}")]
    InvalidMilestonePlan(String),
    #[error("milestone amounts sum to {planned} but the payment total is {total}")]
    MilestoneAmountMismatch { total: u64, planned: u128 },
    #[error("job {job_id} already has payment {payment_id} with different terms")]
    PaymentAlreadyExists { job_id: String, payment_id: String },
    #[error("payment {payment_id} not found")]
    PaymentNotFound { payment_id: String },
    #[error("milestone {milestone_id} not found")]
    MilestoneNotFound { milestone_id: String },
    #[error("payment {payment_id} has not been funded")]
    EscrowNotFunded { payment_id: String },
    #[error(
        "milestone {milestone_id} (sequence {sequence}) cannot complete while the previous milestone is {}",
        .prior_status.label()
    )]
    PriorMilestoneIncomplete {
        milestone_id: String,
        sequence: u32,
        prior_status: MilestoneStatus,
    },
    #[error("milestone {milestone_id} cannot move from {} to {}", .from.label(), .to.label())]
    InvalidMilestoneTransition {
        milestone_id: String,
        from: MilestoneStatus,
        to: MilestoneStatus,
    },
    #[error("payment {payment_id} holds {available} in escrow but {required} is required")]
    InsufficientEscrowBalance {
        payment_id: String,
        required: u64,
        available: u64,
    },
    #[error("payment {payment_id} is {} and cannot close until fully released", .status.label())]
    PaymentNotReleased {
        payment_id: String,
        status: PaymentStatus,
    },
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl EscrowError {
    pub fn kind(&self) -> &'static str {
        match self {
            EscrowError::InvalidMilestonePlan(_) => "invalid_milestone_plan",
            EscrowError::MilestoneAmountMismatch { .. } => "milestone_amount_mismatch",
            EscrowError::PaymentAlreadyExists { .. } => "payment_already_exists",
            EscrowError::PaymentNotFound { .. } => "payment_not_found",
            EscrowError::MilestoneNotFound { .. } => "milestone_not_found",
            EscrowError::EscrowNotFunded { .. } => "escrow_not_funded",
            EscrowError::PriorMilestoneIncomplete { .. } => "prior_milestone_incomplete",
            EscrowError::InvalidMilestoneTransition { .. } => "invalid_milestone_transition",
            EscrowError::InsufficientEscrowBalance { .. } => "insufficient_escrow_balance",
            EscrowError::PaymentNotReleased { .. } => "payment_not_released",
            EscrowError::Gateway(_) => "gateway_error",
            EscrowError::Repository(_) => "repository_error",
        }
    }
}
