use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::workflows::clock::{Clock, SystemClock};
use crate::workflows::locks::{hold, KeyedLocks};
use crate::workflows::registry::{
    check_eligibility, Ineligibility, InstallerRegistry, Job, JobId, RegistryError,
};
use crate::workflows::scoring::{ScoringFunction, Weights};
use crate::workflows::store::RepositoryError;

use super::domain::{
    Auction, AuctionId, AuctionState, BidId, BidRecord, BidStatus, BidSubmission,
};
use super::repository::AuctionRepository;

const DEFAULT_AUCTION_HOURS: u32 = 72;

/// Runs auctions: opening, bid intake with live ranking, closing, awarding, and expiry.
pub struct AuctionCoordinator<R, G> {
    repository: Arc<R>,
    registry: Arc<G>,
    scoring: ScoringFunction,
    weights: Weights,
    clock: Arc<dyn Clock>,
    default_hours: u32,
    job_locks: KeyedLocks<JobId>,
    auction_locks: KeyedLocks<AuctionId>,
}

static AUCTION_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static BID_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_auction_id() -> AuctionId {
    let id = AUCTION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    AuctionId(format!("auc-{id:08}"))
}

fn next_bid_id() -> BidId {
    let id = BID_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    BidId(format!("bid-{id:08}"))
}

impl<R, G> AuctionCoordinator<R, G>
where
    R: AuctionRepository + 'static,
    G: InstallerRegistry + 'static,
{
    pub fn new(repository: Arc<R>, registry: Arc<G>) -> Self {
        Self::with_parts(
            repository,
            registry,
            ScoringFunction::default(),
            Arc::new(SystemClock),
            DEFAULT_AUCTION_HOURS,
        )
    }

    pub fn with_parts(
        repository: Arc<R>,
        registry: Arc<G>,
        scoring: ScoringFunction,
        clock: Arc<dyn Clock>,
        default_hours: u32,
    ) -> Self {
        Self {
            repository,
            registry,
            scoring,
            weights: Weights::bidding(),
            clock,
            default_hours,
            job_locks: KeyedLocks::default(),
            auction_locks: KeyedLocks::default(),
        }
    }

    /// Open an auction for `job`, lasting `deadline_hours` (or the configured default).
    pub fn open(&self, job: Job, deadline_hours: Option<u32>) -> Result<Auction, AuctionError> {
        let hours = deadline_hours.unwrap_or(self.default_hours);
        if hours == 0 {
            return Err(AuctionError::InvalidDeadline { hours });
        }

        let job_slot = self.job_locks.slot(&job.id);
        let _job_held = hold(&job_slot);

        let now = self.clock.now();
        for existing in self.repository.for_job(&job.id)? {
            if !existing.state.is_active() {
                continue;
            }
            let slot = self.auction_locks.slot(&existing.id);
            let _held = hold(&slot);
            let mut current = self.load(&existing.id)?;
            if self.persist_expiry(&mut current, now)? {
                continue;
            }
            if current.state.is_active() {
                return Err(AuctionError::AuctionAlreadyOpen {
                    job_id: job.id.0.clone(),
                    auction_id: current.id.0,
                });
            }
        }

        let auction = Auction {
            id: next_auction_id(),
            job,
            state: AuctionState::Open,
            opened_at: now,
            deadline: now + Duration::hours(i64::from(hours)),
            bids: Vec::new(),
            awarded_bid: None,
            closed_at: None,
            awarded_at: None,
            expired_at: None,
        };
        let stored = self.repository.insert(auction)?;
        info!(
            auction_id = %stored.id.0,
            job_id = %stored.job.id.0,
            deadline = %stored.deadline,
            "auction opened"
        );
        Ok(stored)
    }

    /// Score and insert a bid, then re-rank every bid of the auction.
    pub fn submit_bid(
        &self,
        auction_id: &AuctionId,
        submission: BidSubmission,
    ) -> Result<BidRecord, AuctionError> {
        let slot = self.auction_locks.slot(auction_id);
        let _held = hold(&slot);

        let now = self.clock.now();
        let mut auction = self.load(auction_id)?;
        if self.persist_expiry(&mut auction, now)? {
            return Err(AuctionError::AuctionExpired {
                auction_id: auction_id.0.clone(),
            });
        }
        match auction.state {
            AuctionState::Open => {}
            AuctionState::Expired => {
                return Err(AuctionError::AuctionExpired {
                    auction_id: auction_id.0.clone(),
                })
            }
            state @ (AuctionState::Closed | AuctionState::Awarded) => {
                return Err(AuctionError::AuctionNotOpen {
                    auction_id: auction_id.0.clone(),
                    state,
                })
            }
        }

        if submission.price == 0 {
            return Err(AuctionError::InvalidBid(
                "quoted price must be greater than zero".to_string(),
            ));
        }

        let installer = self
            .registry
            .installer(&submission.installer_id)?
            .ok_or_else(|| AuctionError::InstallerNotFound {
                installer_id: submission.installer_id.0.clone(),
            })?;

        // Free capacity is not a bidding precondition: the quoted timeline absorbs it.
        match check_eligibility(&installer, &auction.job) {
            Ok(()) | Err(Ineligibility::NoCapacity) => {}
            Err(reason) => {
                return Err(AuctionError::IneligibleInstaller {
                    installer_id: installer.id.0,
                    reason,
                })
            }
        }

        let quote = submission.quote();
        let card = self
            .scoring
            .score(&installer, &auction.job, &self.weights, Some(&quote))
            .ok_or_else(|| AuctionError::IneligibleInstaller {
                installer_id: installer.id.0.clone(),
                reason: Ineligibility::OutsideServiceArea {
                    region: auction.job.region.clone(),
                },
            })?;

        let bid_id = next_bid_id();
        auction.bids.push(BidRecord {
            id: bid_id.clone(),
            auction_id: auction.id.clone(),
            job_id: auction.job.id.clone(),
            installer_id: installer.id,
            price: quote.price,
            timeline_days: quote.timeline_days,
            warranty_months: quote.warranty_months,
            score: card.total,
            breakdown: card.breakdown,
            rank: 0,
            submitted_at: now,
            status: BidStatus::Active,
        });
        auction.rerank();

        let stored = auction
            .bid(&bid_id)
            .cloned()
            .ok_or_else(|| AuctionError::BidNotFound {
                auction_id: auction_id.0.clone(),
                bid_id: bid_id.0.clone(),
            })?;
        self.repository.update(auction)?;

        info!(
            auction_id = %auction_id.0,
            bid_id = %stored.id.0,
            installer_id = %stored.installer_id.0,
            score = stored.score,
            rank = stored.rank,
            "bid ranked"
        );
        Ok(stored)
    }

    /// Award the auction to `bid_id`; every other bid is rejected.
    pub fn award(&self, auction_id: &AuctionId, bid_id: &BidId) -> Result<Auction, AuctionError> {
        let slot = self.auction_locks.slot(auction_id);
        let _held = hold(&slot);

        let now = self.clock.now();
        let mut auction = self.load(auction_id)?;
        if self.persist_expiry(&mut auction, now)? {
            return Err(AuctionError::AuctionExpired {
                auction_id: auction_id.0.clone(),
            });
        }
        match auction.state {
            AuctionState::Open | AuctionState::Closed => {}
            AuctionState::Awarded => {
                return Err(AuctionError::AuctionAlreadyAwarded {
                    auction_id: auction_id.0.clone(),
                })
            }
            AuctionState::Expired => {
                return Err(AuctionError::AuctionExpired {
                    auction_id: auction_id.0.clone(),
                })
            }
        }

        if auction.bid(bid_id).is_none() {
            return Err(AuctionError::BidNotFound {
                auction_id: auction_id.0.clone(),
                bid_id: bid_id.0.clone(),
            });
        }

        for bid in auction.bids.iter_mut() {
            bid.status = if &bid.id == bid_id {
                BidStatus::Awarded
            } else {
                BidStatus::Rejected
            };
        }
        auction.state = AuctionState::Awarded;
        auction.awarded_bid = Some(bid_id.clone());
        auction.awarded_at = Some(now);
        self.repository.update(auction.clone())?;

        info!(
            auction_id = %auction_id.0,
            bid_id = %bid_id.0,
            bids = auction.bids.len(),
            "auction awarded"
        );
        Ok(auction)
    }

    /// Stop accepting bids. Closing a closed auction is a no-op.
    pub fn close(&self, auction_id: &AuctionId) -> Result<Auction, AuctionError> {
        let slot = self.auction_locks.slot(auction_id);
        let _held = hold(&slot);

        let now = self.clock.now();
        let mut auction = self.load(auction_id)?;
        if self.persist_expiry(&mut auction, now)? {
            return Err(AuctionError::AuctionExpired {
                auction_id: auction_id.0.clone(),
            });
        }
        match auction.state {
            AuctionState::Open => {
                auction.state = AuctionState::Closed;
                auction.closed_at = Some(now);
                self.repository.update(auction.clone())?;
                info!(auction_id = %auction_id.0, bids = auction.bids.len(), "auction closed");
                Ok(auction)
            }
            AuctionState::Closed => Ok(auction),
            AuctionState::Awarded => Err(AuctionError::AuctionAlreadyAwarded {
                auction_id: auction_id.0.clone(),
            }),
            AuctionState::Expired => Err(AuctionError::AuctionExpired {
                auction_id: auction_id.0.clone(),
            }),
        }
    }

    /// Administrative cancellation: a close that is never followed by an award.
    pub fn cancel(&self, auction_id: &AuctionId) -> Result<Auction, AuctionError> {
        self.close(auction_id)
    }

    /// Expire every open auction whose deadline passed before `now`.
    pub fn expire_overdue(&self, now: DateTime<Utc>) -> Result<Vec<AuctionId>, AuctionError> {
        let mut expired = Vec::new();
        for candidate in self.repository.open_auctions()? {
            if !candidate.is_overdue(now) {
                continue;
            }
            let slot = self.auction_locks.slot(&candidate.id);
            let _held = hold(&slot);
            let mut current = self.load(&candidate.id)?;
            if self.persist_expiry(&mut current, now)? {
                expired.push(current.id);
            }
        }
        if !expired.is_empty() {
            debug!(count = expired.len(), "expiry sweep finished");
        }
        Ok(expired)
    }

    /// Sweep overdue auctions against the coordinator's own clock, the same time source
    /// lazy expiry uses.
    pub fn expire_due(&self) -> Result<Vec<AuctionId>, AuctionError> {
        self.expire_overdue(self.clock.now())
    }

    pub fn get(&self, auction_id: &AuctionId) -> Result<Auction, AuctionError> {
        let slot = self.auction_locks.slot(auction_id);
        let _held = hold(&slot);

        let mut auction = self.load(auction_id)?;
        self.persist_expiry(&mut auction, self.clock.now())?;
        Ok(auction)
    }

    /// The open or closed auction currently attached to a job, if any.
    pub fn active_for_job(&self, job_id: &JobId) -> Result<Option<Auction>, AuctionError> {
        let now = self.clock.now();
        for existing in self.repository.for_job(job_id)? {
            if !existing.state.is_active() {
                continue;
            }
            let slot = self.auction_locks.slot(&existing.id);
            let _held = hold(&slot);
            let mut current = self.load(&existing.id)?;
            self.persist_expiry(&mut current, now)?;
            if current.state.is_active() {
                return Ok(Some(current));
            }
        }
        Ok(None)
    }

    fn load(&self, auction_id: &AuctionId) -> Result<Auction, AuctionError> {
        self.repository
            .fetch(auction_id)?
            .ok_or_else(|| AuctionError::AuctionNotFound {
                auction_id: auction_id.0.clone(),
            })
    }

    /// Lazy expiry. Callers must hold the auction's lock.
    fn persist_expiry(&self, auction: &mut Auction, now: DateTime<Utc>) -> Result<bool, AuctionError> {
        if !auction.expire_if_overdue(now) {
            return Ok(false);
        }
        self.repository.update(auction.clone())?;
        info!(
            auction_id = %auction.id.0,
            deadline = %auction.deadline,
            bids = auction.bids.len(),
            "auction expired"
        );
        Ok(true)
    }
}

/// Error raised by the auction coordinator.
#[derive(Debug, thiserror::Error)]
pub enum AuctionError {
    #[error("job {job_id} already has active auction {auction_id}")]
    AuctionAlreadyOpen { job_id: String, auction_id: String },
    #[error("auction {auction_id} is not open (state: {})", .state.label())]
    AuctionNotOpen {
        auction_id: String,
        state: AuctionState,
    },
    #[error("auction {auction_id} has expired")]
    AuctionExpired { auction_id: String },
    #[error("auction {auction_id} has already been awarded")]
    AuctionAlreadyAwarded { auction_id: String },
    #[error("auction {auction_id} not found")]
    AuctionNotFound { auction_id: String },
    #[error("bid {bid_id} not found in auction {auction_id}")]
    BidNotFound { auction_id: String, bid_id: String },
    #[error("installer {installer_id} not found in registry")]
    InstallerNotFound { installer_id: String },
    #[error("installer {installer_id} cannot bid: {reason}")]
    IneligibleInstaller {
        installer_id: String,
        reason: Ineligibility,
    },
    #[error("invalid bid: {0}")]
    InvalidBid(String),
    #[error("auction deadline must be at least one hour (got {hours})")]
    InvalidDeadline { hours: u32 },
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl AuctionError {
    pub fn kind(&self) -> &'static str {
        match self {
            AuctionError::AuctionAlreadyOpen { .. } => "auction_already_open",
            AuctionError::AuctionNotOpen { .. } => "auction_not_open",
            AuctionError::AuctionExpired { .. } => "auction_expired",
            AuctionError::AuctionAlreadyAwarded { .. } => "auction_already_awarded",
            AuctionError::AuctionNotFound { .. } => "auction_not_found",
            AuctionError::BidNotFound { .. } => "bid_not_found",
            AuctionError::InstallerNotFound { .. } => "installer_not_found",
            AuctionError::IneligibleInstaller { .. } => "ineligible_installer",
            AuctionError::InvalidBid(_) => "invalid_bid",
            AuctionError::InvalidDeadline { .. } => "invalid_deadline",
            AuctionError::Registry(_) => "registry_unavailable",
            AuctionError::Repository(_) => "repository_error",
        }
    }
}
