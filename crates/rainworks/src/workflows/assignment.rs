//! Handoff value passed from allocation or bidding into escrow.

use serde::{Deserialize, Serialize};

use super::allocation::{AllocationId, AllocationPolicy, AllocationRecord};
use super::bidding::{AuctionId, BidId, BidRecord, BidStatus};
use super::registry::{InstallerId, JobId};

/// Where the installer selection came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssignmentSource {
    Allocation {
        record_id: AllocationId,
        policy: AllocationPolicy,
    },
    Award {
        auction_id: AuctionId,
        bid_id: BidId,
    },
}

/// Job and installer pairing plus the amount escrow should hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub job_id: JobId,
    pub installer_id: InstallerId,
    pub agreed_amount: u64,
    pub source: AssignmentSource,
}

impl From<&AllocationRecord> for Assignment {
    fn from(record: &AllocationRecord) -> Self {
        Self {
            job_id: record.job_id.clone(),
            installer_id: record.installer_id.clone(),
            agreed_amount: record.job.estimated_cost,
            source: AssignmentSource::Allocation {
                record_id: record.id.clone(),
                policy: record.policy,
            },
        }
    }
}

impl Assignment {
    /// `None` unless the bid actually won its auction.
    pub fn from_awarded_bid(bid: &BidRecord) -> Option<Self> {
        if bid.status != BidStatus::Awarded {
            return None;
        }
        Some(Self {
            job_id: bid.job_id.clone(),
            installer_id: bid.installer_id.clone(),
            agreed_amount: bid.price,
            source: AssignmentSource::Award {
                auction_id: bid.auction_id.clone(),
                bid_id: bid.id.clone(),
            },
        })
    }
}
