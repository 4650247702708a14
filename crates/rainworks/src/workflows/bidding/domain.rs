use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::registry::{InstallerId, Job, JobId};
use crate::workflows::scoring::{order_by_score, BidQuote, Criterion};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AuctionId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BidId(pub String);

/// Auction lifecycle. `Awarded` and `Expired` are terminal; `Closed` only moves to `Awarded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuctionState {
    Open,
    Closed,
    Awarded,
    Expired,
}

impl AuctionState {
    pub const fn label(self) -> &'static str {
        match self {
            AuctionState::Open => "open",
            AuctionState::Closed => "closed",
            AuctionState::Awarded => "awarded",
            AuctionState::Expired => "expired",
        }
    }

    /// Open and closed auctions still block a new auction for the same job.
    pub const fn is_active(self) -> bool {
        matches!(self, AuctionState::Open | AuctionState::Closed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BidStatus {
    Active,
    Awarded,
    Rejected,
}

/// Bid payload submitted by an installer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidSubmission {
    pub installer_id: InstallerId,
    pub price: u64,
    pub timeline_days: u32,
    pub warranty_months: u32,
}

impl BidSubmission {
    pub fn quote(&self) -> BidQuote {
        BidQuote {
            price: self.price,
            timeline_days: self.timeline_days,
            warranty_months: self.warranty_months,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidRecord {
    pub id: BidId,
    pub auction_id: AuctionId,
    pub job_id: JobId,
    pub installer_id: InstallerId,
    pub price: u64,
    pub timeline_days: u32,
    pub warranty_months: u32,
    pub score: f64,
    pub breakdown: BTreeMap<Criterion, f64>,
    /// 1-based position among all bids of the auction.
    pub rank: u32,
    pub submitted_at: DateTime<Utc>,
    pub status: BidStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Auction {
    pub id: AuctionId,
    pub job: Job,
    pub state: AuctionState,
    pub opened_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    /// Kept in rank order.
    pub bids: Vec<BidRecord>,
    pub awarded_bid: Option<BidId>,
    pub closed_at: Option<DateTime<Utc>>,
    pub awarded_at: Option<DateTime<Utc>>,
    pub expired_at: Option<DateTime<Utc>>,
}

impl Auction {
    /// Open past its deadline but not yet marked expired.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.state == AuctionState::Open && now > self.deadline
    }

    /// Marks an overdue auction expired. Returns whether the state changed.
    pub(crate) fn expire_if_overdue(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_overdue(now) {
            return false;
        }
        self.state = AuctionState::Expired;
        self.expired_at = Some(now);
        true
    }

    /// Re-sorts bids and rewrites ranks as a dense 1..N permutation.
    pub(crate) fn rerank(&mut self) {
        order_by_score(
            &mut self.bids,
            |bid| bid.score,
            |left, right| {
                left.installer_id
                    .cmp(&right.installer_id)
                    .then_with(|| left.id.cmp(&right.id))
            },
        );
        for (position, bid) in self.bids.iter_mut().enumerate() {
            bid.rank = position as u32 + 1;
        }
    }

    pub fn bid(&self, id: &BidId) -> Option<&BidRecord> {
        self.bids.iter().find(|bid| &bid.id == id)
    }

    pub fn winning_bid(&self) -> Option<&BidRecord> {
        self.awarded_bid.as_ref().and_then(|id| self.bid(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::fixtures::{job, start_time};
    use chrono::Duration;

    fn bid(id: &str, installer: &str, score: f64) -> BidRecord {
        BidRecord {
            id: BidId(id.to_string()),
            auction_id: AuctionId("auc-1".to_string()),
            job_id: JobId("JOB-1".to_string()),
            installer_id: InstallerId(installer.to_string()),
            price: 100_000,
            timeline_days: 30,
            warranty_months: 12,
            score,
            breakdown: BTreeMap::new(),
            rank: 0,
            submitted_at: start_time(),
            status: BidStatus::Active,
        }
    }

    fn auction(bids: Vec<BidRecord>) -> Auction {
        Auction {
            id: AuctionId("auc-1".to_string()),
            job: job("JOB-1"),
            state: AuctionState::Open,
            opened_at: start_time(),
            deadline: start_time() + Duration::hours(72),
            bids,
            awarded_bid: None,
            closed_at: None,
            awarded_at: None,
            expired_at: None,
        }
    }

    #[test]
    fn rerank_assigns_dense_ranks_with_installer_then_bid_tiebreak() {
        let mut auction = auction(vec![
            bid("bid-3", "INS-B", 70.0),
            bid("bid-2", "INS-A", 70.004),
            bid("bid-1", "INS-A", 70.0),
            bid("bid-4", "INS-C", 82.5),
        ]);

        auction.rerank();

        let order: Vec<(&str, u32)> = auction
            .bids
            .iter()
            .map(|bid| (bid.id.0.as_str(), bid.rank))
            .collect();
        assert_eq!(
            order,
            vec![("bid-4", 1), ("bid-1", 2), ("bid-2", 3), ("bid-3", 4)]
        );
    }

    #[test]
    fn only_open_auctions_expire() {
        let mut open = auction(Vec::new());
        let late = open.deadline + Duration::seconds(1);
        assert!(!open.expire_if_overdue(open.deadline));
        assert!(open.expire_if_overdue(late));
        assert_eq!(open.state, AuctionState::Expired);
        assert_eq!(open.expired_at, Some(late));

        let mut closed = auction(Vec::new());
        closed.state = AuctionState::Closed;
        assert!(!closed.expire_if_overdue(late));
        assert_eq!(closed.state, AuctionState::Closed);
    }
}
