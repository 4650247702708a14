use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

use chrono::Duration;

use super::common::*;
use crate::workflows::assignment::{Assignment, AssignmentSource};
use crate::workflows::bidding::{
    AuctionError, AuctionId, AuctionRepository, AuctionState, BidId, BidStatus,
};
use crate::workflows::fixtures::{job, start_time};
use crate::workflows::registry::Ineligibility;

#[test]
fn open_uses_the_default_deadline() {
    let harness = harness();

    let auction = harness
        .coordinator
        .open(job("JOB-1"), None)
        .expect("auction opens");

    assert_eq!(auction.state, AuctionState::Open);
    assert_eq!(auction.opened_at, start_time());
    assert_eq!(auction.deadline, start_time() + Duration::hours(72));
    assert!(auction.bids.is_empty());
}

#[test]
fn open_rejects_zero_hour_deadlines() {
    let harness = harness();

    let err = harness
        .coordinator
        .open(job("JOB-2"), Some(0))
        .expect_err("zero hours rejected");

    assert!(matches!(err, AuctionError::InvalidDeadline { hours: 0 }));
}

#[test]
fn one_active_auction_per_job() {
    let harness = harness();
    let first = harness
        .coordinator
        .open(job("JOB-3"), Some(24))
        .expect("first auction");
    harness.coordinator.close(&first.id).expect("close");

    let err = harness
        .coordinator
        .open(job("JOB-3"), Some(24))
        .expect_err("closed auction still blocks");

    match &err {
        AuctionError::AuctionAlreadyOpen { job_id, auction_id } => {
            assert_eq!(job_id, "JOB-3");
            assert_eq!(auction_id, &first.id.0);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.kind(), "auction_already_open");
}

#[test]
fn overdue_auction_no_longer_blocks_a_new_one() {
    let harness = harness();
    let stale = harness
        .coordinator
        .open(job("JOB-4"), Some(1))
        .expect("first auction");
    harness.clock.advance(Duration::hours(2));

    let fresh = harness
        .coordinator
        .open(job("JOB-4"), Some(1))
        .expect("fresh auction");

    assert_ne!(stale.id, fresh.id);
    let stored = harness
        .repository
        .fetch(&stale.id)
        .expect("readable")
        .expect("stored");
    assert_eq!(stored.state, AuctionState::Expired);
}

#[test]
fn bids_after_the_deadline_expire_the_auction_without_a_sweep() {
    let harness = harness();
    let auction = harness
        .coordinator
        .open(job("JOB-5"), None)
        .expect("auction opens");
    harness.clock.advance(Duration::hours(72) + Duration::seconds(1));

    let err = harness
        .coordinator
        .submit_bid(&auction.id, submission("INS-A", 110_000))
        .expect_err("deadline passed");

    assert!(matches!(err, AuctionError::AuctionExpired { .. }));
    let stored = harness
        .repository
        .fetch(&auction.id)
        .expect("readable")
        .expect("stored");
    assert_eq!(stored.state, AuctionState::Expired);
    assert!(stored.bids.is_empty());
}

#[test]
fn bids_at_the_deadline_are_still_accepted() {
    let harness = harness();
    let auction = harness
        .coordinator
        .open(job("JOB-6"), Some(10))
        .expect("auction opens");
    harness.clock.advance(Duration::hours(10));

    let bid = harness
        .coordinator
        .submit_bid(&auction.id, submission("INS-A", 110_000))
        .expect("bid accepted");

    assert_eq!(bid.rank, 1);
}

#[test]
fn ranks_stay_dense_after_every_submission() {
    let harness = harness();
    let auction = harness
        .coordinator
        .open(job("JOB-7"), None)
        .expect("auction opens");

    let first = harness
        .coordinator
        .submit_bid(&auction.id, submission("INS-A", 110_000))
        .expect("first bid");
    assert_eq!(first.rank, 1);

    let cheaper = harness
        .coordinator
        .submit_bid(&auction.id, submission("INS-B", 95_000))
        .expect("second bid");
    assert_eq!(cheaper.rank, 1);

    harness
        .coordinator
        .submit_bid(&auction.id, submission("INS-A", 150_000))
        .expect("third bid");

    let current = harness.coordinator.get(&auction.id).expect("auction");
    let ranks: Vec<u32> = current.bids.iter().map(|bid| bid.rank).collect();
    assert_eq!(ranks, vec![1, 2, 3]);
    assert_eq!(current.bids[0].installer_id.0, "INS-B");
    assert_eq!(current.bids[1].id, first.id);
    assert!(current
        .bids
        .windows(2)
        .all(|pair| pair[0].score + 0.01 >= pair[1].score));
}

#[test]
fn concurrent_bids_receive_distinct_ranks() {
    let harness = harness();
    let auction = harness
        .coordinator
        .open(job("JOB-8"), None)
        .expect("auction opens");

    let handles: Vec<_> = [("INS-A", 110_000), ("INS-B", 95_000)]
        .into_iter()
        .map(|(installer, price)| {
            let coordinator = Arc::clone(&harness.coordinator);
            let auction_id = auction.id.clone();
            thread::spawn(move || {
                coordinator
                    .submit_bid(&auction_id, submission(installer, price))
                    .expect("bid accepted")
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("bidder thread");
    }

    let current = harness.coordinator.get(&auction.id).expect("auction");
    let ranks: BTreeSet<u32> = current.bids.iter().map(|bid| bid.rank).collect();
    assert_eq!(ranks, BTreeSet::from([1, 2]));
}

#[test]
fn rejects_bids_from_unknown_or_ineligible_installers() {
    let harness = harness();
    let auction = harness
        .coordinator
        .open(job("JOB-9"), None)
        .expect("auction opens");

    let unknown = harness
        .coordinator
        .submit_bid(&auction.id, submission("INS-X", 100_000))
        .expect_err("unknown installer");
    assert!(matches!(unknown, AuctionError::InstallerNotFound { .. }));

    let outside = harness
        .coordinator
        .submit_bid(&auction.id, submission("INS-O", 100_000))
        .expect_err("outside service area");
    assert!(matches!(
        outside,
        AuctionError::IneligibleInstaller {
            reason: Ineligibility::OutsideServiceArea { .. },
            ..
        }
    ));

    let free = harness
        .coordinator
        .submit_bid(&auction.id, submission("INS-A", 0))
        .expect_err("zero price");
    assert!(matches!(free, AuctionError::InvalidBid(_)));

    let current = harness.coordinator.get(&auction.id).expect("auction");
    assert!(current.bids.is_empty());
}

#[test]
fn installers_without_free_slots_may_still_bid() {
    let harness = harness();
    let auction = harness
        .coordinator
        .open(job("JOB-10"), None)
        .expect("auction opens");

    let bid = harness
        .coordinator
        .submit_bid(&auction.id, submission("INS-F", 105_000))
        .expect("bid accepted");

    assert_eq!(bid.installer_id.0, "INS-F");
    assert!(!bid.breakdown.contains_key(&crate::workflows::scoring::Criterion::Capacity));
}

#[test]
fn award_settles_every_bid() {
    let harness = harness();
    let auction = harness
        .coordinator
        .open(job("JOB-11"), None)
        .expect("auction opens");
    let winner = harness
        .coordinator
        .submit_bid(&auction.id, submission("INS-A", 110_000))
        .expect("bid");
    harness
        .coordinator
        .submit_bid(&auction.id, submission("INS-B", 95_000))
        .expect("bid");

    let awarded = harness
        .coordinator
        .award(&auction.id, &winner.id)
        .expect("award succeeds");

    assert_eq!(awarded.state, AuctionState::Awarded);
    assert_eq!(awarded.awarded_bid, Some(winner.id.clone()));
    for bid in &awarded.bids {
        let expected = if bid.id == winner.id {
            BidStatus::Awarded
        } else {
            BidStatus::Rejected
        };
        assert_eq!(bid.status, expected);
    }

    let assignment = Assignment::from_awarded_bid(
        awarded.winning_bid().expect("winning bid present"),
    )
    .expect("awarded bid converts");
    assert_eq!(assignment.agreed_amount, 110_000);
    assert_eq!(
        assignment.source,
        AssignmentSource::Award {
            auction_id: auction.id.clone(),
            bid_id: winner.id.clone(),
        }
    );
    assert!(Assignment::from_awarded_bid(&awarded.bids[0]).is_none());

    let again = harness
        .coordinator
        .award(&auction.id, &winner.id)
        .expect_err("already awarded");
    assert!(matches!(again, AuctionError::AuctionAlreadyAwarded { .. }));

    let late_bid = harness
        .coordinator
        .submit_bid(&auction.id, submission("INS-B", 90_000))
        .expect_err("awarded auctions take no bids");
    assert!(matches!(
        late_bid,
        AuctionError::AuctionNotOpen {
            state: AuctionState::Awarded,
            ..
        }
    ));

    let close = harness
        .coordinator
        .close(&auction.id)
        .expect_err("awarded auctions do not close");
    assert!(matches!(close, AuctionError::AuctionAlreadyAwarded { .. }));
}

#[test]
fn concurrent_awards_have_a_single_winner() {
    let harness = harness();
    let auction = harness
        .coordinator
        .open(job("JOB-12"), None)
        .expect("auction opens");
    let first = harness
        .coordinator
        .submit_bid(&auction.id, submission("INS-A", 110_000))
        .expect("bid");
    let second = harness
        .coordinator
        .submit_bid(&auction.id, submission("INS-B", 95_000))
        .expect("bid");

    let handles: Vec<_> = [first.id, second.id]
        .into_iter()
        .map(|bid_id| {
            let coordinator = Arc::clone(&harness.coordinator);
            let auction_id = auction.id.clone();
            thread::spawn(move || coordinator.award(&auction_id, &bid_id))
        })
        .collect();
    let outcomes: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("award thread"))
        .collect();

    let winners = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
    assert_eq!(winners, 1);
    assert!(outcomes.iter().any(|outcome| matches!(
        outcome,
        Err(AuctionError::AuctionAlreadyAwarded { .. })
    )));
}

#[test]
fn unknown_bids_leave_the_auction_untouched() {
    let harness = harness();
    let auction = harness
        .coordinator
        .open(job("JOB-13"), None)
        .expect("auction opens");
    harness
        .coordinator
        .submit_bid(&auction.id, submission("INS-A", 110_000))
        .expect("bid");
    let before = harness.coordinator.get(&auction.id).expect("auction");

    let err = harness
        .coordinator
        .award(&auction.id, &BidId("bid-missing".to_string()))
        .expect_err("no such bid");

    assert!(matches!(err, AuctionError::BidNotFound { .. }));
    assert_eq!(harness.coordinator.get(&auction.id).expect("auction"), before);
}

#[test]
fn closed_auctions_can_be_awarded_after_the_deadline() {
    let harness = harness();
    let auction = harness
        .coordinator
        .open(job("JOB-14"), Some(4))
        .expect("auction opens");
    let bid = harness
        .coordinator
        .submit_bid(&auction.id, submission("INS-B", 98_000))
        .expect("bid");

    let closed = harness.coordinator.close(&auction.id).expect("close");
    assert_eq!(closed.state, AuctionState::Closed);
    let repeat = harness.coordinator.cancel(&auction.id).expect("repeat close");
    assert_eq!(repeat, closed);

    let refused = harness
        .coordinator
        .submit_bid(&auction.id, submission("INS-A", 99_000))
        .expect_err("closed auctions take no bids");
    assert!(matches!(refused, AuctionError::AuctionNotOpen { .. }));

    harness.clock.advance(Duration::hours(8));
    assert!(harness
        .coordinator
        .expire_overdue(harness.clock_now())
        .expect("sweep")
        .is_empty());

    let awarded = harness
        .coordinator
        .award(&auction.id, &bid.id)
        .expect("closed auction awards");
    assert_eq!(awarded.state, AuctionState::Awarded);
}

#[test]
fn overdue_open_auctions_cannot_be_awarded_or_closed() {
    let harness = harness();
    let auction = harness
        .coordinator
        .open(job("JOB-15"), Some(2))
        .expect("auction opens");
    let bid = harness
        .coordinator
        .submit_bid(&auction.id, submission("INS-A", 110_000))
        .expect("bid");
    harness.clock.advance(Duration::hours(3));

    let award = harness
        .coordinator
        .award(&auction.id, &bid.id)
        .expect_err("expired");
    assert!(matches!(award, AuctionError::AuctionExpired { .. }));

    let close = harness
        .coordinator
        .close(&auction.id)
        .expect_err("expired");
    assert!(matches!(close, AuctionError::AuctionExpired { .. }));
}

#[test]
fn sweep_expires_only_overdue_open_auctions() {
    let harness = harness();
    let short = harness
        .coordinator
        .open(job("JOB-16"), Some(1))
        .expect("short auction");
    let long = harness
        .coordinator
        .open(job("JOB-17"), Some(48))
        .expect("long auction");
    harness.clock.advance(Duration::hours(5));

    let expired = harness
        .coordinator
        .expire_overdue(harness.clock_now())
        .expect("sweep");

    assert_eq!(expired, vec![short.id.clone()]);
    assert_eq!(
        harness.coordinator.get(&long.id).expect("auction").state,
        AuctionState::Open
    );
    assert!(harness
        .coordinator
        .expire_overdue(harness.clock_now())
        .expect("second sweep")
        .is_empty());
}

#[test]
fn clock_driven_sweep_follows_the_injected_clock() {
    let harness = harness();
    let auction = harness
        .coordinator
        .open(job("JOB-19"), Some(4))
        .expect("auction opens");

    assert!(harness.coordinator.expire_due().expect("sweep").is_empty());

    harness.clock.advance(Duration::hours(5));
    assert_eq!(
        harness.coordinator.expire_due().expect("sweep"),
        vec![auction.id.clone()]
    );
    assert_eq!(
        harness.coordinator.get(&auction.id).expect("auction").state,
        AuctionState::Expired
    );
}

#[test]
fn active_for_job_skips_finished_auctions() {
    let harness = harness();
    let site = job("JOB-18");
    assert!(harness
        .coordinator
        .active_for_job(&site.id)
        .expect("lookup")
        .is_none());

    let auction = harness
        .coordinator
        .open(site.clone(), Some(6))
        .expect("auction opens");
    let active = harness
        .coordinator
        .active_for_job(&site.id)
        .expect("lookup")
        .expect("active auction");
    assert_eq!(active.id, auction.id);

    harness.clock.advance(Duration::hours(7));
    assert!(harness
        .coordinator
        .active_for_job(&site.id)
        .expect("lookup")
        .is_none());
}

#[test]
fn unknown_auctions_are_reported() {
    let harness = harness();

    let err = harness
        .coordinator
        .get(&AuctionId("auc-missing".to_string()))
        .expect_err("missing");

    assert!(matches!(err, AuctionError::AuctionNotFound { .. }));
    assert_eq!(err.kind(), "auction_not_found");
}
