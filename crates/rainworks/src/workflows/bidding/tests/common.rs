use std::sync::Arc;

use crate::workflows::bidding::{AuctionCoordinator, BidSubmission, InMemoryAuctionRepository};
use crate::workflows::clock::ManualClock;
use crate::workflows::fixtures::{installer, start_time};
use crate::workflows::registry::{InMemoryInstallerRegistry, Installer, InstallerId};
use crate::workflows::scoring::ScoringFunction;

pub(super) use crate::workflows::fixtures::read_json;

pub(super) type MemoryCoordinator =
    AuctionCoordinator<InMemoryAuctionRepository, InMemoryInstallerRegistry>;

pub(super) struct Harness {
    pub(super) coordinator: Arc<MemoryCoordinator>,
    pub(super) repository: Arc<InMemoryAuctionRepository>,
    pub(super) clock: Arc<ManualClock>,
}

pub(super) fn bidders() -> Vec<Installer> {
    let mut outside = installer("INS-O", 90.0, 5);
    outside.service_areas = ["MYS-C".to_string()].into_iter().collect();
    vec![
        installer("INS-A", 92.0, 2),
        installer("INS-B", 79.0, 10),
        installer("INS-F", 85.0, 0),
        outside,
    ]
}

pub(super) fn harness() -> Harness {
    let repository = Arc::new(InMemoryAuctionRepository::default());
    let registry = Arc::new(InMemoryInstallerRegistry::new(bidders()));
    let clock = Arc::new(ManualClock::new(start_time()));
    let coordinator = Arc::new(AuctionCoordinator::with_parts(
        repository.clone(),
        registry,
        ScoringFunction::default(),
        clock.clone(),
        72,
    ));
    Harness {
        coordinator,
        repository,
        clock,
    }
}

pub(super) fn submission(installer_id: &str, price: u64) -> BidSubmission {
    BidSubmission {
        installer_id: InstallerId(installer_id.to_string()),
        price,
        timeline_days: 30,
        warranty_months: 24,
    }
}

impl Harness {
    pub(super) fn clock_now(&self) -> chrono::DateTime<chrono::Utc> {
        crate::workflows::clock::Clock::now(self.clock.as_ref())
    }
}
