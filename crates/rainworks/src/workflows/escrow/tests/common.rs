use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::workflows::clock::ManualClock;
use crate::workflows::escrow::{
    EscrowEvent, EscrowLedger, GatewayError, InMemoryPaymentRepository, MilestonePlanItem,
    Payment, PaymentGateway, PaymentRequest,
};
use crate::workflows::fixtures::start_time;
use crate::workflows::registry::{InstallerId, JobId};

pub(super) use crate::workflows::fixtures::read_json;

pub(super) const REFERENCE_TOTAL: u64 = 115_000;
pub(super) const REFERENCE_SPLIT: [u64; 4] = [23_000, 46_000, 34_500, 11_500];

pub(super) type MemoryLedger = EscrowLedger<InMemoryPaymentRepository, MemoryGateway>;

#[derive(Default)]
pub(super) struct MemoryGateway {
    events: Mutex<Vec<EscrowEvent>>,
    failing: AtomicBool,
    rejecting_settlement: AtomicBool,
}

impl MemoryGateway {
    pub(super) fn events(&self) -> Vec<EscrowEvent> {
        self.events.lock().expect("gateway mutex poisoned").clone()
    }

    pub(super) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Reject any batch that settles a whole payment, accepting everything else.
    pub(super) fn set_rejecting_settlement(&self, rejecting: bool) {
        self.rejecting_settlement.store(rejecting, Ordering::SeqCst);
    }

    pub(super) fn milestone_releases(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, EscrowEvent::MilestoneReleased { .. }))
            .count()
    }
}

impl PaymentGateway for MemoryGateway {
    fn publish(&self, events: &[EscrowEvent]) -> Result<(), GatewayError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable("gateway offline".to_string()));
        }
        let settles = events
            .iter()
            .any(|event| matches!(event, EscrowEvent::PaymentReleased { .. }));
        if settles && self.rejecting_settlement.load(Ordering::SeqCst) {
            return Err(GatewayError::Rejected("settlement refused".to_string()));
        }
        self.events
            .lock()
            .expect("gateway mutex poisoned")
            .extend_from_slice(events);
        Ok(())
    }
}

pub(super) fn ledger() -> (Arc<MemoryLedger>, Arc<MemoryGateway>) {
    let gateway = Arc::new(MemoryGateway::default());
    let ledger = Arc::new(EscrowLedger::with_clock(
        Arc::new(InMemoryPaymentRepository::default()),
        gateway.clone(),
        Arc::new(ManualClock::new(start_time())),
    ));
    (ledger, gateway)
}

pub(super) fn request(job_id: &str, total: u64, amounts: &[u64]) -> PaymentRequest {
    PaymentRequest {
        job_id: JobId(job_id.to_string()),
        installer_id: InstallerId("INS-A".to_string()),
        total_amount: total,
        milestones: amounts
            .iter()
            .enumerate()
            .map(|(index, amount)| MilestonePlanItem::new(format!("Stage {}", index + 1), *amount))
            .collect(),
    }
}

/// Funded payment on the reference four-stage split.
pub(super) fn funded_payment(ledger: &MemoryLedger, job_id: &str) -> Payment {
    let payment = ledger
        .create_payment(request(job_id, REFERENCE_TOTAL, &REFERENCE_SPLIT))
        .expect("payment created");
    ledger.fund_escrow(&payment.id).expect("escrow funded")
}
