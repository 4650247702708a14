//! Milestone escrow: custody of the agreed amount and staged release against verified work.

pub mod domain;
pub mod gateway;
mod ledger;
pub mod repository;
pub mod router;

#[cfg(test)]
mod tests;

pub use domain::{
    standard_plan, EscrowEvent, Milestone, MilestoneId, MilestonePlanItem, MilestoneStatus,
    Payment, PaymentId, PaymentRequest, PaymentStatus,
};
pub use gateway::{GatewayError, PaymentGateway};
pub use ledger::{EscrowError, EscrowLedger};
pub use repository::{InMemoryPaymentRepository, PaymentRepository};
pub use router::escrow_router;
