//! Installer allocation: eligibility filtering, policy-driven scoring, and an
//! append-only decision log per job.

pub mod domain;
mod engine;
pub mod repository;
pub mod router;

#[cfg(test)]
mod tests;

pub use domain::{AllocationId, AllocationPolicy, AllocationRecord, RankedAlternative};
pub use engine::{AllocationEngine, AllocationError};
pub use repository::{AllocationRepository, InMemoryAllocationRepository};
pub use router::allocation_router;
