pub mod allocation;
pub mod assignment;
pub mod bidding;
pub mod clock;
pub mod escrow;
#[cfg(test)]
pub(crate) mod fixtures;
mod http;
mod locks;
pub mod registry;
pub mod scoring;
pub mod store;

pub use assignment::{Assignment, AssignmentSource};
pub use clock::{Clock, ManualClock, SystemClock};
pub use store::RepositoryError;
