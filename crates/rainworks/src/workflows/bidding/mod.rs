//! Sealed competitive bidding: auctions with a deadline, live re-ranking of bids, and a
//! single award per auction.

mod coordinator;
pub mod domain;
pub mod repository;
pub mod router;

#[cfg(test)]
mod tests;

pub use coordinator::{AuctionCoordinator, AuctionError};
pub use domain::{
    Auction, AuctionId, AuctionState, BidId, BidRecord, BidStatus, BidSubmission,
};
pub use repository::{AuctionRepository, InMemoryAuctionRepository};
pub use router::auction_router;
