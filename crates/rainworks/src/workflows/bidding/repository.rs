use std::collections::HashMap;
use std::sync::Mutex;

use crate::workflows::registry::JobId;
use crate::workflows::store::RepositoryError;

use super::domain::{Auction, AuctionId, AuctionState};

/// Storage abstraction for auctions and their embedded bids.
pub trait AuctionRepository: Send + Sync {
    fn insert(&self, auction: Auction) -> Result<Auction, RepositoryError>;
    fn update(&self, auction: Auction) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &AuctionId) -> Result<Option<Auction>, RepositoryError>;
    fn for_job(&self, job_id: &JobId) -> Result<Vec<Auction>, RepositoryError>;
    fn open_auctions(&self) -> Result<Vec<Auction>, RepositoryError>;
}

#[derive(Debug, Default)]
pub struct InMemoryAuctionRepository {
    auctions: Mutex<HashMap<AuctionId, Auction>>,
}

impl AuctionRepository for InMemoryAuctionRepository {
    fn insert(&self, auction: Auction) -> Result<Auction, RepositoryError> {
        let mut guard = self.auctions.lock()?;
        if guard.contains_key(&auction.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(auction.id.clone(), auction.clone());
        Ok(auction)
    }

    fn update(&self, auction: Auction) -> Result<(), RepositoryError> {
        let mut guard = self.auctions.lock()?;
        match guard.get_mut(&auction.id) {
            Some(slot) => {
                *slot = auction;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch(&self, id: &AuctionId) -> Result<Option<Auction>, RepositoryError> {
        let guard = self.auctions.lock()?;
        Ok(guard.get(id).cloned())
    }

    fn for_job(&self, job_id: &JobId) -> Result<Vec<Auction>, RepositoryError> {
        let guard = self.auctions.lock()?;
        let mut auctions: Vec<Auction> = guard
            .values()
            .filter(|auction| &auction.job.id == job_id)
            .cloned()
            .collect();
        auctions.sort_by(|left, right| left.opened_at.cmp(&right.opened_at).then(left.id.cmp(&right.id)));
        Ok(auctions)
    }

    fn open_auctions(&self) -> Result<Vec<Auction>, RepositoryError> {
        let guard = self.auctions.lock()?;
        let mut auctions: Vec<Auction> = guard
            .values()
            .filter(|auction| auction.state == AuctionState::Open)
            .cloned()
            .collect();
        auctions.sort_by(|left, right| left.deadline.cmp(&right.deadline).then(left.id.cmp(&right.id)));
        Ok(auctions)
    }
}
