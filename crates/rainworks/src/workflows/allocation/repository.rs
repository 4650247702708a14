use std::collections::HashMap;
use std::sync::Mutex;

use crate::workflows::registry::JobId;
use crate::workflows::store::RepositoryError;

use super::domain::{AllocationPolicy, AllocationRecord};

/// Append-only store of allocation decisions.
pub trait AllocationRepository: Send + Sync {
    fn append(&self, record: AllocationRecord) -> Result<AllocationRecord, RepositoryError>;
    /// Newest record for the job under `policy`.
    fn latest(
        &self,
        job_id: &JobId,
        policy: AllocationPolicy,
    ) -> Result<Option<AllocationRecord>, RepositoryError>;
    /// Records for a job, oldest first.
    fn history(&self, job_id: &JobId) -> Result<Vec<AllocationRecord>, RepositoryError>;
}

#[derive(Debug, Default)]
pub struct InMemoryAllocationRepository {
    records: Mutex<HashMap<JobId, Vec<AllocationRecord>>>,
}

impl AllocationRepository for InMemoryAllocationRepository {
    fn append(&self, record: AllocationRecord) -> Result<AllocationRecord, RepositoryError> {
        let mut guard = self.records.lock()?;
        let history = guard.entry(record.job_id.clone()).or_default();
        if history.iter().any(|existing| existing.id == record.id) {
            return Err(RepositoryError::Conflict);
        }
        history.push(record.clone());
        Ok(record)
    }

    fn latest(
        &self,
        job_id: &JobId,
        policy: AllocationPolicy,
    ) -> Result<Option<AllocationRecord>, RepositoryError> {
        let guard = self.records.lock()?;
        Ok(guard.get(job_id).and_then(|history| {
            history
                .iter()
                .rev()
                .find(|record| record.policy == policy)
                .cloned()
        }))
    }

    fn history(&self, job_id: &JobId) -> Result<Vec<AllocationRecord>, RepositoryError> {
        let guard = self.records.lock()?;
        Ok(guard.get(job_id).cloned().unwrap_or_default())
    }
}
