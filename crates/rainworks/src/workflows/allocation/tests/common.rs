use std::sync::Arc;

use crate::workflows::allocation::{
    AllocationEngine, AllocationPolicy, AllocationRecord, AllocationRepository, InMemoryAllocationRepository,
};
use crate::workflows::clock::ManualClock;
use crate::workflows::fixtures::{installer, start_time};
use crate::workflows::registry::{InMemoryInstallerRegistry, Installer, JobId};
use crate::workflows::scoring::ScoringFunction;
use crate::workflows::store::RepositoryError;

pub(super) use crate::workflows::fixtures::read_json;

pub(super) type MemoryEngine =
    AllocationEngine<InMemoryAllocationRepository, InMemoryInstallerRegistry>;

/// A: strong track record, nearly full. B: weaker record, wide open.
pub(super) fn scenario_pool() -> Vec<Installer> {
    vec![installer("INS-A", 92.0, 2), installer("INS-B", 79.0, 10)]
}

pub(super) fn build_engine(
    installers: Vec<Installer>,
) -> (
    MemoryEngine,
    Arc<InMemoryAllocationRepository>,
    Arc<InMemoryInstallerRegistry>,
) {
    let repository = Arc::new(InMemoryAllocationRepository::default());
    let registry = Arc::new(InMemoryInstallerRegistry::new(installers));
    let engine = AllocationEngine::with_parts(
        repository.clone(),
        registry.clone(),
        ScoringFunction::default(),
        Arc::new(ManualClock::new(start_time())),
    );
    (engine, repository, registry)
}

pub(super) struct UnavailableRepository;

impl AllocationRepository for UnavailableRepository {
    fn append(&self, _record: AllocationRecord) -> Result<AllocationRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn latest(
        &self,
        _job_id: &JobId,
        _policy: AllocationPolicy,
    ) -> Result<Option<AllocationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn history(&self, _job_id: &JobId) -> Result<Vec<AllocationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}
