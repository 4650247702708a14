//! Read-only view of the installer registry and the job descriptions fed into the engine.

pub mod distance;
mod domain;
mod eligibility;
pub mod roster;

pub use distance::{DistanceEstimator, GreatCircleDistance};
pub use domain::{
    CertificationGrade, ExperienceTier, GeoPoint, Installer, InstallerId, Job, JobId, PriceBand,
};
pub use eligibility::{check_eligibility, Ineligibility};
pub use roster::{InstallerRoster, RosterError};

use std::collections::BTreeMap;
use std::sync::RwLock;

/// Source of installer attributes. The engine never writes through this trait.
pub trait InstallerRegistry: Send + Sync {
    /// Point-in-time copy of every installer, ordered by id.
    fn snapshot(&self) -> Result<Vec<Installer>, RegistryError>;
    fn installer(&self, id: &InstallerId) -> Result<Option<Installer>, RegistryError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("installer registry unavailable: {0}")]
    Unavailable(String),
}

/// Registry backed by a process-local map, refreshed by whoever owns the roster.
#[derive(Debug, Default)]
pub struct InMemoryInstallerRegistry {
    installers: RwLock<BTreeMap<InstallerId, Installer>>,
}

impl InMemoryInstallerRegistry {
    pub fn new(installers: impl IntoIterator<Item = Installer>) -> Self {
        let installers = installers
            .into_iter()
            .map(|installer| (installer.id.clone(), installer))
            .collect();
        Self {
            installers: RwLock::new(installers),
        }
    }

    /// Insert or replace an installer, mirroring an update in the upstream registry.
    pub fn upsert(&self, installer: Installer) -> Result<(), RegistryError> {
        let mut guard = self
            .installers
            .write()
            .map_err(|_| RegistryError::Unavailable("registry lock poisoned".to_string()))?;
        guard.insert(installer.id.clone(), installer);
        Ok(())
    }
}

impl InstallerRegistry for InMemoryInstallerRegistry {
    fn snapshot(&self) -> Result<Vec<Installer>, RegistryError> {
        let guard = self
            .installers
            .read()
            .map_err(|_| RegistryError::Unavailable("registry lock poisoned".to_string()))?;
        Ok(guard.values().cloned().collect())
    }

    fn installer(&self, id: &InstallerId) -> Result<Option<Installer>, RegistryError> {
        let guard = self
            .installers
            .read()
            .map_err(|_| RegistryError::Unavailable("registry lock poisoned".to_string()))?;
        Ok(guard.get(id).cloned())
    }
}
