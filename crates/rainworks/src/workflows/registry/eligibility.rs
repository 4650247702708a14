use super::domain::{Installer, Job};

/// Reason an installer is filtered out before scoring.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Ineligibility {
    #[error("installer does not serve region {region}")]
    OutsideServiceArea { region: String },
    #[error("installer has no free capacity")]
    NoCapacity,
    #[error("installer is suspended")]
    Suspended,
    #[error("installer lacks required capabilities: {}", .missing.join(", "))]
    MissingCapabilities { missing: Vec<String> },
}

/// Eligibility gate applied before any scoring happens.
pub fn check_eligibility(installer: &Installer, job: &Job) -> Result<(), Ineligibility> {
    if installer.suspended {
        return Err(Ineligibility::Suspended);
    }

    if !installer.serves(&job.region) {
        return Err(Ineligibility::OutsideServiceArea {
            region: job.region.clone(),
        });
    }

    if installer.capacity_available() == 0 {
        return Err(Ineligibility::NoCapacity);
    }

    let missing: Vec<String> = job
        .required_capabilities
        .difference(&installer.capabilities)
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(Ineligibility::MissingCapabilities { missing });
    }

    Ok(())
}
