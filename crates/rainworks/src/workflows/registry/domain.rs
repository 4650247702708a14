use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for registered installers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstallerId(pub String);

/// Identifier wrapper for installation jobs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperienceTier {
    Entry,
    Established,
    Expert,
}

impl ExperienceTier {
    pub const fn label(self) -> &'static str {
        match self {
            ExperienceTier::Entry => "entry",
            ExperienceTier::Established => "established",
            ExperienceTier::Expert => "expert",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificationGrade {
    A,
    B,
    C,
}

impl CertificationGrade {
    pub const fn label(self) -> &'static str {
        match self {
            CertificationGrade::A => "a",
            CertificationGrade::B => "b",
            CertificationGrade::C => "c",
        }
    }
}

/// Typical quote range an installer works in, in whole currency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBand {
    pub min: u64,
    pub max: u64,
}

impl PriceBand {
    pub fn midpoint(&self) -> f64 {
        (self.min as f64 + self.max as f64) / 2.0
    }
}

/// Installer attributes as published by the external registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installer {
    pub id: InstallerId,
    pub name: String,
    pub company: String,
    pub experience_tier: ExperienceTier,
    pub certification_grade: CertificationGrade,
    /// Reliability/performance index on a 0-100 scale.
    pub rpi: f64,
    /// Historical on-time/compliance percentage, 0-100.
    pub sla_compliance_pct: f64,
    pub active_jobs: u32,
    pub capacity_max: u32,
    pub service_areas: BTreeSet<String>,
    pub service_centroid: GeoPoint,
    #[serde(default)]
    pub price_band: Option<PriceBand>,
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
    #[serde(default)]
    pub suspended: bool,
}

impl Installer {
    /// Free job slots; never exceeds `capacity_max`.
    pub fn capacity_available(&self) -> u32 {
        self.capacity_max.saturating_sub(self.active_jobs)
    }

    pub fn serves(&self, region: &str) -> bool {
        self.service_areas.contains(region)
    }
}

/// Installation job as created upstream. Engines keep the snapshot they were handed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub address: String,
    pub region: String,
    pub location: GeoPoint,
    pub estimated_cost: u64,
    #[serde(default)]
    pub required_capabilities: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
}
