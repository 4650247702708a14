//! Shared builders for unit tests across the workflow modules.

use std::collections::BTreeSet;

use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use super::registry::{
    CertificationGrade, ExperienceTier, GeoPoint, Installer, InstallerId, Job, JobId, PriceBand,
};

pub(crate) const REGION: &str = "BLR-N";

pub(crate) fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 7, 1, 9, 30, 0)
        .single()
        .expect("valid timestamp")
}

pub(crate) fn site() -> GeoPoint {
    GeoPoint {
        lat: 13.0358,
        lon: 77.5970,
    }
}

pub(crate) fn job(id: &str) -> Job {
    Job {
        id: JobId(id.to_string()),
        address: "14 Lake View Road, Hebbal".to_string(),
        region: REGION.to_string(),
        location: site(),
        estimated_cost: 115_000,
        required_capabilities: BTreeSet::from(["recharge-pit".to_string()]),
        created_at: start_time(),
    }
}

/// Installer serving the fixture region from the job site itself, with `free_slots`
/// open out of ten.
pub(crate) fn installer(id: &str, rpi: f64, free_slots: u32) -> Installer {
    Installer {
        id: InstallerId(id.to_string()),
        name: format!("Installer {id}"),
        company: "Monsoon Works".to_string(),
        experience_tier: ExperienceTier::Established,
        certification_grade: CertificationGrade::A,
        rpi,
        sla_compliance_pct: 90.0,
        active_jobs: 10 - free_slots.min(10),
        capacity_max: 10,
        service_areas: BTreeSet::from([REGION.to_string()]),
        service_centroid: site(),
        price_band: Some(PriceBand {
            min: 100_000,
            max: 130_000,
        }),
        capabilities: BTreeSet::from(["recharge-pit".to_string(), "rooftop".to_string()]),
        suspended: false,
    }
}

pub(crate) async fn read_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("valid json body")
}
