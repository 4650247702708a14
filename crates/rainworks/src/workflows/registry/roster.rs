use super::domain::{
    CertificationGrade, ExperienceTier, GeoPoint, Installer, InstallerId, PriceBand,
};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;

#[derive(Debug)]
pub enum RosterError {
    Io(std::io::Error),
    Csv(csv::Error),
    InvalidRow { line: u64, reason: String },
}

impl std::fmt::Display for RosterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RosterError::Io(err) => write!(f, "failed to read installer roster: {}", err),
            RosterError::Csv(err) => write!(f, "invalid installer roster CSV: {}", err),
            RosterError::InvalidRow { line, reason } => {
                write!(f, "installer roster line {}: {}", line, reason)
            }
        }
    }
}

impl std::error::Error for RosterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RosterError::Io(err) => Some(err),
            RosterError::Csv(err) => Some(err),
            RosterError::InvalidRow { .. } => None,
        }
    }
}

impl From<std::io::Error> for RosterError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for RosterError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

/// Loads installer snapshots from a registry CSV export.
pub struct InstallerRoster;

impl InstallerRoster {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<Installer>, RosterError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<Installer>, RosterError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut installers = Vec::new();

        let headers = csv_reader.headers()?.clone();
        for record in csv_reader.records() {
            let record = record?;
            let line = record
                .position()
                .map(|position| position.line())
                .unwrap_or_default();
            let row: RosterRow = record.deserialize(Some(&headers))?;
            installers.push(row.into_installer(line)?);
        }

        installers.sort_by(|left, right| left.id.cmp(&right.id));
        Ok(installers)
    }
}

#[derive(Debug, Deserialize)]
struct RosterRow {
    #[serde(rename = "Installer ID")]
    id: String,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Company")]
    company: String,
    #[serde(rename = "Experience")]
    experience: String,
    #[serde(rename = "Certification")]
    certification: String,
    #[serde(rename = "RPI")]
    rpi: f64,
    #[serde(rename = "SLA %")]
    sla_compliance_pct: f64,
    #[serde(rename = "Active Jobs")]
    active_jobs: u32,
    #[serde(rename = "Capacity")]
    capacity_max: u32,
    #[serde(rename = "Service Areas")]
    service_areas: String,
    #[serde(rename = "Latitude")]
    latitude: f64,
    #[serde(rename = "Longitude")]
    longitude: f64,
    #[serde(rename = "Price Min", default, deserialize_with = "empty_as_none")]
    price_min: Option<u64>,
    #[serde(rename = "Price Max", default, deserialize_with = "empty_as_none")]
    price_max: Option<u64>,
    #[serde(rename = "Capabilities", default)]
    capabilities: String,
    #[serde(rename = "Suspended", default)]
    suspended: String,
}

impl RosterRow {
    fn into_installer(self, line: u64) -> Result<Installer, RosterError> {
        let line_error = |reason: String| RosterError::InvalidRow {
            line,
            reason: format!("{} ({})", reason, self.id),
        };

        let experience_tier = parse_experience(&self.experience)
            .ok_or_else(|| line_error(format!("unknown experience tier '{}'", self.experience)))?;
        let certification_grade = parse_grade(&self.certification)
            .ok_or_else(|| line_error(format!("unknown certification '{}'", self.certification)))?;

        let price_band = match (self.price_min, self.price_max) {
            (Some(min), Some(max)) if min <= max => Some(PriceBand { min, max }),
            (Some(min), Some(max)) => {
                return Err(line_error(format!("price band {min}..{max} is inverted")))
            }
            _ => None,
        };

        let service_areas = split_list(&self.service_areas);
        if service_areas.is_empty() {
            return Err(line_error("no service areas declared".to_string()));
        }

        Ok(Installer {
            id: InstallerId(self.id.clone()),
            name: self.name,
            company: self.company,
            experience_tier,
            certification_grade,
            rpi: self.rpi,
            sla_compliance_pct: self.sla_compliance_pct,
            active_jobs: self.active_jobs,
            capacity_max: self.capacity_max,
            service_areas,
            service_centroid: GeoPoint {
                lat: self.latitude,
                lon: self.longitude,
            },
            price_band,
            capabilities: split_list(&self.capabilities),
            suspended: parse_flag(&self.suspended),
        })
    }
}

fn parse_experience(raw: &str) -> Option<ExperienceTier> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "entry" | "junior" => Some(ExperienceTier::Entry),
        "established" | "mid" => Some(ExperienceTier::Established),
        "expert" | "senior" => Some(ExperienceTier::Expert),
        _ => None,
    }
}

fn parse_grade(raw: &str) -> Option<CertificationGrade> {
    let cleaned = raw.trim().to_ascii_lowercase();
    match cleaned.trim_start_matches("grade").trim() {
        "a" => Some(CertificationGrade::A),
        "b" => Some(CertificationGrade::B),
        "c" => Some(CertificationGrade::C),
        _ => None,
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "yes" | "y" | "true" | "1"
    )
}

fn split_list(raw: &str) -> BTreeSet<String> {
    raw.split([';', '|'])
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    match opt.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse::<u64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}
