use metrics_exporter_prometheus::PrometheusHandle;
use rainworks::config::EngineConfig;
use rainworks::error::AppError;
use rainworks::workflows::allocation::{
    AllocationEngine, AllocationPolicy, InMemoryAllocationRepository,
};
use rainworks::workflows::bidding::{AuctionCoordinator, InMemoryAuctionRepository};
use rainworks::workflows::escrow::{
    EscrowEvent, EscrowLedger, GatewayError, InMemoryPaymentRepository, PaymentGateway,
};
use rainworks::workflows::registry::{InMemoryInstallerRegistry, InstallerRoster};
use rainworks::workflows::scoring::ScoringFunction;
use rainworks::workflows::SystemClock;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

/// Roster shipped with the binary so a fresh checkout can serve requests.
const BUNDLED_ROSTER: &str = include_str!("../../../crates/rainworks/data/installers.csv");

pub(crate) type Engine = AllocationEngine<InMemoryAllocationRepository, InMemoryInstallerRegistry>;
pub(crate) type Coordinator =
    AuctionCoordinator<InMemoryAuctionRepository, InMemoryInstallerRegistry>;
pub(crate) type Ledger = EscrowLedger<InMemoryPaymentRepository, LoggingPaymentGateway>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// The three workflow services wired against in-memory storage.
#[derive(Clone)]
pub(crate) struct Workflows {
    pub(crate) engine: Arc<Engine>,
    pub(crate) coordinator: Arc<Coordinator>,
    pub(crate) ledger: Arc<Ledger>,
    pub(crate) gateway: Arc<LoggingPaymentGateway>,
}

impl Workflows {
    pub(crate) fn new(registry: Arc<InMemoryInstallerRegistry>, engine: &EngineConfig) -> Self {
        let gateway = Arc::new(LoggingPaymentGateway::default());
        Self {
            engine: Arc::new(AllocationEngine::new(
                Arc::new(InMemoryAllocationRepository::default()),
                registry.clone(),
            )),
            coordinator: Arc::new(AuctionCoordinator::with_parts(
                Arc::new(InMemoryAuctionRepository::default()),
                registry,
                ScoringFunction::default(),
                Arc::new(SystemClock),
                engine.default_auction_hours,
            )),
            ledger: Arc::new(EscrowLedger::new(
                Arc::new(InMemoryPaymentRepository::default()),
                gateway.clone(),
            )),
            gateway,
        }
    }
}

/// Gateway stand-in that logs every escrow event and keeps it for inspection.
#[derive(Default, Clone)]
pub(crate) struct LoggingPaymentGateway {
    events: Arc<Mutex<Vec<EscrowEvent>>>,
}

impl PaymentGateway for LoggingPaymentGateway {
    fn publish(&self, events: &[EscrowEvent]) -> Result<(), GatewayError> {
        let mut guard = self
            .events
            .lock()
            .map_err(|_| GatewayError::Unavailable("event log poisoned".to_string()))?;
        for event in events {
            info!(?event, "escrow event published");
        }
        guard.extend_from_slice(events);
        Ok(())
    }
}

impl LoggingPaymentGateway {
    pub(crate) fn events(&self) -> Vec<EscrowEvent> {
        self.events
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

/// Load the roster from `path`, or the bundled sample when no path is configured.
pub(crate) fn load_registry(path: Option<&Path>) -> Result<InMemoryInstallerRegistry, AppError> {
    let installers = match path {
        Some(path) => {
            let installers = InstallerRoster::from_path(path)?;
            info!(path = %path.display(), count = installers.len(), "installer roster loaded");
            installers
        }
        None => {
            let installers = InstallerRoster::from_reader(BUNDLED_ROSTER.as_bytes())?;
            info!(count = installers.len(), "bundled installer roster loaded");
            installers
        }
    };
    Ok(InMemoryInstallerRegistry::new(installers))
}

pub(crate) fn parse_policy(raw: &str) -> Result<AllocationPolicy, String> {
    match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
        "gov_optimized" | "gov" => Ok(AllocationPolicy::GovOptimized),
        "equitable" => Ok(AllocationPolicy::Equitable),
        "user_choice" | "custom" => Ok(AllocationPolicy::UserChoice),
        other => Err(format!(
            "unknown policy '{other}' (expected gov_optimized, equitable, or user_choice)"
        )),
    }
}

/// Parses `criterion=weight` pairs as given on the command line.
pub(crate) fn parse_weight(raw: &str) -> Result<(String, f64), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected criterion=weight, got '{raw}'"))?;
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|err| format!("weight for '{}' is not a number ({err})", name.trim()))?;
    Ok((name.trim().to_string(), value))
}

pub(crate) fn collect_weights(pairs: &[(String, f64)]) -> Option<BTreeMap<String, f64>> {
    (!pairs.is_empty()).then(|| pairs.iter().cloned().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rainworks::workflows::escrow::PaymentId;
    use rainworks::workflows::registry::{InstallerId, InstallerRegistry, JobId};

    #[test]
    fn bundled_roster_populates_the_registry() {
        let registry = load_registry(None).expect("bundled roster parses");
        let snapshot = registry.snapshot().expect("snapshot");
        assert_eq!(snapshot.len(), 7);
        assert!(registry
            .installer(&InstallerId("INS-1003".to_string()))
            .expect("lookup")
            .is_some());
    }

    #[test]
    fn missing_roster_path_is_an_error() {
        let err = load_registry(Some(Path::new("does/not/exist.csv")))
            .err()
            .expect("missing file rejected");
        assert_eq!(err.kind(), "roster_error");
    }

    #[test]
    fn gateway_keeps_published_events() {
        let gateway = LoggingPaymentGateway::default();
        gateway
            .publish(&[EscrowEvent::Funded {
                payment_id: PaymentId("pay-00000001".to_string()),
                job_id: JobId("JOB-1".to_string()),
                amount: 115_000,
            }])
            .expect("publish succeeds");
        assert_eq!(gateway.events().len(), 1);
    }

    #[test]
    fn policy_and_weight_arguments_parse() {
        assert_eq!(
            parse_policy("gov-optimized"),
            Ok(AllocationPolicy::GovOptimized)
        );
        assert!(parse_policy("cheapest").is_err());

        assert_eq!(parse_weight("rpi=0.6"), Ok(("rpi".to_string(), 0.6)));
        assert!(parse_weight("rpi").is_err());
        assert!(parse_weight("rpi=lots").is_err());
        assert_eq!(collect_weights(&[]), None);
    }
}
