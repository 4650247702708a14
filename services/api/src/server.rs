use crate::cli::ServeArgs;
use crate::infra::{load_registry, AppState, Coordinator, Workflows};
use crate::routes::with_workflow_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use rainworks::config::AppConfig;
use rainworks::error::AppError;
use rainworks::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let registry = Arc::new(load_registry(config.engine.installer_roster.as_deref())?);
    let workflows = Workflows::new(registry, &config.engine);

    match config.engine.sweep_interval() {
        Some(period) => spawn_expiry_sweep(workflows.coordinator.clone(), period),
        None => info!("auction expiry sweep disabled; relying on lazy expiry"),
    }

    let app = with_workflow_routes(&workflows)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "rainworks engine ready");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Periodically expires open auctions whose deadline has passed.
fn spawn_expiry_sweep(coordinator: Arc<Coordinator>, period: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            match coordinator.expire_due() {
                Ok(expired) if !expired.is_empty() => {
                    info!(count = expired.len(), "expired overdue auctions");
                }
                Ok(_) => {}
                Err(err) => warn!(error = %err, "auction expiry sweep failed"),
            }
        }
    });
}
