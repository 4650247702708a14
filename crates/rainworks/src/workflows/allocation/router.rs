use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;

use crate::workflows::http::error_response;
use crate::workflows::registry::{InstallerRegistry, Job, JobId};
use crate::workflows::scoring::Weights;

use super::domain::AllocationPolicy;
use super::engine::{AllocationEngine, AllocationError};
use super::repository::AllocationRepository;

#[derive(Debug, Deserialize)]
pub struct AllocationRequest {
    pub job: Job,
    pub policy: AllocationPolicy,
    #[serde(default)]
    pub weights: Option<BTreeMap<String, f64>>,
}

/// Router builder exposing allocation runs and per-job history.
pub fn allocation_router<R, G>(engine: Arc<AllocationEngine<R, G>>) -> Router
where
    R: AllocationRepository + 'static,
    G: InstallerRegistry + 'static,
{
    Router::new()
        .route("/api/v1/allocations", post(allocate_handler::<R, G>))
        .route(
            "/api/v1/jobs/:job_id/allocations",
            get(history_handler::<R, G>),
        )
        .with_state(engine)
}

pub(crate) async fn allocate_handler<R, G>(
    State(engine): State<Arc<AllocationEngine<R, G>>>,
    axum::Json(request): axum::Json<AllocationRequest>,
) -> Response
where
    R: AllocationRepository + 'static,
    G: InstallerRegistry + 'static,
{
    let weights = match request.weights.map(Weights::from_named).transpose() {
        Ok(weights) => weights,
        Err(error) => {
            return error_response(
                StatusCode::UNPROCESSABLE_ENTITY,
                AllocationError::InvalidWeights(error),
                "invalid_weights",
            )
        }
    };

    match engine.allocate(&request.job, request.policy, weights) {
        Ok(record) => (StatusCode::CREATED, axum::Json(record)).into_response(),
        Err(error) => failure(error),
    }
}

pub(crate) async fn history_handler<R, G>(
    State(engine): State<Arc<AllocationEngine<R, G>>>,
    Path(job_id): Path<String>,
) -> Response
where
    R: AllocationRepository + 'static,
    G: InstallerRegistry + 'static,
{
    match engine.history(&JobId(job_id)) {
        Ok(records) => (StatusCode::OK, axum::Json(records)).into_response(),
        Err(error) => failure(error),
    }
}

impl AllocationError {
    pub(crate) fn status(&self) -> StatusCode {
        match self {
            AllocationError::InvalidWeights(_) | AllocationError::NoEligibleInstaller { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AllocationError::Registry(_)
            | AllocationError::Repository(_)
            | AllocationError::Fingerprint(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn failure(error: AllocationError) -> Response {
    let status = error.status();
    let kind = error.kind();
    error_response(status, error, kind)
}
