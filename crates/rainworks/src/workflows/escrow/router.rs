use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};

use crate::workflows::http::error_response;

use super::domain::{Milestone, MilestoneId, PaymentId, PaymentRequest};
use super::gateway::PaymentGateway;
use super::ledger::{EscrowError, EscrowLedger};
use super::repository::PaymentRepository;

/// Router builder exposing payments and milestone transitions.
pub fn escrow_router<R, P>(ledger: Arc<EscrowLedger<R, P>>) -> Router
where
    R: PaymentRepository + 'static,
    P: PaymentGateway + 'static,
{
    Router::new()
        .route("/api/v1/payments", post(create_handler::<R, P>))
        .route("/api/v1/payments/:payment_id", get(payment_handler::<R, P>))
        .route(
            "/api/v1/payments/:payment_id/fund",
            post(fund_handler::<R, P>),
        )
        .route(
            "/api/v1/payments/:payment_id/close",
            post(close_handler::<R, P>),
        )
        .route(
            "/api/v1/milestones/:milestone_id",
            get(milestone_handler::<R, P>),
        )
        .route(
            "/api/v1/milestones/:milestone_id/:action",
            post(transition_handler::<R, P>),
        )
        .with_state(ledger)
}

pub(crate) async fn create_handler<R, P>(
    State(ledger): State<Arc<EscrowLedger<R, P>>>,
    axum::Json(request): axum::Json<PaymentRequest>,
) -> Response
where
    R: PaymentRepository + 'static,
    P: PaymentGateway + 'static,
{
    match ledger.create_payment(request) {
        Ok(payment) => (StatusCode::CREATED, axum::Json(payment)).into_response(),
        Err(error) => failure(error),
    }
}

pub(crate) async fn payment_handler<R, P>(
    State(ledger): State<Arc<EscrowLedger<R, P>>>,
    Path(payment_id): Path<String>,
) -> Response
where
    R: PaymentRepository + 'static,
    P: PaymentGateway + 'static,
{
    match ledger.get(&PaymentId(payment_id)) {
        Ok(payment) => (StatusCode::OK, axum::Json(payment)).into_response(),
        Err(error) => failure(error),
    }
}

pub(crate) async fn fund_handler<R, P>(
    State(ledger): State<Arc<EscrowLedger<R, P>>>,
    Path(payment_id): Path<String>,
) -> Response
where
    R: PaymentRepository + 'static,
    P: PaymentGateway + 'static,
{
    match ledger.fund_escrow(&PaymentId(payment_id)) {
        Ok(payment) => (StatusCode::OK, axum::Json(payment)).into_response(),
        Err(error) => failure(error),
    }
}

pub(crate) async fn close_handler<R, P>(
    State(ledger): State<Arc<EscrowLedger<R, P>>>,
    Path(payment_id): Path<String>,
) -> Response
where
    R: PaymentRepository + 'static,
    P: PaymentGateway + 'static,
{
    match ledger.close_payment(&PaymentId(payment_id)) {
        Ok(payment) => (StatusCode::OK, axum::Json(payment)).into_response(),
        Err(error) => failure(error),
    }
}

pub(crate) async fn milestone_handler<R, P>(
    State(ledger): State<Arc<EscrowLedger<R, P>>>,
    Path(milestone_id): Path<String>,
) -> Response
where
    R: PaymentRepository + 'static,
    P: PaymentGateway + 'static,
{
    match ledger.milestone(&MilestoneId(milestone_id)) {
        Ok(milestone) => (StatusCode::OK, axum::Json(milestone)).into_response(),
        Err(error) => failure(error),
    }
}

pub(crate) async fn transition_handler<R, P>(
    State(ledger): State<Arc<EscrowLedger<R, P>>>,
    Path((milestone_id, action)): Path<(String, String)>,
) -> Response
where
    R: PaymentRepository + 'static,
    P: PaymentGateway + 'static,
{
    let id = MilestoneId(milestone_id);
    let outcome: Result<Milestone, EscrowError> = match action.as_str() {
        "start" => ledger.start_milestone(&id),
        "complete" => ledger.complete_milestone(&id),
        "verify" => ledger.verify_milestone(&id),
        "release" => ledger.release_milestone(&id),
        other => {
            return error_response(
                StatusCode::NOT_FOUND,
                format!("unknown milestone action '{other}'"),
                "unknown_action",
            )
        }
    };

    match outcome {
        Ok(milestone) => (StatusCode::OK, axum::Json(milestone)).into_response(),
        Err(error) => failure(error),
    }
}

impl EscrowError {
    pub(crate) fn status(&self) -> StatusCode {
        match self {
            EscrowError::PaymentNotFound { .. } | EscrowError::MilestoneNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            EscrowError::InvalidMilestonePlan(_) | EscrowError::MilestoneAmountMismatch { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            EscrowError::PaymentAlreadyExists { .. }
            | EscrowError::EscrowNotFunded { .. }
            | EscrowError::PriorMilestoneIncomplete { .. }
            | EscrowError::InvalidMilestoneTransition { .. }
            | EscrowError::InsufficientEscrowBalance { .. }
            | EscrowError::PaymentNotReleased { .. } => StatusCode::CONFLICT,
            EscrowError::Gateway(_) | EscrowError::Repository(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

fn failure(error: EscrowError) -> Response {
    let status = error.status();
    let kind = error.kind();
    error_response(status, error, kind)
}
