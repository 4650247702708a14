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
use crate::workflows::registry::{InstallerRegistry, Job};

use super::coordinator::{AuctionCoordinator, AuctionError};
use super::domain::{AuctionId, BidId, BidSubmission};
use super::repository::AuctionRepository;

#[derive(Debug, Deserialize)]
pub struct OpenAuctionRequest {
    pub job: Job,
    #[serde(default)]
    pub deadline_hours: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct AwardRequest {
    pub bid_id: BidId,
}

/// Router builder exposing the auction lifecycle.
pub fn auction_router<R, G>(coordinator: Arc<AuctionCoordinator<R, G>>) -> Router
where
    R: AuctionRepository + 'static,
    G: InstallerRegistry + 'static,
{
    Router::new()
        .route("/api/v1/auctions", post(open_handler::<R, G>))
        .route("/api/v1/auctions/:auction_id", get(status_handler::<R, G>))
        .route(
            "/api/v1/auctions/:auction_id/bids",
            post(bid_handler::<R, G>),
        )
        .route(
            "/api/v1/auctions/:auction_id/close",
            post(close_handler::<R, G>),
        )
        .route(
            "/api/v1/auctions/:auction_id/cancel",
            post(close_handler::<R, G>),
        )
        .route(
            "/api/v1/auctions/:auction_id/award",
            post(award_handler::<R, G>),
        )
        .with_state(coordinator)
}

pub(crate) async fn open_handler<R, G>(
    State(coordinator): State<Arc<AuctionCoordinator<R, G>>>,
    axum::Json(request): axum::Json<OpenAuctionRequest>,
) -> Response
where
    R: AuctionRepository + 'static,
    G: InstallerRegistry + 'static,
{
    match coordinator.open(request.job, request.deadline_hours) {
        Ok(auction) => (StatusCode::CREATED, axum::Json(auction)).into_response(),
        Err(error) => failure(error),
    }
}

pub(crate) async fn status_handler<R, G>(
    State(coordinator): State<Arc<AuctionCoordinator<R, G>>>,
    Path(auction_id): Path<String>,
) -> Response
where
    R: AuctionRepository + 'static,
    G: InstallerRegistry + 'static,
{
    match coordinator.get(&AuctionId(auction_id)) {
        Ok(auction) => (StatusCode::OK, axum::Json(auction)).into_response(),
        Err(error) => failure(error),
    }
}

pub(crate) async fn bid_handler<R, G>(
    State(coordinator): State<Arc<AuctionCoordinator<R, G>>>,
    Path(auction_id): Path<String>,
    axum::Json(submission): axum::Json<BidSubmission>,
) -> Response
where
    R: AuctionRepository + 'static,
    G: InstallerRegistry + 'static,
{
    match coordinator.submit_bid(&AuctionId(auction_id), submission) {
        Ok(bid) => (StatusCode::CREATED, axum::Json(bid)).into_response(),
        Err(error) => failure(error),
    }
}

pub(crate) async fn close_handler<R, G>(
    State(coordinator): State<Arc<AuctionCoordinator<R, G>>>,
    Path(auction_id): Path<String>,
) -> Response
where
    R: AuctionRepository + 'static,
    G: InstallerRegistry + 'static,
{
    match coordinator.close(&AuctionId(auction_id)) {
        Ok(auction) => (StatusCode::OK, axum::Json(auction)).into_response(),
        Err(error) => failure(error),
    }
}

pub(crate) async fn award_handler<R, G>(
    State(coordinator): State<Arc<AuctionCoordinator<R, G>>>,
    Path(auction_id): Path<String>,
    axum::Json(request): axum::Json<AwardRequest>,
) -> Response
where
    R: AuctionRepository + 'static,
    G: InstallerRegistry + 'static,
{
    match coordinator.award(&AuctionId(auction_id), &request.bid_id) {
        Ok(auction) => (StatusCode::OK, axum::Json(auction)).into_response(),
        Err(error) => failure(error),
    }
}

impl AuctionError {
    pub(crate) fn status(&self) -> StatusCode {
        match self {
            AuctionError::AuctionNotFound { .. }
            | AuctionError::BidNotFound { .. }
            | AuctionError::InstallerNotFound { .. } => StatusCode::NOT_FOUND,
            AuctionError::AuctionAlreadyOpen { .. }
            | AuctionError::AuctionNotOpen { .. }
            | AuctionError::AuctionExpired { .. }
            | AuctionError::AuctionAlreadyAwarded { .. } => StatusCode::CONFLICT,
            AuctionError::IneligibleInstaller { .. }
            | AuctionError::InvalidBid(_)
            | AuctionError::InvalidDeadline { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AuctionError::Registry(_) | AuctionError::Repository(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

fn failure(error: AuctionError) -> Response {
    let status = error.status();
    let kind = error.kind();
    error_response(status, error, kind)
}
