use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::allocation::AllocationError;
use crate::workflows::bidding::AuctionError;
use crate::workflows::escrow::EscrowError;
use crate::workflows::registry::RosterError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

/// Process-level failures surfaced by the binaries.
#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Roster(RosterError),
    Allocation(AllocationError),
    Auction(AuctionError),
    Escrow(EscrowError),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config_error",
            AppError::Telemetry(_) => "telemetry_error",
            AppError::Io(_) => "io_error",
            AppError::Server(_) => "server_error",
            AppError::Roster(_) => "roster_error",
            AppError::Allocation(err) => err.kind(),
            AppError::Auction(err) => err.kind(),
            AppError::Escrow(err) => err.kind(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Roster(err) => write!(f, "roster error: {}", err),
            AppError::Allocation(err) => write!(f, "allocation error: {}", err),
            AppError::Auction(err) => write!(f, "auction error: {}", err),
            AppError::Escrow(err) => write!(f, "escrow error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Roster(err) => Some(err),
            AppError::Allocation(err) => Some(err),
            AppError::Auction(err) => Some(err),
            AppError::Escrow(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Roster(_) => StatusCode::BAD_REQUEST,
            AppError::Allocation(err) => err.status(),
            AppError::Auction(err) => err.status(),
            AppError::Escrow(err) => err.status(),
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string(), "kind": self.kind() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<RosterError> for AppError {
    fn from(value: RosterError) -> Self {
        Self::Roster(value)
    }
}

impl From<AllocationError> for AppError {
    fn from(value: AllocationError) -> Self {
        Self::Allocation(value)
    }
}

impl From<AuctionError> for AppError {
    fn from(value: AuctionError) -> Self {
        Self::Auction(value)
    }
}

impl From<EscrowError> for AppError {
    fn from(value: EscrowError) -> Self {
        Self::Escrow(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_failures_map_to_unprocessable() {
        let error = AppError::from(AllocationError::NoEligibleInstaller {
            job_id: "JOB-1".to_string(),
            considered: 4,
        });
        assert_eq!(error.kind(), "no_eligible_installer");

        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn roster_failures_keep_their_source() {
        let error = AppError::from(RosterError::InvalidRow {
            line: 3,
            reason: "no service areas declared".to_string(),
        });

        assert!(error.to_string().contains("line 3"));
        assert!(std::error::Error::source(&error).is_some());
        assert_eq!(error.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn escrow_state_conflicts_map_to_conflict() {
        let error = AppError::from(EscrowError::EscrowNotFunded {
            payment_id: "pay-00000001".to_string(),
        });
        assert_eq!(error.kind(), "escrow_not_funded");
        assert_eq!(error.into_response().status(), StatusCode::CONFLICT);
    }
}
