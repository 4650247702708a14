use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// JSON error body shared by the workflow routers: `{"error": message, "kind": code}`.
pub(crate) fn error_response(status: StatusCode, error: impl std::fmt::Display, kind: &str) -> Response {
    let payload = json!({
        "error": error.to_string(),
        "kind": kind,
    });
    (status, axum::Json(payload)).into_response()
}
