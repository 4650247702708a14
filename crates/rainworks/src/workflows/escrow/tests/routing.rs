use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;
use crate::workflows::escrow::escrow_router;

fn post_json(uri: &str, payload: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            serde_json::to_vec(&payload).expect("payload serializes"),
        ))
        .expect("request builds")
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::post(uri)
        .body(Body::empty())
        .expect("request builds")
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("router responds");
    let status = response.status();
    (status, read_json(response).await)
}

#[tokio::test]
async fn payment_lifecycle_over_http() {
    let (ledger, _) = ledger();
    let router = escrow_router(ledger);

    let (status, payment) = send(
        &router,
        post_json(
            "/api/v1/payments",
            json!(request("JOB-H1", REFERENCE_TOTAL, &REFERENCE_SPLIT)),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(payment["status"], "created");
    let payment_id = payment["id"].as_str().expect("payment id").to_string();
    let milestone_ids: Vec<String> = payment["milestones"]
        .as_array()
        .expect("milestones")
        .iter()
        .map(|milestone| milestone["id"].as_str().expect("milestone id").to_string())
        .collect();

    let (status, funded) = send(
        &router,
        post_empty(&format!("/api/v1/payments/{payment_id}/fund")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(funded["status"], "escrow");

    for id in &milestone_ids {
        for action in ["start", "complete", "verify", "release"] {
            let (status, milestone) = send(
                &router,
                post_empty(&format!("/api/v1/milestones/{id}/{action}")),
            )
            .await;
            assert_eq!(status, StatusCode::OK, "{action} {id}");
            assert!(milestone["status"].is_string());
        }
    }

    let (status, closed) = send(
        &router,
        post_empty(&format!("/api/v1/payments/{payment_id}/close")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(closed["status"], "closed");
    assert_eq!(closed["escrow_balance"], 0);
    assert_eq!(closed["released_amount"], 115_000);
}

#[tokio::test]
async fn mismatched_plans_are_unprocessable() {
    let (ledger, _) = ledger();
    let router = escrow_router(ledger);

    let (status, body) = send(
        &router,
        post_json(
            "/api/v1/payments",
            json!(request("JOB-H2", REFERENCE_TOTAL, &[100_000])),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "milestone_amount_mismatch");
}

#[tokio::test]
async fn out_of_order_completion_conflicts() {
    let (ledger, _) = ledger();
    let payment = funded_payment(&ledger, "JOB-H3");
    let router = escrow_router(ledger);

    let (status, body) = send(
        &router,
        post_empty(&format!(
            "/api/v1/milestones/{}/complete",
            payment.milestones[2].id.0
        )),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "prior_milestone_incomplete");
}

#[tokio::test]
async fn unknown_actions_and_ids_are_not_found() {
    let (ledger, _) = ledger();
    let payment = funded_payment(&ledger, "JOB-H4");
    let router = escrow_router(ledger);

    let (status, body) = send(
        &router,
        post_empty(&format!(
            "/api/v1/milestones/{}/approve",
            payment.milestones[0].id.0
        )),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "unknown_action");

    let (status, body) = send(
        &router,
        Request::get("/api/v1/payments/pay-missing")
            .body(Body::empty())
            .expect("request builds"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "payment_not_found");
}
