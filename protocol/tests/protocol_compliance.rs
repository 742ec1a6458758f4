//! Error-envelope compliance tests for the governance HTTP surface.
//!
//! Validates that every `GovError` variant maps to the documented
//! `{success, error, code, status, hint?, gate?, fields?, details?}`
//! response shape over a real `axum::response::Response`, not just the
//! `GovError` accessors in isolation.

use axum::response::IntoResponse;
use gov_core::error::{FieldError, GovError};
use protocol::ApiError;
use serde_json::Value;

async fn body_json(response: axum::response::Response) -> Value {
    let (parts, body) = response.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX).await.expect("read body");
    let mut value: Value = serde_json::from_slice(&bytes).expect("valid json");
    value["__status__"] = Value::from(parts.status.as_u16());
    value
}

#[tokio::test]
async fn not_found_envelope() {
    let response = ApiError(GovError::not_found_code("TASK-9")).into_response();
    let body = body_json(response).await;

    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "not_found");
    assert_eq!(body["status"], 404);
    assert_eq!(body["__status__"], 404);
    assert!(body["error"].as_str().unwrap().contains("TASK-9"));
}

#[tokio::test]
async fn gate_failure_envelope_carries_gate_and_hint() {
    let response =
        ApiError(GovError::gate_failure_with_hint("wip_cap", "assignee is at their WIP cap", "override with wip_override"))
            .into_response();
    let body = body_json(response).await;

    assert_eq!(body["code"], "gate_failure");
    assert_eq!(body["status"], 422);
    assert_eq!(body["gate"], "wip_cap");
    assert_eq!(body["hint"], "override with wip_override");
}

#[tokio::test]
async fn field_validation_envelope_lists_every_field() {
    let err = GovError::FieldValidation {
        message: "task is missing required fields".to_string(),
        fields: vec![
            FieldError { field: "reviewer".to_string(), message: "must not be empty".to_string() },
            FieldError { field: "done_criteria".to_string(), message: "feature tasks require at least 2".to_string() },
        ],
    };
    let response = ApiError(err).into_response();
    let body = body_json(response).await;

    assert_eq!(body["code"], "field_validation");
    let fields = body["fields"].as_array().expect("fields array");
    assert_eq!(fields.len(), 2);
    assert_eq!(fields[0]["field"], "reviewer");
    assert_eq!(fields[1]["field"], "done_criteria");
}

#[tokio::test]
async fn ambiguous_prefix_envelope_carries_candidates() {
    let err = GovError::ambiguous_prefix("LOGIN", vec!["LOGIN-SSO-1".to_string(), "LOGIN-SSO-2".to_string()]);
    let response = ApiError(err).into_response();
    let body = body_json(response).await;

    assert_eq!(body["code"], "ambiguous_prefix");
    let candidates = body["details"]["candidates"].as_array().expect("candidates array");
    assert_eq!(candidates.len(), 2);
}

#[tokio::test]
async fn duplicate_envelope_carries_existing_id() {
    let response = ApiError(GovError::duplicate(42)).into_response();
    let body = body_json(response).await;

    assert_eq!(body["code"], "duplicate");
    assert_eq!(body["details"]["existing_id"], 42);
}

#[tokio::test]
async fn unauthorized_gate_envelope_maps_to_403() {
    let response = ApiError(GovError::unauthorized_gate("reviewer_identity", "actor is not the assigned reviewer")).into_response();
    let body = body_json(response).await;

    assert_eq!(body["status"], 403);
    assert_eq!(body["code"], "unauthorized_gate");
    assert_eq!(body["gate"], "reviewer_identity");
}

#[tokio::test]
async fn storage_error_never_leaks_raw_details_field() {
    // Storage errors carry no `hint`/`gate`/`fields`/`details` — the
    // envelope must omit them rather than serialize `null`.
    let response = ApiError(GovError::storage("connection pool exhausted")).into_response();
    let body = body_json(response).await;

    assert_eq!(body["status"], 500);
    assert!(body.get("hint").is_none());
    assert!(body.get("gate").is_none());
    assert!(body.get("fields").is_none());
    assert!(body.get("details").is_none());
}
