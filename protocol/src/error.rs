//! Error handling for the governance HTTP surface.
//!
//! Maps `gov_core::GovError` onto the uniform JSON envelope every endpoint
//! returns on failure: `{success, error, code, status, hint?, gate?,
//! fields?, details?}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use gov_core::error::GovError;
use serde::Serialize;
use serde_json::json;

/// Newtype so we can implement `IntoResponse` for a foreign error type.
pub struct ApiError(pub GovError);

impl From<GovError> for ApiError {
    fn from(err: GovError) -> Self {
        ApiError(err)
    }
}

#[derive(Serialize)]
struct ErrorEnvelope {
    success: bool,
    error: String,
    code: String,
    status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<Vec<FieldErrorJson>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct FieldErrorJson {
    field: String,
    message: String,
}

/// Stable machine-readable error code, independent of the display message.
pub fn error_code(err: &GovError) -> &'static str {
    match err {
        GovError::NotFound(_) => "not_found",
        GovError::AmbiguousPrefix { .. } => "ambiguous_prefix",
        GovError::Validation(_) => "validation",
        GovError::FieldValidation { .. } => "field_validation",
        GovError::GateFailure { .. } => "gate_failure",
        GovError::Unauthorized(_) => "unauthorized",
        GovError::UnauthorizedGate { .. } => "unauthorized_gate",
        GovError::Duplicate { .. } => "duplicate",
        GovError::Storage(_) => "storage",
        GovError::Transient(_) => "transient",
        GovError::Configuration(_) => "configuration",
        GovError::Internal(_) => "internal",
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let fields = match &err {
            GovError::FieldValidation { fields, .. } => Some(
                fields
                    .iter()
                    .map(|f| FieldErrorJson {
                        field: f.field.clone(),
                        message: f.message.clone(),
                    })
                    .collect(),
            ),
            _ => None,
        };

        let details = match &err {
            GovError::AmbiguousPrefix { candidates, .. } => {
                Some(json!({ "candidates": candidates }))
            }
            GovError::Duplicate { existing_id } => Some(json!({ "existing_id": existing_id })),
            _ => None,
        };

        let envelope = ErrorEnvelope {
            success: false,
            error: err.to_string(),
            code: error_code(&err).to_string(),
            status: status.as_u16(),
            hint: err.hint().map(|s| s.to_string()),
            gate: err.gate().map(|s| s.to_string()),
            fields,
            details,
        };

        (status, Json(envelope)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let err = GovError::not_found_code("abc");
        assert_eq!(err.status_code(), 404);
        assert_eq!(error_code(&err), "not_found");
    }

    #[test]
    fn gate_failure_maps_to_422_with_gate_name() {
        let err = GovError::gate_failure("artifacts", "empty artifacts");
        assert_eq!(err.status_code(), 422);
        assert_eq!(err.gate(), Some("artifacts"));
        assert_eq!(error_code(&err), "gate_failure");
    }
}
