use thiserror::Error;

/// Result type alias used throughout the governance core.
pub type Result<T> = std::result::Result<T, GovError>;

/// Error taxonomy for the execution-governance core, mirrored onto the
/// uniform failure envelope at the HTTP boundary:
/// `{success:false, error, code, status, hint?, gate?, fields?, details?}`
/// (§7).
///
/// # Examples
///
/// ```rust
/// use gov_core::error::GovError;
///
/// let e = GovError::gate_failure("reviewer_identity", "actor is not the assigned reviewer");
/// assert_eq!(e.status_code(), 403);
/// assert_eq!(e.gate(), Some("reviewer_identity"));
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GovError {
    /// Entity not found by id/code/prefix.
    #[error("not found: {0}")]
    NotFound(String),

    /// A short prefix resolved to more than one candidate.
    #[error("ambiguous prefix '{prefix}': {candidates:?}")]
    AmbiguousPrefix { prefix: String, candidates: Vec<String> },

    /// Bad input, missing required field, or schema mismatch.
    #[error("validation error: {0}")]
    Validation(String),

    /// A named field failed validation; carries the structured field
    /// list the envelope's `fields` member surfaces.
    #[error("validation error: {0} ({} field(s))", .fields.len())]
    FieldValidation { message: String, fields: Vec<FieldError> },

    /// A gate in the transition chain rejected the patch. `gate` is the
    /// stable identifier callers match on (e.g. `"pr_not_merged"`).
    #[error("gate '{gate}' rejected: {message}")]
    GateFailure {
        gate: String,
        message: String,
        hint: Option<String>,
    },

    /// Wrong reviewer, unauthorized approval, or similar authorization
    /// failure. Always paired with a mutation-alert + audit entry by the
    /// caller.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// An authorization failure tied to a specific gate identifier
    /// (e.g. `reviewer_identity`), surfaced as 403 with `gate` set —
    /// §8 scenario 2 expects both on an unauthorized approval attempt.
    #[error("unauthorized ({gate}): {message}")]
    UnauthorizedGate { gate: String, message: String },

    /// Idempotency-key collision interpreted as duplicate intent; the
    /// caller should treat this as success and use the attached id.
    #[error("duplicate of existing entity {existing_id}")]
    Duplicate { existing_id: i64 },

    /// Database/storage failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Outbound network call (webhook delivery, PR integrity lookup)
    /// failed transiently; the owning worker retries with backoff.
    #[error("transient error: {0}")]
    Transient(String),

    /// Configuration error at startup or reload.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Internal invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}

/// One entry in a `FieldValidation` error's field list.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl GovError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn not_found_id(id: i64) -> Self {
        Self::NotFound(format!("task {id} not found"))
    }

    pub fn not_found_code(code: &str) -> Self {
        Self::NotFound(format!("task '{code}' not found"))
    }

    pub fn ambiguous_prefix(prefix: impl Into<String>, candidates: Vec<String>) -> Self {
        Self::AmbiguousPrefix { prefix: prefix.into(), candidates }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn empty_field(field: &str) -> Self {
        Self::FieldValidation {
            message: format!("field '{field}' cannot be empty"),
            fields: vec![FieldError { field: field.into(), message: "must not be empty".into() }],
        }
    }

    pub fn gate_failure(gate: impl Into<String>, message: impl Into<String>) -> Self {
        Self::GateFailure { gate: gate.into(), message: message.into(), hint: None }
    }

    pub fn gate_failure_with_hint(
        gate: impl Into<String>,
        message: impl Into<String>,
        hint: impl Into<String>,
    ) -> Self {
        Self::GateFailure { gate: gate.into(), message: message.into(), hint: Some(hint.into()) }
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn unauthorized_gate(gate: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UnauthorizedGate { gate: gate.into(), message: message.into() }
    }

    pub fn duplicate(existing_id: i64) -> Self {
        Self::Duplicate { existing_id }
    }

    pub fn storage(msg: impl std::fmt::Display) -> Self {
        Self::Storage(msg.to_string())
    }

    pub fn transient(msg: impl std::fmt::Display) -> Self {
        Self::Transient(msg.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, GovError::NotFound(_) | GovError::AmbiguousPrefix { .. })
    }

    pub fn is_gate_failure(&self) -> bool {
        matches!(self, GovError::GateFailure { .. } | GovError::UnauthorizedGate { .. })
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, GovError::Transient(_))
    }

    /// The gate identifier, if this is a `GateFailure` or `UnauthorizedGate`.
    pub fn gate(&self) -> Option<&str> {
        match self {
            GovError::GateFailure { gate, .. } => Some(gate.as_str()),
            GovError::UnauthorizedGate { gate, .. } => Some(gate.as_str()),
            _ => None,
        }
    }

    /// Remediation hint, if one was attached.
    pub fn hint(&self) -> Option<&str> {
        match self {
            GovError::GateFailure { hint, .. } => hint.as_deref(),
            _ => None,
        }
    }

    /// HTTP status code per §7's error taxonomy.
    pub fn status_code(&self) -> u16 {
        match self {
            GovError::NotFound(_) => 404,
            GovError::AmbiguousPrefix { .. } => 400,
            GovError::Validation(_) | GovError::FieldValidation { .. } => 400,
            GovError::GateFailure { .. } => 422,
            GovError::Unauthorized(_) | GovError::UnauthorizedGate { .. } => 403,
            GovError::Duplicate { .. } => 200,
            GovError::Storage(_) => 500,
            GovError::Transient(_) => 503,
            GovError::Configuration(_) => 500,
            GovError::Internal(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(GovError::not_found_id(1).status_code(), 404);
        assert_eq!(GovError::gate_failure("artifacts", "empty").status_code(), 422);
        assert_eq!(GovError::unauthorized("x").status_code(), 403);
        assert_eq!(GovError::duplicate(7).status_code(), 200);
    }

    #[test]
    fn gate_accessor() {
        let e = GovError::gate_failure_with_hint("pr_not_merged", "PR open", "merge the PR first");
        assert_eq!(e.gate(), Some("pr_not_merged"));
        assert_eq!(e.hint(), Some("merge the PR first"));
        assert!(e.is_gate_failure());
    }
}
