//! Structured request logging middleware for the governance HTTP server.
//!
//! Single-line request logging with timing and query-parameter
//! truncation/redaction, in the same shape the teacher used for its
//! JSON-RPC method logging, adapted to REST: the "operation" is the
//! HTTP method + path rather than a JSON-RPC method name, since there
//! is no envelope method field to parse off a REST request body.

use axum::{body::Body, extract::Request, http::StatusCode, middleware::Next, response::Response};
use chrono::Utc;
use std::time::Instant;
use tracing::info;

/// Maximum length for a query-parameter value before truncation.
const MAX_PARAM_LENGTH: usize = 30;
const TRUNCATION_SUFFIX: &str = "...";

/// Governance request logging middleware.
///
/// Logs requests in the format:
/// `YYYY-MM-DD HH:MM:SS [METHOD /path] [34 ms] [200] param1="value"`
pub async fn gov_request_logging_middleware(request: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    let start_time = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let query_summary = format_query_summary(request.uri().query().unwrap_or(""));

    let response = next.run(request).await;
    let duration = start_time.elapsed();
    let status = response.status();
    let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S");

    if query_summary.is_empty() {
        info!("{} [{} {}] [{} ms] [{}]", timestamp, method, path, duration.as_millis(), status.as_u16());
    } else {
        info!(
            "{} [{} {}] [{} ms] [{}] {}",
            timestamp,
            method,
            path,
            duration.as_millis(),
            status.as_u16(),
            query_summary
        );
    }

    Ok(response)
}

/// Format a raw query string into a redacted, truncated summary.
fn format_query_summary(query: &str) -> String {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next().unwrap_or_default();
            let value = parts.next().unwrap_or_default();
            if is_sensitive_parameter(key) {
                format!("{key}=\"[REDACTED]\"")
            } else {
                format!("{key}=\"{}\"", truncate_string(value, MAX_PARAM_LENGTH))
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Truncate a string to `max_length`, appending the truncation suffix.
fn truncate_string(input: &str, max_length: usize) -> String {
    if input.len() <= max_length {
        input.to_string()
    } else {
        let truncated_length = max_length.saturating_sub(TRUNCATION_SUFFIX.len());
        format!("{}{}", &input[..truncated_length], TRUNCATION_SUFFIX)
    }
}

/// Check whether a query-parameter key should be redacted.
fn is_sensitive_parameter(key: &str) -> bool {
    let sensitive_keys = [
        "password", "token", "secret", "key", "auth", "authorization", "credential", "api_key",
        "access_token", "refresh_token",
    ];
    let key_lower = key.to_lowercase();
    sensitive_keys.iter().any(|&sensitive| key_lower.contains(sensitive))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_long_values() {
        assert_eq!(truncate_string("short", 10), "short");
        assert_eq!(truncate_string("this is a very long string", 10), "this is...");
        assert_eq!(truncate_string("exactly10c", 10), "exactly10c");
    }

    #[test]
    fn redacts_sensitive_query_params() {
        let summary = format_query_summary("agent_name=priya&api_key=sensitive_value&note=ok");
        assert!(summary.contains("agent_name=\"priya\""));
        assert!(summary.contains("api_key=\"[REDACTED]\""));
        assert!(summary.contains("note=\"ok\""));
    }

    #[test]
    fn empty_query_yields_empty_summary() {
        assert_eq!(format_query_summary(""), "");
    }
}
