//! Webhook delivery engine (§4.4).
//!
//! A durable, at-least-once, idempotent delivery queue. The state
//! machine and backoff math live here as pure functions; the actual
//! HTTP POST and its timeout belong to the caller (the `server` crate's
//! scheduler), per §5's write-then-send ordering: state is persisted
//! before the network call is attempted.

use crate::models::{WebhookEvent, WebhookStatus};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;

#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub initial_backoff_ms: i64,
    pub multiplier: f64,
    pub max_backoff_ms: i64,
    pub max_attempts: u32,
    pub max_concurrent: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self { initial_backoff_ms: 1000, multiplier: 2.0, max_backoff_ms: 60_000, max_attempts: 5, max_concurrent: 8 }
    }
}

/// Required outbound headers for a delivery attempt (§4.4).
#[derive(Debug, Clone)]
pub struct DeliveryHeaders {
    pub webhook_id: String,
    pub idempotency_key: String,
    pub event_type: String,
    pub provider: String,
    pub attempt: u32,
    pub timestamp: DateTime<Utc>,
}

pub fn delivery_headers(event: &WebhookEvent, attempt: u32, now: DateTime<Utc>) -> DeliveryHeaders {
    DeliveryHeaders {
        webhook_id: event.id.to_string(),
        idempotency_key: event.idempotency_key.clone(),
        event_type: event.event_type.clone(),
        provider: event.provider.clone(),
        attempt,
        timestamp: now,
    }
}

/// Outcome of one delivery attempt, as observed by the caller after
/// the HTTP call returns (or times out/errors).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptResult {
    Success,
    Failure,
}

pub fn classify_status(status_code: Option<u16>) -> AttemptResult {
    match status_code {
        Some(code) if (200..300).contains(&code) => AttemptResult::Success,
        _ => AttemptResult::Failure,
    }
}

/// Backoff delay for the given attempt number (1-indexed), with +/-20%
/// jitter, clamped to `max_backoff_ms` (§4.4).
pub fn backoff_delay(attempt: u32, policy: &BackoffPolicy, jitter_fn: impl Fn(f64) -> f64) -> Duration {
    let base = policy.initial_backoff_ms as f64 * policy.multiplier.powi(attempt as i32 - 1);
    let clamped = base.min(policy.max_backoff_ms as f64);
    let jitter = jitter_fn(clamped);
    Duration::milliseconds(jitter.round() as i64)
}

/// Default jitter source: uniform +/-20%.
pub fn random_jitter(base_ms: f64) -> f64 {
    let mut rng = rand::thread_rng();
    let factor = rng.gen_range(0.8..=1.2);
    base_ms * factor
}

/// Apply the result of a delivery attempt to an event, returning its
/// next state. Does not mutate `event` in place so the caller can diff
/// before/after for persistence.
pub fn apply_attempt(
    event: &WebhookEvent,
    result: AttemptResult,
    status_code: Option<u16>,
    error: Option<String>,
    now: DateTime<Utc>,
    policy: &BackoffPolicy,
    jitter_fn: impl Fn(f64) -> f64,
) -> WebhookEvent {
    let mut next = event.clone();
    next.attempts += 1;
    next.last_attempt_at = Some(now);
    next.last_status_code = status_code;
    next.last_error = error;

    match result {
        AttemptResult::Success => {
            next.status = WebhookStatus::Delivered;
            next.delivered_at = Some(now);
            next.next_retry_at = None;
        }
        AttemptResult::Failure => {
            if next.attempts >= next.max_attempts.max(policy.max_attempts) {
                next.status = WebhookStatus::DeadLetter;
                next.next_retry_at = None;
            } else {
                next.status = WebhookStatus::Retrying;
                let delay = backoff_delay(next.attempts, policy, jitter_fn);
                next.next_retry_at = Some(now + delay);
            }
        }
    }
    next
}

/// Whether an event is eligible to be picked up by the retry loop.
pub fn is_retryable(event: &WebhookEvent, now: DateTime<Utc>) -> bool {
    match event.status {
        WebhookStatus::Pending => true,
        WebhookStatus::Retrying => event.next_retry_at.map_or(true, |t| t <= now),
        _ => false,
    }
}

/// Replay an event: a new row referencing the original via metadata
/// and a fresh idempotency key; the original is never mutated (§4.4).
/// Replay-of-replay depth is tracked but never capped (§9 open
/// question 3, resolved): `replayed_from` / `replay_depth` surface
/// runaway chains via `GET /webhooks/stats` rather than blocking them.
pub fn replay_event(original: &WebhookEvent, new_id: i64, new_idempotency_key: String, now: DateTime<Utc>) -> WebhookEvent {
    let depth = original
        .metadata
        .get("replay_depth")
        .and_then(|v| v.as_u64())
        .unwrap_or(0)
        + 1;

    let mut metadata = serde_json::Map::new();
    metadata.insert("replayed_from".to_string(), serde_json::Value::from(original.id));
    metadata.insert("replay_depth".to_string(), serde_json::Value::from(depth));

    WebhookEvent {
        id: new_id,
        idempotency_key: new_idempotency_key,
        provider: original.provider.clone(),
        event_type: original.event_type.clone(),
        payload: original.payload.clone(),
        target_url: original.target_url.clone(),
        status: WebhookStatus::Pending,
        attempts: 0,
        max_attempts: original.max_attempts,
        next_retry_at: None,
        last_attempt_at: None,
        last_error: None,
        last_status_code: None,
        delivered_at: None,
        created_at: now,
        expires_at: original.expires_at,
        metadata: serde_json::Value::Object(metadata),
    }
}

/// Whether a `delivered` row has aged past its retention window and
/// should be purged. Non-delivered rows are retained for forensics
/// regardless of `expires_at` (§4.4).
pub fn eligible_for_purge(event: &WebhookEvent, now: DateTime<Utc>) -> bool {
    event.status == WebhookStatus::Delivered && event.expires_at.is_some_and(|t| t <= now)
}
