//! Wall-clock cadence driver tying the watchdog ticks (§4.3) and the
//! webhook retry queue (§4.4) to `tokio::time::interval`s.
//!
//! Each tick is a fire-and-forget task: a missed or slow tick never
//! blocks the next one, and a single tick's error is logged and
//! swallowed rather than propagated, the same "best effort, never take
//! the process down" posture the teacher's background jobs use.

use std::sync::Arc;
use std::time::Duration;

use database::SqliteGovRepository;
use gov_core::protocol::{GovHandler, WatchdogTickParams};
use gov_core::repository::WebhookRepository;
use gov_core::webhook::{apply_attempt, classify_status, delivery_headers, random_jitter, BackoffPolicy};
use reqwest::Client;
use tracing::{debug, error, info, warn};

use crate::config::SchedulerConfig;
use crate::setup::AppHandler;

/// Spawns one background task per cadence in `config`, plus the webhook
/// delivery loop. Returns immediately; tasks run until the process
/// exits (they are not joined — `main` keeps the server future alive).
pub fn spawn_all(handler: Arc<AppHandler>, repository: Arc<SqliteGovRepository>, config: &SchedulerConfig) {
    spawn_tick(handler.clone(), Duration::from_secs(config.idle_nudge_seconds), "idle_nudge", |h, p| {
        Box::pin(async move { h.tick_idle_nudge(p).await })
    });
    spawn_tick(handler.clone(), Duration::from_secs(config.cadence_watchdog_seconds), "cadence_watchdog", |h, p| {
        Box::pin(async move { h.tick_cadence_watchdog(p).await })
    });
    spawn_tick(handler.clone(), Duration::from_secs(config.mention_rescue_seconds), "mention_rescue", |h, p| {
        Box::pin(async move { h.tick_mention_rescue(p).await })
    });
    spawn_tick(handler.clone(), Duration::from_secs(config.board_health_seconds), "board_health", |h, p| {
        Box::pin(async move { h.tick_board_health(p).await })
    });
    spawn_tick(handler.clone(), Duration::from_secs(config.execution_sweeper_seconds), "execution_sweeper", |h, p| {
        Box::pin(async move { h.tick_execution_sweeper(p).await })
    });

    spawn_webhook_retry_loop(repository, Duration::from_secs(config.webhook_retry_seconds));
}

type TickFuture = std::pin::Pin<Box<dyn std::future::Future<Output = gov_core::error::Result<serde_json::Value>> + Send>>;

fn spawn_tick(
    handler: Arc<AppHandler>,
    period: Duration,
    name: &'static str,
    call: impl Fn(Arc<AppHandler>, WatchdogTickParams) -> TickFuture + Send + Sync + 'static,
) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let params = WatchdogTickParams { dry_run: false, force: false, now_ms: None };
            match call(handler.clone(), params).await {
                Ok(result) => debug!(tick = name, ?result, "watchdog tick completed"),
                Err(error) => error!(tick = name, %error, "watchdog tick failed"),
            }
        }
    });
}

/// Drains `WebhookRepository::list_retryable`, POSTs each event's
/// payload, and persists the resulting state via `apply_attempt`.
/// State is always written before the next attempt is considered, per
/// §5's write-then-send ordering described in `gov_core::webhook`.
fn spawn_webhook_retry_loop(repository: Arc<SqliteGovRepository>, period: Duration) {
    tokio::spawn(async move {
        let client = Client::builder().timeout(Duration::from_secs(10)).build().expect("reqwest client builds");
        let backoff = BackoffPolicy::default();
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            let now = chrono::Utc::now();
            let due = match WebhookRepository::list_retryable(repository.as_ref(), now, backoff.max_concurrent).await {
                Ok(events) => events,
                Err(error) => {
                    error!(%error, "failed to list retryable webhooks");
                    continue;
                }
            };

            for event in due {
                let attempt = event.attempts + 1;
                let headers = delivery_headers(&event, attempt, now);
                let response = client
                    .post(&event.target_url)
                    .header("X-Webhook-Id", headers.webhook_id)
                    .header("X-Idempotency-Key", headers.idempotency_key)
                    .header("X-Event-Type", headers.event_type)
                    .header("X-Provider", headers.provider)
                    .header("X-Attempt", headers.attempt.to_string())
                    .json(&event.payload)
                    .send()
                    .await;

                let (status_code, error_message) = match &response {
                    Ok(resp) => (Some(resp.status().as_u16()), None),
                    Err(error) => (None, Some(error.to_string())),
                };
                let result = classify_status(status_code);
                let next = apply_attempt(&event, result, status_code, error_message, now, &backoff, random_jitter);

                if let Err(error) = WebhookRepository::update(repository.as_ref(), &next).await {
                    error!(%error, webhook_id = event.id, "failed to persist webhook delivery attempt");
                } else {
                    match next.status {
                        gov_core::models::WebhookStatus::Delivered => info!(webhook_id = event.id, "webhook delivered"),
                        gov_core::models::WebhookStatus::DeadLetter => {
                            warn!(webhook_id = event.id, "webhook moved to dead letter after exhausting retries")
                        }
                        _ => debug!(webhook_id = event.id, next_retry_at = ?next.next_retry_at, "webhook retry scheduled"),
                    }
                }
            }
        }
    });
}
