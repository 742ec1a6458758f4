//! Noise budget, alert integrity & suppression (§4.6).
//!
//! A two-stage filter sitting above chat: a per-channel rate budget
//! diverts non-critical traffic to a digest queue, and an alert-
//! integrity pass deduplicates flapping automated alerts by normalized
//! content inside a sliding window. Both stages are pure decision
//! functions; the caller persists the suppression ledger entry and
//! enqueues/flushes the digest.

use crate::models::Severity;
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct NoiseBudgetPolicy {
    pub per_channel_budget: u32,
    pub window: Duration,
    pub canary_mode: bool,
}

impl Default for NoiseBudgetPolicy {
    fn default() -> Self {
        Self { per_channel_budget: 20, window: Duration::minutes(10), canary_mode: true }
    }
}

#[derive(Debug, Clone)]
pub struct ChannelActivity {
    pub channel: String,
    pub window_start: DateTime<Utc>,
    pub message_count: u32,
}

/// Decision for one outbound automated message against the per-channel
/// noise budget.
#[derive(Debug, Clone, PartialEq)]
pub enum BudgetDecision {
    /// Under budget, or critical severity bypassing the budget.
    Send,
    /// Over budget; diverted to the digest queue (canary mode records
    /// this without enforcing — the message still sends).
    Digest,
}

pub fn evaluate_budget(activity: &ChannelActivity, severity: Severity, policy: &NoiseBudgetPolicy) -> BudgetDecision {
    if severity == Severity::Critical {
        return BudgetDecision::Send;
    }
    let over_budget = activity.message_count >= policy.per_channel_budget;
    if over_budget && !policy.canary_mode {
        BudgetDecision::Digest
    } else {
        BudgetDecision::Send
    }
}

/// Normalize automated-alert content by stripping timestamps, numeric
/// ids, and bare counts, so structurally-identical flapping alerts
/// collapse to the same key for dedup (§4.6 Alert integrity).
pub fn normalize_alert_content(content: &str) -> String {
    static TIMESTAMP: OnceLock<Regex> = OnceLock::new();
    static NUMBER: OnceLock<Regex> = OnceLock::new();

    let ts = TIMESTAMP.get_or_init(|| {
        Regex::new(r"\d{4}-\d{2}-\d{2}T[\d:.+Z-]+").expect("static regex")
    });
    let num = NUMBER.get_or_init(|| Regex::new(r"\b\d+\b").expect("static regex"));

    let no_ts = ts.replace_all(content, "<ts>");
    let no_num = num.replace_all(&no_ts, "<n>");
    no_num.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Per-alert-key state machine: `idle -> fired -> suppressed -> expires -> idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertState {
    Idle,
    Fired,
    Suppressed,
}

#[derive(Debug, Clone)]
pub struct AlertRecord {
    pub alert_key: String,
    pub state: AlertState,
    pub last_fired_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Decide whether a normalized alert should fire or be suppressed this
/// instant, and the record's next state.
pub fn evaluate_alert(
    record: Option<&AlertRecord>,
    alert_key: &str,
    now: DateTime<Utc>,
    sliding_window: Duration,
) -> (bool, AlertRecord) {
    match record {
        None => (
            true,
            AlertRecord { alert_key: alert_key.to_string(), state: AlertState::Fired, last_fired_at: Some(now), expires_at: Some(now + sliding_window) },
        ),
        Some(r) => {
            let expired = r.expires_at.map_or(true, |e| now >= e);
            if expired {
                (
                    true,
                    AlertRecord { alert_key: alert_key.to_string(), state: AlertState::Fired, last_fired_at: Some(now), expires_at: Some(now + sliding_window) },
                )
            } else {
                (
                    false,
                    AlertRecord { alert_key: alert_key.to_string(), state: AlertState::Suppressed, last_fired_at: r.last_fired_at, expires_at: r.expires_at },
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn critical_bypasses_budget() {
        let activity = ChannelActivity { channel: "ops".into(), window_start: Utc::now(), message_count: 100 };
        let policy = NoiseBudgetPolicy { canary_mode: false, ..Default::default() };
        assert_eq!(evaluate_budget(&activity, Severity::Critical, &policy), BudgetDecision::Send);
    }

    #[test]
    fn over_budget_diverts_when_enforcing() {
        let activity = ChannelActivity { channel: "ops".into(), window_start: Utc::now(), message_count: 100 };
        let policy = NoiseBudgetPolicy { canary_mode: false, ..Default::default() };
        assert_eq!(evaluate_budget(&activity, Severity::Low, &policy), BudgetDecision::Digest);
    }

    #[test]
    fn canary_mode_still_sends() {
        let activity = ChannelActivity { channel: "ops".into(), window_start: Utc::now(), message_count: 100 };
        let policy = NoiseBudgetPolicy { canary_mode: true, ..Default::default() };
        assert_eq!(evaluate_budget(&activity, Severity::Low, &policy), BudgetDecision::Send);
    }

    #[test]
    fn normalization_strips_timestamps_and_counts() {
        let a = normalize_alert_content("Task 42 stale for 2026-01-15T03:00:00Z (3 times)");
        let b = normalize_alert_content("Task 99 stale for 2026-02-20T11:30:00Z (7 times)");
        assert_eq!(a, b);
    }

    #[test]
    fn alert_state_machine_suppresses_within_window() {
        let now = Utc::now();
        let (fired, record) = evaluate_alert(None, "k1", now, Duration::minutes(30));
        assert!(fired);
        assert_eq!(record.state, AlertState::Fired);

        let (fired_again, record2) = evaluate_alert(Some(&record), "k1", now + Duration::minutes(5), Duration::minutes(30));
        assert!(!fired_again);
        assert_eq!(record2.state, AlertState::Suppressed);

        let (fired_after_expiry, _) = evaluate_alert(Some(&record), "k1", now + Duration::minutes(31), Duration::minutes(30));
        assert!(fired_after_expiry);
    }
}
