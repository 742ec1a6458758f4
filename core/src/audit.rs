//! Audit ledger append logic & mutation-alert debounce (§4.5).
//!
//! The gate chain ([`crate::gate_chain`]) produces [`crate::gate_chain::AuditDraft`]
//! and [`crate::gate_chain::MutationAlert`] values without touching
//! storage. This module turns those drafts into [`crate::models::AuditEntry`]
//! rows and decides which mutation alerts actually need to go out, so a
//! flapping unauthorized-approval attempt doesn't page the same person
//! once per retry.

use crate::gate_chain::{AuditDraft, MutationAlert};
use crate::models::AuditEntry;
use chrono::{DateTime, Duration, Utc};

/// How long a (task, alert-kind) pair stays debounced after firing.
pub const MUTATION_ALERT_DEBOUNCE: Duration = Duration::minutes(15);

/// How often stale debounce records are pruned so the in-memory set
/// doesn't grow unbounded (§4.5).
pub const DEBOUNCE_PRUNE_INTERVAL: Duration = Duration::minutes(30);

/// Turn gate-chain audit drafts into persistable rows. One entry per
/// draft, in the order the gate chain produced them, so a single
/// mutation that touches N review-sensitive fields yields N entries.
pub fn build_audit_entries(task_id: i64, actor: &str, context: &str, drafts: &[AuditDraft], now: DateTime<Utc>) -> Vec<AuditEntry> {
    drafts
        .iter()
        .map(|d| AuditEntry {
            id: 0,
            task_id,
            actor: actor.to_string(),
            context: context.to_string(),
            field_path: d.field_path.clone(),
            before: d.before.clone(),
            after: d.after.clone(),
            timestamp: now,
        })
        .collect()
}

/// A debounce key identifying one kind of mutation alert for one task.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlertKey {
    pub task_id: i64,
    pub kind: &'static str,
}

fn alert_key(alert: &MutationAlert) -> AlertKey {
    match alert {
        MutationAlert::UnauthorizedApproval { task_id, .. } => AlertKey { task_id: *task_id, kind: "unauthorized_approval" },
        MutationAlert::ApprovalFlip { task_id, .. } => AlertKey { task_id: *task_id, kind: "approval_flip" },
    }
}

/// A previously-fired alert's debounce record.
#[derive(Debug, Clone)]
pub struct DebounceRecord {
    pub key: AlertKey,
    pub fired_at: DateTime<Utc>,
}

/// Filter mutation alerts down to the ones that should actually be
/// delivered right now, given prior debounce records. Returns the
/// alerts to deliver plus the new/updated debounce records to persist.
pub fn debounce_alerts(
    alerts: &[MutationAlert],
    prior: &[DebounceRecord],
    now: DateTime<Utc>,
) -> (Vec<MutationAlert>, Vec<DebounceRecord>) {
    let mut to_send = Vec::new();
    let mut updated = Vec::new();

    for alert in alerts {
        let key = alert_key(alert);
        let still_debounced = prior
            .iter()
            .find(|r| r.key == key)
            .is_some_and(|r| now - r.fired_at < MUTATION_ALERT_DEBOUNCE);

        if !still_debounced {
            to_send.push(alert.clone());
            updated.push(DebounceRecord { key, fired_at: now });
        }
    }
    (to_send, updated)
}

/// Drop debounce records older than [`DEBOUNCE_PRUNE_INTERVAL`] past
/// their own window, called on the watchdog's low-frequency cadence.
pub fn prune_debounce_records(records: Vec<DebounceRecord>, now: DateTime<Utc>) -> Vec<DebounceRecord> {
    records
        .into_iter()
        .filter(|r| now - r.fired_at < MUTATION_ALERT_DEBOUNCE + DEBOUNCE_PRUNE_INTERVAL)
        .collect()
}
