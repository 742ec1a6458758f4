//! Typed broadcast event bus (§4.8, §9).
//!
//! Per §9's redesign note the source's ad hoc event bus becomes a
//! typed `tokio::sync::broadcast` channel; subscribers filter by
//! agent/topic/type client-side. Back-pressure is handled by the
//! channel's own bounded ring buffer — lagged subscribers observe a
//! `RecvError::Lagged(n)`, counted here so overflow is observable
//! rather than silent.

use crate::gate_chain::LifecycleEvent;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Every event kind the bus carries, tagged for SSE subscriber
/// filtering by `topics`/`types` (§6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GovEvent {
    TaskCreated { task_id: i64 },
    TaskUpdated { task_id: i64 },
    StatusChanged { task_id: i64, from: String, to: String },
    InsightCreated { insight_id: i64 },
    InsightUpdated { insight_id: i64 },
    InsightPromoted { insight_id: i64, task_id: i64 },
    WatchdogDecision { worker: String, summary: String },
}

impl From<LifecycleEvent> for GovEvent {
    fn from(e: LifecycleEvent) -> Self {
        match e {
            LifecycleEvent::TaskCreated { task_id } => GovEvent::TaskCreated { task_id },
            LifecycleEvent::TaskUpdated { task_id } => GovEvent::TaskUpdated { task_id },
            LifecycleEvent::StatusChanged { task_id, from, to } => {
                GovEvent::StatusChanged { task_id, from: from.to_string(), to: to.to_string() }
            }
        }
    }
}

/// A bounded, multi-producer multi-consumer fan-out for [`GovEvent`]s.
/// Each subscriber gets its own lagging counter so drop-oldest overflow
/// is visible per-consumer rather than globally averaged.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<GovEvent>,
    dropped: Arc<AtomicU64>,
}

impl EventBus {
    /// `capacity` bounds the per-subscriber ring buffer; a slow
    /// subscriber drops the oldest unread events rather than blocking
    /// publishers (§9).
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, dropped: Arc::new(AtomicU64::new(0)) }
    }

    pub fn publish(&self, event: GovEvent) {
        // Err here only means there are currently no subscribers.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> EventSubscription {
        EventSubscription { receiver: self.sender.subscribe(), dropped: self.dropped.clone() }
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

/// One subscriber's handle. `recv` transparently skips over lag gaps,
/// incrementing the shared drop counter, so callers see a clean stream
/// of events rather than having to handle `Lagged` themselves.
pub struct EventSubscription {
    receiver: broadcast::Receiver<GovEvent>,
    dropped: Arc<AtomicU64>,
}

impl EventSubscription {
    pub async fn recv(&mut self) -> Option<GovEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    self.dropped.fetch_add(n, Ordering::Relaxed);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive() {
        let bus = EventBus::new(8);
        let mut sub = bus.subscribe();
        bus.publish(GovEvent::TaskCreated { task_id: 1 });
        let event = sub.recv().await.unwrap();
        assert_eq!(event, GovEvent::TaskCreated { task_id: 1 });
    }

    #[tokio::test]
    async fn overflow_is_counted_not_blocking() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();
        for i in 0..10 {
            bus.publish(GovEvent::TaskCreated { task_id: i });
        }
        let _ = sub.recv().await;
        assert!(bus.dropped_count() > 0);
    }
}
