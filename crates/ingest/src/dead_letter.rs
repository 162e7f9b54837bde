//! Events that could not be applied after exhausting their retries.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::ScoreEvent;

/// An event set aside for inspection or manual replay.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetter {
    /// The event exactly as it would be re-submitted.
    pub event: ScoreEvent,
    /// Why the last attempt failed.
    pub reason: String,
    /// How many apply attempts were made.
    pub attempts: u32,
    /// When the event was given up on.
    pub failed_at: DateTime<Utc>,
}

/// Shared log of dead-lettered events.
///
/// Every entry is also emitted at `error` level with its full JSON payload,
/// so nothing is lost if the process exits before the log is inspected.
#[derive(Debug, Clone, Default)]
pub struct DeadLetterLog {
    entries: Arc<RwLock<Vec<DeadLetter>>>,
}

impl DeadLetterLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a dead letter.
    pub async fn record(&self, event: ScoreEvent, reason: impl Into<String>, attempts: u32) {
        let entry = DeadLetter {
            event,
            reason: reason.into(),
            attempts,
            failed_at: Utc::now(),
        };

        match serde_json::to_string(&entry.event) {
            Ok(payload) => tracing::error!(
                event_id = %entry.event.event_id,
                attempts,
                reason = %entry.reason,
                %payload,
                "score event dead-lettered"
            ),
            Err(err) => tracing::error!(
                event_id = %entry.event.event_id,
                attempts,
                reason = %entry.reason,
                payload = ?entry.event,
                serialization_error = %err,
                "score event dead-lettered"
            ),
        }
        metrics::counter!("score_events_dead_lettered_total").increment(1);

        self.entries.write().await.push(entry);
    }

    /// Returns a copy of every recorded dead letter, oldest first.
    pub async fn entries(&self) -> Vec<DeadLetter> {
        self.entries.read().await.clone()
    }

    /// Removes and returns every recorded dead letter, for replay.
    pub async fn take(&self) -> Vec<DeadLetter> {
        std::mem::take(&mut *self.entries.write().await)
    }

    /// Number of recorded dead letters.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns true if nothing has been dead-lettered.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_record_and_take() {
        let log = DeadLetterLog::new();
        assert!(log.is_empty().await);

        let event = ScoreEvent::new("exam", "student", 0.5).with_event_id("evt-1");
        log.record(event.clone(), "lock timeout", 3).await;

        let entries = log.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event, event);
        assert_eq!(entries[0].attempts, 3);
        assert_eq!(entries[0].reason, "lock timeout");

        let taken = log.take().await;
        assert_eq!(taken.len(), 1);
        assert!(log.is_empty().await);
    }

    #[tokio::test]
    async fn test_clones_share_entries() {
        let log = DeadLetterLog::new();
        let other = log.clone();
        log.record(ScoreEvent::new("e", "s", 0.1), "boom", 1).await;
        assert_eq!(other.len().await, 1);
    }

    #[test]
    fn test_serializes_for_replay() {
        let entry = DeadLetter {
            event: ScoreEvent::new("e", "s", 0.5).with_event_id("x"),
            reason: "lock timeout".to_string(),
            attempts: 5,
            failed_at: Utc::now(),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["event"]["examId"], "e");
        assert_eq!(json["event"]["eventId"], "x");
        assert_eq!(json["attempts"], 5);
    }
}
