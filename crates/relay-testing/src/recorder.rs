//! Bounded in-memory event sink
//!
//! [`FakeRecorder`] formats each published event as `"<Type> <Reason> <note>"`
//! and pushes it into a bounded channel that [`EventList`] drains. A full
//! channel drops the new event and logs a warning; emitters never block.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::EventType;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::warn;

use relay_common::events::EventPublisher;

/// Events a single reconciliation is expected to emit at most
pub const MAX_EVENT_BUFFER_SIZE: usize = 10;

/// Create a connected recorder/list pair with room for `capacity` events
pub fn event_channel(capacity: usize) -> (FakeRecorder, EventList) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let dropped = Arc::new(AtomicUsize::new(0));
    (
        FakeRecorder {
            tx,
            dropped: dropped.clone(),
        },
        EventList {
            rx: Mutex::new(rx),
            dropped,
        },
    )
}

/// Render an event the way it is stored in the buffer
pub fn format_event(type_: EventType, reason: &str, note: Option<&str>) -> String {
    let type_ = match type_ {
        EventType::Normal => "Normal",
        EventType::Warning => "Warning",
    };
    match note {
        Some(note) if !note.is_empty() => format!("{type_} {reason} {note}"),
        _ => format!("{type_} {reason}"),
    }
}

/// [`EventPublisher`] writing into a bounded buffer
#[derive(Clone, Debug)]
pub struct FakeRecorder {
    tx: mpsc::Sender<String>,
    dropped: Arc<AtomicUsize>,
}

#[async_trait]
impl EventPublisher for FakeRecorder {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        _action: &str,
        note: Option<String>,
    ) {
        let event = format_event(type_, reason, note.as_deref());
        if let Err(e) = self.tx.try_send(event) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            warn!(
                reason,
                name = ?resource_ref.name,
                namespace = ?resource_ref.namespace,
                error = %e,
                "event buffer full, dropping event"
            );
        }
    }
}

/// Drainable view of the events a reconciler emitted
#[derive(Debug)]
pub struct EventList {
    rx: Mutex<mpsc::Receiver<String>>,
    dropped: Arc<AtomicUsize>,
}

impl EventList {
    /// Take every buffered event, oldest first
    pub fn events(&self) -> Vec<String> {
        let mut rx = self.rx.lock();
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Number of events discarded because the buffer was full
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn target() -> ObjectReference {
        ObjectReference {
            name: Some("orders".to_string()),
            namespace: Some("shop".to_string()),
            ..Default::default()
        }
    }

    #[rstest]
    #[case::with_note(EventType::Normal, Some("all good"), "Normal Synced all good")]
    #[case::without_note(EventType::Warning, None, "Warning Synced")]
    #[case::empty_note(EventType::Normal, Some(""), "Normal Synced")]
    fn formats_events(
        #[case] type_: EventType,
        #[case] note: Option<&str>,
        #[case] expected: &str,
    ) {
        assert_eq!(format_event(type_, "Synced", note), expected);
    }

    #[tokio::test]
    async fn overflow_drops_newest_and_keeps_order() {
        let (recorder, list) = event_channel(3);
        for i in 0..5 {
            recorder
                .publish(&target(), EventType::Normal, "Tick", "Reconcile", Some(i.to_string()))
                .await;
        }
        assert_eq!(
            list.events(),
            vec!["Normal Tick 0", "Normal Tick 1", "Normal Tick 2"]
        );
        assert_eq!(list.dropped(), 2);
    }

    #[tokio::test]
    async fn draining_frees_capacity() {
        let (recorder, list) = event_channel(1);
        recorder
            .publish(&target(), EventType::Normal, "First", "Reconcile", None)
            .await;
        assert_eq!(list.events(), vec!["Normal First"]);
        recorder
            .publish(&target(), EventType::Normal, "Second", "Reconcile", None)
            .await;
        assert_eq!(list.events(), vec!["Normal Second"]);
        assert!(list.events().is_empty());
    }
}
