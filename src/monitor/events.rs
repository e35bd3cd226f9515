//! Event stream (spec §3, §4.8): an unbounded mpsc ingress queue draining
//! into an append-only, mutex-guarded list ("lock-free queue plus
//! append-only list" per the Design Notes strategy).

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::trace;

use crate::model::MonitorEvent;

/// A handle producers use to push events without blocking on the list lock.
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<MonitorEvent>,
}

impl EventSender {
    pub fn send(&self, event: MonitorEvent) {
        // An unbounded channel never blocks the sampler loop; a closed
        // receiver (stream dropped) just means the event is discarded.
        let _ = self.tx.send(event);
    }
}

/// Owns the append-only event history and the background task draining the
/// ingress queue into it.
pub struct EventStream {
    events: Arc<Mutex<Vec<MonitorEvent>>>,
    sender: EventSender,
    _drain_task: tokio::task::JoinHandle<()>,
}

impl EventStream {
    pub fn new() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<MonitorEvent>();
        let events: Arc<Mutex<Vec<MonitorEvent>>> = Arc::new(Mutex::new(Vec::new()));

        let drain_events = events.clone();
        let drain_task = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                trace!("monitor event: {:?} for {}", event.kind, event.server_name);
                drain_events.lock().expect("event list mutex poisoned").push(event);
            }
        });

        Self {
            events,
            sender: EventSender { tx },
            _drain_task: drain_task,
        }
    }

    pub fn sender(&self) -> EventSender {
        self.sender.clone()
    }

    /// A snapshot of every event recorded so far, oldest first.
    pub fn snapshot(&self) -> Vec<MonitorEvent> {
        self.events.lock().expect("event list mutex poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().expect("event list mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventStream {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EventKind;

    #[tokio::test]
    async fn sent_events_appear_in_snapshot_in_order() {
        let stream = EventStream::new();
        let sender = stream.sender();

        sender.send(MonitorEvent::new(EventKind::Info, "srv1", "first"));
        sender.send(MonitorEvent::new(EventKind::Info, "srv1", "second"));

        // Give the drain task a chance to run.
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        let snapshot = stream.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].message, "first");
        assert_eq!(snapshot[1].message, "second");
    }
}
