//! Domain event system: decoupled communication between bounded contexts.
//!
//! Events are published when something interesting happens in the system.
//! Other components can subscribe to react without tight coupling; the
//! corpus sync listener is the main consumer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// Exemplars were created, updated, deleted or imported
    ExemplarsChanged {
        reason: String,
        count: usize,
        timestamp: DateTime<Utc>,
    },

    /// A response context was assembled for the chat layer
    ContextAssembled {
        intent: String,
        exemplars: usize,
        exercises: usize,
        degraded: bool,
        elapsed_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A retrieval step failed or timed out and a fallback was used
    RetrievalDegraded {
        stage: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A knowledge graph was built
    GraphBuilt {
        nodes: usize,
        edges: usize,
        similarity_edges: usize,
        timestamp: DateTime<Utc>,
    },

    /// Exemplars were exported to disk
    CorpusSynced {
        exemplars: usize,
        token_groups: usize,
        timestamp: DateTime<Utc>,
    },
}

impl DomainEvent {
    pub fn exemplars_changed(reason: impl Into<String>, count: usize) -> Self {
        Self::ExemplarsChanged {
            reason: reason.into(),
            count,
            timestamp: Utc::now(),
        }
    }

    pub fn retrieval_degraded(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::RetrievalDegraded {
            stage: stage.into(),
            reason: reason.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
/// Components can subscribe to receive all events and filter for what they care about.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(DomainEvent::exemplars_changed("promotion", 1));

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            DomainEvent::ExemplarsChanged { reason, count, .. } => {
                assert_eq!(reason, "promotion");
                assert_eq!(*count, 1);
            }
            _ => panic!("Expected ExemplarsChanged event"),
        }
    }

    #[test]
    fn event_bus_no_subscribers_doesnt_panic() {
        let bus = EventBus::new(16);
        bus.publish(DomainEvent::retrieval_degraded("ranker", "no subscribers"));
    }
}
