// Queue events for UI layers

use crate::domain::{RegistrationId, Timestamp};
use tokio::sync::broadcast;
use tracing::warn;

/// Something observable happened to the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
    Registered {
        registration_id: RegistrationId,
        plate: Option<String>,
    },
    CheckedIn {
        registration_id: RegistrationId,
        at: Timestamp,
    },
    MissedCheckIn {
        registration_id: RegistrationId,
        at: Timestamp,
    },
    Dispatched {
        registration_id: RegistrationId,
        trailer_number: String,
        at: Timestamp,
    },
    Reset,
}

/// Sending half, owned by the queue service
pub struct EventPublisher {
    tx: broadcast::Sender<QueueEvent>,
}

impl EventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish to current subscribers (none is fine)
    pub fn publish(&self, event: QueueEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> EventSubscriber {
        EventSubscriber {
            rx: self.tx.subscribe(),
        }
    }
}

/// Receiving half handed to UI layers
pub struct EventSubscriber {
    rx: broadcast::Receiver<QueueEvent>,
}

impl EventSubscriber {
    /// Wait for the next event; `None` once the service is gone
    pub async fn recv(&mut self) -> Option<QueueEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped = skipped, "Event subscriber lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next event if one is already queued
    pub fn try_recv(&mut self) -> Option<QueueEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}
