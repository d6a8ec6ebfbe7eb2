//! Event Bus
//!
//! Publish/subscribe over a tokio broadcast channel with two named topics.
//! Subscribers that fall behind skip the missed events; the store always
//! holds the latest snapshot, so nothing is lost by skipping notifications.

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::warn;

use crate::network::connection::ConnectionStatus;
use crate::sync::entity::EntityKind;

/// Default channel capacity.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Named topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// One or more entity collections were replaced.
    EntitiesUpdated,
    /// The connection moved to a new state.
    ConnectionStateChanged,
}

/// Bus events.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// Collections of `kinds` changed, from a frame read on connection `generation`.
    EntitiesUpdated {
        /// Changed kinds.
        kinds: Vec<EntityKind>,
        /// Connection generation the frame came from.
        generation: u64,
    },
    /// New connection status.
    ConnectionStateChanged(ConnectionStatus),
}

impl SyncEvent {
    /// Topic this event is published on.
    pub fn topic(&self) -> Topic {
        match self {
            Self::EntitiesUpdated { .. } => Topic::EntitiesUpdated,
            Self::ConnectionStateChanged(_) => Topic::ConnectionStateChanged,
        }
    }
}

/// Cloneable publisher.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SyncEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventBus {
    /// Create a bus holding up to `capacity` undelivered events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event. Returns the number of subscribers it reached.
    pub fn publish(&self, event: SyncEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// Subscribe to one topic.
    pub fn subscribe(&self, topic: Topic) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
            topic: Some(topic),
        }
    }

    /// Subscribe to every topic.
    pub fn subscribe_all(&self) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
            topic: None,
        }
    }

    /// Current subscriber count.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Receiving end of a subscription.
#[derive(Debug)]
pub struct Subscription {
    rx: broadcast::Receiver<SyncEvent>,
    topic: Option<Topic>,
}

impl Subscription {
    fn wants(&self, event: &SyncEvent) -> bool {
        self.topic.map_or(true, |topic| event.topic() == topic)
    }

    /// Wait for the next matching event. `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<SyncEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.wants(&event) => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event subscriber lagged; skipping ahead");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next matching event if one is already queued.
    pub fn try_recv(&mut self) -> Option<SyncEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) if self.wants(&event) => return Some(event),
                Ok(_) => continue,
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "event subscriber lagged; skipping ahead");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }
}
