//! In-memory room bus for deterministic single-binary tests.
//!
//! A shared [`InMemoryBroker`] stands in for the external broadcast channel;
//! each simulated server process attaches its own [`InMemoryRoomBus`] with
//! its own registry. Publishing on any bus fans the envelope to every
//! attached bus that currently holds a subscription for the room, which is
//! exactly the production topology minus the network.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock, Weak};

use async_trait::async_trait;

use crate::adapters::websocket::RoomRegistry;
use crate::domain::foundation::{DomainError, EventEnvelope, RoomId};
use crate::ports::RoomBus;

/// Shared broker connecting any number of in-memory buses.
///
/// Also records every published envelope for test assertions.
pub struct InMemoryBroker {
    attached: RwLock<Vec<Weak<InMemoryRoomBus>>>,
    published: RwLock<Vec<EventEnvelope>>,
}

impl InMemoryBroker {
    /// Creates an empty broker.
    pub fn new() -> Self {
        Self {
            attached: RwLock::new(Vec::new()),
            published: RwLock::new(Vec::new()),
        }
    }

    async fn fan_out(&self, envelope: EventEnvelope) {
        self.published
            .write()
            .expect("InMemoryBroker: published lock poisoned")
            .push(envelope.clone());

        // Collect strong refs before any await point
        let buses: Vec<Arc<InMemoryRoomBus>> = {
            let mut attached = self
                .attached
                .write()
                .expect("InMemoryBroker: attached lock poisoned");
            attached.retain(|weak| weak.strong_count() > 0);
            attached.iter().filter_map(Weak::upgrade).collect()
        };

        for bus in buses {
            bus.deliver_local(envelope.clone()).await;
        }
    }

    // === Test Helpers ===

    /// Returns all published envelopes (for test assertions).
    pub fn published_events(&self) -> Vec<EventEnvelope> {
        self.published
            .read()
            .expect("InMemoryBroker: published lock poisoned")
            .clone()
    }

    /// Returns published envelopes of a specific type.
    pub fn events_of_type(&self, event_type: &str) -> Vec<EventEnvelope> {
        self.published_events()
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }

    /// Returns count of published envelopes.
    pub fn event_count(&self) -> usize {
        self.published
            .read()
            .expect("InMemoryBroker: published lock poisoned")
            .len()
    }

    /// Checks if an envelope of the given type was published.
    pub fn has_event(&self, event_type: &str) -> bool {
        self.published
            .read()
            .expect("InMemoryBroker: published lock poisoned")
            .iter()
            .any(|e| e.event_type == event_type)
    }

    /// Clears the published log (for test isolation).
    pub fn clear(&self) {
        self.published
            .write()
            .expect("InMemoryBroker: published lock poisoned")
            .clear();
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

/// One simulated process's view of the shared broker.
///
/// Holds the process-local registry envelopes fan into, and the
/// reference-counted set of rooms this process is subscribed to.
pub struct InMemoryRoomBus {
    broker: Arc<InMemoryBroker>,
    registry: Arc<RoomRegistry>,
    subscriptions: Mutex<HashMap<RoomId, usize>>,
}

impl InMemoryRoomBus {
    /// Attaches a new bus (one simulated process) to the broker.
    pub fn attach(broker: Arc<InMemoryBroker>, registry: Arc<RoomRegistry>) -> Arc<Self> {
        let bus = Arc::new(Self {
            broker: Arc::clone(&broker),
            registry,
            subscriptions: Mutex::new(HashMap::new()),
        });
        broker
            .attached
            .write()
            .expect("InMemoryBroker: attached lock poisoned")
            .push(Arc::downgrade(&bus));
        bus
    }

    fn is_subscribed(&self, room_id: &RoomId) -> bool {
        self.subscriptions
            .lock()
            .expect("InMemoryRoomBus: subscriptions lock poisoned")
            .contains_key(room_id)
    }

    /// Current reference count for a room (test visibility).
    pub fn subscription_count(&self, room_id: &RoomId) -> usize {
        self.subscriptions
            .lock()
            .expect("InMemoryRoomBus: subscriptions lock poisoned")
            .get(room_id)
            .copied()
            .unwrap_or(0)
    }

    async fn deliver_local(&self, envelope: EventEnvelope) {
        if !self.is_subscribed(&envelope.room_id) {
            return;
        }
        // Forward verbatim; never re-publish
        let room_id = envelope.room_id;
        self.registry.deliver(&room_id, envelope).await;
    }
}

#[async_trait]
impl RoomBus for InMemoryRoomBus {
    async fn publish(&self, envelope: EventEnvelope) -> Result<(), DomainError> {
        self.broker.fan_out(envelope).await;
        Ok(())
    }

    async fn subscribe(&self, room_id: &RoomId) -> Result<(), DomainError> {
        let mut subs = self
            .subscriptions
            .lock()
            .expect("InMemoryRoomBus: subscriptions lock poisoned");
        *subs.entry(*room_id).or_insert(0) += 1;
        Ok(())
    }

    async fn unsubscribe(&self, room_id: &RoomId) -> Result<(), DomainError> {
        let mut subs = self
            .subscriptions
            .lock()
            .expect("InMemoryRoomBus: subscriptions lock poisoned");
        if let Some(count) = subs.get_mut(room_id) {
            *count -= 1;
            if *count == 0 {
                subs.remove(room_id);
            }
        }
        Ok(())
    }
}
