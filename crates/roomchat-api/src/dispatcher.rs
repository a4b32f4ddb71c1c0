use tokio::sync::broadcast;

use crate::graphql::types::{Message, Room};

/// Records created through the API, fanned out to subscribers.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    RoomCreated(Room),
    MessageCreated(Message),
}

/// Broadcasts creation events to every open subscription.
#[derive(Clone)]
pub struct Dispatcher {
    broadcast_tx: broadcast::Sender<ChatEvent>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self { broadcast_tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.broadcast_tx.subscribe()
    }

    /// Send to all current subscribers. Having none is not an error.
    pub fn broadcast(&self, event: ChatEvent) {
        let _ = self.broadcast_tx.send(event);
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
