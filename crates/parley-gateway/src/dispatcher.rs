use std::sync::Arc;

use tokio::sync::broadcast;

use parley_types::events::GatewayEvent;

/// Fan-out point for gateway events. Every connection subscribes to the
/// broadcast channel and filters for its own user.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    broadcast_tx: broadcast::Sender<GatewayEvent>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner { broadcast_tx }),
        }
    }

    /// Subscribe to gateway events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Broadcast an event to all connected clients.
    pub fn broadcast(&self, event: GatewayEvent) {
        let _ = self.inner.broadcast_tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use parley_types::models::Message;
    use uuid::Uuid;

    #[tokio::test]
    async fn broadcast_reaches_every_subscriber() {
        let dispatcher = Dispatcher::new();
        let mut a = dispatcher.subscribe();
        let mut b = dispatcher.subscribe();

        dispatcher.broadcast(GatewayEvent::MessageInsert(Message {
            id: 1,
            sender: "alice".into(),
            receiver: "bob".into(),
            content: "hi".into(),
            created_at: Utc::now(),
        }));

        assert!(matches!(a.recv().await.unwrap(), GatewayEvent::MessageInsert(m) if m.id == 1));
        assert!(matches!(b.recv().await.unwrap(), GatewayEvent::MessageInsert(m) if m.id == 1));
    }

    #[tokio::test]
    async fn broadcast_without_subscribers_is_dropped() {
        let dispatcher = Dispatcher::new();
        dispatcher.broadcast(GatewayEvent::Ready {
            user_id: Uuid::new_v4(),
            username: "alice".into(),
        });
        let mut late = dispatcher.subscribe();
        assert!(late.try_recv().is_err());
    }
}
