use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast, mpsc};
use tracing::debug;
use uuid::Uuid;

use showcase_types::events::GatewayEvent;
use showcase_types::models::SiteConfigEntry;

const BROADCAST_CAPACITY: usize = 1024;

/// Fans events out to every gateway connection and in-process subscriber.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Broadcast channel for gateway events. Receivers filter by section themselves.
    broadcast_tx: broadcast::Sender<GatewayEvent>,

    /// Per-user targeted send channels: user_id -> (conn_id, sender)
    user_channels: RwLock<HashMap<Uuid, (Uuid, mpsc::UnboundedSender<GatewayEvent>)>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                user_channels: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Subscribe to gateway events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Broadcast an event to all subscribers. Returns how many receivers got it.
    pub fn broadcast(&self, event: GatewayEvent) -> usize {
        self.inner.broadcast_tx.send(event).unwrap_or(0)
    }

    /// Announce a stored configuration section on the change feed.
    pub fn publish_config(&self, entry: &SiteConfigEntry) -> usize {
        let receivers = self.broadcast(GatewayEvent::ConfigUpdate {
            section: entry.section.clone(),
            value: entry.value.clone(),
            revision: entry.revision,
        });
        debug!(
            "Published section '{}' rev {} to {} receivers",
            entry.section, entry.revision, receivers
        );
        receivers
    }

    /// Number of live broadcast receivers (gateway connections plus in-process consumers).
    pub fn receiver_count(&self) -> usize {
        self.inner.broadcast_tx.receiver_count()
    }

    /// Register a per-user targeted channel. Returns the connection id that
    /// owns it; a newer registration for the same user replaces older ones.
    pub async fn register_user_channel(
        &self,
        user_id: Uuid,
        tx: mpsc::UnboundedSender<GatewayEvent>,
    ) -> Uuid {
        let conn_id = Uuid::new_v4();
        self.inner.user_channels.write().await.insert(user_id, (conn_id, tx));
        conn_id
    }

    /// Unregister a per-user targeted channel, but only if conn_id matches.
    pub async fn unregister_user_channel(&self, user_id: Uuid, conn_id: Uuid) {
        let mut channels = self.inner.user_channels.write().await;
        if channels.get(&user_id).is_some_and(|(stored, _)| *stored == conn_id) {
            channels.remove(&user_id);
        }
    }

    /// Send a targeted event to a specific user. Returns false when the user
    /// has no live connection.
    pub async fn send_to_user(&self, user_id: Uuid, event: GatewayEvent) -> bool {
        let channels = self.inner.user_channels.read().await;
        match channels.get(&user_id) {
            Some((_, tx)) => tx.send(event).is_ok(),
            None => false,
        }
    }

    pub async fn is_connected(&self, user_id: Uuid) -> bool {
        self.inner.user_channels.read().await.contains_key(&user_id)
    }
}
