use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use common::UserId;
use futures::future::join_all;
use tokio::sync::RwLock;

use crate::{Connection, ConnectionId, Event};

struct Registered {
    user_id: UserId,
    connection: Arc<Connection>,
}

#[derive(Default)]
struct Registry {
    connections: HashMap<ConnectionId, Registered>,
    by_user: HashMap<UserId, HashSet<ConnectionId>>,
}

impl Registry {
    fn remove(&mut self, id: ConnectionId) -> Option<Registered> {
        let registered = self.connections.remove(&id)?;
        if let Some(ids) = self.by_user.get_mut(&registered.user_id) {
            ids.remove(&id);
            if ids.is_empty() {
                self.by_user.remove(&registered.user_id);
            }
        }
        Some(registered)
    }
}

/// Registry of live connections with per-user fan-out.
///
/// Registry mutations are exclusive. Sends take a snapshot of the target
/// connections and write outside the registry lock, so a slow client never
/// blocks registration or other users.
#[derive(Clone, Default)]
pub struct EventHub {
    registry: Arc<RwLock<Registry>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associates a connection with a user. Registering the same connection
    /// again moves it to `user_id`.
    pub async fn register(&self, connection: Arc<Connection>, user_id: UserId) {
        let id = connection.id();
        let total = {
            let mut registry = self.registry.write().await;
            registry.remove(id);
            registry.by_user.entry(user_id).or_default().insert(id);
            registry.connections.insert(
                id,
                Registered {
                    user_id,
                    connection,
                },
            );
            registry.connections.len()
        };

        metrics::gauge!("hub_connections").set(total as f64);
        tracing::debug!(connection_id = %id, user_id = %user_id, "Connection registered");
    }

    /// Removes a connection. Unknown connections are ignored.
    pub async fn unregister(&self, id: ConnectionId) -> bool {
        let (removed, total) = {
            let mut registry = self.registry.write().await;
            let removed = registry.remove(id);
            (removed, registry.connections.len())
        };

        metrics::gauge!("hub_connections").set(total as f64);
        match removed {
            Some(registered) => {
                tracing::debug!(
                    connection_id = %id,
                    user_id = %registered.user_id,
                    "Connection unregistered"
                );
                true
            }
            None => false,
        }
    }

    /// Delivers an event to every connection of one user.
    ///
    /// Returns the number of successful writes. A user without connections
    /// is not an error.
    pub async fn send_to_user(&self, user_id: UserId, event: &Event) -> usize {
        let targets: Vec<Arc<Connection>> = {
            let registry = self.registry.read().await;
            registry
                .by_user
                .get(&user_id)
                .map(|ids| {
                    ids.iter()
                        .filter_map(|id| registry.connections.get(id))
                        .map(|r| r.connection.clone())
                        .collect()
                })
                .unwrap_or_default()
        };

        if targets.is_empty() {
            tracing::debug!(user_id = %user_id, event_type = %event.event_type, "No live connections");
            return 0;
        }

        self.deliver(targets, event).await
    }

    /// Delivers an event to every registered connection.
    pub async fn broadcast(&self, event: &Event) -> usize {
        let targets: Vec<Arc<Connection>> = {
            let registry = self.registry.read().await;
            registry
                .connections
                .values()
                .map(|r| r.connection.clone())
                .collect()
        };

        self.deliver(targets, event).await
    }

    pub async fn connection_count(&self) -> usize {
        self.registry.read().await.connections.len()
    }

    pub async fn user_connection_count(&self, user_id: UserId) -> usize {
        self.registry
            .read()
            .await
            .by_user
            .get(&user_id)
            .map_or(0, HashSet::len)
    }

    async fn deliver(&self, targets: Vec<Arc<Connection>>, event: &Event) -> usize {
        let frame = match event.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(event_type = %event.event_type, error = %e, "Failed to serialize event");
                return 0;
            }
        };

        let results = join_all(targets.into_iter().map(|connection| {
            let frame = frame.as_str();
            async move {
                match connection.send_frame(frame).await {
                    Ok(()) => true,
                    Err(e) => {
                        // Concurrent sends may fail on the same connection;
                        // only the one that removes it closes it.
                        if self.unregister(connection.id()).await {
                            tracing::warn!(
                                connection_id = %connection.id(),
                                error = %e,
                                "Write failed, pruning connection"
                            );
                            connection.close().await;
                            metrics::counter!("hub_connections_pruned_total").increment(1);
                        }
                        false
                    }
                }
            }
        }))
        .await;

        let delivered = results.into_iter().filter(|ok| *ok).count();
        metrics::counter!("hub_events_delivered_total", "type" => event.event_type.as_str())
            .increment(delivered as u64);
        delivered
    }
}
