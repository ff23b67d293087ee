use crate::connection::{Connection, ConnectionId, ConnectionRegistry, UserId};
use events::Event;
use log::*;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;

/// Fan-out on top of the registry.
///
/// Every operation works on a snapshot taken at call time and pushes with
/// `try_send`, so a producer never waits on any connection. A target that is
/// not connected is simply skipped; the return values count the connections
/// that accepted the event.
#[derive(Clone)]
pub struct Router {
    registry: Arc<ConnectionRegistry>,
}

impl Router {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Deliver to one connection if it is currently registered.
    pub fn send_to_connection(&self, connection_id: &ConnectionId, event: Event) -> bool {
        match self.registry.get(connection_id) {
            Some(connection) => self.deliver(&connection, event),
            None => {
                debug!("No connection {connection_id}, dropping {} event", event.kind);
                false
            }
        }
    }

    /// Send message to specific user - O(1) lookup + O(k) send where k = user's connections
    pub fn send_to_user(&self, user_id: &str, event: Event) -> usize {
        let connections = self.registry.list_by_user(user_id);
        if connections.is_empty() {
            debug!("User {user_id} has no live connections for {} event", event.kind);
            return 0;
        }

        connections
            .iter()
            .filter(|connection| self.deliver(connection, event.clone()))
            .count()
    }

    pub fn send_to_users(&self, user_ids: &[UserId], event: Event) -> usize {
        let delivered = user_ids
            .iter()
            .map(|user_id| self.send_to_user(user_id, event.clone()))
            .sum();

        debug!(
            "Sent {} event to {} connection(s) across {} user(s)",
            event.kind,
            delivered,
            user_ids.len()
        );
        delivered
    }

    /// Broadcast to all connections - O(n). Each copy is stamped with the
    /// receiving connection's user id.
    pub fn broadcast(&self, event: Event) -> usize {
        let delivered = self
            .registry
            .list_all()
            .iter()
            .filter(|connection| self.deliver(connection, event.stamped_for(&connection.user_id)))
            .count();

        debug!("Broadcast {} event to {} connection(s)", event.kind, delivered);
        delivered
    }

    fn deliver(&self, connection: &Connection, event: Event) -> bool {
        match connection.sender.try_send(event) {
            Ok(()) => {
                self.registry.touch(&connection.id);
                true
            }
            Err(TrySendError::Full(event)) => {
                warn!(
                    "Queue full for connection {} (user {}), dropping {} event {}",
                    connection.id, connection.user_id, event.kind, event.id
                );
                false
            }
            Err(TrySendError::Closed(event)) => {
                debug!(
                    "Connection {} is closing, skipping {} event {}",
                    connection.id, event.kind, event.id
                );
                false
            }
        }
    }
}
