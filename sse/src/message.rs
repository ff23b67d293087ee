use crate::connection::{ConnectionId, UserId};
use events::Event;

/// An event together with where it should go.
#[derive(Debug, Clone)]
pub struct Message {
    pub event: Event,
    pub scope: MessageScope,
}

#[derive(Debug, Clone)]
pub enum MessageScope {
    /// Send to a single live connection
    Connection { connection_id: ConnectionId },
    /// Send to all connections for a specific user
    User { user_id: UserId },
    /// Send to all connections of each listed user
    Users { user_ids: Vec<UserId> },
    /// Send to all connected users
    Broadcast,
}
