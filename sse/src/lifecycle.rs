use crate::connection::{ConnectionId, ConnectionRegistry};
use events::{Event, UserStatus};
use log::*;
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Buffer of the presence channel; a listener lagging further than this
/// misses edges and gets `RecvError::Lagged`.
const STATUS_CHANNEL_CAPACITY: usize = 256;

/// Why a connection is being torn down. Only used for logging; every reason
/// goes through the same routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The transport dropped its end of the stream.
    ClientClosed,
    /// The per-connection worker stopped on its own.
    ChannelClosed,
    /// The liveness sweep found the connection silent for too long.
    Stale,
    /// Process-level shutdown.
    Shutdown,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let reason = match self {
            DisconnectReason::ClientClosed => "client closed",
            DisconnectReason::ChannelClosed => "channel closed",
            DisconnectReason::Stale => "stale heartbeat",
            DisconnectReason::Shutdown => "shutdown",
        };
        f.write_str(reason)
    }
}

/// Shared core of the hub: the registry, the presence channel and the root
/// cancellation token. Workers, the liveness monitor and every open stream
/// hold an `Arc` to it so they can all reach the one disconnect routine.
pub(crate) struct Lifecycle {
    registry: Arc<ConnectionRegistry>,
    status_tx: broadcast::Sender<Event>,
    shutdown: CancellationToken,
}

impl Lifecycle {
    pub(crate) fn new(registry: Arc<ConnectionRegistry>) -> Self {
        let (status_tx, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);
        Self {
            registry,
            status_tx,
            shutdown: CancellationToken::new(),
        }
    }

    pub(crate) fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub(crate) fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    pub(crate) fn subscribe_status(&self) -> broadcast::Receiver<Event> {
        self.status_tx.subscribe()
    }

    /// Tear down one connection. Safe to call from any trigger, any number of
    /// times: the registry hands the removal to exactly one caller and every
    /// other call returns `false` without side effects.
    pub(crate) fn disconnect(&self, connection_id: &ConnectionId, reason: DisconnectReason) -> bool {
        let Some(removal) = self.registry.unregister(connection_id) else {
            trace!("Connection {connection_id} already gone ({reason})");
            return false;
        };

        // Completing the channel right after removal keeps "registered" and
        // "open" in step for every observer.
        removal.connection.cancel.cancel();

        info!(
            "Disconnected SSE connection {} for user {} ({})",
            connection_id, removal.connection.user_id, reason
        );

        if let Some(sequence) = removal.offline_sequence {
            self.publish_status(&removal.connection.user_id, UserStatus::Offline, sequence);
        }

        true
    }

    pub(crate) fn publish_status(&self, user_id: &str, status: UserStatus, sequence: u64) {
        debug!("User {user_id} is now {status:?} (presence #{sequence})");
        // No subscribers is a normal state, not a failure.
        if self
            .status_tx
            .send(Event::user_status_changed(user_id, status, sequence))
            .is_err()
        {
            trace!("No presence listeners for user {user_id}");
        }
    }
}
