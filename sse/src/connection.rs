use crate::error::{capacity_exceeded, registry_closed, Error};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use events::Event;
use log::*;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};
use tokio::sync::mpsc::Sender;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

// Type alias for user IDs (the transport hands us an already validated id)
pub type UserId = String;

/// Unique identifier for a connection (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Caller-supplied details about the client, captured at connect time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConnectionMetadata {
    pub user_agent: Option<String>,
    pub remote_addr: Option<String>,
    /// Value of the client's `Last-Event-ID` header when reconnecting.
    pub last_event_id: Option<String>,
}

/// Everything the hub keeps about one live connection.
///
/// Clones are snapshots: the heartbeat fields of a clone do not move when the
/// registry's copy is touched.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub user_id: UserId,
    pub metadata: ConnectionMetadata,
    pub connected_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
    /// Monotonic twin of `last_heartbeat`, used for liveness decisions.
    pub(crate) last_seen: Instant,
    pub(crate) sender: Sender<Event>,
    pub(crate) cancel: CancellationToken,
}

impl Connection {
    pub(crate) fn new(
        id: ConnectionId,
        user_id: UserId,
        metadata: ConnectionMetadata,
        sender: Sender<Event>,
        cancel: CancellationToken,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            metadata,
            connected_at: now,
            last_heartbeat: now,
            last_seen: Instant::now(),
            sender,
            cancel,
        }
    }

    pub fn descriptor(&self) -> ConnectionDescriptor {
        ConnectionDescriptor {
            id: self.id.clone(),
            connected_at: self.connected_at,
            last_heartbeat: self.last_heartbeat,
        }
    }

    /// How long this snapshot has gone without a successful delivery, as of `now`.
    pub fn silent_for(&self, now: Instant) -> std::time::Duration {
        now.saturating_duration_since(self.last_seen)
    }
}

/// Read-only view of a connection for status endpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionDescriptor {
    pub id: ConnectionId,
    pub connected_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
}

/// Result of a successful [`ConnectionRegistry::unregister`].
#[derive(Debug)]
pub struct Removal {
    pub connection: Connection,
    /// Presence sequence of the user's offline edge. Set for exactly one
    /// remover: the one that took the user's last connection.
    pub offline_sequence: Option<u64>,
}

/// Connection registry with dual indices for O(1) lookups
pub struct ConnectionRegistry {
    /// Primary storage: lookup by connection_id for registration/cleanup - O(1)
    connections: DashMap<ConnectionId, Connection>,

    /// Secondary index: fast lookup by user_id for message routing - O(1).
    /// A user key exists only while its set is non-empty.
    user_index: DashMap<UserId, HashSet<ConnectionId>>,

    /// Admission counter, kept separately so the limit check is a single atomic op.
    admitted: AtomicUsize,
    max_connections: usize,

    /// Presence edges of one user are numbered while that user's index entry
    /// is locked, so the numbers follow the order of the registry changes.
    presence_sequence: AtomicU64,

    /// Registration holds the read side for its whole insert; `close` takes
    /// the write side, so nothing lands in the registry after it is closed.
    closed: RwLock<bool>,
}

impl ConnectionRegistry {
    pub fn new(max_connections: usize) -> Self {
        Self {
            connections: DashMap::new(),
            user_index: DashMap::new(),
            admitted: AtomicUsize::new(0),
            max_connections,
            presence_sequence: AtomicU64::new(0),
            closed: RwLock::new(false),
        }
    }

    fn next_presence_sequence(&self) -> u64 {
        self.presence_sequence.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Register a new connection. Returns the presence sequence of the
    /// user's online edge when this is the user's first live connection.
    pub fn register(&self, connection: Connection) -> Result<Option<u64>, Error> {
        let closed = self.closed.read().unwrap_or_else(PoisonError::into_inner);
        if *closed {
            return Err(registry_closed());
        }

        let admitted = self.admitted.fetch_add(1, Ordering::AcqRel);
        if admitted >= self.max_connections {
            self.admitted.fetch_sub(1, Ordering::AcqRel);
            warn!(
                "Rejecting connection for user {}: limit of {} reached",
                connection.user_id, self.max_connections
            );
            return Err(capacity_exceeded(self.max_connections));
        }

        let connection_id = connection.id.clone();
        let user_id = connection.user_id.clone();

        // Insert into primary storage
        self.connections.insert(connection_id.clone(), connection);

        // Update secondary index. An entry only exists while its set is
        // non-empty, so an empty set here was just created.
        let online_sequence = {
            let mut ids = self.user_index.entry(user_id).or_default();
            let first = ids.is_empty();
            ids.insert(connection_id);
            first.then(|| self.next_presence_sequence())
        };

        Ok(online_sequence)
    }

    /// Unregister a connection. Unknown ids are a no-op returning `None`.
    pub fn unregister(&self, connection_id: &ConnectionId) -> Option<Removal> {
        let (_, connection) = self.connections.remove(connection_id)?;
        self.admitted.fetch_sub(1, Ordering::AcqRel);

        // Removing the id, the emptiness check and dropping the user key
        // happen under one shard lock, so a concurrent register for the same
        // user either sees the old set or creates a fresh one.
        let mut offline_sequence = None;
        self.user_index
            .remove_if_mut(&connection.user_id, |_, ids| {
                ids.remove(connection_id);
                if ids.is_empty() {
                    offline_sequence = Some(self.next_presence_sequence());
                    true
                } else {
                    false
                }
            });

        Some(Removal {
            connection,
            offline_sequence,
        })
    }

    pub fn get(&self, connection_id: &ConnectionId) -> Option<Connection> {
        self.connections
            .get(connection_id)
            .map(|entry| entry.value().clone())
    }

    pub fn list_by_user(&self, user_id: &str) -> Vec<Connection> {
        let ids: Vec<ConnectionId> = match self.user_index.get(user_id) {
            Some(ids) => ids.iter().cloned().collect(),
            None => return Vec::new(),
        };

        ids.iter().filter_map(|id| self.get(id)).collect()
    }

    pub fn list_all(&self) -> Vec<Connection> {
        self.connections
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.connections.len()
    }

    pub fn user_ids(&self) -> Vec<UserId> {
        self.user_index
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Refresh the heartbeat clocks of a registered connection.
    pub fn touch(&self, connection_id: &ConnectionId) -> bool {
        match self.connections.get_mut(connection_id) {
            Some(mut connection) => {
                connection.last_heartbeat = Utc::now();
                connection.last_seen = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Refuse all further registrations.
    /// Waits for in-flight registrations to finish.
    pub fn close(&self) {
        *self.closed.write().unwrap_or_else(PoisonError::into_inner) = true;
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.read().unwrap_or_else(PoisonError::into_inner)
    }
}
