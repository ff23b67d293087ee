use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// User ids arrive already validated from the authentication layer and are
/// treated as opaque strings from here on.
pub type UserId = String;

/// Closed set of event types that can travel over a client connection.
///
/// The snake_case name is what goes into the `event:` line of the wire form
/// and what frontends switch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ConnectionEstablished,
    Heartbeat,
    NotificationCreated,
    NotificationUpdated,
    NotificationDeleted,
    UserStatusChanged,
    WorkflowStarted,
    WorkflowCompleted,
    WorkflowFailed,
    WorkflowStepCompleted,
    SystemAnnouncement,
    SystemMaintenance,
    SystemUpdate,
}

impl EventKind {
    pub const ALL: [EventKind; 13] = [
        EventKind::ConnectionEstablished,
        EventKind::Heartbeat,
        EventKind::NotificationCreated,
        EventKind::NotificationUpdated,
        EventKind::NotificationDeleted,
        EventKind::UserStatusChanged,
        EventKind::WorkflowStarted,
        EventKind::WorkflowCompleted,
        EventKind::WorkflowFailed,
        EventKind::WorkflowStepCompleted,
        EventKind::SystemAnnouncement,
        EventKind::SystemMaintenance,
        EventKind::SystemUpdate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ConnectionEstablished => "connection_established",
            EventKind::Heartbeat => "heartbeat",
            EventKind::NotificationCreated => "notification_created",
            EventKind::NotificationUpdated => "notification_updated",
            EventKind::NotificationDeleted => "notification_deleted",
            EventKind::UserStatusChanged => "user_status_changed",
            EventKind::WorkflowStarted => "workflow_started",
            EventKind::WorkflowCompleted => "workflow_completed",
            EventKind::WorkflowFailed => "workflow_failed",
            EventKind::WorkflowStepCompleted => "workflow_step_completed",
            EventKind::SystemAnnouncement => "system_announcement",
            EventKind::SystemMaintenance => "system_maintenance",
            EventKind::SystemUpdate => "system_update",
        }
    }

    /// System-wide kinds are the only ones that may be broadcast by an operator.
    pub fn is_system(&self) -> bool {
        matches!(
            self,
            EventKind::SystemAnnouncement | EventKind::SystemMaintenance | EventKind::SystemUpdate
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct UnknownEventKind(pub String);

impl fmt::Display for UnknownEventKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "unknown event kind: {}", self.0)
    }
}

impl std::error::Error for UnknownEventKind {}

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .iter()
            .find(|kind| kind.as_str() == value)
            .copied()
            .ok_or_else(|| UnknownEventKind(value.to_string()))
    }
}

/// Presence edge carried by `user_status_changed` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Online,
    Offline,
}

/// An immutable event value. Fan-out never mutates an event in place, it
/// stamps copies (see [`Event::stamped_for`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub kind: EventKind,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
}

impl Event {
    pub fn new(kind: EventKind, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            payload,
            timestamp: Utc::now(),
            user_id: None,
        }
    }

    /// Builder-style target user.
    pub fn for_user(mut self, user_id: impl Into<UserId>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Returns a copy of this event addressed to `user_id`, keeping id, kind,
    /// payload and timestamp intact.
    pub fn stamped_for(&self, user_id: &str) -> Self {
        Self {
            user_id: Some(user_id.to_string()),
            ..self.clone()
        }
    }

    /// First event on every new connection.
    pub fn connection_established(connection_id: &str, user_id: &str) -> Self {
        Event::new(
            EventKind::ConnectionEstablished,
            json!({
                "connection_id": connection_id,
                "user_id": user_id,
            }),
        )
        .for_user(user_id)
    }

    pub fn heartbeat(connection_id: &str) -> Self {
        Event::new(
            EventKind::Heartbeat,
            json!({ "connection_id": connection_id }),
        )
    }

    /// Presence edge. `sequence` grows with every edge the hub emits, so a
    /// listener can ignore an edge older than the last one it applied for
    /// the same user.
    pub fn user_status_changed(user_id: &str, status: UserStatus, sequence: u64) -> Self {
        Event::new(
            EventKind::UserStatusChanged,
            json!({
                "user_id": user_id,
                "status": status,
                "sequence": sequence,
            }),
        )
        .for_user(user_id)
    }
}
