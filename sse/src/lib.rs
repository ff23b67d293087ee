//! Server-Sent Events (SSE) infrastructure for real-time delivery.
//!
//! This crate keeps the long-lived client connections of the hub open,
//! multiplexes independently produced events onto each of them, reclaims
//! dead ones and fans messages out to one user, many users or everyone.
//!
//! # Architecture
//!
//! - **Dual-index registry**: O(1) lookups for both connection management and
//!   user-scoped routing via separate DashMap indices. It is the only shared
//!   mutable state.
//! - **One worker per connection**: each connection has its own bounded
//!   queue and a worker that merges queued events, heartbeats and
//!   cancellation into a single ordered output. A slow reader stalls only
//!   itself; when its queue is full the newest event is dropped.
//! - **Liveness sweep**: a background task evicts connections whose heartbeat
//!   has not been delivered for longer than the stale threshold.
//! - **One disconnect routine**: client close, worker exit, eviction and
//!   shutdown all go through the same idempotent teardown, which also emits
//!   the `user_status_changed` presence edges.
//! - **Ephemeral messages**: nothing is persisted or replayed; a user who is
//!   offline misses the event.
//!
//! # Message Flow
//!
//! 1. The transport authenticates the caller and calls
//!    `Manager::create_connection`, getting back an `EventStream`
//! 2. The stream yields `connection_established` first, then heartbeats and
//!    routed events
//! 3. Producers publish `events::DomainEvent`s; `SseDomainEventHandler`
//!    turns them into events and routes them through the `Manager`
//! 4. When the client goes away the transport drops the stream, which runs
//!    the disconnect routine
//!
//! # Example: Sending an event
//!
//! ```rust,ignore
//! use events::{Event, EventKind};
//! use sse::message::{Message as SseMessage, MessageScope};
//!
//! app_state.sse_manager.send_message(SseMessage {
//!     event: Event::new(EventKind::NotificationCreated, notification_json),
//!     scope: MessageScope::User { user_id: recipient_id },
//! });
//! ```
//!
//! # Modules
//!
//! - `connection`: connection record, ConnectionId and the registry
//! - `channel`: per-connection worker and the EventStream handed to transports
//! - `router`: send-to-connection/user/users and broadcast
//! - `monitor`: the liveness sweep
//! - `lifecycle`: the shared disconnect routine and presence signal
//! - `manager`: startup, shutdown, routing and introspection entry point
//! - `message`: scoped message definitions
//! - `wire`: text form of an event and its decoder

pub mod channel;
pub mod connection;
pub mod domain_event_handler;
pub mod error;
mod lifecycle;
pub mod manager;
pub mod message;
pub mod monitor;
pub mod router;
pub mod settings;
pub mod wire;

pub use channel::EventStream;
pub use connection::{ConnectionDescriptor, ConnectionId, ConnectionMetadata, UserId};
pub use domain_event_handler::SseDomainEventHandler;
pub use lifecycle::DisconnectReason;
pub use manager::Manager;
pub use settings::Settings;
