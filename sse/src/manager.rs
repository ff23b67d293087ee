use crate::channel::{self, EventStream};
use crate::connection::{
    Connection, ConnectionDescriptor, ConnectionId, ConnectionMetadata, ConnectionRegistry, UserId,
};
use crate::error::Error;
use crate::lifecycle::{DisconnectReason, Lifecycle};
use crate::message::{Message as SseMessage, MessageScope};
use crate::monitor::{LivenessMonitor, MonitorHandle};
use crate::router::Router;
use crate::settings::Settings;
use events::{Event, UserStatus};
use log::*;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;

/// Entry point of the delivery hub: owns the registry, routes messages and
/// drives the connection lifecycle from startup to shutdown.
///
/// Built once at startup and shared behind an `Arc`; there is no global
/// instance.
pub struct Manager {
    settings: Settings,
    lifecycle: Arc<Lifecycle>,
    router: Router,
    monitor: Mutex<Option<MonitorHandle>>,
}

impl Manager {
    pub fn new(settings: Settings) -> Result<Self, Error> {
        settings.validate()?;
        Ok(Self::from_valid(settings))
    }

    fn from_valid(settings: Settings) -> Self {
        let registry = Arc::new(ConnectionRegistry::new(settings.max_connections));
        Self {
            lifecycle: Arc::new(Lifecycle::new(registry.clone())),
            router: Router::new(registry),
            monitor: Mutex::new(None),
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Spawn the liveness monitor. Calling it again while a monitor runs, or
    /// after shutdown, does nothing. Must be called from within a Tokio runtime.
    pub fn start(&self) {
        if self.lifecycle.registry().is_closed() {
            warn!("Ignoring start request for an SSE manager that has been shut down");
            return;
        }

        let mut monitor = self.monitor.lock().unwrap_or_else(PoisonError::into_inner);
        if monitor.is_some() {
            return;
        }

        *monitor = Some(
            LivenessMonitor::new(
                self.lifecycle.clone(),
                self.settings.sweep_interval,
                self.settings.stale_threshold,
            )
            .spawn(),
        );
        info!("SSE manager started");
    }

    /// Stop the liveness monitor, refuse new connections and tear down every
    /// live one. Only completes the channels; it never waits for transports
    /// to finish writing.
    pub async fn shutdown(&self) {
        info!("Shutting down SSE manager");

        let monitor = self
            .monitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(monitor) = monitor {
            monitor.stop().await;
        }

        let registry = self.lifecycle.registry();
        registry.close();

        let drained = registry
            .list_all()
            .iter()
            .filter(|connection| {
                self.lifecycle
                    .disconnect(&connection.id, DisconnectReason::Shutdown)
            })
            .count();

        // Workers that were between registration and their first poll.
        self.lifecycle.shutdown_token().cancel();

        info!("SSE manager shut down, closed {drained} connection(s)");
    }

    pub fn is_shut_down(&self) -> bool {
        self.lifecycle.registry().is_closed()
    }

    /// Open a new connection for an already authenticated user. The returned
    /// stream starts with a `connection_established` event. Must be called
    /// from within a Tokio runtime.
    pub fn create_connection(
        &self,
        user_id: UserId,
        metadata: ConnectionMetadata,
    ) -> Result<EventStream, Error> {
        let connection_id = ConnectionId::new();
        let cancel = self.lifecycle.shutdown_token().child_token();

        let opened = channel::open(
            &connection_id,
            &user_id,
            self.settings.channel_capacity,
            self.settings.heartbeat_interval,
            cancel.clone(),
            self.lifecycle.clone(),
        );

        let online_sequence = self.lifecycle.registry().register(Connection::new(
            connection_id.clone(),
            user_id.clone(),
            metadata,
            opened.inbound,
            cancel,
        ))?;

        opened.worker.spawn();

        info!("Registered SSE connection {connection_id} for user {user_id}");
        if let Some(sequence) = online_sequence {
            self.lifecycle
                .publish_status(&user_id, UserStatus::Online, sequence);
        }

        Ok(opened.stream)
    }

    /// Disconnect routine for callers outside the hub (e.g. a transport that
    /// noticed the client went away). Returns `false` if it was already gone.
    pub fn disconnect(&self, connection_id: &ConnectionId) -> bool {
        self.lifecycle
            .disconnect(connection_id, DisconnectReason::ClientClosed)
    }

    pub fn send_to_connection(&self, connection_id: &ConnectionId, event: Event) -> bool {
        self.router.send_to_connection(connection_id, event)
    }

    pub fn send_to_user(&self, user_id: &str, event: Event) -> usize {
        self.router.send_to_user(user_id, event)
    }

    pub fn send_to_users(&self, user_ids: &[UserId], event: Event) -> usize {
        self.router.send_to_users(user_ids, event)
    }

    pub fn broadcast(&self, event: Event) -> usize {
        self.router.broadcast(event)
    }

    /// Send a message based on its scope
    pub fn send_message(&self, message: SseMessage) -> usize {
        match message.scope {
            MessageScope::Connection { connection_id } => {
                usize::from(self.router.send_to_connection(&connection_id, message.event))
            }
            MessageScope::User { user_id } => self.router.send_to_user(&user_id, message.event),
            MessageScope::Users { user_ids } => {
                self.router.send_to_users(&user_ids, message.event)
            }
            MessageScope::Broadcast => self.router.broadcast(message.event),
        }
    }

    /// Presence edges (`user_status_changed`) for internal listeners.
    pub fn subscribe_status(&self) -> broadcast::Receiver<Event> {
        self.lifecycle.subscribe_status()
    }

    pub fn connection_count(&self) -> usize {
        self.lifecycle.registry().count()
    }

    pub fn connected_user_ids(&self) -> Vec<UserId> {
        let mut user_ids = self.lifecycle.registry().user_ids();
        user_ids.sort();
        user_ids
    }

    pub fn connections_for_user(&self, user_id: &str) -> Vec<ConnectionDescriptor> {
        let mut descriptors: Vec<ConnectionDescriptor> = self
            .lifecycle
            .registry()
            .list_by_user(user_id)
            .iter()
            .map(Connection::descriptor)
            .collect();
        descriptors.sort_by_key(|descriptor| descriptor.connected_at);
        descriptors
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::from_valid(Settings::default())
    }
}
