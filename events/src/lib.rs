//! Event system infrastructure for the realtime hub.
//!
//! This crate provides the event model shared by business producers and the
//! delivery layer, plus the publisher that keeps the two loosely coupled.
//!
//! # Architecture
//!
//! - **Event / EventKind**: the immutable value that travels over a client
//!   connection, with its closed set of types
//! - **DomainEvent**: enum of business-level happenings (notification writes,
//!   workflow transitions, operator notices)
//! - **EventHandler**: trait for implementing event handlers
//! - **EventPublisher**: publishes domain events to registered handlers
//!
//! This crate has no dependencies on other internal crates, avoiding circular
//! dependencies. Business entities are carried as serialized JSON values.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

mod event;

pub use event::{Event, EventKind, UnknownEventKind, UserId, UserStatus};

/// Domain events emitted by business producers once their own work has
/// committed. The producer decides who should hear about it; delivery is
/// best-effort and users without a live connection simply miss it.
#[derive(Debug, Clone)]
pub enum DomainEvent {
    /// A notification row was written for one or more users.
    NotificationCreated {
        notification: Value,
        notify_user_ids: Vec<UserId>,
    },
    /// An existing notification changed (typically marked read).
    NotificationUpdated {
        notification: Value,
        notify_user_ids: Vec<UserId>,
    },
    /// A notification was removed; only the id survives.
    NotificationDeleted {
        notification_id: String,
        notify_user_ids: Vec<UserId>,
    },
    WorkflowStarted {
        workflow_id: String,
        workflow: Value,
        notify_user_ids: Vec<UserId>,
    },
    WorkflowStepCompleted {
        workflow_id: String,
        step: Value,
        notify_user_ids: Vec<UserId>,
    },
    WorkflowCompleted {
        workflow_id: String,
        workflow: Value,
        notify_user_ids: Vec<UserId>,
    },
    WorkflowFailed {
        workflow_id: String,
        error: String,
        notify_user_ids: Vec<UserId>,
    },
    /// Operator notices go to every connected user.
    SystemNotice { kind: EventKind, payload: Value },
}

/// Trait for handling domain events.
/// Implementations can perform side effects like pushing to live connections,
/// updating caches, logging, etc.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &DomainEvent);
}

/// Publishes domain events to registered handlers.
/// Handlers are called sequentially in registration order.
#[derive(Clone)]
pub struct EventPublisher {
    handlers: Arc<Vec<Arc<dyn EventHandler>>>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Vec::new()),
        }
    }

    /// Register a new event handler.
    /// Note: This creates a new publisher instance with the additional handler.
    /// Store the returned publisher in your application state.
    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        let mut handlers = (*self.handlers).clone();
        handlers.push(handler);
        self.handlers = Arc::new(handlers);
        self
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Publish an event to all registered handlers, one after another.
    pub async fn publish(&self, event: DomainEvent) {
        for handler in self.handlers.iter() {
            handler.handle(&event).await;
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}
