use crate::message::{Message as SseMessage, MessageScope};
use crate::Manager;
use async_trait::async_trait;
use events::{DomainEvent, Event, EventHandler, EventKind, UserId};
use log::*;
use serde_json::json;
use std::sync::Arc;

/// Handles domain events by converting them to connection events and routing
/// them to the affected users.
///
/// The producer decides which users should be notified and includes their ids
/// in the domain event; this handler only builds the event and routes it.
/// Operator notices are broadcast to everyone.
pub struct SseDomainEventHandler {
    sse_manager: Arc<Manager>,
}

impl SseDomainEventHandler {
    pub fn new(sse_manager: Arc<Manager>) -> Self {
        Self { sse_manager }
    }

    /// Send an event to all specified users.
    fn send_to_users(&self, event: Event, user_ids: &[UserId]) {
        let kind = event.kind;
        let delivered = self.sse_manager.send_message(SseMessage {
            event,
            scope: MessageScope::Users {
                user_ids: user_ids.to_vec(),
            },
        });

        debug!(
            "Sent {} event to {} connection(s) of {} user(s): {:?}",
            kind,
            delivered,
            user_ids.len(),
            user_ids
        );
    }

    fn broadcast(&self, event: Event) {
        let kind = event.kind;
        let delivered = self.sse_manager.send_message(SseMessage {
            event,
            scope: MessageScope::Broadcast,
        });
        debug!("Broadcast {kind} event to {delivered} connection(s)");
    }
}

#[async_trait]
impl EventHandler for SseDomainEventHandler {
    async fn handle(&self, event: &DomainEvent) {
        match event {
            DomainEvent::NotificationCreated {
                notification,
                notify_user_ids,
            } => {
                let event = Event::new(
                    EventKind::NotificationCreated,
                    json!({ "notification": notification }),
                );
                self.send_to_users(event, notify_user_ids);
            }

            DomainEvent::NotificationUpdated {
                notification,
                notify_user_ids,
            } => {
                let event = Event::new(
                    EventKind::NotificationUpdated,
                    json!({ "notification": notification }),
                );
                self.send_to_users(event, notify_user_ids);
            }

            DomainEvent::NotificationDeleted {
                notification_id,
                notify_user_ids,
            } => {
                let event = Event::new(
                    EventKind::NotificationDeleted,
                    json!({ "notification_id": notification_id }),
                );
                self.send_to_users(event, notify_user_ids);
            }

            DomainEvent::WorkflowStarted {
                workflow_id,
                workflow,
                notify_user_ids,
            } => {
                debug!("Handling WorkflowStarted event for workflow {workflow_id}");
                let event = Event::new(
                    EventKind::WorkflowStarted,
                    json!({ "workflow_id": workflow_id, "workflow": workflow }),
                );
                self.send_to_users(event, notify_user_ids);
            }

            DomainEvent::WorkflowStepCompleted {
                workflow_id,
                step,
                notify_user_ids,
            } => {
                let event = Event::new(
                    EventKind::WorkflowStepCompleted,
                    json!({ "workflow_id": workflow_id, "step": step }),
                );
                self.send_to_users(event, notify_user_ids);
            }

            DomainEvent::WorkflowCompleted {
                workflow_id,
                workflow,
                notify_user_ids,
            } => {
                debug!("Handling WorkflowCompleted event for workflow {workflow_id}");
                let event = Event::new(
                    EventKind::WorkflowCompleted,
                    json!({ "workflow_id": workflow_id, "workflow": workflow }),
                );
                self.send_to_users(event, notify_user_ids);
            }

            DomainEvent::WorkflowFailed {
                workflow_id,
                error,
                notify_user_ids,
            } => {
                debug!("Handling WorkflowFailed event for workflow {workflow_id}");
                let event = Event::new(
                    EventKind::WorkflowFailed,
                    json!({ "workflow_id": workflow_id, "error": error }),
                );
                self.send_to_users(event, notify_user_ids);
            }

            DomainEvent::SystemNotice { kind, payload } => {
                if !kind.is_system() {
                    warn!("Refusing to broadcast non-system event kind {kind}");
                    return;
                }
                self.broadcast(Event::new(*kind, payload.clone()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionMetadata;
    use crate::EventStream;

    async fn connect(manager: &Manager, user_id: &str) -> EventStream {
        let mut stream = manager
            .create_connection(user_id.to_string(), ConnectionMetadata::default())
            .unwrap();
        stream.recv().await.unwrap();
        stream
    }

    #[tokio::test]
    async fn notification_goes_only_to_listed_users() {
        let manager = Arc::new(Manager::default());
        let handler = SseDomainEventHandler::new(manager.clone());
        let mut u1 = connect(&manager, "u1").await;
        let mut u2 = connect(&manager, "u2").await;

        handler
            .handle(&DomainEvent::NotificationCreated {
                notification: json!({"id": "n-1", "title": "Role changed"}),
                notify_user_ids: vec!["u1".to_string()],
            })
            .await;
        handler
            .handle(&DomainEvent::NotificationDeleted {
                notification_id: "n-0".to_string(),
                notify_user_ids: vec!["u2".to_string()],
            })
            .await;

        let created = u1.recv().await.unwrap();
        assert_eq!(created.kind, EventKind::NotificationCreated);
        assert_eq!(created.payload["notification"]["id"], "n-1");

        let deleted = u2.recv().await.unwrap();
        assert_eq!(deleted.kind, EventKind::NotificationDeleted);
        assert_eq!(deleted.payload["notification_id"], "n-0");
    }

    #[tokio::test]
    async fn workflow_failure_carries_the_error() {
        let manager = Arc::new(Manager::default());
        let handler = SseDomainEventHandler::new(manager.clone());
        let mut owner = connect(&manager, "owner").await;

        handler
            .handle(&DomainEvent::WorkflowFailed {
                workflow_id: "wf-9".to_string(),
                error: "approval timed out".to_string(),
                notify_user_ids: vec!["owner".to_string(), "offline-user".to_string()],
            })
            .await;

        let failed = owner.recv().await.unwrap();
        assert_eq!(failed.kind, EventKind::WorkflowFailed);
        assert_eq!(failed.payload["workflow_id"], "wf-9");
        assert_eq!(failed.payload["error"], "approval timed out");
    }

    #[tokio::test]
    async fn system_notice_is_broadcast_but_other_kinds_are_refused() {
        let manager = Arc::new(Manager::default());
        let handler = SseDomainEventHandler::new(manager.clone());
        let mut a = connect(&manager, "a").await;
        let mut b = connect(&manager, "b").await;

        handler
            .handle(&DomainEvent::SystemNotice {
                kind: EventKind::Heartbeat,
                payload: json!({}),
            })
            .await;
        handler
            .handle(&DomainEvent::SystemNotice {
                kind: EventKind::SystemMaintenance,
                payload: json!({"starts_at": "2026-10-19T02:00:00Z"}),
            })
            .await;

        for (stream, user) in [(&mut a, "a"), (&mut b, "b")] {
            let notice = stream.recv().await.unwrap();
            assert_eq!(notice.kind, EventKind::SystemMaintenance);
            assert_eq!(notice.user_id.as_deref(), Some(user));
        }
    }
}
