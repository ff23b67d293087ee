//! Per-connection delivery path.
//!
//! Every connection gets its own worker task that merges three sources into
//! one ordered output: the router's bounded inbound queue, a heartbeat ticker
//! and the connection's cancellation token. The transport drains the output
//! through an [`EventStream`]; nothing here is shared between connections, so
//! a slow reader only ever stalls its own worker.

use crate::connection::{ConnectionId, UserId};
use crate::lifecycle::{DisconnectReason, Lifecycle};
use events::Event;
use futures::Stream;
use log::*;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Output side of a connection, consumed by exactly one transport handler.
///
/// The stream ends (`recv` yields `None`) once the connection is torn down.
/// Dropping it counts as the client going away and runs the disconnect
/// routine for the connection.
pub struct EventStream {
    connection_id: ConnectionId,
    user_id: UserId,
    receiver: mpsc::Receiver<Event>,
    lifecycle: Arc<Lifecycle>,
}

impl EventStream {
    pub fn connection_id(&self) -> &ConnectionId {
        &self.connection_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Next event for this connection, or `None` once the channel completed.
    pub async fn recv(&mut self) -> Option<Event> {
        self.receiver.recv().await
    }
}

impl Stream for EventStream {
    type Item = Event;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Event>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.lifecycle
            .disconnect(&self.connection_id, DisconnectReason::ClientClosed);
    }
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("connection_id", &self.connection_id)
            .field("user_id", &self.user_id)
            .finish()
    }
}

const OUTPUT_SLOTS: usize = 1;

pub(crate) struct ChannelWorker {
    connection_id: ConnectionId,
    inbound: mpsc::Receiver<Event>,
    output: mpsc::Sender<Event>,
    cancel: CancellationToken,
    heartbeat_interval: Duration,
    lifecycle: Arc<Lifecycle>,
}

/// Both halves of a freshly opened channel. The worker is not running yet so
/// the caller can register the connection first and spawn only on success.
pub(crate) struct OpenedChannel {
    pub(crate) inbound: mpsc::Sender<Event>,
    pub(crate) stream: EventStream,
    pub(crate) worker: ChannelWorker,
}

pub(crate) fn open(
    connection_id: &ConnectionId,
    user_id: &str,
    capacity: usize,
    heartbeat_interval: Duration,
    cancel: CancellationToken,
    lifecycle: Arc<Lifecycle>,
) -> OpenedChannel {
    let (inbound_tx, inbound_rx) = mpsc::channel(capacity);
    // One slot: the worker can only hand over the next event once the reader
    // took the previous one. Buffering happens in the inbound queue, and a
    // heartbeat counts as delivered only when the reader is keeping up.
    let (output_tx, output_rx) = mpsc::channel(OUTPUT_SLOTS);

    // The output is empty, so the handshake always lands first.
    if let Err(e) = output_tx.try_send(Event::connection_established(
        connection_id.as_str(),
        user_id,
    )) {
        warn!("Failed to queue connection_established for {connection_id}: {e}");
    }

    OpenedChannel {
        inbound: inbound_tx,
        stream: EventStream {
            connection_id: connection_id.clone(),
            user_id: user_id.to_string(),
            receiver: output_rx,
            lifecycle: lifecycle.clone(),
        },
        worker: ChannelWorker {
            connection_id: connection_id.clone(),
            inbound: inbound_rx,
            output: output_tx,
            cancel,
            heartbeat_interval,
            lifecycle,
        },
    }
}

impl ChannelWorker {
    pub(crate) fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        let period = self.heartbeat_interval;
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let reason = loop {
            let (event, is_heartbeat) = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break DisconnectReason::ChannelClosed,
                message = self.inbound.recv() => match message {
                    Some(event) => (event, false),
                    None => break DisconnectReason::ChannelClosed,
                },
                _ = ticker.tick() => (Event::heartbeat(self.connection_id.as_str()), true),
            };

            // Waiting on a full output only blocks this connection. Keep
            // watching the token so teardown never waits on the reader.
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break DisconnectReason::ChannelClosed,
                sent = self.output.send(event) => {
                    if sent.is_err() {
                        break DisconnectReason::ClientClosed;
                    }
                }
            }

            if is_heartbeat {
                trace!("Heartbeat delivered on connection {}", self.connection_id);
                self.lifecycle.registry().touch(&self.connection_id);
            }
        };

        self.lifecycle.disconnect(&self.connection_id, reason);
        debug!(
            "Channel worker for connection {} stopped ({})",
            self.connection_id, reason
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{Connection, ConnectionMetadata, ConnectionRegistry};
    use events::EventKind;
    use futures::StreamExt;
    use serde_json::json;

    struct Harness {
        lifecycle: Arc<Lifecycle>,
        inbound: mpsc::Sender<Event>,
        stream: EventStream,
        cancel: CancellationToken,
        worker: JoinHandle<()>,
    }

    fn harness(capacity: usize, heartbeat: Duration) -> Harness {
        let lifecycle = Arc::new(Lifecycle::new(Arc::new(ConnectionRegistry::new(10))));
        let connection_id = ConnectionId::new();
        let cancel = CancellationToken::new();
        let opened = open(
            &connection_id,
            "u1",
            capacity,
            heartbeat,
            cancel.clone(),
            lifecycle.clone(),
        );
        lifecycle
            .registry()
            .register(Connection::new(
                connection_id,
                "u1".to_string(),
                ConnectionMetadata::default(),
                opened.inbound.clone(),
                cancel.clone(),
            ))
            .unwrap();

        Harness {
            lifecycle,
            inbound: opened.inbound,
            stream: opened.stream,
            cancel,
            worker: opened.worker.spawn(),
        }
    }

    #[tokio::test]
    async fn first_event_is_connection_established() {
        let mut h = harness(8, Duration::from_secs(30));

        let first = h.stream.recv().await.unwrap();
        assert_eq!(first.kind, EventKind::ConnectionEstablished);
        assert_eq!(first.payload["user_id"], "u1");
        assert_eq!(
            first.payload["connection_id"],
            h.stream.connection_id().as_str()
        );
    }

    #[tokio::test]
    async fn inbound_events_keep_their_order() {
        let mut h = harness(8, Duration::from_secs(30));
        for n in 0..5 {
            h.inbound
                .send(Event::new(EventKind::NotificationCreated, json!({ "n": n })))
                .await
                .unwrap();
        }

        h.stream.recv().await.unwrap();
        for n in 0..5 {
            let event = h.stream.recv().await.unwrap();
            assert_eq!(event.payload["n"], n);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_is_emitted_every_period_and_touches_the_connection() {
        let mut h = harness(8, Duration::from_secs(30));
        let id = h.stream.connection_id().clone();
        let before = h.lifecycle.registry().get(&id).unwrap().last_seen;

        h.stream.recv().await.unwrap();
        let beat = h.stream.recv().await.unwrap();
        assert_eq!(beat.kind, EventKind::Heartbeat);
        assert_eq!(beat.payload["connection_id"], id.as_str());

        // Let the worker finish its post-send bookkeeping.
        tokio::task::yield_now().await;
        let after = h.lifecycle.registry().get(&id).unwrap().last_seen;
        assert!(after - before >= Duration::from_secs(30));

        let second = h.stream.recv().await.unwrap();
        assert_eq!(second.kind, EventKind::Heartbeat);
    }

    #[tokio::test]
    async fn cancellation_completes_the_stream_and_unregisters() {
        let mut h = harness(8, Duration::from_secs(30));
        let id = h.stream.connection_id().clone();

        h.cancel.cancel();
        (&mut h.worker).await.unwrap();

        let remaining: Vec<Event> = (&mut h.stream).collect().await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].kind, EventKind::ConnectionEstablished);
        assert!(h.lifecycle.registry().get(&id).is_none());
    }

    #[tokio::test]
    async fn dropping_the_stream_disconnects_the_connection() {
        let h = harness(8, Duration::from_secs(30));
        let id = h.stream.connection_id().clone();
        let lifecycle = h.lifecycle.clone();

        drop(h.stream);

        assert!(lifecycle.registry().get(&id).is_none());
        assert!(h.cancel.is_cancelled());
        h.worker.await.unwrap();
    }

    #[tokio::test]
    async fn blocked_reader_does_not_stall_teardown() {
        // The unread handshake fills the output, the next send blocks.
        let h = harness(8, Duration::from_secs(30));
        h.inbound
            .send(Event::new(EventKind::SystemUpdate, json!({})))
            .await
            .unwrap();
        tokio::task::yield_now().await;

        h.cancel.cancel();
        h.worker.await.unwrap();
        drop(h.stream);
    }

    #[tokio::test(start_paused = true)]
    async fn unread_stream_stops_refreshing_the_heartbeat() {
        let h = harness(64, Duration::from_secs(30));
        let id = h.stream.connection_id().clone();
        let registered = h.lifecycle.registry().get(&id).unwrap().last_seen;

        // Nobody reads the handshake, so no heartbeat can be handed over.
        time::sleep(Duration::from_secs(95)).await;
        let connection = h.lifecycle.registry().get(&id).unwrap();
        assert_eq!(connection.last_seen, registered);
        assert!(connection.silent_for(Instant::now()) > Duration::from_secs(90));
    }
}
