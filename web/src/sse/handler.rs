use crate::error::Error;
use crate::extractors::authenticated_user::AuthenticatedUser;
use async_stream::stream;
use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderMap};
use axum::response::sse::{Event, Sse};
use futures::Stream;
use log::*;
use service::AppState;
use sse::{wire, ConnectionMetadata};
use std::convert::Infallible;
use std::net::SocketAddr;

const LAST_EVENT_ID_HEADER: &str = "last-event-id";

fn header_value(headers: &HeaderMap, name: impl header::AsHeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// SSE handler that establishes a long-lived connection for real-time updates.
///
/// A user may hold any number of these at once (one per tab or device).
/// The stream ends when the hub disconnects the connection; when the client
/// goes away first, axum drops the stream and that drop disconnects it.
pub(crate) async fn sse_handler(
    AuthenticatedUser(user_id): AuthenticatedUser,
    State(app_state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, Error> {
    let metadata = ConnectionMetadata {
        user_agent: header_value(&headers, header::USER_AGENT),
        remote_addr: connect_info.map(|ConnectInfo(addr)| addr.to_string()),
        last_event_id: header_value(&headers, LAST_EVENT_ID_HEADER),
    };
    debug!("Establishing SSE connection for user {user_id} ({metadata:?})");

    let mut events = app_state.sse_manager.create_connection(user_id, metadata)?;

    let stream = stream! {
        while let Some(event) = events.recv().await {
            match wire::to_axum_event(&event) {
                Ok(frame) => yield Ok(frame),
                Err(e) => warn!(
                    "Skipping {} event {} for connection {}: {e}",
                    event.kind,
                    event.id,
                    events.connection_id()
                ),
            }
        }

        debug!(
            "SSE stream ended for user {} on connection {}",
            events.user_id(),
            events.connection_id()
        );
    };

    // Heartbeat events double as keep-alive, so axum's own comment pings are
    // not enabled.
    Ok(Sse::new(stream))
}
