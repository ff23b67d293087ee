use crate::controller::ApiResponse;
use crate::error::Error;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use events::{DomainEvent, EventKind};
use log::*;
use serde::Deserialize;
use serde_json::{json, Value};
use service::AppState;

#[derive(Debug, Deserialize)]
pub(crate) struct AnnouncementParams {
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

/// POST /announcements
///
/// Broadcast an operator notice to every open connection. Only the
/// `system_*` kinds are accepted.
pub async fn create(
    State(app_state): State<AppState>,
    Json(params): Json<AnnouncementParams>,
) -> Result<impl IntoResponse, Error> {
    let kind = params
        .kind
        .parse::<EventKind>()
        .map_err(|e| Error::Unprocessable(e.to_string()))?;

    if !kind.is_system() {
        return Err(Error::Unprocessable(format!(
            "{kind} cannot be announced, expected one of system_announcement, system_maintenance, system_update"
        )));
    }

    let connection_count = app_state.sse_manager.connection_count();
    info!("Announcing {kind} to {connection_count} connection(s)");

    app_state
        .event_publisher
        .publish(DomainEvent::SystemNotice {
            kind,
            payload: params.payload,
        })
        .await;

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::new(
            StatusCode::ACCEPTED.into(),
            json!({ "kind": kind, "connection_count": connection_count }),
        )),
    ))
}
