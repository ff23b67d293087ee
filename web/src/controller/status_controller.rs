use crate::controller::ApiResponse;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use log::*;
use serde::Serialize;
use service::AppState;
use sse::{ConnectionDescriptor, UserId};

#[derive(Debug, Serialize)]
pub(crate) struct ConnectionStats {
    pub connection_count: usize,
    pub user_ids: Vec<UserId>,
}

/// GET /status/connections
///
/// Number of open connections and the distinct users holding them.
pub async fn index(State(app_state): State<AppState>) -> impl IntoResponse {
    let stats = ConnectionStats {
        connection_count: app_state.sse_manager.connection_count(),
        user_ids: app_state.sse_manager.connected_user_ids(),
    };
    debug!(
        "Connection stats: {} connection(s) across {} user(s)",
        stats.connection_count,
        stats.user_ids.len()
    );

    Json(ApiResponse::new(StatusCode::OK.into(), stats))
}

/// GET /status/connections/:user_id
///
/// Descriptors of the user's open connections, oldest first. A user with no
/// connections gets an empty list.
pub async fn read(
    State(app_state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> impl IntoResponse {
    let connections: Vec<ConnectionDescriptor> =
        app_state.sse_manager.connections_for_user(&user_id);

    Json(ApiResponse::new(StatusCode::OK.into(), connections))
}
