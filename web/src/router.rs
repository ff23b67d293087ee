use crate::{
    controller::{announcement_controller, health_check_controller, status_controller},
    sse, AppState,
};
use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use log::*;
use service::config::Config;
use tower_http::cors::CorsLayer;

pub fn define_routes(app_state: AppState) -> Router {
    let cors = cors_layer(&app_state.config);

    Router::new()
        .merge(health_routes())
        .merge(sse_routes(app_state.clone()))
        .merge(status_routes(app_state.clone()))
        .merge(announcement_routes(app_state))
        .layer(cors)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid CORS origin {origin:?}: {e}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static("x-user-id"),
            HeaderName::from_static("last-event-id"),
        ])
        .allow_credentials(true)
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

fn sse_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/events", get(sse::handler::sse_handler))
        .with_state(app_state)
}

fn status_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/status/connections", get(status_controller::index))
        .route("/status/connections/:user_id", get(status_controller::read))
        .with_state(app_state)
}

fn announcement_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/announcements", post(announcement_controller::create))
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body, BodyDataStream};
    use axum::http::{Request, StatusCode};
    use events::EventKind;
    use futures::StreamExt;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app_with(flags: &[&str]) -> (Router, Arc<::sse::Manager>) {
        let mut args = vec!["realtime_hub"];
        args.extend_from_slice(flags);
        let config = Config::from_args(args);
        let manager = service::init_sse_manager(&config).unwrap();
        let app_state = AppState::with_sse_handler(config, &manager);
        (define_routes(app_state), manager)
    }

    fn events_request(user_id: &str) -> Request<Body> {
        Request::builder()
            .uri("/events")
            .header("x-user-id", user_id)
            .header(header::USER_AGENT, "router-tests")
            .header("last-event-id", "evt-41")
            .body(Body::empty())
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn next_event(body: &mut BodyDataStream) -> ::sse::wire::WireEvent {
        let chunk = body.next().await.unwrap().unwrap();
        ::sse::wire::decode(std::str::from_utf8(&chunk).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn health_check_responds_healthy() {
        let (app, _manager) = app_with(&[]);
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"healthy");
    }

    #[tokio::test]
    async fn events_without_identity_is_unauthorized() {
        let (app, manager) = app_with(&[]);
        let response = app
            .oneshot(Request::builder().uri("/events").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(manager.connection_count(), 0);
    }

    #[tokio::test]
    async fn events_stream_starts_with_connection_established() {
        let (app, manager) = app_with(&[]);
        let response = app.clone().oneshot(events_request("u1")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );

        let mut body = response.into_body().into_data_stream();
        let first = next_event(&mut body).await;
        assert_eq!(first.kind, EventKind::ConnectionEstablished);
        assert_eq!(first.payload["user_id"], "u1");

        let connection_id = first.payload["connection_id"].as_str().unwrap().to_string();
        let descriptors = manager.connections_for_user("u1");
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].id.as_str(), connection_id);

        // Client goes away
        drop(body);
        assert_eq!(manager.connection_count(), 0);
    }

    #[tokio::test]
    async fn status_endpoints_report_open_connections() {
        let (app, _manager) = app_with(&[]);
        let a = app.clone().oneshot(events_request("alice")).await.unwrap();
        let b1 = app.clone().oneshot(events_request("bob")).await.unwrap();
        let b2 = app.clone().oneshot(events_request("bob")).await.unwrap();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/status/connections")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({
                "status_code": 200,
                "data": {"connection_count": 3, "user_ids": ["alice", "bob"]}
            })
        );

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/status/connections/bob")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
        assert!(body["data"][0]["connected_at"].is_string());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/status/connections/nobody")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(json_body(response).await["data"], json!([]));

        drop((a, b1, b2));
    }

    #[tokio::test]
    async fn announcement_reaches_open_streams() {
        let (app, _manager) = app_with(&[]);
        let response = app.clone().oneshot(events_request("u1")).await.unwrap();
        let mut body = response.into_body().into_data_stream();
        next_event(&mut body).await;

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/announcements")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        json!({
                            "kind": "system_maintenance",
                            "payload": {"starts_at": "2026-10-19T02:00:00Z"}
                        })
                        .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(json_body(response).await["data"]["connection_count"], 1);

        let notice = next_event(&mut body).await;
        assert_eq!(notice.kind, EventKind::SystemMaintenance);
        assert_eq!(notice.payload["starts_at"], "2026-10-19T02:00:00Z");
    }

    #[tokio::test]
    async fn announcement_rejects_non_system_and_unknown_kinds() {
        let (app, _manager) = app_with(&[]);

        for kind in ["notification_created", "not_a_kind"] {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .method(Method::POST)
                        .uri("/announcements")
                        .header(header::CONTENT_TYPE, "application/json")
                        .body(Body::from(json!({"kind": kind}).to_string()))
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY, "{kind}");
        }
    }

    #[tokio::test]
    async fn full_hub_refuses_new_streams() {
        let (app, manager) = app_with(&["--sse-max-connections", "1"]);
        let first = app.clone().oneshot(events_request("u1")).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app.oneshot(events_request("u2")).await.unwrap();
        assert_eq!(second.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(manager.connection_count(), 1);
    }

    #[tokio::test]
    async fn shutdown_ends_open_streams_and_refuses_new_ones() {
        let (app, manager) = app_with(&[]);
        let response = app.clone().oneshot(events_request("u1")).await.unwrap();
        let mut body = response.into_body().into_data_stream();
        next_event(&mut body).await;

        manager.shutdown().await;
        assert!(body.next().await.is_none());

        let response = app.oneshot(events_request("u1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    fn health_request_from(origin: &str) -> Request<Body> {
        Request::builder()
            .uri("/health")
            .header(header::ORIGIN, origin)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn invalid_origins_are_skipped() {
        let (app, _manager) = app_with(&["--allowed-origins", "https://ok.example,bad\norigin"]);

        let allowed = app
            .clone()
            .oneshot(health_request_from("https://ok.example"))
            .await
            .unwrap();
        assert_eq!(allowed.status(), StatusCode::OK);
        assert_eq!(
            allowed.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://ok.example"
        );
        assert_eq!(
            allowed.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS],
            "true"
        );

        let foreign = app
            .oneshot(health_request_from("https://evil.example"))
            .await
            .unwrap();
        assert_eq!(foreign.status(), StatusCode::OK);
        assert!(foreign
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }
}
