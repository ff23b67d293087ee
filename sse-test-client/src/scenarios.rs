use crate::api_client::ApiClient;
use crate::identity::TestUser;
use crate::output::TestResult;
use crate::sse_client::Connection;
use anyhow::Result;
use colored::*;
use serde_json::json;
use std::time::{Duration, Instant};

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Each connection's first event is its own connection_established.
pub async fn test_connection(
    user1: &TestUser,
    user2: &TestUser,
    sse1: &mut Connection,
    sse2: &mut Connection,
) -> Result<TestResult> {
    let name = "connection_established";
    println!("{} Running {}...", "→".blue(), name);
    let start = Instant::now();

    for (user, sse) in [(user1, sse1), (user2, sse2)] {
        let event = match sse.wait_for_event("connection_established", EVENT_TIMEOUT).await {
            Ok(event) => event,
            Err(e) => return Ok(TestResult::fail(name, start.elapsed(), format!("{}: {e}", user.label))),
        };

        if event.data["user_id"] != json!(user.user_id) {
            return Ok(TestResult::fail(
                name,
                start.elapsed(),
                format!(
                    "{} got user_id {} in connection_established",
                    user.label, event.data["user_id"]
                ),
            ));
        }
        if event.id.is_none() {
            return Ok(TestResult::fail(
                name,
                start.elapsed(),
                format!("{} got connection_established without an event id", user.label),
            ));
        }
        if event.data["connection_id"].as_str().is_none() {
            return Ok(TestResult::fail(
                name,
                start.elapsed(),
                format!("{} got no connection_id", user.label),
            ));
        }
    }

    Ok(TestResult::pass(name, start.elapsed()))
}

/// The status endpoints list both test users while their streams are open.
pub async fn test_status(
    user1: &TestUser,
    user2: &TestUser,
    api_client: &ApiClient,
) -> Result<TestResult> {
    let name = "connection_status";
    println!("{} Running {}...", "→".blue(), name);
    let start = Instant::now();

    let stats = api_client.connection_stats().await?;
    for user in [user1, user2] {
        if !stats.user_ids.contains(&user.user_id) {
            return Ok(TestResult::fail(
                name,
                start.elapsed(),
                format!("{} missing from connected users {:?}", user.label, stats.user_ids),
            ));
        }

        let connections = api_client.connections_for_user(&user.user_id).await?;
        if connections.is_empty() {
            return Ok(TestResult::fail(
                name,
                start.elapsed(),
                format!("No connection descriptors for {}", user.label),
            ));
        }
    }

    if stats.connection_count < 2 {
        return Ok(TestResult::fail(
            name,
            start.elapsed(),
            format!("Expected at least 2 connections, server reports {}", stats.connection_count),
        ));
    }

    Ok(TestResult::pass(name, start.elapsed()))
}

/// An announcement is delivered to every open connection.
pub async fn test_announcement(
    api_client: &ApiClient,
    sse1: &mut Connection,
    sse2: &mut Connection,
) -> Result<TestResult> {
    let name = "system_announcement_broadcast";
    println!("{} Running {}...", "→".blue(), name);
    let start = Instant::now();

    let marker = uuid::Uuid::new_v4().to_string();
    api_client
        .announce(
            "system_announcement",
            json!({ "message": "sse-test-client check", "marker": marker }),
        )
        .await?;

    for sse in [sse1, sse2] {
        match sse.wait_for_event("system_announcement", EVENT_TIMEOUT).await {
            Ok(event) if event.data["marker"] == json!(marker) => {}
            Ok(event) => {
                return Ok(TestResult::fail(
                    name,
                    start.elapsed(),
                    format!("{} got an unexpected announcement: {}", sse.user_label, event.data),
                ))
            }
            Err(e) => {
                return Ok(TestResult::fail(
                    name,
                    start.elapsed(),
                    format!("{}: {e}", sse.user_label),
                ))
            }
        }
    }

    Ok(TestResult::pass(name, start.elapsed()))
}

/// A heartbeat arrives within the given window. Only useful with a short
/// heartbeat interval configured on the server.
pub async fn test_heartbeat(sse: &mut Connection, within: Duration) -> Result<TestResult> {
    let name = "heartbeat";
    println!("{} Running {} (up to {}s)...", "→".blue(), name, within.as_secs());
    let start = Instant::now();

    match sse.wait_for_event("heartbeat", within).await {
        Ok(_) => Ok(TestResult::pass(name, start.elapsed())),
        Err(e) => Ok(TestResult::fail(
            name,
            start.elapsed(),
            format!("{}: {e}", sse.user_label),
        )),
    }
}
