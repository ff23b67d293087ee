//! SSE HTTP handler for the web layer.
//!
//! This module contains only the Axum handler for the event stream endpoint.
//! The delivery machinery (Manager, ConnectionRegistry, per-connection
//! workers) lives in the `sse` crate.

pub mod handler;
