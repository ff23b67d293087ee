//! HTTP surface of the hub: the event stream endpoint plus the small set of
//! status, announcement and health routes around it.

use log::*;
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;

pub use service::AppState;

mod controller;
pub mod error;
mod extractors;
pub mod router;
mod sse;

/// Binds the configured interface and port and serves until `shutdown`
/// resolves.
///
/// `shutdown` must close the hub's event streams before it returns,
/// otherwise graceful shutdown waits on every open stream forever.
pub async fn init_server<F>(app_state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = format!(
        "{}:{}",
        app_state.config.interface(),
        app_state.config.port
    );
    let listener = TcpListener::bind(&addr).await?;
    info!("Server starting... listening for connections on http://{addr}");

    let app = router::define_routes(app_state);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
}
