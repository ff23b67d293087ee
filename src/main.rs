use log::*;
use service::{config::Config, logging::Logger, AppState};
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() {
    let config = Config::new();
    if let Err(e) = Logger::init_logger(&config) {
        eprintln!("Failed to start logger: {e}");
        std::process::exit(1);
    }

    info!(
        "Starting realtime hub [{}] in {} mode",
        env!("CARGO_PKG_VERSION"),
        config.runtime_env()
    );

    let sse_manager = match service::init_sse_manager(&config) {
        Ok(manager) => manager,
        Err(e) => {
            error!("Invalid SSE configuration: {e}");
            std::process::exit(1);
        }
    };

    let app_state = AppState::with_sse_handler(config, &sse_manager);

    if let Err(e) = web::init_server(app_state, shutdown_signal(Arc::clone(&sse_manager))).await {
        error!("Server error: {e}");
        std::process::exit(1);
    }

    info!("Realtime hub shutdown complete");
}

/// Resolves on SIGINT/SIGTERM once every open event stream has been closed,
/// which lets axum's graceful shutdown finish.
async fn shutdown_signal(sse_manager: Arc<sse::Manager>) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {e}"),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    sse_manager.shutdown().await;
}
