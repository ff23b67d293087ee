use config::Config;
use events::EventPublisher;
use log::info;
use std::sync::Arc;

pub mod config;
pub mod logging;

/// Builds the delivery hub from the configuration and starts its liveness
/// monitor.
pub fn init_sse_manager(config: &Config) -> Result<Arc<sse::Manager>, sse::error::Error> {
    let settings = config.sse_settings();
    info!(
        "SSE config: heartbeat_interval={}s, sweep_interval={}s, stale_threshold={}s, \
         channel_capacity={}, max_connections={}",
        settings.heartbeat_interval.as_secs(),
        settings.sweep_interval.as_secs(),
        settings.stale_threshold.as_secs(),
        settings.channel_capacity,
        settings.max_connections,
    );

    let manager = Arc::new(sse::Manager::new(settings)?);
    manager.start();
    Ok(manager)
}

// Service-level state containing only infrastructure concerns
// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub sse_manager: Arc<sse::Manager>,
    pub event_publisher: EventPublisher,
}

impl AppState {
    pub fn new(
        app_config: Config,
        sse_manager: &Arc<sse::Manager>,
        event_publisher: EventPublisher,
    ) -> Self {
        Self {
            config: app_config,
            sse_manager: Arc::clone(sse_manager),
            event_publisher,
        }
    }

    /// State wired the way the binary wires it: the hub's domain-event
    /// handler registered on the publisher.
    pub fn with_sse_handler(app_config: Config, sse_manager: &Arc<sse::Manager>) -> Self {
        let event_publisher = EventPublisher::new().with_handler(Arc::new(
            sse::SseDomainEventHandler::new(Arc::clone(sse_manager)),
        ));
        Self::new(app_config, sse_manager, event_publisher)
    }
}
