use crate::lifecycle::{DisconnectReason, Lifecycle};
use log::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Periodic sweep that evicts connections whose heartbeat went stale.
///
/// The monitor only reads the registry and hands stale ids to the shared
/// disconnect routine; it never touches heartbeat state itself.
pub struct LivenessMonitor {
    lifecycle: Arc<Lifecycle>,
    sweep_interval: Duration,
    stale_threshold: Duration,
}

/// Handle to a running monitor task.
pub(crate) struct MonitorHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Stop the timer and wait for an in-flight sweep to finish.
    pub(crate) async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!("Liveness monitor task ended abnormally: {e}");
        }
    }
}

impl LivenessMonitor {
    pub(crate) fn new(
        lifecycle: Arc<Lifecycle>,
        sweep_interval: Duration,
        stale_threshold: Duration,
    ) -> Self {
        Self {
            lifecycle,
            sweep_interval,
            stale_threshold,
        }
    }

    /// Evict every connection silent for longer than the threshold as of
    /// `now`. Returns how many connections this sweep evicted.
    pub fn sweep(&self, now: Instant) -> usize {
        let mut evicted = 0;

        for connection in self.lifecycle.registry().list_all() {
            let silent = connection.silent_for(now);
            if silent <= self.stale_threshold {
                continue;
            }

            debug!(
                "Connection {} for user {} silent for {}s",
                connection.id,
                connection.user_id,
                silent.as_secs()
            );

            // A connection that went away on its own since the snapshot is
            // not an eviction, and must not stop the rest of the sweep.
            if self
                .lifecycle
                .disconnect(&connection.id, DisconnectReason::Stale)
            {
                evicted += 1;
            }
        }

        if evicted > 0 {
            info!("Liveness sweep evicted {evicted} stale connection(s)");
        }
        evicted
    }

    pub(crate) fn spawn(self) -> MonitorHandle {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(self.run(cancel.clone()));
        MonitorHandle { cancel, task }
    }

    async fn run(self, cancel: CancellationToken) {
        let mut ticker = time::interval_at(
            Instant::now() + self.sweep_interval,
            self.sweep_interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Liveness monitor started (sweep every {}s, stale after {}s)",
            self.sweep_interval.as_secs(),
            self.stale_threshold.as_secs()
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.sweep(Instant::now());
                }
            }
        }

        info!("Liveness monitor stopped");
    }
}
