use crate::error::{config_error, Error};
use std::time::Duration;

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_STALE_THRESHOLD: Duration = Duration::from_secs(90);
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;
pub const DEFAULT_MAX_CONNECTIONS: usize = 10_000;

/// Tunables for the delivery hub.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Period of the synthetic heartbeat event on every connection.
    pub heartbeat_interval: Duration,
    /// Period of the liveness sweep.
    pub sweep_interval: Duration,
    /// A connection silent for longer than this is evicted by the sweep.
    pub stale_threshold: Duration,
    /// Bound of each per-connection queue; overflow drops the newest event.
    pub channel_capacity: usize,
    pub max_connections: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            stale_threshold: DEFAULT_STALE_THRESHOLD,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), Error> {
        if self.heartbeat_interval.is_zero() {
            return Err(config_error("heartbeat interval must be greater than zero"));
        }
        if self.sweep_interval.is_zero() {
            return Err(config_error("sweep interval must be greater than zero"));
        }
        // The threshold has to clear at least one full heartbeat period or
        // healthy connections get evicted between two beats.
        if self.stale_threshold <= self.heartbeat_interval {
            return Err(config_error(
                "stale threshold must be greater than the heartbeat interval",
            ));
        }
        if self.channel_capacity == 0 {
            return Err(config_error("channel capacity must be at least 1"));
        }
        if self.max_connections == 0 {
            return Err(config_error("max connections must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SseErrorKind;

    #[test]
    fn defaults_are_valid_and_keep_a_three_beat_margin() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.stale_threshold, settings.heartbeat_interval * 3);
    }

    #[test]
    fn threshold_not_above_heartbeat_is_rejected() {
        let settings = Settings {
            stale_threshold: Duration::from_secs(30),
            ..Settings::default()
        };
        let err = settings.validate().unwrap_err();
        assert_eq!(err.error_kind, SseErrorKind::Config);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let settings = Settings {
            channel_capacity: 0,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn zero_intervals_are_rejected() {
        let no_heartbeat = Settings {
            heartbeat_interval: Duration::ZERO,
            ..Settings::default()
        };
        let no_sweep = Settings {
            sweep_interval: Duration::ZERO,
            ..Settings::default()
        };
        assert!(no_heartbeat.validate().is_err());
        assert!(no_sweep.validate().is_err());
    }
}
