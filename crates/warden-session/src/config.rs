//! Manager-wide session configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Default idle timeout for new sessions: 30 minutes.
pub const DEFAULT_GLOBAL_SESSION_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Default period between validation sweeps: 1 hour.
pub const DEFAULT_VALIDATION_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Configuration for session behavior.
///
/// Host applications usually deserialize this from their own config file
/// and hand it to the manager builder. Anything left out falls back to the
/// defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Idle timeout given to every new session. Individual sessions can
    /// override it afterwards. `Duration::ZERO` means sessions never expire
    /// on their own.
    pub global_session_timeout: Duration,

    /// Whether the manager runs the periodic validation sweep. With the
    /// sweep disabled, expiration is only noticed when a session is
    /// accessed.
    pub validation_scheduler_enabled: bool,

    /// Time between validation sweeps.
    pub validation_interval: Duration,

    /// Buffer size of the lifecycle event channel. Slow subscribers that
    /// fall further behind than this miss events.
    pub event_channel_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            global_session_timeout: DEFAULT_GLOBAL_SESSION_TIMEOUT,
            validation_scheduler_enabled: true,
            validation_interval: DEFAULT_VALIDATION_INTERVAL,
            event_channel_capacity: 64,
        }
    }
}

impl SessionConfig {
    /// Smallest accepted sweep interval.
    pub const MIN_VALIDATION_INTERVAL: Duration = Duration::from_millis(1);

    /// Largest accepted sweep interval (one year).
    pub const MAX_VALIDATION_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_global_session_timeout(mut self, timeout: Duration) -> Self {
        self.global_session_timeout = timeout;
        self
    }

    pub fn with_validation_interval(mut self, interval: Duration) -> Self {
        self.validation_interval = interval;
        self
    }

    pub fn with_validation_scheduler(mut self, enabled: bool) -> Self {
        self.validation_scheduler_enabled = enabled;
        self
    }

    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity;
        self
    }

    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// - `validation_interval` is kept between [`Self::MIN_VALIDATION_INTERVAL`]
    ///   and [`Self::MAX_VALIDATION_INTERVAL`].
    /// - `event_channel_capacity` is raised to 1.
    pub fn validated(mut self) -> Self {
        if self.validation_interval < Self::MIN_VALIDATION_INTERVAL {
            warn!(
                interval_ms = self.validation_interval.as_secs_f64() * 1000.0,
                "validation_interval below minimum, clamping"
            );
            self.validation_interval = Self::MIN_VALIDATION_INTERVAL;
        }
        if self.validation_interval > Self::MAX_VALIDATION_INTERVAL {
            warn!(
                interval_secs = self.validation_interval.as_secs(),
                "validation_interval above maximum, clamping"
            );
            self.validation_interval = Self::MAX_VALIDATION_INTERVAL;
        }
        if self.event_channel_capacity == 0 {
            warn!("event_channel_capacity is 0, clamping to 1");
            self.event_channel_capacity = 1;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.global_session_timeout, Duration::from_secs(1800));
        assert_eq!(cfg.validation_interval, Duration::from_secs(3600));
        assert!(cfg.validation_scheduler_enabled);
    }

    #[test]
    fn test_validated_clamps_zero_interval_and_capacity() {
        let cfg = SessionConfig::new()
            .with_validation_interval(Duration::ZERO)
            .with_event_channel_capacity(0)
            .validated();

        assert_eq!(cfg.validation_interval, SessionConfig::MIN_VALIDATION_INTERVAL);
        assert_eq!(cfg.event_channel_capacity, 1);
    }

    #[test]
    fn test_validated_clamps_huge_interval() {
        let cfg = SessionConfig::new()
            .with_validation_interval(Duration::MAX)
            .validated();
        assert_eq!(cfg.validation_interval, SessionConfig::MAX_VALIDATION_INTERVAL);
    }

    #[test]
    fn test_validated_clamps_huge_interval_loaded_from_json() {
        let cfg: SessionConfig = serde_json::from_str(
            r#"{ "validation_interval": { "secs": 18446744073709551615, "nanos": 0 } }"#,
        )
        .unwrap();
        assert_eq!(
            cfg.validated().validation_interval,
            SessionConfig::MAX_VALIDATION_INTERVAL
        );
    }

    #[test]
    fn test_validated_keeps_sane_values() {
        let cfg = SessionConfig::new()
            .with_global_session_timeout(Duration::from_secs(5))
            .with_validation_interval(Duration::from_secs(1));
        assert_eq!(cfg.clone().validated(), cfg);
    }

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let cfg: SessionConfig = serde_json::from_str(
            r#"{ "validation_scheduler_enabled": false,
                 "global_session_timeout": { "secs": 90, "nanos": 0 } }"#,
        )
        .unwrap();

        assert!(!cfg.validation_scheduler_enabled);
        assert_eq!(cfg.global_session_timeout, Duration::from_secs(90));
        assert_eq!(cfg.validation_interval, DEFAULT_VALIDATION_INTERVAL);
    }
}
