use std::time::Duration;

use crate::error::{Result, SessionError};

/// Default read-liveness window.
pub const DEFAULT_READ_LIVENESS_WINDOW: Duration = Duration::from_secs(60);

/// Default per-write deadline.
pub const DEFAULT_WRITE_DEADLINE: Duration = Duration::from_secs(10);

/// Default inbound frame payload cap in bytes.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 512;

/// Size of the probe payload the writer sends. Peers echo it back in a reply,
/// so `max_frame_size` may not be smaller.
pub const PROBE_PAYLOAD_LEN: usize = 8;

/// Default OutboundQueue capacity.
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 256;

/// Default ReplyQueue capacity.
pub const DEFAULT_REPLY_CAPACITY: usize = 16;

/// Liveness and I/O limits for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Sliding window after the last received frame before the peer is declared dead.
    pub read_liveness_window: Duration,
    /// Probe interval. Must be strictly shorter than `read_liveness_window`.
    pub probe_period: Duration,
    /// Budget for each individual write.
    pub write_deadline: Duration,
    /// Maximum inbound payload size in bytes.
    pub max_frame_size: usize,
    /// Capacity of the application → writer queue.
    pub outbound_capacity: usize,
    /// Capacity of the reader → writer reply queue.
    pub reply_capacity: usize,
}

impl SessionConfig {
    /// Config with the given liveness window and a probe period of 7/10 of it.
    pub fn with_liveness_window(window: Duration) -> Self {
        Self {
            read_liveness_window: window,
            probe_period: default_probe_period(window),
            ..Self::default()
        }
    }

    /// Check the invariants the loops rely on.
    pub fn validate(&self) -> Result<()> {
        if self.read_liveness_window.is_zero() {
            return Err(invalid("read_liveness_window must be greater than zero"));
        }
        if self.probe_period.is_zero() {
            return Err(invalid("probe_period must be greater than zero"));
        }
        if self.probe_period >= self.read_liveness_window {
            return Err(invalid(format!(
                "probe_period ({:?}) must be shorter than read_liveness_window ({:?})",
                self.probe_period, self.read_liveness_window
            )));
        }
        if self.write_deadline.is_zero() {
            return Err(invalid("write_deadline must be greater than zero"));
        }
        if self.max_frame_size < PROBE_PAYLOAD_LEN {
            return Err(invalid(format!(
                "max_frame_size ({}) must be at least the probe payload size ({PROBE_PAYLOAD_LEN})",
                self.max_frame_size
            )));
        }
        if self.outbound_capacity == 0 || self.reply_capacity == 0 {
            return Err(invalid("queue capacities must be greater than zero"));
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_liveness_window: DEFAULT_READ_LIVENESS_WINDOW,
            probe_period: default_probe_period(DEFAULT_READ_LIVENESS_WINDOW),
            write_deadline: DEFAULT_WRITE_DEADLINE,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            reply_capacity: DEFAULT_REPLY_CAPACITY,
        }
    }
}

fn default_probe_period(window: Duration) -> Duration {
    window * 7 / 10
}

fn invalid(message: impl Into<String>) -> SessionError {
    SessionError::InvalidConfig(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SessionConfig::default();
        assert_eq!(config.read_liveness_window, Duration::from_secs(60));
        assert_eq!(config.probe_period, Duration::from_secs(42));
        assert_eq!(config.write_deadline, Duration::from_secs(10));
        assert_eq!(config.max_frame_size, 512);
        config.validate().unwrap();
    }

    #[test]
    fn probe_period_derived_from_window() {
        let config = SessionConfig::with_liveness_window(Duration::from_secs(10));
        assert_eq!(config.probe_period, Duration::from_secs(7));
        config.validate().unwrap();
    }

    #[test]
    fn probe_period_must_be_shorter_than_window() {
        let config = SessionConfig {
            probe_period: Duration::from_secs(60),
            ..SessionConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SessionError::InvalidConfig(_))
        ));
    }

    #[test]
    fn max_frame_size_must_fit_probe_reply() {
        let too_small = SessionConfig {
            max_frame_size: PROBE_PAYLOAD_LEN - 1,
            ..SessionConfig::default()
        };
        assert!(matches!(
            too_small.validate(),
            Err(SessionError::InvalidConfig(_))
        ));

        let exact = SessionConfig {
            max_frame_size: PROBE_PAYLOAD_LEN,
            ..SessionConfig::default()
        };
        exact.validate().unwrap();
    }

    #[test]
    fn rejects_zero_values() {
        let zero_write = SessionConfig {
            write_deadline: Duration::ZERO,
            ..SessionConfig::default()
        };
        assert!(zero_write.validate().is_err());

        let zero_frame = SessionConfig {
            max_frame_size: 0,
            ..SessionConfig::default()
        };
        assert!(zero_frame.validate().is_err());

        let zero_queue = SessionConfig {
            reply_capacity: 0,
            ..SessionConfig::default()
        };
        assert!(zero_queue.validate().is_err());

        let zero_window = SessionConfig::with_liveness_window(Duration::ZERO);
        assert!(zero_window.validate().is_err());
    }
}
