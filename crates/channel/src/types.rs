//! Public types for the stream channel.

use std::time::Duration;

use lectern_protocol::constants::{HEARTBEAT_PERIOD, STALE_AFTER};

/// Connection state of the channel.
///
/// "Stale" is deliberately not a state: a silent connection raises
/// [`ChannelEvent::Stale`] without leaving `Open`.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    /// Initial websocket handshake in progress.
    Connecting,
    /// Connected; queries flow.
    Open,
    /// Connection lost, attempting to reconnect.
    Reconnecting { attempt: u32 },
    /// Disconnected; no automatic retries until the caller reinitiates.
    Closed,
}

/// Connection-level events, separate from per-query completions.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    StateChanged(ConnectionState),
    /// Reconnection attempt scheduled.
    Reconnecting { attempt: u32, next_retry_secs: f64 },
    /// Nothing received for longer than the stale threshold. Fires once
    /// per stale period; the connection stays up.
    Stale { silent_for: Duration },
    /// Retry budget exhausted; the channel is offline until the caller
    /// calls reconnect.
    Offline,
}

/// Configuration for automatic reconnection with exponential backoff.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Initial delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Maximum delay between attempts (backoff cap).
    pub max_delay: Duration,
    /// Multiplier for each subsequent attempt.
    pub backoff_factor: f64,
    /// Attempt budget before the channel gives up and goes offline.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(15),
            backoff_factor: 2.0,
            max_attempts: 10,
        }
    }
}

impl ReconnectConfig {
    /// Delay before reconnection attempt number `attempt` (1-based).
    /// Retries are spread over ±25% of the base delay so clients do not
    /// reconnect in lockstep after a backend restart.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(63) as i32;
        let base = (self.initial_delay.as_secs_f64() * self.backoff_factor.powi(exp))
            .min(self.max_delay.as_secs_f64());
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos();
        let unit = f64::from(nanos) / f64::from(u32::MAX); // [0, 1)
        let jittered = base * (0.75 + 0.5 * unit);
        Duration::from_secs_f64(jittered.max(0.05))
    }
}

/// Channel construction parameters.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Websocket URL of the backend's streaming endpoint.
    pub url: String,
    /// Keepalive ping interval while open.
    pub heartbeat_period: Duration,
    /// Silence threshold for stale notifications.
    pub stale_after: Duration,
    pub reconnect: ReconnectConfig,
}

impl ChannelConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            heartbeat_period: HEARTBEAT_PERIOD,
            stale_after: STALE_AFTER,
            reconnect: ReconnectConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_state_equality() {
        assert_eq!(ConnectionState::Open, ConnectionState::Open);
        assert_ne!(ConnectionState::Open, ConnectionState::Connecting);
        assert_eq!(
            ConnectionState::Reconnecting { attempt: 1 },
            ConnectionState::Reconnecting { attempt: 1 },
        );
        assert_ne!(
            ConnectionState::Reconnecting { attempt: 1 },
            ConnectionState::Reconnecting { attempt: 2 },
        );
    }

    #[test]
    fn reconnect_config_defaults() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_millis(250));
        assert_eq!(config.max_delay, Duration::from_secs(15));
        assert_eq!(config.max_attempts, 10);
        assert!((config.backoff_factor - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn reconnect_delay_doubles_until_capped() {
        let config = ReconnectConfig::default();
        // Jitter keeps each delay within ±25% of its base value.
        for (attempt, base) in [(1, 0.25), (2, 0.5), (3, 1.0), (5, 4.0), (7, 15.0), (10, 15.0)] {
            let secs = config.delay_for_attempt(attempt).as_secs_f64();
            assert!(
                secs >= base * 0.74 && secs <= base * 1.26,
                "attempt {attempt}: {secs:.3}s out of range around {base:.2}s"
            );
        }
    }

    #[test]
    fn channel_config_uses_protocol_defaults() {
        let config = ChannelConfig::new("ws://localhost:9400/stream");
        assert_eq!(config.heartbeat_period, HEARTBEAT_PERIOD);
        assert_eq!(config.stale_after, STALE_AFTER);
    }
}
