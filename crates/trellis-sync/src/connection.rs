//! Connection-state tracking with reconnect backoff.
//!
//! There is no server push channel: the client only learns it is offline
//! when a command fails at the transport. The tracker reports the current
//! state and produces jittered backoff delays for reconnect attempts; on a
//! successful reconnect the owner rolls back every pending optimistic
//! update before re-syncing.

use std::sync::RwLock;

/// Observable connection state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// The transport is healthy.
    Connected,
    /// The transport is down; no reconnect attempt has started.
    Disconnected,
    /// A reconnect attempt is in flight.
    Reconnecting {
        /// Attempt number, starting at 1.
        attempt: u32,
    },
    /// Reconnect attempts are exhausted.
    Failed,
}

/// Reconnect backoff configuration.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnect attempt (default: 100ms).
    pub initial_delay_ms: u64,
    /// Backoff ceiling (default: 30s).
    pub max_delay_ms: u64,
    /// Attempts before giving up (default: 10).
    pub max_attempts: u32,
    /// Exponential multiplier (default: 2.0).
    pub backoff_multiplier: f64,
    /// Fraction of the delay randomized away (default: 0.1).
    pub jitter_fraction: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 100,
            max_delay_ms: 30_000,
            max_attempts: 10,
            backoff_multiplier: 2.0,
            jitter_fraction: 0.1,
        }
    }
}

struct TrackerState {
    state: ConnectionState,
    attempt: u32,
    last_delay_ms: u64,
}

/// Shared connection-state tracker.
pub struct ConnectionTracker {
    config: ReconnectConfig,
    inner: RwLock<TrackerState>,
}

impl ConnectionTracker {
    /// Creates a tracker starting in the connected state.
    pub fn new(config: ReconnectConfig) -> Self {
        tracing::debug!(
            "initializing connection tracker: initial_delay={}ms, max_delay={}ms, max_attempts={}",
            config.initial_delay_ms,
            config.max_delay_ms,
            config.max_attempts
        );
        Self {
            config,
            inner: RwLock::new(TrackerState {
                state: ConnectionState::Connected,
                attempt: 0,
                last_delay_ms: 0,
            }),
        }
    }

    /// The current connection state.
    pub fn state(&self) -> ConnectionState {
        self.inner
            .read()
            .map(|s| s.state.clone())
            .unwrap_or(ConnectionState::Failed)
    }

    /// True when the transport is healthy.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Records a successful (re)connection, resetting backoff.
    pub fn on_connected(&self) {
        if let Ok(mut inner) = self.inner.write() {
            inner.state = ConnectionState::Connected;
            inner.attempt = 0;
            inner.last_delay_ms = 0;
            tracing::info!("connection established, reconnect state reset");
        }
    }

    /// Records a lost connection, entering the reconnecting state.
    pub fn on_disconnected(&self) {
        if let Ok(mut inner) = self.inner.write() {
            let attempt = inner.attempt.max(1);
            inner.state = ConnectionState::Reconnecting { attempt };
            tracing::warn!("connection lost, entering reconnect (attempt {})", attempt);
        }
    }

    /// The delay before the next reconnect attempt, or `None` once attempts
    /// are exhausted (the tracker moves to `Failed`).
    pub fn next_delay_ms(&self) -> Option<u64> {
        let mut inner = match self.inner.write() {
            Ok(inner) => inner,
            Err(_) => return None,
        };
        if inner.attempt >= self.config.max_attempts {
            inner.state = ConnectionState::Failed;
            tracing::warn!(
                "reconnect attempts exhausted after {} tries",
                inner.attempt
            );
            return None;
        }

        let base = if inner.attempt == 0 {
            self.config.initial_delay_ms
        } else {
            let scaled = (self.config.initial_delay_ms as f64
                * self.config.backoff_multiplier.powi(inner.attempt as i32))
                as u64;
            scaled.min(self.config.max_delay_ms)
        };

        let jitter = if self.config.jitter_fraction > 0.0 {
            let range = (base as f64 * self.config.jitter_fraction) as u64;
            rand_jitter(range)
        } else {
            0
        };

        inner.attempt += 1;
        inner.state = ConnectionState::Reconnecting {
            attempt: inner.attempt,
        };
        inner.last_delay_ms = base.saturating_sub(jitter).max(1);
        Some(inner.last_delay_ms)
    }

    /// The delay handed out by the most recent `next_delay_ms`.
    pub fn last_delay_ms(&self) -> u64 {
        self.inner.read().map(|s| s.last_delay_ms).unwrap_or(0)
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new(ReconnectConfig::default())
    }
}

/// Cheap jitter from system-time entropy.
fn rand_jitter(max: u64) -> u64 {
    if max == 0 {
        return 0;
    }
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or(0);
    nanos % max
}
