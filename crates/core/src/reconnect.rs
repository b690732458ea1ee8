//! Reconnection policy for live-stream clients.
//!
//! A client that loses its stream retries immediately a few times. Once the
//! consecutive failure count reaches the threshold it probes the session to
//! tell an expired login apart from a network blip, and backs off linearly
//! while the network is at fault.
//!
//! The policy is a pure state machine; the caller owns the sleeping and the
//! HTTP calls.

use core::time::Duration;

/// What the client should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectAction {
    /// Reconnect right away.
    RetryNow,
    /// Call the authenticated probe endpoint and report the result through
    /// [`ReconnectPolicy::on_probe`].
    ProbeSession,
    /// Wait this long, then reconnect.
    Backoff(Duration),
    /// The session is gone; stop and ask the user to log in again.
    Reauthenticate,
}

/// Consecutive-failure tracker for a single stream client.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    threshold: u32,
    base_delay: Duration,
    max_delay: Duration,
    failures: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(2), Duration::from_secs(60))
    }
}

impl ReconnectPolicy {
    /// Create a policy.
    ///
    /// A `threshold` of zero is treated as one.
    #[must_use]
    pub fn new(threshold: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            base_delay,
            max_delay,
            failures: 0,
        }
    }

    /// Consecutive failures since the last successful connection.
    #[must_use]
    pub const fn failures(&self) -> u32 {
        self.failures
    }

    /// Record a transport failure.
    pub const fn on_failure(&mut self) -> ReconnectAction {
        self.failures = self.failures.saturating_add(1);
        if self.failures < self.threshold {
            ReconnectAction::RetryNow
        } else {
            ReconnectAction::ProbeSession
        }
    }

    /// Record the outcome of the session probe.
    ///
    /// The delay grows by `base_delay` for every failure past the threshold,
    /// capped at `max_delay`.
    pub fn on_probe(&mut self, session_valid: bool) -> ReconnectAction {
        if !session_valid {
            return ReconnectAction::Reauthenticate;
        }
        let step = self.failures.saturating_sub(self.threshold).saturating_add(1);
        let delay = self.base_delay.saturating_mul(step).min(self.max_delay);
        ReconnectAction::Backoff(delay)
    }

    /// Record a successful connection.
    pub const fn on_success(&mut self) {
        self.failures = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ReconnectPolicy {
        ReconnectPolicy::new(3, Duration::from_secs(2), Duration::from_secs(7))
    }

    #[test]
    fn test_retries_immediately_below_threshold() {
        let mut p = policy();
        assert_eq!(p.on_failure(), ReconnectAction::RetryNow);
        assert_eq!(p.on_failure(), ReconnectAction::RetryNow);
        assert_eq!(p.on_failure(), ReconnectAction::ProbeSession);
    }

    #[test]
    fn test_expired_session_stops_retrying() {
        let mut p = policy();
        for _ in 0..3 {
            p.on_failure();
        }
        assert_eq!(p.on_probe(false), ReconnectAction::Reauthenticate);
    }

    #[test]
    fn test_backoff_is_linear_and_capped() {
        let mut p = policy();
        for _ in 0..3 {
            p.on_failure();
        }
        assert_eq!(p.on_probe(true), ReconnectAction::Backoff(Duration::from_secs(2)));
        p.on_failure();
        assert_eq!(p.on_probe(true), ReconnectAction::Backoff(Duration::from_secs(4)));
        p.on_failure();
        assert_eq!(p.on_probe(true), ReconnectAction::Backoff(Duration::from_secs(6)));
        p.on_failure();
        assert_eq!(p.on_probe(true), ReconnectAction::Backoff(Duration::from_secs(7)));
    }

    #[test]
    fn test_success_resets_counter() {
        let mut p = policy();
        p.on_failure();
        p.on_failure();
        p.on_success();
        assert_eq!(p.failures(), 0);
        assert_eq!(p.on_failure(), ReconnectAction::RetryNow);
    }
}
