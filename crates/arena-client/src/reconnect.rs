//! Reconnection as explicit state, not ad hoc timers.
//!
//! The policy computes capped exponential delays; the state tracks the
//! attempt budget and the manual-disconnect flag that suppresses any
//! reconnection the close path would otherwise schedule, making
//! cancellation semantics (user navigates away) unambiguous.

use std::time::Duration;

/// Capped exponential backoff for reconnection attempts.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Attempts before giving up entirely.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before the given attempt (1-indexed). Attempt 0 connects
    /// immediately; each following attempt doubles the delay up to the
    /// hard ceiling.
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::from_millis(0);
        }

        let exponent = attempt.saturating_sub(1).min(16);
        let multiplier = 1u128 << exponent;
        let backoff_ms = self.initial_backoff.as_millis().saturating_mul(multiplier);
        let bounded_ms = backoff_ms.min(self.max_backoff.as_millis());
        Duration::from_millis(bounded_ms as u64)
    }
}

/// What the connection loop should do after losing a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Wait the given delay, then attempt again.
    RetryAfter(Duration),
    /// Stop: the attempt budget is exhausted; the user must be told that
    /// realtime sync has failed.
    GiveUp { attempts: u32 },
    /// Stop: disconnect was explicitly requested.
    Stopped,
}

/// Per-connection reconnect state machine.
#[derive(Debug)]
pub struct ReconnectState {
    policy: ReconnectPolicy,
    attempt: u32,
    disconnect_requested: bool,
}

impl ReconnectState {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            attempt: 0,
            disconnect_requested: false,
        }
    }

    /// Record a successful connection: the attempt counter resets so the
    /// next outage starts from a fresh budget.
    pub fn connected(&mut self) {
        self.attempt = 0;
    }

    /// Mark that the user asked to disconnect. Any decision taken after
    /// this is `Stopped`, regardless of remaining budget.
    pub fn request_disconnect(&mut self) {
        self.disconnect_requested = true;
    }

    pub fn disconnect_requested(&self) -> bool {
        self.disconnect_requested
    }

    /// Attempts consumed since the last successful connection.
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Decide what to do after the connection dropped (or an attempt
    /// failed).
    pub fn next_decision(&mut self) -> ReconnectDecision {
        if self.disconnect_requested {
            return ReconnectDecision::Stopped;
        }
        if self.attempt >= self.policy.max_attempts {
            return ReconnectDecision::GiveUp {
                attempts: self.attempt,
            };
        }
        self.attempt += 1;
        ReconnectDecision::RetryAfter(self.policy.backoff_for_attempt(self.attempt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(500),
        }
    }

    #[test]
    fn test_backoff_doubles_until_ceiling() {
        let p = policy();
        assert_eq!(p.backoff_for_attempt(0), Duration::from_millis(0));
        assert_eq!(p.backoff_for_attempt(1), Duration::from_millis(100));
        assert_eq!(p.backoff_for_attempt(2), Duration::from_millis(200));
        assert_eq!(p.backoff_for_attempt(3), Duration::from_millis(400));
        // Capped at the hard ceiling from here on.
        assert_eq!(p.backoff_for_attempt(4), Duration::from_millis(500));
        assert_eq!(p.backoff_for_attempt(20), Duration::from_millis(500));
    }

    #[test]
    fn test_budget_exhaustion() {
        let mut state = ReconnectState::new(policy());
        for expected in 1..=4u32 {
            match state.next_decision() {
                ReconnectDecision::RetryAfter(_) => assert_eq!(state.attempts(), expected),
                other => panic!("expected retry, got {:?}", other),
            }
        }
        assert_eq!(state.next_decision(), ReconnectDecision::GiveUp { attempts: 4 });
    }

    #[test]
    fn test_success_resets_budget() {
        let mut state = ReconnectState::new(policy());
        state.next_decision();
        state.next_decision();
        assert_eq!(state.attempts(), 2);

        state.connected();
        assert_eq!(state.attempts(), 0);
        match state.next_decision() {
            ReconnectDecision::RetryAfter(delay) => {
                // Fresh budget starts back at the initial delay.
                assert_eq!(delay, Duration::from_millis(100));
            }
            other => panic!("expected retry, got {:?}", other),
        }
    }

    #[test]
    fn test_manual_disconnect_suppresses_reconnection() {
        let mut state = ReconnectState::new(policy());
        state.next_decision();
        state.request_disconnect();
        // Budget remains, but the flag wins.
        assert_eq!(state.next_decision(), ReconnectDecision::Stopped);
        assert_eq!(state.next_decision(), ReconnectDecision::Stopped);
    }
}
