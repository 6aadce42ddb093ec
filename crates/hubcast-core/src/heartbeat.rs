//! Heartbeat policy and the per-client liveness state machine.
//!
//! A client starts `Alive` with a read deadline `T` in the future. Sending a
//! ping moves it to `Suspect`; a pong moves it back to `Alive` and pushes the
//! deadline out by `T`. Reaching the deadline without a pong makes it `Dead`,
//! which is terminal.

use std::time::{Duration, Instant};

use crate::config::{MAX_HEARTBEAT_SECS, PING_PERIOD_SECS, PONG_WAIT_SECS, WRITE_WAIT_SECS};
use crate::error::{HubcastError, Result};

/// Timing discipline shared by both pumps of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatPolicy {
    ping_interval: Duration,
    pong_timeout: Duration,
    write_timeout: Duration,
}

impl HeartbeatPolicy {
    /// Build a policy, rejecting any combination where a ping could not be
    /// attempted before the read deadline fires (`pong_timeout <= ping_interval`)
    /// and durations too long to be added to a clock reading.
    pub fn new(
        ping_interval: Duration,
        pong_timeout: Duration,
        write_timeout: Duration,
    ) -> Result<Self> {
        if ping_interval.is_zero() || write_timeout.is_zero() {
            return Err(HubcastError::Config(
                "heartbeat intervals must be non-zero".to_string(),
            ));
        }
        let ceiling = Duration::from_secs(MAX_HEARTBEAT_SECS);
        if ping_interval > ceiling || pong_timeout > ceiling || write_timeout > ceiling {
            return Err(HubcastError::Config(format!(
                "heartbeat durations must not exceed {MAX_HEARTBEAT_SECS}s"
            )));
        }
        if pong_timeout <= ping_interval {
            return Err(HubcastError::Config(format!(
                "pong timeout ({}ms) must be greater than ping interval ({}ms)",
                pong_timeout.as_millis(),
                ping_interval.as_millis()
            )));
        }
        Ok(Self {
            ping_interval,
            pong_timeout,
            write_timeout,
        })
    }

    /// Derive the ping interval as 9/10 of the pong timeout.
    pub fn from_pong_timeout(pong_timeout: Duration, write_timeout: Duration) -> Result<Self> {
        Self::new(pong_timeout / 10 * 9, pong_timeout, write_timeout)
    }

    pub fn ping_interval(&self) -> Duration {
        self.ping_interval
    }

    pub fn pong_timeout(&self) -> Duration {
        self.pong_timeout
    }

    pub fn write_timeout(&self) -> Duration {
        self.write_timeout
    }
}

impl Default for HeartbeatPolicy {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(PING_PERIOD_SECS),
            pong_timeout: Duration::from_secs(PONG_WAIT_SECS),
            write_timeout: Duration::from_secs(WRITE_WAIT_SECS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessState {
    Alive,
    Suspect,
    Dead,
}

/// Liveness bookkeeping owned by a client's read pump.
#[derive(Debug, Clone)]
pub struct Liveness {
    state: LivenessState,
    deadline: Instant,
    timeout: Duration,
}

impl Liveness {
    pub fn new(now: Instant, policy: &HeartbeatPolicy) -> Self {
        Self {
            state: LivenessState::Alive,
            deadline: now + policy.pong_timeout(),
            timeout: policy.pong_timeout(),
        }
    }

    pub fn state(&self) -> LivenessState {
        self.state
    }

    /// Instant at which the peer is declared dead unless it acknowledges first.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// A ping went out; the peer now owes an acknowledgement.
    pub fn probe_sent(&mut self) {
        if self.state == LivenessState::Alive {
            self.state = LivenessState::Suspect;
        }
    }

    /// The peer acknowledged. Extends the deadline unless already dead.
    pub fn acknowledge(&mut self, now: Instant) {
        if self.state == LivenessState::Dead {
            return;
        }
        self.state = LivenessState::Alive;
        self.deadline = now + self.timeout;
    }

    /// Check the deadline. Returns true once the client is dead.
    pub fn expire(&mut self, now: Instant) -> bool {
        if self.state != LivenessState::Dead && now >= self.deadline {
            self.state = LivenessState::Dead;
        }
        self.state == LivenessState::Dead
    }
}
