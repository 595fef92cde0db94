//! The voting-period timer.
//!
//! The deadline is a single atomic written by the control path and read
//! by anyone, without a lock. A reader may briefly see the previous
//! deadline; that is fine, because the lobby role takes the
//! authoritative "voting is closed" decision once and latches it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::Clock;

/// Bounds how long players may deliberate over the next race.
pub struct VotingTimer {
    clock: Arc<dyn Clock>,
    /// Absolute deadline in clock milliseconds. 0 until the first period.
    end_voting_period: AtomicU64,
    /// Length of the most recent period in milliseconds.
    max_voting_time: AtomicU64,
}

impl VotingTimer {
    /// A timer with no period started yet.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            end_voting_period: AtomicU64::new(0),
            max_voting_time: AtomicU64::new(0),
        }
    }

    /// Opens (or restarts) a voting period lasting `max_time` seconds.
    ///
    /// The window is rounded to whole milliseconds. Negative or
    /// non-finite values open an already-closed window.
    pub fn start(&self, max_time: f32) {
        let window = if max_time.is_finite() && max_time > 0.0 {
            (f64::from(max_time) * 1000.0).round() as u64
        } else {
            0
        };
        let deadline = self.clock.now_ms().saturating_add(window);
        self.max_voting_time.store(window, Ordering::Release);
        self.end_voting_period.store(deadline, Ordering::Release);
        debug!(window_ms = window, deadline_ms = deadline, "voting period started");
    }

    /// Seconds left before the deadline, never negative.
    ///
    /// Before any period was started this is 0.
    pub fn remaining(&self) -> f32 {
        let deadline = self.end_voting_period.load(Ordering::Acquire);
        let left = deadline.saturating_sub(self.clock.now_ms());
        left as f32 / 1000.0
    }

    /// `true` once the clock has reached the deadline.
    ///
    /// Before any period was started the deadline is 0, so this is `true`.
    pub fn is_over(&self) -> bool {
        self.clock.now_ms() >= self.end_voting_period.load(Ordering::Acquire)
    }

    /// Length of the most recent period, in seconds.
    pub fn max_time(&self) -> f32 {
        self.max_voting_time.load(Ordering::Acquire) as f32 / 1000.0
    }

    /// The raw deadline in clock milliseconds.
    pub fn deadline_ms(&self) -> u64 {
        self.end_voting_period.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for VotingTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VotingTimer")
            .field("end_voting_period", &self.deadline_ms())
            .field("max_voting_time", &self.max_voting_time.load(Ordering::Acquire))
            .finish()
    }
}
