//! Fixed-rate tick scheduler for the lobby's `update(ticks)` loop.
//!
//! Unlike a simulation loop, the lobby does not need every tick delivered
//! individually. When the driver falls behind, the scheduler folds the
//! missed ticks into one [`TickInfo::ticks`] count so the lobby sees how
//! much game time actually passed.

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the tick scheduler.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Tick rate in Hz. 0 = event-driven (tick never fires).
    pub tick_rate_hz: u32,
    /// Upper bound on `TickInfo::ticks` after a stall. Anything beyond is
    /// dropped with a warning rather than replayed.
    pub max_ticks_per_update: u32,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 0,
            max_ticks_per_update: 10,
        }
    }
}

impl TickConfig {
    /// Maximum supported tick rate.
    pub const MAX_TICK_RATE_HZ: u32 = 128;

    /// Create a config for a specific tick rate with default settings.
    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self {
            tick_rate_hz,
            ..Default::default()
        }
    }

    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// Called by [`TickScheduler::new`]:
    /// - `tick_rate_hz` capped to [`Self::MAX_TICK_RATE_HZ`].
    /// - `max_ticks_per_update` at least 1.
    pub fn validated(mut self) -> Self {
        if self.tick_rate_hz > Self::MAX_TICK_RATE_HZ {
            warn!(
                rate = self.tick_rate_hz,
                max = Self::MAX_TICK_RATE_HZ,
                "tick_rate_hz exceeds maximum, clamping"
            );
            self.tick_rate_hz = Self::MAX_TICK_RATE_HZ;
        }
        self.max_ticks_per_update = self.max_ticks_per_update.max(1);
        self
    }

    /// Duration of a single tick. `None` in event-driven mode.
    pub fn tick_duration(&self) -> Option<Duration> {
        if self.tick_rate_hz == 0 {
            None
        } else {
            Some(Duration::from_secs_f64(1.0 / f64::from(self.tick_rate_hz)))
        }
    }
}

// ---------------------------------------------------------------------------
// Tick info
// ---------------------------------------------------------------------------

/// What [`TickScheduler::wait_for_tick`] hands back to the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickInfo {
    /// Running total of ticks delivered, starting at 1.
    pub tick: u64,
    /// Ticks elapsed since the previous wake-up. 1 when on schedule.
    pub ticks: u32,
    /// Duration of one tick.
    pub dt: Duration,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Wakes the lobby driver at a fixed rate.
pub struct TickScheduler {
    config: TickConfig,
    tick_duration: Option<Duration>,
    tick_count: u64,
    next_tick: Option<Instant>,
    paused: bool,
}

impl TickScheduler {
    /// Create a new scheduler from config. The first tick fires one tick
    /// duration from now.
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        let tick_duration = config.tick_duration();
        let next_tick = tick_duration.map(|d| Instant::now() + d);

        match tick_duration {
            None => debug!("tick scheduler created in event-driven mode"),
            Some(d) => debug!(
                rate_hz = config.tick_rate_hz,
                tick_ms = d.as_secs_f64() * 1000.0,
                "tick scheduler created"
            ),
        }

        Self {
            config,
            tick_duration,
            tick_count: 0,
            next_tick,
            paused: false,
        }
    }

    /// Create a scheduler for a specific tick rate with default settings.
    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self::new(TickConfig::with_rate(tick_rate_hz))
    }

    /// Waits until the next tick is due.
    ///
    /// In event-driven mode or while paused this future never resolves;
    /// `tokio::select!` keeps serving its other branches. Cancel-safe: a
    /// dropped wait leaves the schedule untouched.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let (next, dur) = match (self.next_tick, self.tick_duration) {
            (Some(next), Some(dur)) if !self.paused => (next, dur),
            _ => return std::future::pending().await,
        };

        time::sleep_until(next).await;

        let now = Instant::now();
        let late_by = now.saturating_duration_since(next);
        let missed = late_by.as_nanos() / dur.as_nanos();
        let elapsed = missed.saturating_add(1);
        let cap = self.config.max_ticks_per_update;

        let ticks = if elapsed > u128::from(cap) {
            warn!(
                tick = self.tick_count,
                elapsed = elapsed as u64,
                delivered = cap,
                "lobby fell behind, dropping ticks"
            );
            cap
        } else {
            elapsed as u32
        };

        // Realign to the cadence only when on time; after a stall restart
        // from now so the next wake-up is a full tick away.
        self.next_tick = Some(if missed == 0 { next + dur } else { now + dur });
        self.tick_count += u64::from(ticks);

        trace!(tick = self.tick_count, ticks, "tick fired");

        TickInfo {
            tick: self.tick_count,
            ticks,
            dt: dur,
        }
    }

    /// Stops ticking until [`resume`](Self::resume). Idempotent.
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            debug!(tick = self.tick_count, "tick scheduler paused");
        }
    }

    /// Resumes ticking one full tick from now, so time spent paused is
    /// not reported as elapsed ticks.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            if let Some(dur) = self.tick_duration {
                self.next_tick = Some(Instant::now() + dur);
            }
            debug!(tick = self.tick_count, "tick scheduler resumed");
        }
    }

    /// Returns `true` while ticks are suspended.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Returns `true` when the tick rate is 0 and no ticks are produced.
    pub fn is_event_driven(&self) -> bool {
        self.tick_duration.is_none()
    }

    /// Ticks delivered so far.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// The configured rate, after validation.
    pub fn tick_rate_hz(&self) -> u32 {
        self.config.tick_rate_hz
    }

    /// Time between ticks, or `None` when event-driven.
    pub fn tick_duration(&self) -> Option<Duration> {
        self.tick_duration
    }
}
