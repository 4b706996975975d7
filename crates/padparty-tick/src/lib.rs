//! Fixed-timestep tick scheduler for Padparty.
//!
//! Drives one room's simulation at a fixed rate, decoupled from the
//! arrival of network events. Snake and soccer rooms tick continuously;
//! a room with no game selected runs in event-driven mode (rate 0), where
//! [`TickScheduler::wait_for_tick`] pends forever.
//!
//! # Integration
//!
//! The scheduler sits inside the host runtime's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(event) = inbox.recv() => { /* feed the engine */ }
//!         tick = scheduler.wait_for_tick() => {
//!             let notes = engine.tick(tick.dt);
//!         }
//!     }
//! }
//! ```
//!
//! # Overruns
//!
//! When a tick fires late (slow engine, starved executor), the missed
//! ticks are skipped and the next deadline is rescheduled from *now* —
//! a room that falls behind slows down instead of spiraling into an
//! ever-growing catch-up burst.

use std::time::Duration;

use rand::Rng;
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

/// Configuration for the tick scheduler.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Tick rate in Hz. 0 = event-driven (tick never fires).
    pub tick_rate_hz: u32,
    /// Random jitter (0–max µs) added to the *first* tick to
    /// desynchronize rooms created at the same instant.
    pub initial_jitter_us: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 0,
            initial_jitter_us: 2_000, // 0–2 ms default jitter
        }
    }
}

impl TickConfig {
    /// Maximum supported tick rate.
    pub const MAX_TICK_RATE_HZ: u32 = 128;

    /// Config for a specific tick rate with default jitter.
    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self {
            tick_rate_hz,
            ..Default::default()
        }
    }

    /// Clamps out-of-range values so the config is safe to use.
    pub fn validated(mut self) -> Self {
        if self.tick_rate_hz > Self::MAX_TICK_RATE_HZ {
            warn!(
                rate = self.tick_rate_hz,
                max = Self::MAX_TICK_RATE_HZ,
                "tick_rate_hz exceeds maximum — clamping"
            );
            self.tick_rate_hz = Self::MAX_TICK_RATE_HZ;
        }
        self
    }

    /// Duration of a single tick. `None` in event-driven mode.
    pub fn tick_duration(&self) -> Option<Duration> {
        if self.tick_rate_hz == 0 {
            None
        } else {
            Some(Duration::from_secs_f64(1.0 / self.tick_rate_hz as f64))
        }
    }
}

/// Information about a fired tick, returned by [`TickScheduler::wait_for_tick`].
#[derive(Debug, Clone)]
pub struct TickInfo {
    /// Monotonically increasing tick number (starts at 1).
    pub tick: u64,
    /// Fixed delta time for this tick (always `1 / tick_rate`). Engines
    /// use this, not wall-clock elapsed time, so simulation stays
    /// deterministic under scheduling noise.
    pub dt: Duration,
    /// `true` if this tick fired noticeably late.
    pub overrun: bool,
    /// How many ticks were skipped because of the overrun.
    pub ticks_skipped: u64,
}

/// Fixed-timestep tick scheduler. One per active room.
pub struct TickScheduler {
    config: TickConfig,
    tick_duration: Option<Duration>,
    tick_count: u64,
    /// When the next tick should fire.
    next_tick: Option<TokioInstant>,
    paused: bool,
}

impl TickScheduler {
    /// Creates a scheduler, scheduling the first tick with jitter.
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        let tick_duration = config.tick_duration();

        let next_tick = tick_duration.map(|d| {
            let jitter = if config.initial_jitter_us > 0 {
                let us = rand::rng().random_range(0..config.initial_jitter_us);
                Duration::from_micros(us)
            } else {
                Duration::ZERO
            };
            TokioInstant::now() + d + jitter
        });

        if config.tick_rate_hz == 0 {
            debug!("tick scheduler created in event-driven mode");
        } else {
            debug!(rate_hz = config.tick_rate_hz, "tick scheduler created");
        }

        Self {
            config,
            tick_duration,
            tick_count: 0,
            next_tick,
            paused: false,
        }
    }

    /// Creates a scheduler for a specific tick rate with default settings.
    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self::new(TickConfig::with_rate(tick_rate_hz))
    }

    /// Waits until the next tick is due.
    ///
    /// In event-driven mode or while paused this future pends forever —
    /// it never resolves on its own, but `tokio::select!` still services
    /// the other branches.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let (next, tick_dur) = match (self.next_tick, self.tick_duration) {
            (Some(next), Some(dur)) if !self.paused => (next, dur),
            _ => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        };

        time::sleep_until(next).await;

        let now = TokioInstant::now();
        self.tick_count += 1;

        // >10% late counts as an overrun.
        let late_by = now.saturating_duration_since(next);
        let overrun = late_by > tick_dur / 10;
        let mut ticks_skipped = 0u64;

        if overrun {
            ticks_skipped =
                late_by.as_nanos() as u64 / tick_dur.as_nanos() as u64;
            if ticks_skipped > 0 {
                warn!(
                    tick = self.tick_count,
                    skipped = ticks_skipped,
                    late_ms = late_by.as_secs_f64() * 1000.0,
                    "tick overrun — skipping ahead"
                );
            }
            // Reschedule from now, not from the missed deadline.
            self.next_tick = Some(now + tick_dur);
        } else {
            self.next_tick = Some(next + tick_dur);
        }

        trace!(tick = self.tick_count, overrun, "tick fired");

        TickInfo {
            tick: self.tick_count,
            dt: tick_dur,
            overrun,
            ticks_skipped,
        }
    }

    /// Pauses the tick loop; `wait_for_tick` pends until [`resume`](Self::resume).
    /// Idempotent.
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            debug!(tick = self.tick_count, "tick scheduler paused");
        }
    }

    /// Resumes after a pause.
    ///
    /// The next deadline is reset to `now + tick_duration` so time spent
    /// paused doesn't turn into a burst of catch-up ticks.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            if let Some(dur) = self.tick_duration {
                self.next_tick = Some(TokioInstant::now() + dur);
            }
            debug!(tick = self.tick_count, "tick scheduler resumed");
        }
    }

    /// Whether the scheduler is currently paused.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Whether this scheduler is in event-driven mode (rate 0).
    pub fn is_event_driven(&self) -> bool {
        self.tick_duration.is_none()
    }

    /// Ticks fired so far.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// The configured tick rate in Hz.
    pub fn tick_rate_hz(&self) -> u32 {
        self.config.tick_rate_hz
    }

    /// The fixed tick duration, or `None` in event-driven mode.
    pub fn tick_duration(&self) -> Option<Duration> {
        self.tick_duration
    }
}
