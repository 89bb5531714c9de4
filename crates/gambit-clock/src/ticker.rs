//! Fixed-period tick source.
//!
//! A late wake-up never produces a burst of catch-up ticks: the next
//! deadline is always scheduled from the moment the tick actually fired,
//! and [`TickInfo::elapsed`] reports the real time since the previous
//! tick so the clock is charged for every millisecond that passed.

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{trace, warn};

/// Information about a fired tick, returned by [`Ticker::wait_for_tick`].
#[derive(Debug, Clone)]
pub struct TickInfo {
    /// Monotonically increasing tick number (starts at 1).
    pub tick: u64,
    /// `true` if this tick fired more than 10% late.
    pub overrun: bool,
    /// Whole periods missed because of the late wake-up.
    pub ticks_skipped: u64,
    elapsed: Duration,
}

impl TickInfo {
    /// Time actually elapsed since the previous tick (or since the ticker
    /// was created, for the first one).
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

/// Drives one game's clock loop.
pub struct Ticker {
    period: Duration,
    tick_count: u64,
    last_tick: Instant,
    next_tick: Instant,
    total_overruns: u64,
}

impl Ticker {
    /// Creates a ticker whose first tick fires one `period` from now.
    pub fn new(period: Duration) -> Self {
        let period = period.max(Duration::from_millis(1));
        let now = Instant::now();
        Self {
            period,
            tick_count: 0,
            last_tick: now,
            next_tick: now + period,
            total_overruns: 0,
        }
    }

    /// Wait until the next tick is due.
    ///
    /// Cancel-safe: if the future is dropped before the deadline nothing
    /// is consumed, so it can sit in a `tokio::select!` next to a quit
    /// signal.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let next = self.next_tick;
        time::sleep_until(next).await;

        let now = Instant::now();
        self.tick_count += 1;

        let late_by = now.saturating_duration_since(next);
        let overrun = late_by > self.period / 10;
        let mut ticks_skipped = 0u64;
        if overrun {
            self.total_overruns += 1;
            ticks_skipped =
                (late_by.as_nanos() / self.period.as_nanos()) as u64;
            if ticks_skipped > 0 {
                warn!(
                    tick = self.tick_count,
                    skipped = ticks_skipped,
                    late_ms = late_by.as_secs_f64() * 1000.0,
                    "tick overrun: skipping ahead"
                );
            }
        }

        let elapsed = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;
        self.next_tick = now + self.period;

        trace!(tick = self.tick_count, overrun, "tick fired");

        TickInfo {
            tick: self.tick_count,
            overrun,
            ticks_skipped,
            elapsed,
        }
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Number of ticks that fired late.
    pub fn total_overruns(&self) -> u64 {
        self.total_overruns
    }
}
