//! Time control and loop periods.

use std::time::Duration;

use tracing::warn;

/// Configuration for a game's clocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockConfig {
    /// Time each player starts with. Default: 10 minutes.
    pub initial_time: Duration,
    /// How often the running clock is charged. Default: 10 ms.
    pub tick_period: Duration,
    /// How often both players are sent the remaining times. Default: 200 ms.
    pub status_interval: Duration,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            initial_time: Duration::from_secs(10 * 60),
            tick_period: Duration::from_millis(10),
            status_interval: Duration::from_millis(200),
        }
    }
}

impl ClockConfig {
    /// Shortest accepted tick period.
    pub const MIN_TICK_PERIOD: Duration = Duration::from_millis(1);

    /// Config with the given starting time and default periods.
    pub fn with_initial_time(initial_time: Duration) -> Self {
        Self {
            initial_time,
            ..Default::default()
        }
    }

    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// - `tick_period` is raised to [`Self::MIN_TICK_PERIOD`].
    /// - `status_interval` is raised to `tick_period`.
    pub fn validated(mut self) -> Self {
        if self.tick_period < Self::MIN_TICK_PERIOD {
            warn!(
                tick_period = ?self.tick_period,
                "tick_period below minimum: clamping"
            );
            self.tick_period = Self::MIN_TICK_PERIOD;
        }
        if self.status_interval < self.tick_period {
            self.status_interval = self.tick_period;
        }
        self
    }
}
