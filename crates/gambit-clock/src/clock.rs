//! Countdown clocks and the alternating pair.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use gambit_protocol::Color;

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Result of advancing a single clock by one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The clock is stopped; nothing changed.
    Idle,
    /// The clock is running and still has time left.
    Running,
    /// This tick took the clock to zero. The clock stopped itself.
    Exhausted,
}

/// A single countdown timer.
///
/// `remaining` only decreases while `running`, and floors at zero. A clock
/// that hits zero stops, so [`TickOutcome::Exhausted`] is reported once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clock {
    remaining: Duration,
    running: bool,
}

impl Clock {
    /// Creates a stopped clock with `initial` on it.
    pub fn new(initial: Duration) -> Self {
        Self {
            remaining: initial,
            running: false,
        }
    }

    /// Starts the clock. An exhausted clock stays stopped.
    pub fn start(&mut self) {
        self.running = !self.remaining.is_zero();
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining.is_zero()
    }

    /// Charges `dt` to the clock if it is running.
    pub fn tick(&mut self, dt: Duration) -> TickOutcome {
        if !self.running {
            return TickOutcome::Idle;
        }
        self.remaining = self.remaining.saturating_sub(dt);
        if self.remaining.is_zero() {
            self.running = false;
            TickOutcome::Exhausted
        } else {
            TickOutcome::Running
        }
    }
}

// ---------------------------------------------------------------------------
// ChessClock
// ---------------------------------------------------------------------------

/// Point-in-time view of both clocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockSnapshot {
    pub white: Duration,
    pub black: Duration,
    /// Whose clock is running, if anyone's.
    pub running: Option<Color>,
}

impl ClockSnapshot {
    /// Remaining time for `color`.
    pub fn remaining(&self, color: Color) -> Duration {
        match color {
            Color::White => self.white,
            Color::Black => self.black,
        }
    }

    /// `(own, opponent)` remaining time as seen by `color`.
    pub fn perspective(&self, color: Color) -> (Duration, Duration) {
        (self.remaining(color), self.remaining(color.opponent()))
    }
}

/// The two clocks of one game.
///
/// Both clocks sit behind a single mutex, so every transition that touches
/// the pair (start one, stop the other) is atomic and no observer can ever
/// see both running. The lock is never held across an `.await`.
#[derive(Debug)]
pub struct ChessClock {
    clocks: Mutex<[Clock; 2]>,
}

fn slot(color: Color) -> usize {
    match color {
        Color::White => 0,
        Color::Black => 1,
    }
}

impl ChessClock {
    /// Creates two stopped clocks with `initial` each.
    pub fn new(initial: Duration) -> Self {
        Self {
            clocks: Mutex::new([Clock::new(initial); 2]),
        }
    }

    fn lock(&self) -> MutexGuard<'_, [Clock; 2]> {
        // No critical section can leave the pair inconsistent.
        self.clocks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts `color`'s clock and stops the other one.
    pub fn start(&self, color: Color) {
        let mut clocks = self.lock();
        clocks[slot(color.opponent())].stop();
        clocks[slot(color)].start();
        tracing::trace!(%color, "clock started");
    }

    /// `from` just moved: stop its clock and start the opponent's.
    ///
    /// A move made after `from`'s clock ran out changes nothing. Returns
    /// `true` if the clock was handed over.
    pub fn hand_over(&self, from: Color) -> bool {
        let mut clocks = self.lock();
        if clocks[slot(from)].is_exhausted() {
            return false;
        }
        clocks[slot(from)].stop();
        clocks[slot(from.opponent())].start();
        tracing::trace!(%from, "clock handed over");
        true
    }

    pub fn stop_all(&self) {
        let mut clocks = self.lock();
        clocks.iter_mut().for_each(Clock::stop);
    }

    /// Charges `dt` to whichever clock is running.
    ///
    /// Returns the colour whose clock this tick exhausted, if any.
    pub fn tick(&self, dt: Duration) -> Option<Color> {
        let mut clocks = self.lock();
        for color in [Color::White, Color::Black] {
            if clocks[slot(color)].tick(dt) == TickOutcome::Exhausted {
                return Some(color);
            }
        }
        None
    }

    /// Whose clock is running, if anyone's.
    pub fn running(&self) -> Option<Color> {
        self.snapshot().running
    }

    pub fn remaining(&self, color: Color) -> Duration {
        self.lock()[slot(color)].remaining()
    }

    pub fn snapshot(&self) -> ClockSnapshot {
        let clocks = self.lock();
        let running = [Color::White, Color::Black]
            .into_iter()
            .find(|c| clocks[slot(*c)].is_running());
        ClockSnapshot {
            white: clocks[0].remaining(),
            black: clocks[1].remaining(),
            running,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    // =====================================================================
    // Clock
    // =====================================================================

    #[test]
    fn test_clock_new_is_stopped() {
        let clock = Clock::new(ms(100));
        assert!(!clock.is_running());
        assert_eq!(clock.remaining(), ms(100));
    }

    #[test]
    fn test_clock_tick_while_stopped_is_idle() {
        let mut clock = Clock::new(ms(100));
        assert_eq!(clock.tick(ms(10)), TickOutcome::Idle);
        assert_eq!(clock.remaining(), ms(100));
    }

    #[test]
    fn test_clock_tick_while_running_decrements() {
        let mut clock = Clock::new(ms(100));
        clock.start();
        assert_eq!(clock.tick(ms(10)), TickOutcome::Running);
        assert_eq!(clock.remaining(), ms(90));
    }

    #[test]
    fn test_clock_tick_floors_at_zero_and_stops() {
        let mut clock = Clock::new(ms(15));
        clock.start();
        assert_eq!(clock.tick(ms(10)), TickOutcome::Running);
        assert_eq!(clock.tick(ms(10)), TickOutcome::Exhausted);
        assert_eq!(clock.remaining(), Duration::ZERO);
        assert!(!clock.is_running());
        // Exhaustion is reported once.
        assert_eq!(clock.tick(ms(10)), TickOutcome::Idle);
    }

    #[test]
    fn test_clock_start_when_exhausted_stays_stopped() {
        let mut clock = Clock::new(Duration::ZERO);
        clock.start();
        assert!(!clock.is_running());
        assert!(clock.is_exhausted());
    }

    // =====================================================================
    // ChessClock
    // =====================================================================

    #[test]
    fn test_chess_clock_new_has_nothing_running() {
        let clocks = ChessClock::new(ms(1000));
        assert_eq!(clocks.running(), None);
    }

    #[test]
    fn test_chess_clock_start_stops_the_other_side() {
        let clocks = ChessClock::new(ms(1000));
        clocks.start(Color::White);
        assert_eq!(clocks.running(), Some(Color::White));
        clocks.start(Color::Black);
        assert_eq!(clocks.running(), Some(Color::Black));
    }

    #[test]
    fn test_chess_clock_hand_over_alternates() {
        let clocks = ChessClock::new(ms(1000));
        clocks.start(Color::White);
        clocks.hand_over(Color::White);
        assert_eq!(clocks.running(), Some(Color::Black));
        clocks.hand_over(Color::Black);
        assert_eq!(clocks.running(), Some(Color::White));
    }

    #[test]
    fn test_chess_clock_hand_over_after_flag_fall_is_ignored() {
        let clocks = ChessClock::new(ms(100));
        clocks.start(Color::White);
        assert_eq!(clocks.tick(ms(150)), Some(Color::White));
        clocks.stop_all();

        assert!(!clocks.hand_over(Color::White));
        assert_eq!(clocks.running(), None);
        assert_eq!(clocks.remaining(Color::Black), ms(100));
    }

    #[test]
    fn test_chess_clock_tick_only_touches_running_side() {
        let clocks = ChessClock::new(ms(1000));
        clocks.start(Color::White);
        clocks.tick(ms(100));
        assert_eq!(clocks.remaining(Color::White), ms(900));
        assert_eq!(clocks.remaining(Color::Black), ms(1000));

        clocks.hand_over(Color::White);
        clocks.tick(ms(250));
        assert_eq!(clocks.remaining(Color::White), ms(900));
        assert_eq!(clocks.remaining(Color::Black), ms(750));
    }

    #[test]
    fn test_chess_clock_tick_reports_exhausted_color() {
        let clocks = ChessClock::new(ms(30));
        clocks.start(Color::Black);
        assert_eq!(clocks.tick(ms(20)), None);
        assert_eq!(clocks.tick(ms(20)), Some(Color::Black));
        assert_eq!(clocks.running(), None);
        assert_eq!(clocks.tick(ms(20)), None);
    }

    #[test]
    fn test_chess_clock_never_runs_both_under_any_sequence() {
        let clocks = ChessClock::new(ms(500));
        // Walk a deterministic pseudo-random sequence of operations.
        let mut seed = 17u32;
        for _ in 0..500 {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            match (seed >> 16) % 5 {
                0 => clocks.start(Color::White),
                1 => {
                    clocks.hand_over(Color::White);
                }
                2 => {
                    clocks.hand_over(Color::Black);
                }
                3 => {
                    clocks.tick(ms(7));
                }
                _ => clocks.stop_all(),
            }
            let snap = clocks.snapshot();
            let guard = clocks.lock();
            let running = guard.iter().filter(|c| c.is_running()).count();
            assert!(running <= 1, "both clocks running: {snap:?}");
        }
    }

    #[test]
    fn test_snapshot_perspective_is_mirrored() {
        let clocks = ChessClock::new(ms(1000));
        clocks.start(Color::White);
        clocks.tick(ms(400));
        let snap = clocks.snapshot();
        assert_eq!(snap.perspective(Color::White), (ms(600), ms(1000)));
        assert_eq!(snap.perspective(Color::Black), (ms(1000), ms(600)));
        assert_eq!(snap.running, Some(Color::White));
    }
}
