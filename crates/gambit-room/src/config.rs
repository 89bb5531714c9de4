//! Game configuration and state machine.

use std::fmt;
use std::time::Duration;

use gambit_clock::ClockConfig;

// ---------------------------------------------------------------------------
// GameConfig
// ---------------------------------------------------------------------------

/// Configuration shared by every game a server hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameConfig {
    /// Time control and clock loop periods.
    pub clock: ClockConfig,

    /// How long an open invitation waits for a guest before the game is
    /// dropped. Default: 5 minutes.
    pub invitation_ttl: Duration,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            clock: ClockConfig::default(),
            invitation_ttl: Duration::from_secs(5 * 60),
        }
    }
}

impl GameConfig {
    /// Clamps the clock settings; see [`ClockConfig::validated`].
    pub fn validated(mut self) -> Self {
        self.clock = self.clock.validated();
        self
    }
}

// ---------------------------------------------------------------------------
// GameState
// ---------------------------------------------------------------------------

/// The lifecycle state of a game.
///
/// Transitions only move forward, and `Waiting` may skip straight to
/// `Terminating` when the invitation expires:
///
/// ```text
/// Waiting → Active → Terminating → Terminated
///    └──────────────────↗
/// ```
///
/// - **Waiting**: the host is connected; the token is open for a guest.
/// - **Active**: both players are relaying and a clock is running.
/// - **Terminating**: the quit signal fired; loops are unwinding.
/// - **Terminated**: every task has returned, the clocks are stopped and
///   the token is gone from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GameState {
    Waiting,
    Active,
    Terminating,
    Terminated,
}

impl GameState {
    /// Returns `true` once the quit signal has fired.
    pub fn is_shutting_down(self) -> bool {
        self >= Self::Terminating
    }

    /// Returns `true` if moving to `target` goes forward.
    pub fn can_transition_to(self, target: Self) -> bool {
        target > self
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "Waiting"),
            Self::Active => write!(f, "Active"),
            Self::Terminating => write!(f, "Terminating"),
            Self::Terminated => write!(f, "Terminated"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_invitation_ttl_is_five_minutes() {
        let config = GameConfig::default();
        assert_eq!(config.invitation_ttl, Duration::from_secs(300));
    }

    #[test]
    fn test_state_transitions_only_move_forward() {
        assert!(GameState::Waiting.can_transition_to(GameState::Active));
        assert!(GameState::Waiting.can_transition_to(GameState::Terminating));
        assert!(GameState::Active.can_transition_to(GameState::Terminated));
        assert!(!GameState::Terminating.can_transition_to(GameState::Active));
        let done = GameState::Terminated;
        assert!(!done.can_transition_to(GameState::Terminated));
    }

    #[test]
    fn test_state_predicates() {
        assert!(!GameState::Waiting.is_shutting_down());
        assert!(!GameState::Active.is_shutting_down());
        assert!(GameState::Terminating.is_shutting_down());
        assert!(GameState::Terminated.is_shutting_down());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(GameState::Terminating.to_string(), "Terminating");
    }
}
