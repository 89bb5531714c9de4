//! Game sessions for gambit.
//!
//! A [`GameSession`] is created when a host opens a game, waits for a
//! guest, then runs five tasks until the game ends: an inbound and an
//! outbound relay loop per player, and one clock loop. A single quit
//! signal (a `CancellationToken`) tears all of them down.
//!
//! # Key types
//!
//! - [`GameSession`]: one game, from invitation to teardown
//! - [`SessionRegistry`]: invitation token → session
//! - [`GameState`]: lifecycle state machine
//! - [`GameOutcome`]: how a game ended
//! - [`GameConfig`]: clocks and invitation lifetime

mod config;
mod error;
mod game;
mod registry;

pub use config::{GameConfig, GameState};
pub use error::GameError;
pub use game::{GameOutcome, GameSession};
pub use registry::SessionRegistry;
