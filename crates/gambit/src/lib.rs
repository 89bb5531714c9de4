//! # Gambit
//!
//! Pairs two players into a live chess game over WebSockets, relays their
//! moves, and runs the alternating game clocks.
//!
//! A host connects to `/new-game` and receives an invitation URL carrying
//! a token; a guest connects to `/join-game/{token}`. From then on the
//! server never looks at the board: it forwards each move verbatim, hands
//! the clock over on every move, and ends the game on the first terminal
//! flag (checkmate, resignation, accepted draw, timeout, ...).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gambit::prelude::*;
//!
//! # async fn start() -> Result<(), GambitError> {
//! let server = GambitServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::GambitError;
pub use server::{GambitServer, GambitServerBuilder, WsChannel};

/// Installs a `tracing` subscriber that honours `RUST_LOG`, falling back
/// to `info` for everything.
///
/// Safe to call more than once; only the first call installs anything.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Convenience re-exports.
pub mod prelude {
    pub use crate::{
        GambitError, GambitServer, GambitServerBuilder, init_tracing,
    };
    pub use gambit_clock::ClockConfig;
    pub use gambit_protocol::{
        Color, ErrorCode, Flag, Message, Notice, Outbound,
    };
    pub use gambit_room::{
        GameConfig, GameOutcome, GameSession, GameState, SessionRegistry,
    };
    pub use gambit_session::{Endpoint, generate_token};
}
