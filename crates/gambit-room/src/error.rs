//! Error types for the room layer.

/// Errors that can occur when joining a game.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// No game is registered under the token.
    #[error("no game for token {0}")]
    NotFound(String),

    /// The game already has its second player.
    #[error("game {0} already has two players")]
    AlreadyStarted(String),

    /// The game is shutting down or its invitation expired.
    #[error("game {0} is closed")]
    Closed(String),
}
