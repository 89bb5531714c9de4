//! Unified error type for gambit.

use gambit_protocol::ProtocolError;
use gambit_room::GameError;
use gambit_session::SessionError;
use gambit_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attributes let `?` convert sub-crate errors directly.
#[derive(Debug, thiserror::Error)]
pub enum GambitError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A relay-level error (closed channel, endpoint failure).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A game-level error (unknown token, game already full).
    #[error(transparent)]
    Game(#[from] GameError),
}
