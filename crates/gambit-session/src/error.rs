//! Error types for the session layer.

use gambit_protocol::ProtocolError;

/// Errors raised by an [`Endpoint`](crate::Endpoint) or a mailbox.
///
/// Every variant is fatal to the relay loop that sees it; nothing here is
/// retried.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The peer closed the channel in an orderly way, or the channel was
    /// already closed when we tried to use it.
    #[error("channel closed")]
    ChannelClosed,

    /// The underlying connection failed.
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A payload could not be encoded or decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl SessionError {
    /// Wraps any transport-level error.
    pub fn transport(
        err: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transport(Box::new(err))
    }

    /// `true` for an orderly close, as opposed to a failure.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::ChannelClosed)
    }
}
