//! Transport abstraction layer for gambit.
//!
//! Provides the [`Transport`] and [`Connection`] traits that abstract over
//! the network protocol carrying player traffic. The relay core above this
//! crate only ever sees bytes going in and out of a [`Connection`].
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::future::Future;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// What the client asked for when it opened the connection.
///
/// For WebSocket this is the HTTP upgrade request: the path selects the
/// route (`/new-game`, `/join-game/{token}`) and the `Host` header is used
/// to build invitation links.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpgradeRequest {
    /// Request path without the query string.
    pub path: String,
    /// Value of the `Host` header, if the client sent one.
    pub host: Option<String>,
}

impl UpgradeRequest {
    /// Creates a request record for `path` with no host.
    pub fn for_path(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            host: None,
        }
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    fn accept(
        &mut self,
    ) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send;
}

/// A single connection that can send and receive bytes.
///
/// The returned futures are `Send` so connection handlers can be spawned
/// onto the multi-threaded runtime while staying generic over the
/// connection type.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Sends data to the remote peer.
    fn send(
        &self,
        data: &[u8],
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Receives the next message from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, Self::Error>> + Send;

    /// Closes the connection.
    fn close(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;

    /// Returns the request the peer opened this connection with.
    fn request(&self) -> &UpgradeRequest;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new(7);
        assert_eq!(id.to_string(), "conn-7");
    }

    #[test]
    fn test_connection_id_hash_works_as_map_key() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(ConnectionId::new(1), "white");
        map.insert(ConnectionId::new(2), "black");
        assert_eq!(map[&ConnectionId::new(1)], "white");
    }

    #[test]
    fn test_upgrade_request_for_path_has_no_host() {
        let req = UpgradeRequest::for_path("/new-game");
        assert_eq!(req.path, "/new-game");
        assert!(req.host.is_none());
    }
}
