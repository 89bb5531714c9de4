//! `GambitServer` builder and server loop.
//!
//! This is the entry point for running a gambit server. It ties together
//! all the layers: transport → protocol → session → room.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use gambit_protocol::JsonCodec;
use gambit_room::{GameConfig, SessionRegistry};
use gambit_session::MessageChannel;
use gambit_transport::{Transport, WebSocketConnection, WebSocketTransport};

use crate::GambitError;
use crate::handler::handle_connection;

/// The endpoint type games are played over: a WebSocket speaking JSON.
pub type WsChannel = MessageChannel<WebSocketConnection, JsonCodec>;

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState {
    pub(crate) registry: Arc<SessionRegistry<WsChannel>>,
    pub(crate) game_config: GameConfig,
    pub(crate) public_url: Option<String>,
}

/// Builder for configuring and starting a gambit server.
///
/// # Example
///
/// ```rust,ignore
/// use gambit::prelude::*;
///
/// let server = GambitServer::builder()
///     .bind("0.0.0.0:8080")
///     .public_url("https://chess.example.com")
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct GambitServerBuilder {
    bind_addr: String,
    public_url: Option<String>,
    game_config: GameConfig,
}

impl GambitServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            public_url: None,
            game_config: GameConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the base invitation links are built on.
    ///
    /// Without one, the `Host` header of the host's upgrade request is used.
    pub fn public_url(mut self, url: impl Into<String>) -> Self {
        self.public_url = Some(url.into().trim_end_matches('/').to_string());
        self
    }

    /// Sets the per-game configuration.
    pub fn game_config(mut self, config: GameConfig) -> Self {
        self.game_config = config;
        self
    }

    /// Binds the listener and builds the server.
    pub async fn build(self) -> Result<GambitServer, GambitError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            registry: Arc::new(SessionRegistry::new()),
            game_config: self.game_config.validated(),
            public_url: self.public_url,
        });

        Ok(GambitServer { transport, state })
    }
}

impl Default for GambitServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound gambit server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct GambitServer {
    transport: WebSocketTransport,
    state: Arc<ServerState>,
}

impl GambitServer {
    /// Creates a new builder.
    pub fn builder() -> GambitServerBuilder {
        GambitServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// The registry of open and running games.
    pub fn registry(&self) -> Arc<SessionRegistry<WsChannel>> {
        Arc::clone(&self.state.registry)
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), GambitError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` resolves, then cancels every
    /// registered game.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), GambitError> {
        tracing::info!("gambit server running");
        tokio::pin!(shutdown);

        loop {
            let accepted = tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.transport.accept() => accepted,
            };
            match accepted {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }

        let tokens = self.state.registry.tokens().await;
        tracing::info!(games = tokens.len(), "shutting down");
        for token in tokens {
            self.state.registry.remove(&token).await;
        }
        Ok(())
    }
}
