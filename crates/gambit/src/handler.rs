//! Per-connection handler: route by upgrade path, then host or join a game.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Route on the request path
//!   2. `/new-game`: send the invitation, register, run the game
//!   3. `/join-game/{token}`: seat the guest, wait for the game to end
//!   4. Close the socket

use std::sync::Arc;

use gambit_protocol::{ErrorCode, JsonCodec, Notice};
use gambit_room::{GameError, GameSession, GameState};
use gambit_session::{Endpoint, MessageChannel, generate_token};
use gambit_transport::{Connection, UpgradeRequest, WebSocketConnection};

use crate::GambitError;
use crate::server::{ServerState, WsChannel};

/// Where an upgrade request is headed.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Route<'a> {
    NewGame,
    JoinGame(&'a str),
    Unknown,
}

pub(crate) fn route(path: &str) -> Route<'_> {
    match path {
        "/new-game" | "/ws" => Route::NewGame,
        _ => match path.strip_prefix("/join-game/") {
            Some(token) if !token.is_empty() && !token.contains('/') => {
                Route::JoinGame(token)
            }
            _ => Route::Unknown,
        },
    }
}

/// The link a guest follows to join the game behind `token`.
pub(crate) fn invitation_url(
    public_url: Option<&str>,
    request: &UpgradeRequest,
    token: &str,
) -> String {
    let base = public_url.or(request.host.as_deref()).unwrap_or_default();
    format!("{base}/?token={token}")
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection(
    conn: WebSocketConnection,
    state: Arc<ServerState>,
) -> Result<(), GambitError> {
    let conn_id = conn.id();
    let request = conn.request().clone();
    tracing::debug!(%conn_id, path = %request.path, "handling new connection");

    let channel: Arc<WsChannel> =
        Arc::new(MessageChannel::new(conn, JsonCodec));
    let result = match route(&request.path) {
        Route::NewGame => host_game(&channel, &request, &state).await,
        Route::JoinGame(token) => join_game(&channel, token, &state).await,
        Route::Unknown => {
            tracing::debug!(%conn_id, path = %request.path, "unknown route");
            channel
                .send(&ErrorCode::NOT_FOUND.into())
                .await
                .map_err(GambitError::from)
        }
    };
    channel.close().await;
    result
}

async fn host_game(
    channel: &Arc<WsChannel>,
    request: &UpgradeRequest,
    state: &ServerState,
) -> Result<(), GambitError> {
    let token = generate_token();
    let session = GameSession::new(
        token.as_str(),
        Arc::clone(channel),
        state.game_config,
    );
    // Registered before the link leaves, so the link is valid on arrival.
    state.registry.create(token.as_str(), Arc::clone(&session)).await;

    let url = invitation_url(state.public_url.as_deref(), request, &token);
    if let Err(e) = channel.send(&Notice::Invitation { url }.into()).await {
        state.registry.remove(&token).await;
        return Err(e.into());
    }
    tracing::info!(%token, "invitation sent");

    session.run(&state.registry).await;
    Ok(())
}

async fn join_game(
    channel: &Arc<WsChannel>,
    token: &str,
    state: &ServerState,
) -> Result<(), GambitError> {
    let session = match state.registry.join(token, Arc::clone(channel)).await {
        Ok(session) => session,
        Err(e) => {
            let code = match e {
                GameError::NotFound(_) => {
                    tracing::error!(%token, "join for unknown token");
                    ErrorCode::NOT_FOUND
                }
                GameError::AlreadyStarted(_) | GameError::Closed(_) => {
                    tracing::warn!(%token, error = %e, "join refused");
                    ErrorCode::CONFLICT
                }
            };
            channel.send(&code.into()).await?;
            return Err(e.into());
        }
    };

    tracing::info!(%token, "guest joined");
    session.wait_for_state(GameState::Terminated).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_new_game_and_alias() {
        assert_eq!(route("/new-game"), Route::NewGame);
        assert_eq!(route("/ws"), Route::NewGame);
    }

    #[test]
    fn test_route_join_game_extracts_token() {
        assert_eq!(route("/join-game/abc123"), Route::JoinGame("abc123"));
    }

    #[test]
    fn test_route_join_game_without_token_is_unknown() {
        assert_eq!(route("/join-game/"), Route::Unknown);
        assert_eq!(route("/join-game"), Route::Unknown);
        assert_eq!(route("/join-game/a/b"), Route::Unknown);
    }

    #[test]
    fn test_route_other_paths_are_unknown() {
        assert_eq!(route("/"), Route::Unknown);
        assert_eq!(route("/index.html"), Route::Unknown);
        assert_eq!(route("/new-game/extra"), Route::Unknown);
    }

    #[test]
    fn test_invitation_url_uses_host_header() {
        let request = UpgradeRequest {
            path: "/new-game".into(),
            host: Some("localhost:8080".into()),
        };
        assert_eq!(
            invitation_url(None, &request, "ab12"),
            "localhost:8080/?token=ab12"
        );
    }

    #[test]
    fn test_invitation_url_prefers_public_url() {
        let request = UpgradeRequest {
            path: "/new-game".into(),
            host: Some("10.0.0.5:8080".into()),
        };
        assert_eq!(
            invitation_url(Some("https://chess.example.com"), &request, "ab12"),
            "https://chess.example.com/?token=ab12"
        );
    }

    #[test]
    fn test_invitation_url_without_host_is_relative() {
        let request = UpgradeRequest::for_path("/new-game");
        assert_eq!(invitation_url(None, &request, "ab12"), "/?token=ab12");
    }
}
