//! Integration tests for the gambit server, handler, and routing over real
//! WebSocket connections.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use gambit::WsChannel;
use gambit::prelude::*;
use serde_json::{Value, json};
use tokio_tungstenite::tungstenite::Message as WsMessage;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

type Registry = Arc<SessionRegistry<WsChannel>>;

/// Starts a server on a random port and returns its address and registry.
async fn start_server() -> (String, Registry) {
    let server = GambitServerBuilder::new()
        .bind("127.0.0.1:0")
        .build()
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();
    let registry = server.registry();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    (addr, registry)
}

async fn connect(addr: &str, path: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}{path}"))
        .await
        .expect("should connect");
    ws
}

/// Next JSON payload, skipping clock status notices.
async fn next_json(ws: &mut ClientWs) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("payload within 5s")
            .expect("stream open")
            .expect("frame ok");
        let WsMessage::Text(text) = msg else {
            continue;
        };
        let value: Value =
            serde_json::from_str(text.as_str()).expect("valid JSON");
        if value.get("playerTimer").is_none() {
            return value;
        }
    }
}

/// Reads until the server closes the socket.
async fn expect_closed(ws: &mut ClientWs) {
    let closed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match ws.next().await {
                None | Some(Err(_)) | Some(Ok(WsMessage::Close(_))) => return,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "server should close the socket");
}

/// Teardown runs after the sockets see the end of the game; give it a
/// moment to release the token.
async fn wait_until_empty(registry: &Registry) {
    for _ in 0..200 {
        if registry.is_empty().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("registry still holds {:?}", registry.tokens().await);
}

async fn send_move(ws: &mut ClientWs, src: i8, dst: i8, flag: &str) {
    let text =
        json!({ "idxsrc": src, "idxdst": dst, "flag": flag }).to_string();
    ws.send(WsMessage::Text(text.into())).await.expect("send move");
}

/// Opens a game and returns the host socket and the invitation token.
async fn host(addr: &str) -> (ClientWs, String) {
    let mut ws = connect(addr, "/new-game").await;
    let invitation = next_json(&mut ws).await;
    let url = invitation["url"].as_str().expect("url field").to_string();
    let token = url
        .split_once("/?token=")
        .map(|(_, token)| token.to_string())
        .expect("token in url");
    (ws, token)
}

/// Opens a game, joins it, and consumes both start notices.
async fn started_game(
    addr: &str,
    registry: &Registry,
) -> (ClientWs, ClientWs, String) {
    let (mut white, token) = host(addr).await;
    assert_eq!(registry.tokens().await, vec![token.clone()]);
    let mut black = connect(addr, &format!("/join-game/{token}")).await;
    let white_start = json!({ "gamestart": true, "color": "White" });
    let black_start = json!({ "gamestart": true, "color": "Black" });
    assert_eq!(next_json(&mut white).await, white_start);
    assert_eq!(next_json(&mut black).await, black_start);
    (white, black, token)
}

// =========================================================================
// Routing
// =========================================================================

#[tokio::test]
async fn test_new_game_sends_invitation_with_host_and_token() {
    let (addr, registry) = start_server().await;
    let (_ws, token) = host(&addr).await;

    assert_eq!(token.len(), 32);
    assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(registry.tokens().await, vec![token]);
}

#[tokio::test]
async fn test_link_is_joinable_the_moment_it_arrives() {
    let (addr, _registry) = start_server().await;
    for _ in 0..50 {
        let (_white, token) = host(&addr).await;
        let mut black = connect(&addr, &format!("/join-game/{token}")).await;
        assert_eq!(
            next_json(&mut black).await,
            json!({ "gamestart": true, "color": "Black" })
        );
    }
}

#[tokio::test]
async fn test_invitation_url_is_built_from_host_header() {
    let (addr, _registry) = start_server().await;
    let mut ws = connect(&addr, "/new-game").await;
    let invitation = next_json(&mut ws).await;
    let url = invitation["url"].as_str().expect("url field");
    assert!(url.starts_with(&format!("{addr}/?token=")), "url was {url}");
}

#[tokio::test]
async fn test_ws_alias_opens_a_game() {
    let (addr, registry) = start_server().await;
    let mut ws = connect(&addr, "/ws").await;
    assert!(next_json(&mut ws).await.get("url").is_some());
    assert_eq!(registry.len().await, 1);
}

#[tokio::test]
async fn test_public_url_overrides_host_header() {
    let server = GambitServer::builder()
        .bind("127.0.0.1:0")
        .public_url("https://chess.example.com/")
        .build()
        .await
        .expect("server should build");
    let addr = server.local_addr().expect("addr").to_string();
    tokio::spawn(server.run());
    tokio::time::sleep(Duration::from_millis(10)).await;

    let mut ws = connect(&addr, "/new-game").await;
    let invitation = next_json(&mut ws).await;
    let url = invitation["url"].as_str().expect("url field");
    assert!(
        url.starts_with("https://chess.example.com/?token="),
        "url was {url}"
    );
}

#[tokio::test]
async fn test_unknown_token_gets_bare_404_and_changes_nothing() {
    let (addr, registry) = start_server().await;
    let (_host, token) = host(&addr).await;
    assert_eq!(registry.len().await, 1);

    let mut ws = connect(&addr, "/join-game/deadbeef").await;
    assert_eq!(next_json(&mut ws).await, json!(404));
    expect_closed(&mut ws).await;

    assert_eq!(registry.tokens().await, vec![token]);
}

#[tokio::test]
async fn test_unknown_path_gets_404() {
    let (addr, _registry) = start_server().await;
    let mut ws = connect(&addr, "/nowhere").await;
    assert_eq!(next_json(&mut ws).await, json!(404));
    expect_closed(&mut ws).await;
}

#[tokio::test]
async fn test_second_guest_gets_409() {
    let (addr, registry) = start_server().await;
    let (_white, _black, token) = started_game(&addr, &registry).await;

    let mut third = connect(&addr, &format!("/join-game/{token}")).await;
    assert_eq!(next_json(&mut third).await, json!(409));
    expect_closed(&mut third).await;
}

// =========================================================================
// Games
// =========================================================================

#[tokio::test]
async fn test_moves_are_relayed_both_ways() {
    let (addr, registry) = start_server().await;
    let (mut white, mut black, _) = started_game(&addr, &registry).await;

    send_move(&mut white, 12, 28, "none").await;
    assert_eq!(
        next_json(&mut black).await,
        json!({ "idxsrc": 12, "idxdst": 28, "flag": "none" })
    );

    send_move(&mut black, 52, 36, "none").await;
    assert_eq!(
        next_json(&mut white).await,
        json!({ "idxsrc": 52, "idxdst": 36, "flag": "none" })
    );
}

#[tokio::test]
async fn test_clock_status_is_pushed_to_both_players() {
    let (addr, registry) = start_server().await;
    let (mut white, _black, _) = started_game(&addr, &registry).await;

    let status = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if let Some(Ok(WsMessage::Text(text))) = white.next().await {
                let value: Value =
                    serde_json::from_str(text.as_str()).expect("valid JSON");
                if value.get("playerTimer").is_some() {
                    return value;
                }
            }
        }
    })
    .await
    .expect("status within 2s");

    assert!(status["playerTimer"].as_u64().expect("ms") <= 600_000);
    assert_eq!(status["opponentTimer"], json!(600_000));
}

#[tokio::test]
async fn test_abandon_ends_game_closes_both_sockets_and_clears_registry() {
    let (addr, registry) = start_server().await;
    let (mut white, mut black, _) = started_game(&addr, &registry).await;

    send_move(&mut black, 0, 0, "abandon").await;
    assert_eq!(next_json(&mut white).await["flag"], json!("abandon"));

    expect_closed(&mut white).await;
    expect_closed(&mut black).await;
    wait_until_empty(&registry).await;
}

#[tokio::test]
async fn test_host_disconnect_ends_game() {
    let (addr, registry) = start_server().await;
    let (mut white, mut black, _) = started_game(&addr, &registry).await;

    white.close(None).await.expect("close");
    expect_closed(&mut black).await;
    wait_until_empty(&registry).await;
}

#[tokio::test]
async fn test_malformed_move_is_answered_with_400() {
    let (addr, registry) = start_server().await;
    let (mut white, _black, _) = started_game(&addr, &registry).await;

    white
        .send(WsMessage::Text("not json".to_string().into()))
        .await
        .expect("send");
    assert_eq!(next_json(&mut white).await, json!(400));
    wait_until_empty(&registry).await;
}

#[tokio::test]
async fn test_run_until_shutdown_cancels_open_games() {
    let server = GambitServer::builder()
        .bind("127.0.0.1:0")
        .build()
        .await
        .expect("server should build");
    let addr = server.local_addr().expect("addr").to_string();
    let registry = server.registry();
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let running = tokio::spawn(server.run_until(async {
        let _ = stop_rx.await;
    }));
    tokio::time::sleep(Duration::from_millis(10)).await;

    let (mut ws, _token) = host(&addr).await;
    assert_eq!(registry.len().await, 1);

    stop_tx.send(()).expect("server listening");
    running.await.expect("join").expect("clean shutdown");
    assert!(registry.is_empty().await);
    expect_closed(&mut ws).await;
}
