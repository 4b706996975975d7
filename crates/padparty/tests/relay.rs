//! Integration tests for the signaling relay over real WebSockets.
//!
//! Each test starts a relay on a random port and speaks the wire
//! protocol with raw `tokio-tungstenite` clients, the way browser hosts
//! and controllers do.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use padparty::RelayServerBuilder;
use padparty_protocol::{
    ClientEvent, ConnectionId, GameId, Input, RoomCode, ServerEvent,
};
use tokio_tungstenite::tungstenite::Message;

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Starts a relay on a random port and returns its address.
async fn start_relay() -> String {
    let server = RelayServerBuilder::new()
        .bind("127.0.0.1:0")
        .build()
        .await
        .expect("relay should bind");
    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    addr
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send(ws: &mut ClientWs, event: &ClientEvent) {
    let bytes = serde_json::to_vec(event).expect("encode");
    ws.send(Message::Binary(bytes.into())).await.expect("send");
}

/// Receives the next server event, failing the test after 2 seconds.
async fn recv(ws: &mut ClientWs) -> ServerEvent {
    let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("timed out waiting for server event")
        .expect("stream ended")
        .expect("websocket error");
    serde_json::from_slice(&msg.into_data()).expect("decode server event")
}

/// Host connects and creates a room; returns (host socket, room code).
async fn create_room(addr: &str) -> (ClientWs, RoomCode) {
    let mut host = connect(addr).await;
    send(&mut host, &ClientEvent::CreateRoom).await;
    match recv(&mut host).await {
        ServerEvent::RoomCreated { code } => (host, code),
        other => panic!("expected RoomCreated, got {other:?}"),
    }
}

/// Controller connects and joins; returns (socket, its id as seen by the
/// host, which consumes the host's PLAYER_JOINED).
async fn join(
    addr: &str,
    host: &mut ClientWs,
    code: RoomCode,
    nickname: &str,
) -> (ClientWs, ConnectionId) {
    let mut player = connect(addr).await;
    send(
        &mut player,
        &ClientEvent::JoinRoom {
            code,
            nickname: nickname.to_string(),
        },
    )
    .await;

    let id = match recv(host).await {
        ServerEvent::PlayerJoined { id, nickname: n } => {
            assert_eq!(n, nickname);
            id
        }
        other => panic!("expected PlayerJoined, got {other:?}"),
    };
    match recv(&mut player).await {
        ServerEvent::JoinSuccess {
            code: joined,
            nickname: n,
            ..
        } => {
            assert_eq!(joined, code);
            assert_eq!(n, nickname);
        }
        other => panic!("expected JoinSuccess, got {other:?}"),
    }
    (player, id)
}

#[tokio::test]
async fn test_created_codes_are_wellformed_and_distinct() {
    let addr = start_relay().await;
    let (_host_a, code_a) = create_room(&addr).await;
    let (_host_b, code_b) = create_room(&addr).await;

    assert_ne!(code_a, code_b);
    for code in [code_a, code_b] {
        assert_eq!(code.as_str().len(), 4);
        assert!(code.as_str().bytes().all(|b| b.is_ascii_uppercase()));
    }
}

#[tokio::test]
async fn test_join_notifies_host_and_joiner() {
    let addr = start_relay().await;
    let (mut host, code) = create_room(&addr).await;
    // `join` itself asserts both notifications land.
    let _ = join(&addr, &mut host, code, "Ann").await;
}

#[tokio::test]
async fn test_join_unknown_code_yields_error() {
    let addr = start_relay().await;
    let mut player = connect(&addr).await;
    send(
        &mut player,
        &ClientEvent::JoinRoom {
            code: "ZZZZ".parse().unwrap(),
            nickname: "Ann".into(),
        },
    )
    .await;

    match recv(&mut player).await {
        ServerEvent::Error { message } => {
            assert_eq!(message, "Invalid Room Code");
        }
        other => panic!("expected Error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_player_list_preserves_join_order() {
    let addr = start_relay().await;
    let (mut host, code) = create_room(&addr).await;
    let (_ann, ann_id) = join(&addr, &mut host, code, "Ann").await;
    let (_bob, bob_id) = join(&addr, &mut host, code, "Bob").await;

    send(&mut host, &ClientEvent::GetPlayers { room_code: code }).await;
    match recv(&mut host).await {
        ServerEvent::PlayerList { players } => {
            let ids: Vec<ConnectionId> =
                players.iter().map(|p| p.id).collect();
            assert_eq!(ids, vec![ann_id, bob_id]);
            assert_eq!(players[0].nickname, "Ann");
            assert_eq!(players[1].nickname, "Bob");
        }
        other => panic!("expected PlayerList, got {other:?}"),
    }
}

#[tokio::test]
async fn test_select_game_broadcasts_to_the_room() {
    let addr = start_relay().await;
    let (mut host, code) = create_room(&addr).await;
    let (mut ann, _) = join(&addr, &mut host, code, "Ann").await;

    send(
        &mut host,
        &ClientEvent::SelectGame {
            room_code: code,
            game_id: GameId::Snake,
        },
    )
    .await;

    for ws in [&mut host, &mut ann] {
        match recv(ws).await {
            ServerEvent::GameChanged { game_id } => {
                assert_eq!(game_id, GameId::Snake);
            }
            other => panic!("expected GameChanged, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_game_state_defaults_to_soccer() {
    let addr = start_relay().await;
    let (mut host, code) = create_room(&addr).await;
    let (mut ann, _) = join(&addr, &mut host, code, "Ann").await;

    send(&mut ann, &ClientEvent::GetGameState { room_code: code }).await;
    match recv(&mut ann).await {
        ServerEvent::GameState { game_id } => {
            assert_eq!(game_id, GameId::Soccer);
        }
        other => panic!("expected GameState, got {other:?}"),
    }
}

#[tokio::test]
async fn test_game_state_for_unknown_room_is_an_error() {
    let addr = start_relay().await;
    let mut ws = connect(&addr).await;
    send(
        &mut ws,
        &ClientEvent::GetGameState {
            room_code: "ZZZZ".parse().unwrap(),
        },
    )
    .await;
    assert!(matches!(recv(&mut ws).await, ServerEvent::Error { .. }));
}

#[tokio::test]
async fn test_input_is_forwarded_to_the_host_with_sender_id() {
    let addr = start_relay().await;
    let (mut host, code) = create_room(&addr).await;
    let (mut ann, ann_id) = join(&addr, &mut host, code, "Ann").await;

    let input = Input::Joystick { x: 0.5, y: -1.0 };
    send(
        &mut ann,
        &ClientEvent::Input {
            room_code: code,
            data: input.encode(),
        },
    )
    .await;

    match recv(&mut host).await {
        ServerEvent::Input { player_id, data } => {
            assert_eq!(player_id, ann_id);
            assert_eq!(data.decode().unwrap(), input);
        }
        other => panic!("expected Input, got {other:?}"),
    }
}

#[tokio::test]
async fn test_signals_are_routed_by_target() {
    let addr = start_relay().await;
    let (mut host, code) = create_room(&addr).await;
    let (mut ann, ann_id) = join(&addr, &mut host, code, "Ann").await;

    // Host → player (the offer direction).
    send(
        &mut host,
        &ClientEvent::Signal {
            target: ann_id,
            signal: vec![1, 2, 3],
        },
    )
    .await;
    let host_id = match recv(&mut ann).await {
        ServerEvent::Signal { from, signal } => {
            assert_eq!(signal, vec![1, 2, 3]);
            from
        }
        other => panic!("expected Signal, got {other:?}"),
    };

    // Player → host (the answer direction).
    send(
        &mut ann,
        &ClientEvent::Signal {
            target: host_id,
            signal: vec![4, 5],
        },
    )
    .await;
    match recv(&mut host).await {
        ServerEvent::Signal { from, signal } => {
            assert_eq!(from, ann_id);
            assert_eq!(signal, vec![4, 5]);
        }
        other => panic!("expected Signal, got {other:?}"),
    }
}

#[tokio::test]
async fn test_power_shot_status_reaches_the_player() {
    let addr = start_relay().await;
    let (mut host, code) = create_room(&addr).await;
    let (mut ann, ann_id) = join(&addr, &mut host, code, "Ann").await;

    send(
        &mut host,
        &ClientEvent::PowerShotStatus {
            room_code: code,
            player_id: ann_id,
            available: true,
        },
    )
    .await;

    match recv(&mut ann).await {
        ServerEvent::PowerShotStatus { available } => assert!(available),
        other => panic!("expected PowerShotStatus, got {other:?}"),
    }
}

#[tokio::test]
async fn test_host_disconnect_destroys_the_room() {
    let addr = start_relay().await;
    let (mut host, code) = create_room(&addr).await;
    let (mut ann, _) = join(&addr, &mut host, code, "Ann").await;

    drop(host);

    match recv(&mut ann).await {
        ServerEvent::RoomClosed => {}
        other => panic!("expected RoomClosed, got {other:?}"),
    }

    // No player remains mapped to the removed code: a fresh join of the
    // same code is a clean not-found, not a partial join.
    let mut late = connect(&addr).await;
    send(
        &mut late,
        &ClientEvent::JoinRoom {
            code,
            nickname: "Late".into(),
        },
    )
    .await;
    assert!(matches!(recv(&mut late).await, ServerEvent::Error { .. }));
}

#[tokio::test]
async fn test_player_disconnect_notifies_only_the_host() {
    let addr = start_relay().await;
    let (mut host, code) = create_room(&addr).await;
    let (ann, ann_id) = join(&addr, &mut host, code, "Ann").await;

    drop(ann);

    match recv(&mut host).await {
        ServerEvent::PlayerLeft { id } => assert_eq!(id, ann_id),
        other => panic!("expected PlayerLeft, got {other:?}"),
    }

    // The room survives a player leaving: a new join still works.
    let _ = join(&addr, &mut host, code, "Bob").await;
}

#[tokio::test]
async fn test_malformed_frames_are_dropped_not_fatal() {
    let addr = start_relay().await;
    let (mut host, code) = create_room(&addr).await;

    // Garbage, then valid JSON of the wrong shape: both ignored.
    host.send(Message::Binary(b"not json".to_vec().into()))
        .await
        .expect("send garbage");
    host.send(Message::Text(r#"{"type":"NO_SUCH_EVENT"}"#.into()))
        .await
        .expect("send unknown");

    // The connection (and room) must still be alive and responsive.
    send(&mut host, &ClientEvent::GetPlayers { room_code: code }).await;
    assert!(matches!(
        recv(&mut host).await,
        ServerEvent::PlayerList { .. }
    ));
}
