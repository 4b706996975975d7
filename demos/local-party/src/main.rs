//! A complete party in one process: relay, host, and two scripted
//! controllers playing a few seconds of snake.
//!
//! The pieces talk over real WebSockets; the direct channels use the
//! in-process connector, so input genuinely bypasses the relay once the
//! links come up. Run it with:
//!
//! ```text
//! cargo run -p local-party
//! ```

use std::error::Error;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use padparty::{ControllerRuntime, HostRuntime, RelayServerBuilder};
use padparty_games::{ControlEvent, GameNotification};
use padparty_protocol::{
    ClientEvent, Direction, GameId, Input, RoomCode, ServerEvent,
};
use padparty_tick::TickScheduler;
use padparty_transport::MemoryConnector;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

type Ws = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

async fn connect(
    addr: &str,
) -> Result<Ws, tokio_tungstenite::tungstenite::Error> {
    let (ws, _) =
        tokio_tungstenite::connect_async(format!("ws://{addr}")).await?;
    Ok(ws)
}

fn encode(event: &ClientEvent) -> Message {
    Message::Binary(
        serde_json::to_vec(event).expect("events encode").into(),
    )
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // --- Relay ---
    let server = RelayServerBuilder::new().bind("127.0.0.1:0").build().await?;
    let addr = server.local_addr()?.to_string();
    tokio::spawn(async move {
        let _ = server.run().await;
    });

    let connector = MemoryConnector::new();

    // --- Host ---
    let mut host_ws = connect(&addr).await?;
    host_ws.send(encode(&ClientEvent::CreateRoom)).await?;
    let code = loop {
        let msg = host_ws.next().await.ok_or("relay hung up")??;
        if let Ok(ServerEvent::RoomCreated { code }) =
            serde_json::from_slice(&msg.into_data())
        {
            break code;
        }
    };
    tracing::info!(%code, "room open");

    let (host_out_tx, mut host_out_rx) = mpsc::unbounded_channel();
    let (notes_tx, mut notes_rx) = mpsc::unbounded_channel();
    let (server_ev_tx, server_ev_rx) = mpsc::unbounded_channel();
    let (controls_tx, controls_rx) = mpsc::unbounded_channel();

    let runtime =
        HostRuntime::new(code, connector.clone(), host_out_tx.clone(), notes_tx);
    tokio::spawn(runtime.drive(
        server_ev_rx,
        controls_rx,
        TickScheduler::with_rate(20),
    ));

    // Socket glue: runtime output → relay, relay → runtime input.
    let (mut host_tx, mut host_rx) = host_ws.split();
    tokio::spawn(async move {
        while let Some(event) = host_out_rx.recv().await {
            if host_tx.send(encode(&event)).await.is_err() {
                break;
            }
        }
    });
    tokio::spawn(async move {
        while let Some(Ok(msg)) = host_rx.next().await {
            if let Ok(event) = serde_json::from_slice(&msg.into_data()) {
                if server_ev_tx.send(event).is_err() {
                    break;
                }
            }
        }
    });

    // --- Controllers ---
    for nickname in ["Ann", "Bob"] {
        let addr = addr.clone();
        let connector = connector.clone();
        tokio::spawn(async move {
            if let Err(e) =
                run_controller(&addr, code, connector, nickname).await
            {
                tracing::warn!(nickname, error = %e, "controller stopped");
            }
        });
    }

    // Give the joins a moment, then put the room into snake.
    tokio::time::sleep(Duration::from_millis(300)).await;
    host_out_tx.send(ClientEvent::SelectGame {
        room_code: code,
        game_id: GameId::Snake,
    })?;

    // --- Watch the match for a few seconds ---
    let deadline = tokio::time::Instant::now() + Duration::from_secs(6);
    loop {
        let note = tokio::select! {
            note = notes_rx.recv() => note,
            _ = tokio::time::sleep_until(deadline) => break,
        };
        match note {
            Some(GameNotification::Score(board)) => {
                tracing::info!(?board, "score");
            }
            Some(GameNotification::Time(secs)) => {
                tracing::info!(secs, "clock");
            }
            Some(note) => tracing::info!(?note, "event"),
            None => break,
        }
    }

    controls_tx.send(ControlEvent::Pause)?;
    tracing::info!("party over");
    Ok(())
}

/// A scripted controller: joins the room and walks its snake in a
/// square, re-sending a d-pad press four times a second.
async fn run_controller(
    addr: &str,
    code: RoomCode,
    connector: MemoryConnector,
    nickname: &str,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let ws = connect(addr).await?;
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (out_tx, mut out_rx) = mpsc::unbounded_channel();
    let mut runtime = ControllerRuntime::new(code, connector, out_tx);

    ws_tx
        .send(encode(&ClientEvent::JoinRoom {
            code,
            nickname: nickname.to_string(),
        }))
        .await?;

    let mut walk = [
        Direction::Up,
        Direction::Right,
        Direction::Down,
        Direction::Left,
    ]
    .into_iter()
    .cycle();
    let mut cadence = tokio::time::interval(Duration::from_millis(250));

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                let Some(Ok(msg)) = msg else { break };
                if let Ok(event) = serde_json::from_slice(&msg.into_data()) {
                    runtime.handle_server_event(event);
                    runtime.pump();
                }
            }
            _ = cadence.tick() => {
                let direction = walk.next().expect("cycle never ends");
                let path = runtime.send_input(Input::Dpad { direction });
                tracing::debug!(nickname, ?direction, ?path, "input");
                runtime.pump();
            }
            Some(event) = out_rx.recv() => {
                ws_tx.send(encode(&event)).await?;
            }
        }
    }

    Ok(())
}
