//! Per-connection relay handler: reads client events, mutates the core
//! under its lock, and routes server events to their recipients.
//!
//! Each connection gets two outbound lanes drained by one writer task:
//!
//! - **reliable** — unbounded, for room lifecycle and signaling; and
//! - **volatile** — small and bounded, for relayed gamepad input. Under
//!   congestion `try_send` drops the frame on the floor: input is a full
//!   current-value snapshot, so a newer one supersedes anything lost.
//!   Nothing is retried and nothing queues behind the lane.

use std::sync::Arc;

use padparty_protocol::{
    ClientEvent, Codec, ConnectionId, GameId, ServerEvent,
};
use padparty_transport::{Connection, WebSocketConnection};

use crate::server::{RelayCore, RelayState};

/// Capacity of the volatile (input) lane. Deliberately small: if the
/// host's socket can't drain this much, newer snapshots matter more
/// than completeness.
const VOLATILE_LANE: usize = 32;

/// The error message a joiner sees for an unknown code.
const INVALID_ROOM_CODE: &str = "Invalid Room Code";

/// Outbound lanes for one connected peer.
pub(crate) struct PeerHandle {
    reliable: tokio::sync::mpsc::UnboundedSender<ServerEvent>,
    volatile: tokio::sync::mpsc::Sender<ServerEvent>,
}

impl PeerHandle {
    /// Queues a reliable event. A send to a disappearing peer is a no-op;
    /// their handler is already unwinding.
    fn send(&self, event: ServerEvent) {
        let _ = self.reliable.send(event);
    }

    /// Queues a best-effort event, silently dropping it if the lane is
    /// full or the peer is gone.
    fn send_volatile(&self, event: ServerEvent) {
        if let Err(e) = self.volatile.try_send(event) {
            tracing::trace!(reason = %e, "volatile event dropped");
        }
    }
}

impl RelayCore {
    fn send_to(&self, target: ConnectionId, event: ServerEvent) {
        if let Some(peer) = self.peers.get(&target) {
            peer.send(event);
        }
    }

    fn send_volatile_to(&self, target: ConnectionId, event: ServerEvent) {
        if let Some(peer) = self.peers.get(&target) {
            peer.send_volatile(event);
        }
    }
}

/// Handles one connection from accept to close. Never returns an error:
/// every failure is isolated to this connection.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<RelayState<C>>,
) {
    let conn = Arc::new(conn);
    let id = conn.id();
    tracing::debug!(%id, "connection opened");

    let (reliable_tx, reliable_rx) = tokio::sync::mpsc::unbounded_channel();
    let (volatile_tx, volatile_rx) = tokio::sync::mpsc::channel(VOLATILE_LANE);

    state.core.lock().await.peers.insert(
        id,
        PeerHandle {
            reliable: reliable_tx,
            volatile: volatile_tx,
        },
    );

    let writer = tokio::spawn(writer_loop(
        Arc::clone(&conn),
        Arc::clone(&state),
        reliable_rx,
        volatile_rx,
    ));

    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::debug!(%id, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::debug!(%id, error = %e, "recv error");
                break;
            }
        };

        let event: ClientEvent = match state.codec.decode(&data) {
            Ok(event) => event,
            Err(e) => {
                // Malformed frame: drop it, keep the connection.
                tracing::debug!(%id, error = %e, "undecodable client event");
                continue;
            }
        };

        let mut core = state.core.lock().await;
        dispatch(&mut core, id, event);
    }

    // Unexpected or clean, the disconnect policy is the same.
    let mut core = state.core.lock().await;
    handle_disconnect(&mut core, id);
    core.peers.remove(&id);
    drop(core);

    // Dropping the peer handle ended both lanes; the writer drains and
    // exits on its own.
    let _ = writer.await;
    tracing::debug!(%id, "connection handler finished");
}

/// Drains both outbound lanes into the socket, reliable lane first.
async fn writer_loop<C: Codec>(
    conn: Arc<WebSocketConnection>,
    state: Arc<RelayState<C>>,
    mut reliable: tokio::sync::mpsc::UnboundedReceiver<ServerEvent>,
    mut volatile: tokio::sync::mpsc::Receiver<ServerEvent>,
) {
    loop {
        let event = tokio::select! {
            biased;
            event = reliable.recv() => event,
            event = volatile.recv() => event,
        };
        let Some(event) = event else { break };

        let bytes = match state.codec.encode(&event) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode server event");
                continue;
            }
        };
        if conn.send(&bytes).await.is_err() {
            break;
        }
    }
}

/// Routes one client event. Runs under the core lock — the relay is a
/// sequential event processor.
fn dispatch(core: &mut RelayCore, sender: ConnectionId, event: ClientEvent) {
    match event {
        ClientEvent::CreateRoom => {
            let code = core.registry.create_room(sender);
            core.send_to(sender, ServerEvent::RoomCreated { code });
        }

        ClientEvent::JoinRoom { code, nickname } => {
            match core.registry.join_room(code, sender, nickname.clone()) {
                Ok(room) => {
                    let (host, game_id) = (room.host, room.game);
                    core.send_to(
                        host,
                        ServerEvent::PlayerJoined {
                            id: sender,
                            nickname: nickname.clone(),
                        },
                    );
                    core.send_to(
                        sender,
                        ServerEvent::JoinSuccess {
                            code,
                            nickname,
                            game_id,
                        },
                    );
                    tracing::info!(%sender, %code, "player joined");
                }
                Err(_) => {
                    core.send_to(
                        sender,
                        ServerEvent::Error {
                            message: INVALID_ROOM_CODE.to_string(),
                        },
                    );
                }
            }
        }

        ClientEvent::Input { room_code, data } => {
            // Best-effort: unknown rooms and congested lanes both drop
            // the frame silently.
            if let Some(room) = core.registry.room(room_code) {
                let host = room.host;
                core.send_volatile_to(
                    host,
                    ServerEvent::Input {
                        player_id: sender,
                        data,
                    },
                );
            }
        }

        ClientEvent::SelectGame { room_code, game_id } => {
            let targets: Option<Vec<ConnectionId>> = core
                .registry
                .set_game(room_code, game_id)
                .map(|room| {
                    std::iter::once(room.host)
                        .chain(room.players.iter().map(|p| p.id))
                        .collect()
                });
            if let Some(targets) = targets {
                for target in targets {
                    core.send_to(
                        target,
                        ServerEvent::GameChanged { game_id },
                    );
                }
            }
        }

        ClientEvent::GetGameState { room_code } => {
            match core.registry.room(room_code) {
                Some(room) => {
                    // Rooms that haven't picked yet default to soccer.
                    let game_id = room.game.unwrap_or(GameId::Soccer);
                    core.send_to(sender, ServerEvent::GameState { game_id });
                }
                None => core.send_to(
                    sender,
                    ServerEvent::Error {
                        message: format!("room {room_code} not found"),
                    },
                ),
            }
        }

        ClientEvent::GetPlayers { room_code } => {
            match core.registry.room(room_code) {
                Some(room) => {
                    let players = room.roster();
                    core.send_to(sender, ServerEvent::PlayerList { players });
                }
                None => core.send_to(
                    sender,
                    ServerEvent::Error {
                        message: format!("room {room_code} not found"),
                    },
                ),
            }
        }

        ClientEvent::Signal { target, signal } => {
            if core.peers.contains_key(&target) {
                core.send_to(
                    target,
                    ServerEvent::Signal {
                        from: sender,
                        signal,
                    },
                );
            } else {
                tracing::debug!(%sender, %target, "signal for unknown peer dropped");
            }
        }

        ClientEvent::PowerShotStatus {
            room_code,
            player_id,
            available,
        } => {
            if core.registry.room(room_code).is_some() {
                core.send_to(
                    player_id,
                    ServerEvent::PowerShotStatus { available },
                );
            }
        }
    }
}

/// Host authority: a host disconnect destroys the room and tells every
/// member; a player disconnect tells only the host, and the room lives.
fn handle_disconnect(core: &mut RelayCore, id: ConnectionId) {
    if let Some(code) = core.registry.host_room(id) {
        if let Some(room) = core.registry.remove_room(code) {
            tracing::info!(%code, "room closed (host left)");
            for player in room.players {
                core.send_to(player.id, ServerEvent::RoomClosed);
            }
        }
    } else if let Some((code, room)) = core.registry.remove_player(id) {
        let host = room.host;
        tracing::info!(%id, %code, "player left");
        core.send_to(host, ServerEvent::PlayerLeft { id });
    }
}
