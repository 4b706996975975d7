//! The host-side session runtime.
//!
//! Sits between three inputs — relay events, direct-channel frames, and
//! the tick scheduler — and the room's authoritative game engine. The
//! runtime is sans-IO: it consumes typed events and pushes typed output
//! onto channels ([`ClientEvent`]s for the relay socket,
//! [`GameNotification`]s for the renderer), so tests and the demo can
//! drive it without a network.
//!
//! Responsibilities, per the data flow:
//!
//! - on `PlayerJoined`/`PlayerList`, track the roster (colors from join
//!   order), feed the engine, and *initiate* a direct link (the host is
//!   always the initiator);
//! - on `Signal`, advance the handshake and route replies back;
//! - decode input frames — relay-enveloped or direct — into one
//!   [`InputEvent`] shape and feed the engine;
//! - on `GameChanged`, swap the engine and replay the roster into it;
//! - forward `PowerShot` notifications to the affected controller.

use std::time::Duration;

use padparty_games::{
    create_engine, ControlEvent, Engine, GameEvent, GameNotification,
};
use padparty_protocol::{
    palette_color, ClientEvent, Codec, ConnectionId, EncodedInput, GameId,
    JsonCodec, Player, RoomCode, ServerEvent,
};
use padparty_tick::TickScheduler;
use padparty_transport::{Connector, LinkEvent, LinkManager, RelayOut};
use tokio::sync::mpsc;

/// The authoritative host side of one room.
pub struct HostRuntime<C: Connector> {
    room: RoomCode,
    /// Roster in join order; colors derive from the index.
    players: Vec<Player>,
    links: LinkManager<C>,
    link_events: Option<mpsc::UnboundedReceiver<LinkEvent>>,
    /// The host never relays input itself; the fallback lane exists on
    /// the controller side. Held so the manager's sends never error.
    _link_relay: mpsc::UnboundedReceiver<RelayOut>,
    engine: Option<Box<dyn Engine>>,
    game: Option<GameId>,
    codec: JsonCodec,
    out: mpsc::UnboundedSender<ClientEvent>,
    notifications: mpsc::UnboundedSender<GameNotification>,
}

impl<C: Connector> HostRuntime<C> {
    /// Creates the runtime for a room the relay has already created.
    ///
    /// `out` feeds the relay socket; `notifications` feeds the renderer.
    pub fn new(
        room: RoomCode,
        connector: C,
        out: mpsc::UnboundedSender<ClientEvent>,
        notifications: mpsc::UnboundedSender<GameNotification>,
    ) -> Self {
        let (links, link_events, link_relay) = LinkManager::new(connector);
        Self {
            room,
            players: Vec::new(),
            links,
            link_events: Some(link_events),
            _link_relay: link_relay,
            engine: None,
            game: None,
            codec: JsonCodec,
            out,
            notifications,
        }
    }

    /// The room this runtime serves.
    pub fn room(&self) -> RoomCode {
        self.room
    }

    /// The currently selected game, if any.
    pub fn game(&self) -> Option<GameId> {
        self.game
    }

    /// The roster in join order.
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    /// Read access to the link layer (path inspection, tests).
    pub fn links(&self) -> &LinkManager<C> {
        &self.links
    }

    /// Handles one event from the relay socket.
    pub fn handle_server_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::PlayerJoined { id, nickname } => {
                self.admit_player(id, nickname);
            }
            ServerEvent::PlayerList { players } => {
                // Re-sync: admit anyone we don't know yet, in order.
                for entry in players {
                    self.admit_player(entry.id, entry.nickname);
                }
            }
            ServerEvent::PlayerLeft { id } => {
                self.players.retain(|p| p.id != id);
                self.feed_engine(GameEvent::PlayerLeft { id });
                self.links.close_link(id);
            }
            ServerEvent::Signal { from, signal } => {
                match self.links.handle_signal(from, &signal) {
                    Ok(Some(reply)) => {
                        let _ = self.out.send(ClientEvent::Signal {
                            target: from,
                            signal: reply,
                        });
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::debug!(
                            peer = %from, error = %e,
                            "handshake signal rejected"
                        );
                    }
                }
            }
            ServerEvent::Input { player_id, data } => {
                self.feed_input(player_id, data);
            }
            ServerEvent::GameChanged { game_id } => {
                self.start_game(game_id);
            }
            // Join/state responses and room teardown concern the UI
            // layer, not the simulation.
            _ => {}
        }
    }

    /// Handles one notification from the link layer.
    pub fn handle_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Data { peer, data } => {
                // A direct frame is a bare encoded array; the sender is
                // known only from the link that delivered it.
                match self.codec.decode::<EncodedInput>(&data) {
                    Ok(encoded) => self.feed_input(peer, encoded),
                    Err(e) => {
                        tracing::debug!(
                            %peer, error = %e,
                            "undecodable direct frame dropped"
                        );
                    }
                }
            }
            LinkEvent::Connected(peer) => {
                tracing::info!(%peer, "input path switched to direct");
            }
            LinkEvent::Closed(peer) => {
                tracing::info!(%peer, "input path reverted to relay");
            }
        }
    }

    /// Advances the simulation by one fixed step.
    pub fn tick(&mut self, dt: Duration) {
        if let Some(engine) = &mut self.engine {
            let notes = engine.tick(dt);
            self.route_notifications(notes);
        }
    }

    /// Applies a host-UI control (pause/resume/restart/…).
    pub fn control(&mut self, control: ControlEvent) {
        self.feed_engine(GameEvent::Control(control));
    }

    /// Takes the link event receiver for an external select loop.
    pub fn take_link_events(
        &mut self,
    ) -> Option<mpsc::UnboundedReceiver<LinkEvent>> {
        self.link_events.take()
    }

    /// Runs the runtime: relay events, link events, controls, and the
    /// tick scheduler, until the relay channel closes.
    pub async fn drive(
        mut self,
        mut server_events: mpsc::UnboundedReceiver<ServerEvent>,
        mut controls: mpsc::UnboundedReceiver<ControlEvent>,
        mut scheduler: TickScheduler,
    ) {
        let mut link_events = self
            .take_link_events()
            .expect("drive may only be called once");

        loop {
            tokio::select! {
                event = server_events.recv() => {
                    match event {
                        Some(event) => self.handle_server_event(event),
                        None => break,
                    }
                }
                Some(event) = link_events.recv() => {
                    self.handle_link_event(event);
                }
                Some(control) = controls.recv() => {
                    self.control(control);
                }
                info = scheduler.wait_for_tick() => {
                    self.tick(info.dt);
                }
            }
        }

        // Room teardown: all links die with the runtime, immediately.
        self.links.shutdown();
    }

    /// Adds a player to the roster (idempotent), feeds the engine, and
    /// offers them a direct channel.
    fn admit_player(&mut self, id: ConnectionId, nickname: String) {
        if self.players.iter().any(|p| p.id == id) {
            return;
        }
        let player = Player {
            id,
            nickname,
            color: palette_color(self.players.len()),
        };
        self.players.push(player.clone());
        self.feed_engine(GameEvent::PlayerJoined { player });

        match self.links.create_link(id) {
            Ok(Some(offer)) => {
                let _ = self.out.send(ClientEvent::Signal {
                    target: id,
                    signal: offer,
                });
            }
            Ok(None) => {}
            Err(e) => {
                // The relay path still works; the link can be retried
                // on the next join or list re-sync.
                tracing::warn!(%id, error = %e, "could not offer direct link");
            }
        }
    }

    /// Decodes an input frame, attaches the sender, feeds the engine.
    /// Malformed frames are dropped without touching the link.
    fn feed_input(&mut self, player: ConnectionId, data: EncodedInput) {
        match data.decode_from(player) {
            Ok(event) => self.feed_engine(GameEvent::Input(event)),
            Err(e) => {
                tracing::debug!(%player, error = %e, "bad input dropped");
            }
        }
    }

    /// Swaps in the engine for `game_id` and replays the roster into it.
    fn start_game(&mut self, game_id: GameId) {
        tracing::info!(%game_id, room = %self.room, "starting game");
        let mut engine = create_engine(game_id, None);
        let mut notes = Vec::new();
        for player in &self.players {
            notes.extend(engine.apply(GameEvent::PlayerJoined {
                player: player.clone(),
            }));
        }
        self.engine = Some(engine);
        self.game = Some(game_id);
        self.route_notifications(notes);
    }

    fn feed_engine(&mut self, event: GameEvent) {
        if let Some(engine) = &mut self.engine {
            let notes = engine.apply(event);
            self.route_notifications(notes);
        }
    }

    /// Ships notifications to the renderer; power-shot changes also go
    /// to the affected controller through the relay.
    fn route_notifications(&mut self, notes: Vec<GameNotification>) {
        for note in notes {
            if let GameNotification::PowerShot { player, available } = note {
                let _ = self.out.send(ClientEvent::PowerShotStatus {
                    room_code: self.room,
                    player_id: player,
                    available,
                });
            }
            let _ = self.notifications.send(note);
        }
    }
}
