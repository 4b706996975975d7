//! The controller-side session runtime.
//!
//! A controller encodes gamepad input into the compact positional shape
//! and ships it toward the host — over the direct channel when the link
//! is connected, otherwise through the relay. It is the *responder* in
//! link negotiation: it never initiates, and after a channel loss it
//! waits for the host to offer again.

use padparty_protocol::{
    ClientEvent, Codec, ConnectionId, EncodedInput, GameId, Input,
    JsonCodec, RoomCode, ServerEvent,
};
use padparty_transport::{
    Connector, LinkEvent, LinkManager, LinkPath, RelayOut,
};
use tokio::sync::mpsc;

/// The controller side of one session.
pub struct ControllerRuntime<C: Connector> {
    room: RoomCode,
    /// The host's connection id, learned from its first signal.
    host: Option<ConnectionId>,
    links: LinkManager<C>,
    link_events: mpsc::UnboundedReceiver<LinkEvent>,
    /// Input frames that fell back to the relay path.
    link_relay: mpsc::UnboundedReceiver<RelayOut>,
    /// The room's current game, from JoinSuccess / GameState / GameChanged.
    game: Option<GameId>,
    /// Whether our power shot is currently charged (host-announced).
    power_shot: bool,
    codec: JsonCodec,
    out: mpsc::UnboundedSender<ClientEvent>,
}

impl<C: Connector> ControllerRuntime<C> {
    /// Creates the runtime for a joined room. `out` feeds the relay socket.
    pub fn new(
        room: RoomCode,
        connector: C,
        out: mpsc::UnboundedSender<ClientEvent>,
    ) -> Self {
        let (links, link_events, link_relay) = LinkManager::new(connector);
        Self {
            room,
            host: None,
            links,
            link_events,
            link_relay,
            game: None,
            power_shot: false,
            codec: JsonCodec,
            out,
        }
    }

    pub fn room(&self) -> RoomCode {
        self.room
    }

    pub fn game(&self) -> Option<GameId> {
        self.game
    }

    pub fn power_shot_available(&self) -> bool {
        self.power_shot
    }

    /// The path the next input would take.
    pub fn input_path(&self) -> LinkPath {
        match self.host {
            Some(host) => self.links.path(host),
            None => LinkPath::Relay,
        }
    }

    /// Encodes and sends one input toward the host, preferring the
    /// direct path and falling back to the relay. Returns the path used.
    ///
    /// Never errors: a controller must not observe transport hiccups —
    /// a frame either arrives or is superseded by the next snapshot.
    pub fn send_input(&mut self, input: Input) -> LinkPath {
        let encoded = input.encode();

        let Some(host) = self.host else {
            // No handshake yet: the relay is the only path there is.
            self.send_relay(encoded);
            return LinkPath::Relay;
        };

        let frame = match self.codec.encode(&encoded) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "input frame encode failed");
                return LinkPath::Relay;
            }
        };

        let path = self.links.send_input(host, &frame);
        if path == LinkPath::Relay {
            self.pump_relay_fallback();
        }
        path
    }

    /// Handles one event from the relay socket.
    pub fn handle_server_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::Signal { from, signal } => {
                self.host = Some(from);
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
            ServerEvent::JoinSuccess { game_id, .. } => {
                self.game = game_id;
            }
            ServerEvent::GameState { game_id }
            | ServerEvent::GameChanged { game_id } => {
                self.game = Some(game_id);
            }
            ServerEvent::PowerShotStatus { available } => {
                self.power_shot = available;
            }
            ServerEvent::RoomClosed => {
                // Host authority: the session is over; drop the link.
                if let Some(host) = self.host.take() {
                    self.links.close_link(host);
                }
            }
            _ => {}
        }
    }

    /// Drains link-layer notifications and relay-fallback frames.
    /// Call after feeding events or sending input.
    pub fn pump(&mut self) {
        while let Ok(event) = self.link_events.try_recv() {
            match event {
                LinkEvent::Closed(peer) => {
                    // No self-retry: a fresh attempt needs a new offer
                    // from the host.
                    tracing::info!(%peer, "direct channel lost, relay path active");
                }
                LinkEvent::Connected(peer) => {
                    tracing::info!(%peer, "direct channel up");
                }
                LinkEvent::Data { peer, .. } => {
                    // The host sends state via the relay, not the channel.
                    tracing::trace!(%peer, "ignoring unexpected channel data");
                }
            }
        }
        self.pump_relay_fallback();
    }

    /// Wraps fallen-back frames into relay input events.
    fn pump_relay_fallback(&mut self) {
        while let Ok(RelayOut { data, .. }) = self.link_relay.try_recv() {
            match self.codec.decode::<EncodedInput>(&data) {
                Ok(encoded) => self.send_relay(encoded),
                Err(e) => {
                    tracing::debug!(error = %e, "unroutable fallback frame");
                }
            }
        }
    }

    fn send_relay(&self, data: EncodedInput) {
        let _ = self.out.send(ClientEvent::Input {
            room_code: self.room,
            data,
        });
    }
}
