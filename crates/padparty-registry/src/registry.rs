//! The session registry: creates, finds, and destroys rooms.

use std::collections::HashMap;

use padparty_protocol::{ConnectionId, GameId, RoomCode};
use rand::Rng;

use crate::{RegistryError, Room};

/// In-memory store of all active rooms.
///
/// Owns code allocation and the two reverse indexes (host → room,
/// player → room) so disconnect handling never scans every room.
///
/// Invariants: a code maps to at most one active room; a player belongs to
/// exactly one room (joining a second room implicitly leaves the first).
pub struct SessionRegistry {
    /// Active rooms, keyed by code.
    rooms: HashMap<RoomCode, Room>,
    /// Which room each host connection owns.
    host_index: HashMap<ConnectionId, RoomCode>,
    /// Which room each player connection is in.
    player_index: HashMap<ConnectionId, RoomCode>,
}

impl SessionRegistry {
    /// Creates a new, empty registry.
    pub fn new() -> Self {
        Self {
            rooms: HashMap::new(),
            host_index: HashMap::new(),
            player_index: HashMap::new(),
        }
    }

    /// Creates a room for `host` and returns its freshly allocated code.
    pub fn create_room(&mut self, host: ConnectionId) -> RoomCode {
        let code = self.generate_code();
        self.rooms.insert(code, Room::new(code, host));
        self.host_index.insert(host, code);
        tracing::info!(%code, %host, "room created");
        code
    }

    /// Draws 4 letters uniformly from A–Z, retrying until the candidate
    /// doesn't collide with an active room. Uniqueness holds only among
    /// *currently* active rooms — a freed code may be reused.
    fn generate_code(&self) -> RoomCode {
        let mut rng = rand::rng();
        loop {
            let letters =
                [(); 4].map(|_| rng.random_range(b'A'..=b'Z'));
            let code = RoomCode::new(letters)
                .expect("generated letters are uppercase ASCII");
            if !self.rooms.contains_key(&code) {
                return code;
            }
        }
    }

    /// Adds a player to the room with `code`.
    ///
    /// Idempotent per `(code, player)`: re-joining does not duplicate the
    /// roster entry. A player already in a *different* room is moved, so
    /// the one-room-per-player invariant holds.
    ///
    /// # Errors
    /// [`RegistryError::RoomNotFound`] if no active room has this code;
    /// the roster is untouched (no partial join).
    pub fn join_room(
        &mut self,
        code: RoomCode,
        player: ConnectionId,
        nickname: String,
    ) -> Result<&Room, RegistryError> {
        if !self.rooms.contains_key(&code) {
            return Err(RegistryError::RoomNotFound(code));
        }

        if let Some(previous) = self.player_index.get(&player).copied() {
            if previous != code {
                if let Some(room) = self.rooms.get_mut(&previous) {
                    room.remove_player(player);
                }
                tracing::debug!(
                    %player, from = %previous, to = %code,
                    "player moved between rooms"
                );
            }
        }

        let room = self.rooms.get_mut(&code).expect("checked above");
        room.add_player(player, nickname);
        self.player_index.insert(player, code);
        Ok(&*room)
    }

    /// Removes a player from whatever room they're in.
    ///
    /// Returns the room they left, so the caller can notify its host.
    pub fn remove_player(
        &mut self,
        player: ConnectionId,
    ) -> Option<(RoomCode, &Room)> {
        let code = self.player_index.remove(&player)?;
        let room = self.rooms.get_mut(&code)?;
        room.remove_player(player);
        tracing::debug!(%player, %code, "player removed");
        Some((code, &*room))
    }

    /// Destroys a room, clearing every index entry that pointed at it.
    ///
    /// Returns the removed room so the caller can notify its members.
    pub fn remove_room(&mut self, code: RoomCode) -> Option<Room> {
        let room = self.rooms.remove(&code)?;
        self.host_index.remove(&room.host);
        self.player_index.retain(|_, c| *c != code);
        tracing::info!(%code, "room removed");
        Some(room)
    }

    /// The code of the room hosted by `host`, if any.
    pub fn host_room(&self, host: ConnectionId) -> Option<RoomCode> {
        self.host_index.get(&host).copied()
    }

    /// The code of the room `player` is in, if any.
    pub fn player_room(&self, player: ConnectionId) -> Option<RoomCode> {
        self.player_index.get(&player).copied()
    }

    /// Selects the game for a room. Returns the room for broadcasting,
    /// `None` if the code is unknown.
    pub fn set_game(
        &mut self,
        code: RoomCode,
        game: GameId,
    ) -> Option<&Room> {
        let room = self.rooms.get_mut(&code)?;
        room.game = Some(game);
        tracing::info!(%code, %game, "game selected");
        Some(&*room)
    }

    /// Looks up a room by code.
    pub fn room(&self, code: RoomCode) -> Option<&Room> {
        self.rooms.get(&code)
    }

    /// Number of active rooms.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Whether no rooms are active.
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// All active codes (arbitrary order).
    pub fn codes(&self) -> Vec<RoomCode> {
        self.rooms.keys().copied().collect()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
