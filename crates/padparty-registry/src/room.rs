//! A single room: one host, an ordered roster of players, one game.

use padparty_protocol::{
    palette_color, ConnectionId, GameId, Player, PlayerEntry, RoomCode,
};

/// One active session.
///
/// `players` preserves join order — it drives color assignment, snake
/// ranking tie-breaks, and the tanks turn order, so it is a `Vec`, not a
/// set.
#[derive(Debug, Clone)]
pub struct Room {
    /// The room's 4-letter code.
    pub code: RoomCode,
    /// The display-side connection that owns the room.
    pub host: ConnectionId,
    /// Members in join order.
    pub players: Vec<Player>,
    /// The selected game, `None` until the host picks one.
    pub game: Option<GameId>,
}

impl Room {
    pub(crate) fn new(code: RoomCode, host: ConnectionId) -> Self {
        Self {
            code,
            host,
            players: Vec::new(),
            game: None,
        }
    }

    /// Adds a player, assigning a palette color from their join index.
    /// Re-adding an existing id is a no-op (idempotent join).
    pub(crate) fn add_player(&mut self, id: ConnectionId, nickname: String) {
        if self.players.iter().any(|p| p.id == id) {
            return;
        }
        let color = palette_color(self.players.len());
        self.players.push(Player {
            id,
            nickname,
            color,
        });
    }

    /// Removes a player by id. Returns `true` if they were a member.
    pub(crate) fn remove_player(&mut self, id: ConnectionId) -> bool {
        let before = self.players.len();
        self.players.retain(|p| p.id != id);
        self.players.len() != before
    }

    /// Looks up a member by id.
    pub fn player(&self, id: ConnectionId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    /// The roster in wire shape (join order preserved, colors omitted).
    pub fn roster(&self) -> Vec<PlayerEntry> {
        self.players
            .iter()
            .map(|p| PlayerEntry {
                id: p.id,
                nickname: p.nickname.clone(),
            })
            .collect()
    }
}
