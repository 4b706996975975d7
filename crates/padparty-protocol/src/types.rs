//! Core protocol types for Padparty's signaling wire format.
//!
//! Everything in this module gets serialized, sent over the wire, and
//! deserialized on the other side. The two event enums mirror the two
//! directions of the relay protocol: [`ClientEvent`] flows *into* the relay
//! (from hosts and controllers alike), [`ServerEvent`] flows *out* of it.

use serde::{Deserialize, Serialize};

use std::fmt;

use crate::EncodedInput;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a relay connection.
///
/// Newtype over `u64` so a connection id can't be confused with any other
/// number. A connection is a host or a controller; because a controller is
/// a player, this doubles as the player id throughout the system.
///
/// `#[serde(transparent)]` makes `ConnectionId(42)` serialize as plain `42`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A room code: exactly 4 uppercase ASCII letters.
///
/// Codes identify at most one active room at a time; a freed code may be
/// handed out again later. Stored as a fixed array so the type is `Copy`,
/// serialized as the 4-letter string (`"QXJK"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode([u8; 4]);

impl RoomCode {
    /// Number of letters in a code.
    pub const LEN: usize = 4;

    /// Builds a code from 4 bytes, validating shape.
    pub fn new(letters: [u8; 4]) -> Result<Self, String> {
        if letters.iter().all(|b| b.is_ascii_uppercase()) {
            Ok(Self(letters))
        } else {
            Err("room code must be 4 uppercase ASCII letters".to_string())
        }
    }

    /// The code as a string slice.
    pub fn as_str(&self) -> &str {
        // Valid by construction: only uppercase ASCII gets stored.
        std::str::from_utf8(&self.0).expect("room code is ASCII")
    }
}

impl TryFrom<String> for RoomCode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let bytes: [u8; 4] = value
            .as_bytes()
            .try_into()
            .map_err(|_| format!("room code must be {} letters", Self::LEN))?;
        Self::new(bytes)
    }
}

impl std::str::FromStr for RoomCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s.to_string())
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.as_str().to_string()
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Games and players
// ---------------------------------------------------------------------------

/// The selectable mini-games.
///
/// Serialized in SCREAMING_SNAKE_CASE to match the symbolic game ids used
/// by controller UIs (`"SOCCER"`, `"SNAKE"`, `"TANKS"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameId {
    Soccer,
    Snake,
    Tanks,
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Soccer => write!(f, "SOCCER"),
            Self::Snake => write!(f, "SNAKE"),
            Self::Tanks => write!(f, "TANKS"),
        }
    }
}

/// An RGB color, serialized as a `#rrggbb` hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color(pub u32);

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let hex = value.strip_prefix('#').unwrap_or(&value);
        u32::from_str_radix(hex, 16)
            .map(Color)
            .map_err(|_| format!("invalid color {value:?}"))
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        format!("#{:06x}", color.0)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06x}", self.0)
    }
}

/// The fixed palette that colors players by join order.
pub const PLAYER_PALETTE: [Color; 6] = [
    Color(0xff00ff), // magenta
    Color(0x00ff00), // green
    Color(0xffff00), // yellow
    Color(0xff0000), // red
    Color(0x0000ff), // blue
    Color(0x00ffff), // cyan
];

/// The palette color for the player at the given join index (wraps).
pub fn palette_color(join_index: usize) -> Color {
    PLAYER_PALETTE[join_index % PLAYER_PALETTE.len()]
}

/// A member of a room, with the color derived from their join order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: ConnectionId,
    pub nickname: String,
    pub color: Color,
}

/// The wire shape of a player in `PLAYER_LIST` and `PLAYER_JOINED`
/// payloads. Colors are not sent — each side derives them from join order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerEntry {
    pub id: ConnectionId,
    pub nickname: String,
}

// ---------------------------------------------------------------------------
// ClientEvent — anything → relay
// ---------------------------------------------------------------------------

/// Events sent *to* the signaling relay, by hosts and controllers.
///
/// `#[serde(tag = "type")]` produces internally tagged JSON, e.g.
/// `{ "type": "JOIN_ROOM", "code": "QXJK", "nickname": "Ann" }`, which is
/// what browser-side controllers expect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientEvent {
    /// Host → relay: open a new room.
    CreateRoom,

    /// Controller → relay: join an existing room by code.
    JoinRoom { code: RoomCode, nickname: String },

    /// Host → relay: re-sync the ordered member list.
    GetPlayers { room_code: RoomCode },

    /// Host → relay: switch the room to a different game.
    SelectGame { room_code: RoomCode, game_id: GameId },

    /// Controller → relay: which game is this room running?
    GetGameState { room_code: RoomCode },

    /// Either side → relay: forward an opaque handshake blob to `target`.
    /// The relay never inspects `signal`.
    Signal { target: ConnectionId, signal: Vec<u8> },

    /// Controller → relay: gamepad input for the room's host.
    /// Delivered best-effort — may be dropped under congestion.
    Input { room_code: RoomCode, data: EncodedInput },

    /// Host → relay: tell one player whether their power shot is charged.
    PowerShotStatus {
        room_code: RoomCode,
        player_id: ConnectionId,
        available: bool,
    },
}

// ---------------------------------------------------------------------------
// ServerEvent — relay → anything
// ---------------------------------------------------------------------------

/// Events sent *by* the signaling relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerEvent {
    /// Relay → host: your room is open under this code.
    RoomCreated { code: RoomCode },

    /// Relay → joiner: you're in. `game_id` is the room's current game,
    /// `None` if the host hasn't selected one yet.
    JoinSuccess {
        code: RoomCode,
        nickname: String,
        game_id: Option<GameId>,
    },

    /// Relay → requester: something was wrong with your request.
    Error { message: String },

    /// Relay → host: a player entered the room.
    PlayerJoined { id: ConnectionId, nickname: String },

    /// Relay → host: a player's connection went away.
    PlayerLeft { id: ConnectionId },

    /// Relay → host: the ordered member list (join order preserved).
    PlayerList { players: Vec<PlayerEntry> },

    /// Relay → room: the host switched games.
    GameChanged { game_id: GameId },

    /// Relay → requester: the room's current game.
    GameState { game_id: GameId },

    /// Relay → target: an opaque handshake blob from `from`.
    Signal { from: ConnectionId, signal: Vec<u8> },

    /// Relay → host: relayed gamepad input, sender attached by the relay.
    Input {
        player_id: ConnectionId,
        data: EncodedInput,
    },

    /// Relay → player: power-shot availability changed.
    PowerShotStatus { available: bool },

    /// Relay → room members: the host disconnected, the room is gone.
    RoomClosed,
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The relay protocol has a fixed JSON shape that browser controllers
    //! depend on. These tests pin the serde attributes to that shape.

    use super::*;

    fn code(s: &str) -> RoomCode {
        s.parse().expect("valid code")
    }

    // =====================================================================
    // Identity types
    // =====================================================================

    #[test]
    fn test_connection_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&ConnectionId(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn test_connection_id_display() {
        assert_eq!(ConnectionId(7).to_string(), "conn-7");
    }

    #[test]
    fn test_room_code_round_trips_as_string() {
        let json = serde_json::to_string(&code("QXJK")).unwrap();
        assert_eq!(json, "\"QXJK\"");
        let back: RoomCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, code("QXJK"));
    }

    #[test]
    fn test_room_code_rejects_wrong_length() {
        assert!("ABC".parse::<RoomCode>().is_err());
        assert!("ABCDE".parse::<RoomCode>().is_err());
    }

    #[test]
    fn test_room_code_rejects_non_uppercase() {
        assert!("abcd".parse::<RoomCode>().is_err());
        assert!("AB1D".parse::<RoomCode>().is_err());
        assert!("AB D".parse::<RoomCode>().is_err());
    }

    #[test]
    fn test_game_id_uses_symbolic_names() {
        assert_eq!(serde_json::to_string(&GameId::Soccer).unwrap(), "\"SOCCER\"");
        assert_eq!(serde_json::to_string(&GameId::Snake).unwrap(), "\"SNAKE\"");
        assert_eq!(serde_json::to_string(&GameId::Tanks).unwrap(), "\"TANKS\"");
    }

    #[test]
    fn test_color_round_trips_as_hex_string() {
        let json = serde_json::to_string(&Color(0xff00ff)).unwrap();
        assert_eq!(json, "\"#ff00ff\"");
        let back: Color = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Color(0xff00ff));
    }

    #[test]
    fn test_palette_wraps_after_six_players() {
        assert_eq!(palette_color(0), palette_color(6));
        assert_ne!(palette_color(0), palette_color(1));
    }

    // =====================================================================
    // Event JSON shapes
    // =====================================================================

    #[test]
    fn test_create_room_json_format() {
        let json = serde_json::to_value(&ClientEvent::CreateRoom).unwrap();
        assert_eq!(json["type"], "CREATE_ROOM");
    }

    #[test]
    fn test_join_room_json_format() {
        let ev = ClientEvent::JoinRoom {
            code: code("QXJK"),
            nickname: "Ann".into(),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "JOIN_ROOM");
        assert_eq!(json["code"], "QXJK");
        assert_eq!(json["nickname"], "Ann");
    }

    #[test]
    fn test_join_success_carries_optional_game() {
        let ev = ServerEvent::JoinSuccess {
            code: code("QXJK"),
            nickname: "Ann".into(),
            game_id: None,
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "JOIN_SUCCESS");
        assert!(json["game_id"].is_null());
    }

    #[test]
    fn test_signal_blob_is_opaque_bytes() {
        let ev = ClientEvent::Signal {
            target: ConnectionId(9),
            signal: vec![1, 2, 3],
        };
        let bytes = serde_json::to_vec(&ev).unwrap();
        let back: ClientEvent = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(ev, back);
    }

    #[test]
    fn test_input_event_round_trip() {
        let ev = ClientEvent::Input {
            room_code: code("AAAA"),
            data: crate::Input::Joystick { x: 0.5, y: -0.25 }.encode(),
        };
        let bytes = serde_json::to_vec(&ev).unwrap();
        let back: ClientEvent = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(ev, back);
    }

    #[test]
    fn test_server_events_round_trip() {
        let events = vec![
            ServerEvent::RoomCreated { code: code("QXJK") },
            ServerEvent::PlayerJoined {
                id: ConnectionId(3),
                nickname: "Ann".into(),
            },
            ServerEvent::PlayerLeft { id: ConnectionId(3) },
            ServerEvent::PlayerList {
                players: vec![PlayerEntry {
                    id: ConnectionId(3),
                    nickname: "Ann".into(),
                }],
            },
            ServerEvent::GameChanged {
                game_id: GameId::Snake,
            },
            ServerEvent::PowerShotStatus { available: true },
            ServerEvent::RoomClosed,
        ];
        for ev in events {
            let bytes = serde_json::to_vec(&ev).unwrap();
            let back: ServerEvent = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(ev, back);
        }
    }

    #[test]
    fn test_decode_garbage_returns_error() {
        let garbage = b"not json at all";
        let result: Result<ClientEvent, _> = serde_json::from_slice(garbage);
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_unknown_event_type_returns_error() {
        let unknown = r#"{"type": "FLY_TO_MOON", "speed": 9000}"#;
        let result: Result<ClientEvent, _> = serde_json::from_str(unknown);
        assert!(result.is_err());
    }
}
