//! Wire protocol for Padparty.
//!
//! This crate defines the "language" spoken between controllers, the
//! signaling relay, and the host:
//!
//! - **Types** ([`ClientEvent`], [`ServerEvent`], [`RoomCode`], …) — the
//!   signaling messages that travel on the wire.
//! - **Input** ([`Input`], [`EncodedInput`]) — the compact positional
//!   encoding used for gamepad traffic.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how messages are
//!   converted to/from bytes.
//! - **Errors** ([`ProtocolError`]) — what can go wrong while doing so.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and everything
//! else. It doesn't know about connections, rooms, or game rules — it only
//! knows how to name things and serialize them.
//!
//! ```text
//! Transport (bytes) → Protocol (events) → Registry / Engines (semantics)
//! ```

mod codec;
mod error;
mod input;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use input::{Button, Direction, EncodedInput, Input, InputEvent};
pub use types::{
    ClientEvent, Color, ConnectionId, GameId, Player, PlayerEntry, RoomCode,
    ServerEvent, palette_color, PLAYER_PALETTE,
};
