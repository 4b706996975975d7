//! Room registry for Padparty.
//!
//! The in-memory store of active rooms: allocates 4-letter codes, tracks
//! which connection hosts which room and which room each player is in.
//! Purely synchronous data structures — the relay serializes access by
//! handling one event at a time, so no locking lives here.
//!
//! # Key types
//!
//! - [`SessionRegistry`] — create/join/leave/destroy operations
//! - [`Room`] — one session: host, ordered players, selected game
//! - [`RegistryError`] — what can go wrong

mod error;
mod registry;
mod room;

pub use error::RegistryError;
pub use registry::SessionRegistry;
pub use room::Room;
