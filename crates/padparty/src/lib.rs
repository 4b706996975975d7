//! # Padparty
//!
//! Real-time multiplayer mini-game sessions with phones as gamepads.
//!
//! One **host** display and several **controller** devices share a room
//! identified by a 4-letter code. The always-on [`RelayServer`] routes
//! room events and handshake signals; each host↔controller pair then
//! prefers a direct data channel for input, falling back to the relay.
//! The host runs the authoritative game simulation.
//!
//! ## Pieces
//!
//! - [`RelayServer`] — the signaling relay (server side)
//! - [`HostRuntime`] — negotiator + input decoding + game engine (host side)
//! - [`ControllerRuntime`] — input encoding + responder negotiation
//!   (controller side)

mod controller;
mod error;
mod handler;
mod host;
mod server;

pub use controller::ControllerRuntime;
pub use error::PadpartyError;
pub use host::HostRuntime;
pub use server::{RelayServer, RelayServerBuilder};
