//! Transport layer for Padparty.
//!
//! Two concerns live here, one per side of the system:
//!
//! - The **relay transport**: the [`Transport`]/[`Connection`] traits that
//!   abstract the always-on server socket, with a WebSocket implementation
//!   behind the `websocket` feature.
//! - The **peer link negotiator** ([`link`]): the per host↔controller
//!   state machine that establishes a direct data channel (host always
//!   initiates), tracks its health, and falls back to the relay path when
//!   the direct path is not connected.
//!
//! The negotiator never interprets handshake payloads — a [`Connector`]
//! produces and consumes them as opaque blobs, so the NAT-assist details
//! stay outside this crate. [`MemoryConnector`] pairs endpoints inside one
//! process for tests and local play; a WebRTC connector can implement the
//! same traits elsewhere.
//!
//! # Feature Flags
//!
//! - `websocket` (default) — WebSocket relay transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
mod link;
mod memory;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use link::{
    Connector, DirectChannel, LinkEvent, LinkManager, LinkPath, LinkRole,
    LinkState, Negotiated, RelayOut,
};
pub use memory::{MemoryChannel, MemoryConnector};
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport};

use padparty_protocol::ConnectionId;

/// Accepts new incoming relay connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;

    /// Gracefully shuts down the transport, stopping new connections.
    async fn shutdown(&self) -> Result<(), Self::Error>;
}

/// A single relay connection that can send and receive byte frames.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends data to the remote peer.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Receives the next message from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Closes the connection.
    async fn close(&self) -> Result<(), Self::Error>;

    /// The unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
