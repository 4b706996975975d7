//! `RelayServer` builder and accept loop.
//!
//! The relay is the always-on message bus: it owns the room registry and
//! a routing table of connected peers, and forwards events between them.
//! All mutation happens under one lock, so every inbound event is handled
//! to completion before the next — the registry needs no locking
//! discipline of its own, and cross-room interference is impossible by
//! construction (every lookup is keyed by room code).

use std::collections::HashMap;
use std::sync::Arc;

use padparty_protocol::{Codec, ConnectionId, JsonCodec};
use padparty_registry::SessionRegistry;
use padparty_transport::{Transport, WebSocketTransport};
use tokio::sync::Mutex;

use crate::handler::{handle_connection, PeerHandle};
use crate::PadpartyError;

/// The sequentially-mutated heart of the relay: rooms plus the routing
/// table. Guarded by a single mutex in [`RelayState`].
pub(crate) struct RelayCore {
    pub(crate) registry: SessionRegistry,
    pub(crate) peers: HashMap<ConnectionId, PeerHandle>,
}

impl RelayCore {
    fn new() -> Self {
        Self {
            registry: SessionRegistry::new(),
            peers: HashMap::new(),
        }
    }
}

/// Shared server state, one per relay process.
pub(crate) struct RelayState<C: Codec> {
    pub(crate) core: Mutex<RelayCore>,
    pub(crate) codec: C,
}

/// Builder for configuring and starting a relay.
///
/// # Example
///
/// ```rust,ignore
/// let server = RelayServerBuilder::new()
///     .bind("0.0.0.0:3001")
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct RelayServerBuilder {
    bind_addr: String,
}

impl RelayServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:3001".to_string(),
        }
    }

    /// Sets the address to bind the relay to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Binds the listener and builds the server.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport` — the formats the
    /// browser-side host and controllers speak.
    pub async fn build(self) -> Result<RelayServer, PadpartyError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;
        let state = Arc::new(RelayState {
            core: Mutex::new(RelayCore::new()),
            codec: JsonCodec,
        });
        Ok(RelayServer { transport, state })
    }
}

impl Default for RelayServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running signaling relay.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct RelayServer {
    transport: WebSocketTransport,
    state: Arc<RelayState<JsonCodec>>,
}

impl RelayServer {
    /// Creates a new builder.
    pub fn builder() -> RelayServerBuilder {
        RelayServerBuilder::new()
    }

    /// Returns the local address the relay is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the accept loop.
    ///
    /// Spawns a handler task per connection and runs until the process is
    /// terminated. Per-connection failures never escape their task — the
    /// relay itself must not die with a room.
    pub async fn run(mut self) -> Result<(), PadpartyError> {
        tracing::info!("Padparty relay running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        handle_connection(conn, state).await;
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
