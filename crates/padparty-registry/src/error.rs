//! Error types for the room registry.

use padparty_protocol::RoomCode;

/// Errors that can occur during registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// No active room has this code. Surfaced to the requester as a
    /// protocol-level error message, never fatal to the relay.
    #[error("room {0} not found")]
    RoomNotFound(RoomCode),
}
