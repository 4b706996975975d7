//! Unified error type for the Padparty meta crate.

use padparty_protocol::ProtocolError;
use padparty_registry::RegistryError;
use padparty_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attributes auto-generate `From` impls, so `?` converts
/// sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum PadpartyError {
    /// A transport-level error (connection, send, recv, negotiation).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, malformed input).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A registry-level error (unknown room).
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let wrapped: PadpartyError = err.into();
        assert!(matches!(wrapped, PadpartyError::Transport(_)));
        assert!(wrapped.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::MalformedInput("bad".into());
        let wrapped: PadpartyError = err.into();
        assert!(matches!(wrapped, PadpartyError::Protocol(_)));
    }

    #[test]
    fn test_from_registry_error() {
        let err = RegistryError::RoomNotFound("ABCD".parse().unwrap());
        let wrapped: PadpartyError = err.into();
        assert!(matches!(wrapped, PadpartyError::Registry(_)));
        assert!(wrapped.to_string().contains("ABCD"));
    }
}
