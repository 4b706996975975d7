//! Error types for the transport layer.

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection or channel was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// A direct-channel handshake could not proceed: unparseable blob,
    /// unknown session token, or a signal arriving in the wrong state.
    #[error("negotiation failed: {0}")]
    NegotiationFailed(String),

    /// The transport was shut down.
    #[error("transport shut down")]
    Shutdown,
}
