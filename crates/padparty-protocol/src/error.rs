//! Error types for the protocol layer.
//!
//! A `ProtocolError` always means serialization or message shape went
//! wrong — networking and room problems live in their own crates' errors.

/// Errors that can occur while encoding or decoding protocol messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (malformed JSON, missing fields, wrong types).
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A positional input array that parsed as JSON but violates the
    /// input encoding: unknown kind tag, wrong arity, unknown symbol id,
    /// or a non-finite number. The offending event is dropped.
    #[error("malformed input: {0}")]
    MalformedInput(String),
}
