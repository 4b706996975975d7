//! Codec trait and implementations for serializing/deserializing messages.
//!
//! The relay and host don't care *how* events become bytes — they go
//! through the [`Codec`] trait, and the concrete format is swappable.
//! [`JsonCodec`] is the default: human-readable, debuggable from browser
//! dev tools, and what the controller side speaks.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// Converts protocol values to bytes and back.
///
/// `Send + Sync + 'static` because a codec is shared across the relay's
/// per-connection tasks.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if the value can't be represented
    /// in this format.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

/// A [`Codec`] that speaks JSON via `serde_json`.
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(test)]
#[cfg(feature = "json")]
mod tests {
    use super::*;
    use crate::{ClientEvent, ServerEvent};

    #[test]
    fn test_json_codec_round_trips_client_events() {
        let codec = JsonCodec;
        let ev = ClientEvent::JoinRoom {
            code: "QXJK".parse().unwrap(),
            nickname: "Ann".into(),
        };
        let bytes = codec.encode(&ev).unwrap();
        let back: ClientEvent = codec.decode(&bytes).unwrap();
        assert_eq!(ev, back);
    }

    #[test]
    fn test_json_codec_round_trips_server_events() {
        let codec = JsonCodec;
        let ev = ServerEvent::RoomClosed;
        let bytes = codec.encode(&ev).unwrap();
        let back: ServerEvent = codec.decode(&bytes).unwrap();
        assert_eq!(ev, back);
    }

    #[test]
    fn test_json_codec_decode_rejects_garbage() {
        let codec = JsonCodec;
        let result: Result<ClientEvent, _> = codec.decode(b"\xff\xfe");
        assert!(result.is_err());
    }
}
