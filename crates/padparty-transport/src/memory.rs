//! In-process direct channels for tests and single-machine play.
//!
//! [`MemoryConnector`] implements the [`Connector`] handshake with a pair
//! of byte pipes instead of a real peer-to-peer stack. The offer blob
//! carries a random session token; both sides must hold clones of the
//! same connector so the responder can find the initiator's pending pipe.
//!
//! Blob layout (the negotiator treats it as opaque): 1 kind byte
//! (0 = offer, 1 = answer) followed by the token as 8 little-endian bytes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use padparty_protocol::ConnectionId;
use rand::Rng;
use tokio::sync::mpsc;

use crate::{Connector, DirectChannel, Negotiated, TransportError};

const KIND_OFFER: u8 = 0;
const KIND_ANSWER: u8 = 1;

fn encode_blob(kind: u8, token: u64) -> Vec<u8> {
    let mut blob = Vec::with_capacity(9);
    blob.push(kind);
    blob.extend_from_slice(&token.to_le_bytes());
    blob
}

fn decode_blob(blob: &[u8]) -> Result<(u8, u64), TransportError> {
    let (&kind, rest) = blob.split_first().ok_or_else(|| {
        TransportError::NegotiationFailed("empty handshake blob".into())
    })?;
    let token_bytes: [u8; 8] = rest.try_into().map_err(|_| {
        TransportError::NegotiationFailed("truncated handshake blob".into())
    })?;
    Ok((kind, u64::from_le_bytes(token_bytes)))
}

/// One endpoint of a byte pipe: the outbound sender plus the inbound
/// receiver the link manager will read from.
struct Endpoint {
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    inbound: mpsc::UnboundedReceiver<Vec<u8>>,
}

/// A handshake waiting for its other half.
struct Pending {
    /// Taken by the responder when the offer arrives.
    responder: Option<Endpoint>,
    /// Taken by the initiator when the answer comes back.
    initiator: Option<Endpoint>,
}

/// A [`Connector`] that pairs endpoints inside one process.
///
/// Cheap to clone; clones share the pending-handshake table, which is how
/// the two sides of a test or demo find each other.
#[derive(Clone, Default)]
pub struct MemoryConnector {
    pending: Arc<Mutex<HashMap<u64, Pending>>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_pending<T>(
        &self,
        f: impl FnOnce(&mut HashMap<u64, Pending>) -> T,
    ) -> T {
        // A poisoned lock means a panic elsewhere already sank the test
        // or demo; recovering the inner map keeps this path panic-free.
        let mut guard = match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }
}

impl Connector for MemoryConnector {
    type Channel = MemoryChannel;

    fn initiate(
        &self,
        peer: ConnectionId,
    ) -> Result<Vec<u8>, TransportError> {
        let (to_responder, from_initiator) = mpsc::unbounded_channel();
        let (to_initiator, from_responder) = mpsc::unbounded_channel();

        let token: u64 = rand::rng().random();
        self.with_pending(|pending| {
            pending.insert(
                token,
                Pending {
                    responder: Some(Endpoint {
                        outbound: to_initiator,
                        inbound: from_initiator,
                    }),
                    initiator: Some(Endpoint {
                        outbound: to_responder,
                        inbound: from_responder,
                    }),
                },
            );
        });

        tracing::trace!(%peer, token, "memory handshake offered");
        Ok(encode_blob(KIND_OFFER, token))
    }

    fn handle_signal(
        &self,
        peer: ConnectionId,
        signal: &[u8],
    ) -> Result<Negotiated<MemoryChannel>, TransportError> {
        let (kind, token) = decode_blob(signal)?;

        match kind {
            KIND_OFFER => {
                let endpoint = self
                    .with_pending(|p| {
                        p.get_mut(&token).and_then(|e| e.responder.take())
                    })
                    .ok_or_else(|| {
                        TransportError::NegotiationFailed(format!(
                            "unknown handshake token from {peer}"
                        ))
                    })?;
                Ok(Negotiated::Established {
                    channel: MemoryChannel::new(endpoint.outbound),
                    inbound: endpoint.inbound,
                    reply: Some(encode_blob(KIND_ANSWER, token)),
                })
            }
            KIND_ANSWER => {
                let endpoint = self
                    .with_pending(|p| {
                        let endpoint =
                            p.get_mut(&token).and_then(|e| e.initiator.take());
                        // Both halves claimed: the entry is spent.
                        p.remove(&token);
                        endpoint
                    })
                    .ok_or_else(|| {
                        TransportError::NegotiationFailed(format!(
                            "answer for unknown handshake token from {peer}"
                        ))
                    })?;
                Ok(Negotiated::Established {
                    channel: MemoryChannel::new(endpoint.outbound),
                    inbound: endpoint.inbound,
                    reply: None,
                })
            }
            other => Err(TransportError::NegotiationFailed(format!(
                "unknown handshake blob kind {other}"
            ))),
        }
    }
}

/// The outbound half of an in-process direct channel.
pub struct MemoryChannel {
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    closed: AtomicBool,
}

impl MemoryChannel {
    fn new(outbound: mpsc::UnboundedSender<Vec<u8>>) -> Self {
        Self {
            outbound,
            closed: AtomicBool::new(false),
        }
    }
}

impl DirectChannel for MemoryChannel {
    fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::ConnectionClosed(
                "channel closed locally".into(),
            ));
        }
        self.outbound.send(data.to_vec()).map_err(|_| {
            TransportError::ConnectionClosed("peer hung up".into())
        })
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_round_trip() {
        let blob = encode_blob(KIND_OFFER, 0xDEAD_BEEF);
        assert_eq!(decode_blob(&blob).unwrap(), (KIND_OFFER, 0xDEAD_BEEF));
    }

    #[test]
    fn test_decode_rejects_short_blobs() {
        assert!(decode_blob(&[]).is_err());
        assert!(decode_blob(&[KIND_OFFER, 1, 2]).is_err());
    }

    #[tokio::test]
    async fn test_offer_answer_pairs_two_channels() {
        let connector = MemoryConnector::new();
        let host = ConnectionId(1);
        let controller = ConnectionId(2);

        let offer = connector.initiate(controller).unwrap();

        // Responder completes on the offer and produces an answer.
        let Negotiated::Established {
            channel: responder_tx,
            inbound: mut responder_rx,
            reply: Some(answer),
        } = connector.handle_signal(host, &offer).unwrap()
        else {
            panic!("offer should establish the responder side");
        };

        // Initiator completes on the answer.
        let Negotiated::Established {
            channel: initiator_tx,
            inbound: mut initiator_rx,
            reply: None,
        } = connector.handle_signal(controller, &answer).unwrap()
        else {
            panic!("answer should establish the initiator side");
        };

        initiator_tx.send(b"ping").unwrap();
        responder_tx.send(b"pong").unwrap();
        assert_eq!(responder_rx.recv().await.unwrap(), b"ping");
        assert_eq!(initiator_rx.recv().await.unwrap(), b"pong");
    }

    #[tokio::test]
    async fn test_unknown_token_is_a_negotiation_failure() {
        let connector = MemoryConnector::new();
        let blob = encode_blob(KIND_OFFER, 42);
        assert!(connector.handle_signal(ConnectionId(1), &blob).is_err());
    }

    #[tokio::test]
    async fn test_closed_channel_refuses_sends() {
        let connector = MemoryConnector::new();
        let offer = connector.initiate(ConnectionId(2)).unwrap();
        let Negotiated::Established { channel, .. } =
            connector.handle_signal(ConnectionId(1), &offer).unwrap()
        else {
            panic!("should establish");
        };
        channel.close();
        assert!(channel.send(b"late").is_err());
    }
}
