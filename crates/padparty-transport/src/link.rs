//! The dual-path peer link negotiator.
//!
//! One [`LinkManager`] lives on each side of a session (host and
//! controller). Per remote peer it runs a small state machine:
//!
//! ```text
//! Negotiating ──(handshake completes)──→ Connected ──(error/teardown)──→ Closed
//! ```
//!
//! The host is always the **initiator**: on learning of a new player it
//! calls [`LinkManager::create_link`], gets an offer blob, and routes it
//! through the signaling relay. The controller is always the **responder**
//! and answers through the same relay channel. Handshake blobs are opaque
//! here — a [`Connector`] produces and consumes them.
//!
//! Input delivery prefers the direct path whenever the link is `Connected`
//! and otherwise goes through the relay. A direct send that *fails* falls
//! back to the relay for that one message without tearing the link down —
//! only channel closure (remote hangup or explicit [`LinkManager::close_link`])
//! moves the state to `Closed`. A closed responder does not retry on its
//! own; a fresh attempt requires a new offer from the initiator.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use padparty_protocol::ConnectionId;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::TransportError;

// ---------------------------------------------------------------------------
// Channel and connector seams
// ---------------------------------------------------------------------------

/// An established direct data channel to one peer.
///
/// `send` is synchronous: a direct channel is a queue push, and the
/// negotiator needs the failure surfaced at the call site so it can fall
/// back to the relay for that specific message.
pub trait DirectChannel: Send + Sync + 'static {
    /// Pushes one frame to the peer.
    fn send(&self, data: &[u8]) -> Result<(), TransportError>;

    /// Stops the local side from sending. The remote side observes
    /// closure when the channel object is dropped.
    fn close(&self);
}

/// The result of feeding a handshake blob to a [`Connector`].
pub enum Negotiated<C> {
    /// The handshake continues: route this blob back through the relay.
    Reply(Vec<u8>),
    /// The handshake completed on this side.
    Established {
        /// The outbound half of the channel.
        channel: C,
        /// The inbound half; the manager spawns a reader task on it.
        inbound: mpsc::UnboundedReceiver<Vec<u8>>,
        /// A final blob to route back, if the protocol requires one
        /// (the responder's answer).
        reply: Option<Vec<u8>>,
    },
}

/// Produces direct channels from an exchange of opaque handshake blobs.
///
/// The NAT-assist configuration and the actual wire technology live
/// behind this trait; the negotiator only shuttles blobs.
pub trait Connector: Send + Sync + 'static {
    /// The channel type this connector establishes.
    type Channel: DirectChannel;

    /// Initiator side: begins a handshake with `peer`, returning the
    /// offer blob to route through the relay.
    fn initiate(
        &self,
        peer: ConnectionId,
    ) -> Result<Vec<u8>, TransportError>;

    /// Feeds a blob received from `peer` into the handshake.
    fn handle_signal(
        &self,
        peer: ConnectionId,
        signal: &[u8],
    ) -> Result<Negotiated<Self::Channel>, TransportError>;
}

// ---------------------------------------------------------------------------
// Link state
// ---------------------------------------------------------------------------

/// Which side of the handshake this link is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkRole {
    /// The host side: creates offers.
    Initiator,
    /// The controller side: answers offers.
    Responder,
}

/// Lifecycle state of a peer link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LinkState {
    Negotiating = 0,
    Connected = 1,
    Closed = 2,
}

/// Which path input delivery currently uses.
///
/// `Direct` if and only if the link state is `Connected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkPath {
    Direct,
    Relay,
}

/// Link state shared with the link's reader task, so remote closure
/// observed by the reader is visible to the manager without locking.
#[derive(Clone)]
struct SharedState(Arc<AtomicU8>);

impl SharedState {
    fn new(state: LinkState) -> Self {
        Self(Arc::new(AtomicU8::new(state as u8)))
    }

    fn get(&self) -> LinkState {
        match self.0.load(Ordering::Acquire) {
            0 => LinkState::Negotiating,
            1 => LinkState::Connected,
            _ => LinkState::Closed,
        }
    }

    fn set(&self, state: LinkState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// Notifications emitted by a [`LinkManager`].
#[derive(Debug)]
pub enum LinkEvent {
    /// The direct channel to this peer came up.
    Connected(ConnectionId),
    /// The direct channel to this peer went away; delivery reverted to
    /// the relay path.
    Closed(ConnectionId),
    /// A frame arrived over the direct channel. The peer id is attached
    /// here because the channel itself carries no sender metadata.
    Data {
        peer: ConnectionId,
        data: Vec<u8>,
    },
}

/// A message that fell back to the relay path. The runtime owning the
/// relay socket wraps it into the proper relay envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayOut {
    pub peer: ConnectionId,
    pub data: Vec<u8>,
}

struct Link<Ch> {
    role: LinkRole,
    state: SharedState,
    channel: Option<Ch>,
    reader: Option<JoinHandle<()>>,
}

impl<Ch: DirectChannel> Link<Ch> {
    fn teardown(&mut self) {
        if let Some(channel) = self.channel.take() {
            channel.close();
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.state.set(LinkState::Closed);
    }
}

// ---------------------------------------------------------------------------
// LinkManager
// ---------------------------------------------------------------------------

/// Owns every peer link on one side of a session.
pub struct LinkManager<C: Connector> {
    connector: C,
    links: HashMap<ConnectionId, Link<C::Channel>>,
    events: mpsc::UnboundedSender<LinkEvent>,
    relay: mpsc::UnboundedSender<RelayOut>,
}

impl<C: Connector> LinkManager<C> {
    /// Creates a manager. Returns the receivers for link notifications
    /// and for messages that fell back to the relay path.
    pub fn new(
        connector: C,
    ) -> (
        Self,
        mpsc::UnboundedReceiver<LinkEvent>,
        mpsc::UnboundedReceiver<RelayOut>,
    ) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (relay_tx, relay_rx) = mpsc::unbounded_channel();
        (
            Self {
                connector,
                links: HashMap::new(),
                events: events_tx,
                relay: relay_tx,
            },
            events_rx,
            relay_rx,
        )
    }

    /// Initiator side: ensures a link to `peer` exists.
    ///
    /// Idempotent — if a live (negotiating or connected) link is already
    /// present, nothing happens and `None` is returned. A fresh
    /// negotiation starts only when no link exists or the previous one is
    /// closed (e.g., a controller reconnect); the returned blob must be
    /// routed to the peer through the relay.
    pub fn create_link(
        &mut self,
        peer: ConnectionId,
    ) -> Result<Option<Vec<u8>>, TransportError> {
        if let Some(link) = self.links.get_mut(&peer) {
            if link.state.get() != LinkState::Closed {
                return Ok(None);
            }
            // Re-offer over a dead link: clear the remnants first.
            link.teardown();
        }

        let offer = self.connector.initiate(peer)?;
        self.links.insert(
            peer,
            Link {
                role: LinkRole::Initiator,
                state: SharedState::new(LinkState::Negotiating),
                channel: None,
                reader: None,
            },
        );
        tracing::debug!(%peer, "link negotiation started");
        Ok(Some(offer))
    }

    /// Feeds a handshake blob received from `peer` via the relay.
    ///
    /// Creates a responder link on first contact (the controller side
    /// never initiates). Returns a blob to route back, if any.
    pub fn handle_signal(
        &mut self,
        peer: ConnectionId,
        signal: &[u8],
    ) -> Result<Option<Vec<u8>>, TransportError> {
        let link = self.links.entry(peer).or_insert_with(|| Link {
            role: LinkRole::Responder,
            state: SharedState::new(LinkState::Negotiating),
            channel: None,
            reader: None,
        });

        // A new offer arriving over a closed link restarts negotiation.
        if link.state.get() == LinkState::Closed {
            link.teardown();
            link.state.set(LinkState::Negotiating);
        }

        match self.connector.handle_signal(peer, signal)? {
            Negotiated::Reply(blob) => Ok(Some(blob)),
            Negotiated::Established {
                channel,
                inbound,
                reply,
            } => {
                link.channel = Some(channel);
                link.state.set(LinkState::Connected);
                link.reader = Some(spawn_reader(
                    peer,
                    inbound,
                    link.state.clone(),
                    self.events.clone(),
                ));
                let _ = self.events.send(LinkEvent::Connected(peer));
                tracing::info!(%peer, role = ?link.role, "direct channel connected");
                Ok(reply)
            }
        }
    }

    /// Sends one input frame to `peer`, preferring the direct path.
    ///
    /// Falls back to the relay when the link is not connected, and also
    /// when a direct send fails — in that case only the one message is
    /// re-routed; the link is not torn down for a transient error.
    /// Returns the path actually used.
    pub fn send_input(&self, peer: ConnectionId, data: &[u8]) -> LinkPath {
        if let Some(link) = self.links.get(&peer) {
            if link.state.get() == LinkState::Connected {
                if let Some(channel) = &link.channel {
                    match channel.send(data) {
                        Ok(()) => return LinkPath::Direct,
                        Err(e) => {
                            tracing::warn!(
                                %peer, error = %e,
                                "direct send failed, falling back to relay"
                            );
                        }
                    }
                }
            }
        }
        let _ = self.relay.send(RelayOut {
            peer,
            data: data.to_vec(),
        });
        LinkPath::Relay
    }

    /// Tears down the link to `peer`: closes the channel, aborts the
    /// reader task, and reverts delivery to the relay path.
    pub fn close_link(&mut self, peer: ConnectionId) {
        if let Some(link) = self.links.get_mut(&peer) {
            if link.state.get() != LinkState::Closed {
                link.teardown();
                let _ = self.events.send(LinkEvent::Closed(peer));
                tracing::debug!(%peer, "link closed");
            }
        }
    }

    /// The path input to `peer` would take right now.
    pub fn path(&self, peer: ConnectionId) -> LinkPath {
        match self.links.get(&peer) {
            Some(link) if link.state.get() == LinkState::Connected => {
                LinkPath::Direct
            }
            _ => LinkPath::Relay,
        }
    }

    /// The state of the link to `peer`, if one exists.
    pub fn link_state(&self, peer: ConnectionId) -> Option<LinkState> {
        self.links.get(&peer).map(|l| l.state.get())
    }

    /// The role this side plays on the link to `peer`, if one exists.
    pub fn link_role(&self, peer: ConnectionId) -> Option<LinkRole> {
        self.links.get(&peer).map(|l| l.role)
    }

    /// Tears down every link. Called on room teardown; immediate and
    /// unconditional, no drain of in-flight input.
    pub fn shutdown(&mut self) {
        for (peer, link) in self.links.iter_mut() {
            if link.state.get() != LinkState::Closed {
                link.teardown();
                let _ = self.events.send(LinkEvent::Closed(*peer));
            }
        }
        self.links.clear();
    }
}

impl<C: Connector> Drop for LinkManager<C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Forwards inbound channel frames as [`LinkEvent::Data`] until the
/// remote side hangs up, then marks the link closed.
fn spawn_reader(
    peer: ConnectionId,
    mut inbound: mpsc::UnboundedReceiver<Vec<u8>>,
    state: SharedState,
    events: mpsc::UnboundedSender<LinkEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(data) = inbound.recv().await {
            if events.send(LinkEvent::Data { peer, data }).is_err() {
                return;
            }
        }
        // Remote hangup. Skip the notification if the manager already
        // closed the link itself.
        if state.get() != LinkState::Closed {
            state.set(LinkState::Closed);
            let _ = events.send(LinkEvent::Closed(peer));
        }
    })
}
