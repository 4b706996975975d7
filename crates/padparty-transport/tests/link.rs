//! Integration tests for the peer link negotiator.
//!
//! Two [`LinkManager`]s — one per side — are wired through a hand-rolled
//! "relay": the test shuttles handshake blobs between them the way the
//! signaling relay would.

use padparty_protocol::ConnectionId;
use padparty_transport::{
    LinkEvent, LinkManager, LinkPath, LinkRole, LinkState, MemoryConnector,
};
use tokio::sync::mpsc;

const HOST: ConnectionId = ConnectionId(1);
const CONTROLLER: ConnectionId = ConnectionId(2);

struct Pair {
    host: LinkManager<MemoryConnector>,
    host_events: mpsc::UnboundedReceiver<LinkEvent>,
    host_relay: mpsc::UnboundedReceiver<padparty_transport::RelayOut>,
    controller: LinkManager<MemoryConnector>,
    controller_events: mpsc::UnboundedReceiver<LinkEvent>,
    controller_relay: mpsc::UnboundedReceiver<padparty_transport::RelayOut>,
}

/// Builds a host-side and controller-side manager sharing one connector.
fn pair() -> Pair {
    let connector = MemoryConnector::new();
    let (host, host_events, host_relay) = LinkManager::new(connector.clone());
    let (controller, controller_events, controller_relay) =
        LinkManager::new(connector);
    Pair {
        host,
        host_events,
        host_relay,
        controller,
        controller_events,
        controller_relay,
    }
}

/// Runs the full offer/answer exchange until both sides are connected.
fn negotiate(pair: &mut Pair) {
    let offer = pair
        .host
        .create_link(CONTROLLER)
        .expect("offer")
        .expect("fresh link produces an offer");
    let answer = pair
        .controller
        .handle_signal(HOST, &offer)
        .expect("answer")
        .expect("responder replies with an answer");
    let done = pair.host.handle_signal(CONTROLLER, &answer).expect("final");
    assert!(done.is_none(), "initiator sends no further blobs");
}

#[tokio::test]
async fn test_host_initiates_and_both_sides_connect() {
    let mut pair = pair();
    negotiate(&mut pair);

    assert_eq!(pair.host.link_state(CONTROLLER), Some(LinkState::Connected));
    assert_eq!(pair.host.link_role(CONTROLLER), Some(LinkRole::Initiator));
    assert_eq!(
        pair.controller.link_state(HOST),
        Some(LinkState::Connected)
    );
    assert_eq!(pair.controller.link_role(HOST), Some(LinkRole::Responder));

    assert!(matches!(
        pair.host_events.recv().await,
        Some(LinkEvent::Connected(CONTROLLER))
    ));
    assert!(matches!(
        pair.controller_events.recv().await,
        Some(LinkEvent::Connected(HOST))
    ));
}

#[tokio::test]
async fn test_create_link_is_idempotent_while_live() {
    let mut pair = pair();
    let first = pair.host.create_link(CONTROLLER).unwrap();
    assert!(first.is_some());
    let second = pair.host.create_link(CONTROLLER).unwrap();
    assert!(second.is_none(), "live link must not be re-offered");
}

#[tokio::test]
async fn test_connected_path_delivers_directly() {
    let mut pair = pair();
    negotiate(&mut pair);
    // Drain the Connected notifications.
    pair.host_events.recv().await;
    pair.controller_events.recv().await;

    let path = pair.controller.send_input(HOST, b"input-frame");
    assert_eq!(path, LinkPath::Direct);

    match pair.host_events.recv().await {
        Some(LinkEvent::Data { peer, data }) => {
            assert_eq!(peer, CONTROLLER);
            assert_eq!(data, b"input-frame");
        }
        other => panic!("expected data event, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unconnected_link_uses_relay_path() {
    let pair = pair();
    // No negotiation at all: path must be relay.
    assert_eq!(pair.controller.path(HOST), LinkPath::Relay);

    let path = pair.controller.send_input(HOST, b"early");
    assert_eq!(path, LinkPath::Relay);
}

#[tokio::test]
async fn test_closed_link_falls_back_to_relay_without_error() {
    let mut pair = pair();
    negotiate(&mut pair);

    pair.controller.close_link(HOST);
    assert_eq!(pair.controller.link_state(HOST), Some(LinkState::Closed));
    assert_eq!(pair.controller.path(HOST), LinkPath::Relay);

    // Scenario: the next input after a mid-session channel loss arrives
    // via the relay with no error observable by the controller.
    let path = pair.controller.send_input(HOST, b"after-close");
    assert_eq!(path, LinkPath::Relay);

    let fallback = pair.controller_relay.recv().await.expect("relay out");
    assert_eq!(fallback.peer, HOST);
    assert_eq!(fallback.data, b"after-close");
}

#[tokio::test]
async fn test_remote_hangup_marks_link_closed() {
    let mut pair = pair();
    negotiate(&mut pair);
    pair.host_events.recv().await; // Connected
    pair.controller_events.recv().await; // Connected

    // Host side tears down; the controller's reader observes the hangup.
    pair.host.close_link(CONTROLLER);

    match pair.controller_events.recv().await {
        Some(LinkEvent::Closed(peer)) => assert_eq!(peer, HOST),
        other => panic!("expected closed event, got {other:?}"),
    }
    assert_eq!(pair.controller.link_state(HOST), Some(LinkState::Closed));
    assert_eq!(pair.controller.path(HOST), LinkPath::Relay);
}

#[tokio::test]
async fn test_send_failure_falls_back_per_message_and_keeps_link() {
    let mut pair = pair();
    negotiate(&mut pair);

    // Kill the host side without telling the controller: its next direct
    // send fails at send time and must fall back for that message only.
    drop(pair.host);

    let path = pair.controller.send_input(HOST, b"transient");
    assert_eq!(path, LinkPath::Relay);

    // The failure alone must not have torn the link down. (Checked before
    // any await so the controller's reader task cannot have observed the
    // hangup yet — this test runs on the current-thread flavor.)
    assert_eq!(
        pair.controller.link_state(HOST),
        Some(LinkState::Connected)
    );

    let fallback = pair.controller_relay.recv().await.expect("relay out");
    assert_eq!(fallback.data, b"transient");
    let _ = pair.host_relay;
}

#[tokio::test]
async fn test_reoffer_after_close_restarts_negotiation() {
    let mut pair = pair();
    negotiate(&mut pair);

    pair.host.close_link(CONTROLLER);
    pair.controller.close_link(HOST);

    // Host reconnect: a fresh offer over the closed link pair.
    let offer = pair
        .host
        .create_link(CONTROLLER)
        .unwrap()
        .expect("closed link accepts a fresh offer");
    let answer = pair
        .controller
        .handle_signal(HOST, &offer)
        .unwrap()
        .expect("answer");
    pair.host.handle_signal(CONTROLLER, &answer).unwrap();

    assert_eq!(pair.host.link_state(CONTROLLER), Some(LinkState::Connected));
    assert_eq!(pair.controller.link_state(HOST), Some(LinkState::Connected));
}

#[tokio::test]
async fn test_shutdown_closes_every_link() {
    let mut pair = pair();
    negotiate(&mut pair);

    pair.host.shutdown();
    assert_eq!(pair.host.path(CONTROLLER), LinkPath::Relay);
    assert_eq!(pair.host.link_state(CONTROLLER), None);
}
