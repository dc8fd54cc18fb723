use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use super::*;
use crate::channel::TransportError;
use crate::session::Session;
use crate::store::Delivery;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Call {
    Open(ChannelId, String),
    Send(ChannelId, String),
    Close(ChannelId),
}

#[derive(Default)]
struct Recorder {
    calls: Vec<Call>,
    open: HashSet<ChannelId>,
    max_open: usize,
}

#[derive(Clone, Default)]
struct FakeTransport {
    log: Rc<RefCell<Recorder>>,
}

impl FakeTransport {
    fn calls(&self) -> Vec<Call> {
        self.log.borrow().calls.clone()
    }

    fn sends(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Send(_, text) => Some(text),
                _ => None,
            })
            .collect()
    }

    fn opens(&self) -> usize {
        self.calls().iter().filter(|c| matches!(c, Call::Open(..))).count()
    }
}

impl Transport for FakeTransport {
    fn open(&mut self, channel: ChannelId, url: &str) {
        let mut log = self.log.borrow_mut();
        log.calls.push(Call::Open(channel, url.to_owned()));
        log.open.insert(channel);
        log.max_open = log.max_open.max(log.open.len());
    }

    fn send(&mut self, channel: ChannelId, text: String) -> Result<(), TransportError> {
        let mut log = self.log.borrow_mut();
        if !log.open.contains(&channel) {
            return Err(TransportError::UnknownChannel(channel));
        }
        log.calls.push(Call::Send(channel, text));
        Ok(())
    }

    fn close(&mut self, channel: ChannelId) {
        let mut log = self.log.borrow_mut();
        log.calls.push(Call::Close(channel));
        log.open.remove(&channel);
    }
}

fn session() -> Session {
    Session {
        access: "tok".to_owned(),
        email: "me@x.com".to_owned(),
        refresh: None,
        user_id: Some("1".to_owned()),
        username: Some("me".to_owned()),
    }
}

fn manager_with(context: CredentialContext, policy: SendPolicy) -> (ChannelManager<FakeTransport>, FakeTransport) {
    let transport = FakeTransport::default();
    let endpoint = ChatEndpoint::from_base_url("http://host").expect("valid base");
    (ChannelManager::new(context, endpoint, transport.clone(), policy), transport)
}

fn manager() -> (ChannelManager<FakeTransport>, FakeTransport) {
    manager_with(CredentialContext::new(Some(session())), SendPolicy::Optimistic)
}

fn open_peer(manager: &mut ChannelManager<FakeTransport>, peer: &str) -> ChannelId {
    manager.select_peer(Some(PeerId::from(peer))).expect("select should succeed");
    let id = manager.active_channel().expect("channel allocated");
    manager.dispatch(id, ChannelEvent::Opened);
    id
}

fn chat(sender: &str, body: &str) -> ChannelEvent {
    ChannelEvent::Frame(format!(r#"{{"sender":"{sender}","message":"{body}"}}"#))
}

fn bodies(manager: &ChannelManager<FakeTransport>) -> Vec<&str> {
    manager.store().iter().map(|m| m.body.as_str()).collect()
}

#[test]
fn ack_then_chat_lands_one_message() {
    let (mut manager, transport) = manager();
    manager.select_peer(Some(PeerId::from("42"))).expect("select");

    let id = manager.active_channel().expect("channel");
    assert_eq!(
        transport.calls(),
        vec![Call::Open(id, "ws://host/ws/chat/?token=tok&recipient=42".to_owned())]
    );
    assert_eq!(manager.status(), ConnectionStatus::Connecting);

    manager.dispatch(id, ChannelEvent::Opened);
    manager.dispatch(
        id,
        ChannelEvent::Frame(r#"{"type":"websocket_connected","room":"chat_1_42"}"#.to_owned()),
    );
    manager.dispatch(id, chat("a@x.com", "hi"));

    assert_eq!(manager.status(), ConnectionStatus::Connected);
    let messages = manager.store().messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].sender, "a@x.com");
    assert_eq!(messages[0].body, "hi");
    assert_eq!(messages[0].delivery, Delivery::Received);
}

#[test]
fn switching_peers_closes_before_opening() {
    let (mut manager, transport) = manager();
    let first = open_peer(&mut manager, "A");
    let second = open_peer(&mut manager, "B");

    assert_ne!(first, second);
    let calls = transport.calls();
    let close_at = calls.iter().position(|c| *c == Call::Close(first)).expect("first closed");
    let open_at = calls
        .iter()
        .position(|c| matches!(c, Call::Open(id, _) if *id == second))
        .expect("second opened");
    assert!(close_at < open_at);
    assert_eq!(transport.log.borrow().max_open, 1);
    assert_eq!(manager.active_peer(), Some(&PeerId::from("B")));
    assert_eq!(manager.state(), ChannelState::Open);
}

#[test]
fn late_frame_from_superseded_channel_is_dropped() {
    let (mut manager, _transport) = manager();
    let first = open_peer(&mut manager, "A");
    manager.select_peer(Some(PeerId::from("B"))).expect("select B");

    manager.dispatch(first, chat("A", "late"));
    let second = manager.active_channel().expect("channel");
    manager.dispatch(second, ChannelEvent::Opened);
    manager.dispatch(first, chat("A", "later"));

    assert!(manager.store().is_empty());
    assert_eq!(manager.store().peer(), Some(&PeerId::from("B")));
}

#[test]
fn late_handshake_on_superseded_channel_is_closed() {
    let (mut manager, transport) = manager();
    manager.select_peer(Some(PeerId::from("A"))).expect("select A");
    let first = manager.active_channel().expect("channel");
    manager.select_peer(Some(PeerId::from("B"))).expect("select B");

    manager.dispatch(first, ChannelEvent::Opened);

    let closes = transport.calls().iter().filter(|c| **c == Call::Close(first)).count();
    assert_eq!(closes, 2);
    assert_eq!(manager.state(), ChannelState::Connecting);
}

#[test]
fn inbound_frames_keep_receipt_order() {
    let (mut manager, _transport) = manager();
    let id = open_peer(&mut manager, "42");
    for body in ["one", "two", "three"] {
        manager.dispatch(id, chat("42", body));
    }
    assert_eq!(bodies(&manager), vec!["one", "two", "three"]);
}

#[test]
fn blank_send_is_rejected_without_framing() {
    let (mut manager, transport) = manager();
    open_peer(&mut manager, "42");

    for text in ["", "   ", "\n\t"] {
        assert!(matches!(manager.send(text), Err(ChatError::EmptyMessage)));
    }
    assert!(transport.sends().is_empty());
    assert!(manager.store().is_empty());
}

#[test]
fn send_without_open_channel_is_unavailable() {
    let (mut manager, transport) = manager();
    assert!(matches!(manager.send("hi"), Err(ChatError::ChannelUnavailable)));

    manager.select_peer(Some(PeerId::from("42"))).expect("select");
    assert!(matches!(manager.send("hi"), Err(ChatError::ChannelUnavailable)));

    let id = manager.active_channel().expect("channel");
    manager.dispatch(id, ChannelEvent::Failed("refused".to_owned()));
    assert!(matches!(manager.send("hi"), Err(ChatError::ChannelUnavailable)));

    assert!(transport.sends().is_empty());
    assert!(manager.store().is_empty());
}

#[test]
fn send_frames_receiver_message_sender() {
    let (mut manager, transport) = manager();
    open_peer(&mut manager, "42");

    let seq = manager.send("hello").expect("send");
    assert_eq!(seq, 1);
    assert_eq!(
        transport.sends(),
        vec![r#"{"receiver":"42","message":"hello","sender":"me@x.com"}"#.to_owned()]
    );
    let pending = &manager.store().messages()[0];
    assert_eq!(pending.delivery, Delivery::Pending);
    assert_eq!(pending.client_seq, Some(1));
}

#[test]
fn echo_confirms_pending_instead_of_duplicating() {
    let (mut manager, _transport) = manager();
    let id = open_peer(&mut manager, "42");

    manager.send("hello").expect("send");
    manager.dispatch(id, chat("1", "hello"));

    let messages = manager.store().messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].delivery, Delivery::Delivered);
}

#[test]
fn echo_matches_relay_reported_user_id() {
    let mut anonymous_id = session();
    anonymous_id.user_id = None;
    anonymous_id.username = None;
    let (mut manager, _transport) = manager_with(CredentialContext::new(Some(anonymous_id)), SendPolicy::Optimistic);
    let id = open_peer(&mut manager, "42");

    manager.dispatch(
        id,
        ChannelEvent::Frame(r#"{"type":"websocket_connected","room":"chat_9_42","user_id":"9"}"#.to_owned()),
    );
    manager.send("hey").expect("send");
    manager.dispatch(id, chat("9", "hey"));

    assert_eq!(manager.store().len(), 1);
    assert_eq!(manager.store().messages()[0].delivery, Delivery::Delivered);
}

#[test]
fn echo_only_policy_appends_from_inbound_only() {
    let (mut manager, _transport) = manager_with(CredentialContext::new(Some(session())), SendPolicy::EchoOnly);
    let id = open_peer(&mut manager, "42");

    manager.send("hello").expect("send");
    assert!(manager.store().is_empty());

    manager.dispatch(id, chat("me@x.com", "hello"));
    let messages = manager.store().messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].delivery, Delivery::Received);
}

#[test]
fn reselecting_open_peer_is_noop() {
    let (mut manager, transport) = manager();
    let id = open_peer(&mut manager, "42");
    manager.dispatch(id, chat("42", "kept"));

    manager.select_peer(Some(PeerId::from("42"))).expect("reselect");

    assert_eq!(transport.opens(), 1);
    assert_eq!(manager.active_channel(), Some(id));
    assert_eq!(bodies(&manager), vec!["kept"]);
}

#[test]
fn reselecting_failed_peer_reconnects() {
    let (mut manager, transport) = manager();
    let first = open_peer(&mut manager, "42");
    manager.dispatch(first, ChannelEvent::Failed("reset".to_owned()));
    assert_eq!(manager.status(), ConnectionStatus::Disconnected);

    manager.select_peer(Some(PeerId::from("42"))).expect("reselect");

    assert_eq!(transport.opens(), 2);
    assert_ne!(manager.active_channel(), Some(first));
    assert_eq!(manager.status(), ConnectionStatus::Connecting);
}

#[test]
fn malformed_frame_is_dropped_and_channel_stays_open() {
    let (mut manager, _transport) = manager();
    let id = open_peer(&mut manager, "42");

    manager.dispatch(id, ChannelEvent::Frame("not json".to_owned()));
    manager.dispatch(id, ChannelEvent::Frame(r#"{"type":"typing"}"#.to_owned()));
    manager.dispatch(id, ChannelEvent::Frame(r#"{"message":"no sender"}"#.to_owned()));
    manager.dispatch(id, chat("42", "after"));

    assert_eq!(manager.state(), ChannelState::Open);
    assert_eq!(bodies(&manager), vec!["after"]);
}

#[test]
fn missing_token_fails_closed() {
    let (mut manager, transport) = manager_with(CredentialContext::anonymous(), SendPolicy::Optimistic);

    let result = manager.select_peer(Some(PeerId::from("42")));

    assert!(matches!(result, Err(ChatError::AuthMissing)));
    assert!(transport.calls().is_empty());
    assert_eq!(manager.status(), ConnectionStatus::NotAuthenticated);
}

#[test]
fn remote_close_keeps_store_and_reports_disconnected() {
    let (mut manager, _transport) = manager();
    let id = open_peer(&mut manager, "42");
    manager.dispatch(id, chat("42", "before"));

    manager.dispatch(id, ChannelEvent::Closed { code: Some(1011), reason: "bye".to_owned() });

    assert!(matches!(manager.state(), ChannelState::Closed(CloseReason::Error(_))));
    assert_eq!(manager.status(), ConnectionStatus::Disconnected);
    assert_eq!(bodies(&manager), vec!["before"]);

    manager.dispatch(id, chat("42", "ghost"));
    assert_eq!(bodies(&manager), vec!["before"]);
}

#[test]
fn deselect_closes_channel_and_clears_store() {
    let (mut manager, transport) = manager();
    let id = open_peer(&mut manager, "42");
    manager.dispatch(id, chat("42", "hi"));

    manager.select_peer(None).expect("deselect");

    assert!(transport.calls().contains(&Call::Close(id)));
    assert_eq!(manager.state(), ChannelState::Closed(CloseReason::UserInitiated));
    assert_eq!(manager.status(), ConnectionStatus::Idle);
    assert!(manager.store().is_empty());
    assert_eq!(manager.store().peer(), None);
}

#[test]
fn superseded_close_is_recorded_on_switch() {
    let (mut manager, transport) = manager();
    let first = open_peer(&mut manager, "A");
    manager.select_peer(Some(PeerId::from("B"))).expect("select B");

    assert!(transport.calls().contains(&Call::Close(first)));
    assert_eq!(manager.state(), ChannelState::Connecting);
}

#[test]
fn drop_closes_live_channel() {
    let (mut manager, transport) = manager();
    let id = open_peer(&mut manager, "42");

    drop(manager);

    assert_eq!(transport.calls().last(), Some(&Call::Close(id)));
    assert!(transport.log.borrow().open.is_empty());
}

fn close_count(transport: &FakeTransport, channel: ChannelId) -> usize {
    transport
        .calls()
        .iter()
        .filter(|c| **c == Call::Close(channel))
        .count()
}

#[test]
fn deselect_while_connecting_ignores_late_callbacks() {
    let (mut manager, transport) = manager();
    manager.select_peer(Some(PeerId::from("A"))).expect("select A");
    let first = manager.active_channel().expect("channel");

    manager.select_peer(None).expect("deselect");
    manager.dispatch(first, ChannelEvent::Opened);
    manager.dispatch(first, chat("A", "late"));

    assert_eq!(close_count(&transport, first), 2);
    assert_eq!(manager.state(), ChannelState::Closed(CloseReason::UserInitiated));
    assert_eq!(manager.status(), ConnectionStatus::Idle);
    assert!(manager.store().is_empty());
    assert_eq!(manager.store().peer(), None);
}

#[test]
fn shutdown_while_connecting_ignores_late_callbacks() {
    let (mut manager, transport) = manager();
    manager.select_peer(Some(PeerId::from("A"))).expect("select A");
    let first = manager.active_channel().expect("channel");

    manager.shutdown();
    manager.dispatch(first, ChannelEvent::Opened);
    manager.dispatch(first, chat("A", "late"));

    assert_eq!(close_count(&transport, first), 2);
    assert_eq!(manager.state(), ChannelState::Closed(CloseReason::UserInitiated));
    assert!(manager.store().is_empty());
    assert!(transport.log.borrow().open.is_empty());
}

#[test]
fn send_on_dead_socket_reports_unavailable() {
    let (mut manager, transport) = manager();
    let id = open_peer(&mut manager, "42");
    // Socket gone before its failure event reaches the manager.
    transport.log.borrow_mut().open.remove(&id);

    let result = manager.send("hi");

    assert!(matches!(result, Err(ChatError::ChannelUnavailable)));
    assert!(transport.sends().is_empty());
    assert!(manager.store().is_empty());
}

#[test]
fn peer_id_cannot_inject_query_parameters() {
    let (mut manager, transport) = manager();
    manager.select_peer(Some(PeerId::from("2&recipient=3"))).expect("select");
    let id = manager.active_channel().expect("channel");

    assert_eq!(
        transport.calls(),
        vec![Call::Open(id, "ws://host/ws/chat/?token=tok&recipient=2%26recipient%3D3".to_owned())]
    );
}
