use std::collections::HashMap;
use std::time::Duration;

use chat_client::{
    ChatEndpoint, ChatRuntime, ClientConfig, ConnectionStatus, CredentialContext, Delivery, PeerId, SendPolicy,
    Session,
};
use chat_relay::RelayState;
use tokio::net::TcpListener;
use tokio::time::{Instant, timeout_at};

async fn spawn_relay() -> (String, RelayState) {
    let tokens = HashMap::from([("tok".to_owned(), "1".to_owned()), ("tok2".to_owned(), "2".to_owned())]);
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    let state = RelayState::new(tokens);
    tokio::spawn(chat_relay::serve(listener, state.clone()));
    (format!("http://{addr}"), state)
}

fn runtime(base: &str, token: &str, email: &str, user_id: &str) -> ChatRuntime {
    let session = Session {
        access: token.to_owned(),
        email: email.to_owned(),
        refresh: None,
        user_id: Some(user_id.to_owned()),
        username: None,
    };
    let config = ClientConfig {
        base_url: base.to_owned(),
        connect_timeout: Duration::from_secs(5),
        send_policy: SendPolicy::Optimistic,
        ..ClientConfig::default()
    };
    let endpoint = ChatEndpoint::from_base_url(base).expect("valid base");
    ChatRuntime::new(CredentialContext::new(Some(session)), endpoint, &config)
}

/// Feed transport events to the manager until `done` holds.
async fn drive_until(runtime: &mut ChatRuntime, done: impl Fn(&ChatRuntime) -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !done(runtime) {
        let (channel, event) = timeout_at(deadline, runtime.next_event())
            .await
            .expect("condition should be reached before the deadline")
            .expect("event queue open");
        runtime.dispatch(channel, event);
    }
}

#[tokio::test]
async fn message_round_trips_through_relay() {
    let (base, _relay) = spawn_relay().await;
    let mut ann = runtime(&base, "tok", "ann@x.com", "1");
    let mut bob = runtime(&base, "tok2", "bob@x.com", "2");

    ann.manager_mut().select_peer(Some(PeerId::from("2"))).expect("ann selects bob");
    bob.manager_mut().select_peer(Some(PeerId::from("1"))).expect("bob selects ann");
    drive_until(&mut ann, |r| r.manager().relay_user_id().is_some()).await;
    drive_until(&mut bob, |r| r.manager().relay_user_id().is_some()).await;
    assert_eq!(ann.manager().status(), ConnectionStatus::Connected);
    assert_eq!(bob.manager().relay_user_id(), Some("2"));

    ann.manager_mut().send("hi bob").expect("send");
    assert_eq!(ann.manager().store().messages()[0].delivery, Delivery::Pending);

    drive_until(&mut bob, |r| !r.manager().store().is_empty()).await;
    let received = &bob.manager().store().messages()[0];
    assert_eq!(received.sender, "1");
    assert_eq!(received.body, "hi bob");
    assert_eq!(received.delivery, Delivery::Received);

    drive_until(&mut ann, |r| r.manager().store().messages()[0].delivery == Delivery::Delivered).await;
    assert_eq!(ann.manager().store().len(), 1);
}

#[tokio::test]
async fn rejected_token_surfaces_as_disconnected() {
    let (base, _relay) = spawn_relay().await;
    let mut eve = runtime(&base, "forged", "eve@x.com", "9");

    eve.manager_mut().select_peer(Some(PeerId::from("1"))).expect("select starts connecting");
    drive_until(&mut eve, |r| r.manager().status() != ConnectionStatus::Connecting).await;

    assert_eq!(eve.manager().status(), ConnectionStatus::Disconnected);
    assert!(matches!(eve.manager_mut().send("hello"), Err(chat_client::ChatError::ChannelUnavailable)));
}

#[tokio::test]
async fn switching_peers_ends_on_latest_selection() {
    let (base, relay) = spawn_relay().await;
    let mut ann = runtime(&base, "tok", "ann@x.com", "1");

    ann.manager_mut().select_peer(Some(PeerId::from("2"))).expect("select 2");
    ann.manager_mut().select_peer(Some(PeerId::from("3"))).expect("select 3");
    drive_until(&mut ann, |r| r.manager().status() == ConnectionStatus::Connected).await;

    assert_eq!(ann.manager().active_peer(), Some(&PeerId::from("3")));
    assert_eq!(ann.manager().store().peer(), Some(&PeerId::from("3")));
    assert_eq!(ann.manager().transport().live_channels(), 1);

    drive_until(&mut ann, |r| r.manager().relay_user_id().is_some()).await;
    assert_eq!(relay.member_count("chat_1_3").await, 1);
    // The superseded socket may still be mid-handshake; the relay must part it.
    let deadline = Instant::now() + Duration::from_secs(5);
    while relay.member_count("chat_1_2").await > 0 {
        assert!(Instant::now() < deadline, "superseded channel still joined to chat_1_2");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(relay.member_count("chat_1_3").await, 1);
}
