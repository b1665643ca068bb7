use std::time::Duration;
use tokio::sync::mpsc;

use parley_core::{Payload, SignalingState};
use parley_peer::{ChannelEvent, ChannelState, ConnectionConfig};

use crate::integration::init_tracing;
use crate::utils::{
    EVENT_TIMEOUT_MS, MockNetwork, establish_pair, mock_connection, spawn_relay,
    wait_for_channel, wait_for_state,
};

async fn next_message(events: &mut mpsc::UnboundedReceiver<ChannelEvent>) -> String {
    loop {
        let event = tokio::time::timeout(Duration::from_millis(EVENT_TIMEOUT_MS), events.recv())
            .await
            .expect("Timed out waiting for a message")
            .expect("Channel event stream ended");
        if let ChannelEvent::Message(Payload::Text(text)) = event {
            return text;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_messages_survive_reconnect_in_order() {
    init_tracing();

    let mut pair = establish_pair(ConnectionConfig::default(), ConnectionConfig::default())
        .await
        .expect("Failed to establish pair");

    let chat = pair
        .a
        .create_channel(Some("chat"))
        .await
        .expect("Failed to create channel");
    let remote_chat = wait_for_channel(&mut pair.b_events, "chat", true)
        .await
        .expect("b never saw the channel");
    let mut received = remote_chat.subscribe();

    for text in ["1", "2", "3"] {
        chat.send(text).expect("Failed to send");
    }
    for expected in ["1", "2", "3"] {
        assert_eq!(next_message(&mut received).await, expected);
    }

    // Lose the transport; sends keep queueing on the same handle
    pair.network.fail_ice("a");
    wait_for_state(&mut pair.a_events, SignalingState::Reconnecting)
        .await
        .expect("a never dropped");
    assert_eq!(chat.state(), ChannelState::Closed);

    chat.send("4").expect("Failed to queue");
    chat.send("5").expect("Failed to queue");
    assert_eq!(chat.queued(), 2);

    wait_for_state(&mut pair.a_events, SignalingState::Complete)
        .await
        .expect("a never reconnected");
    chat.send("6").expect("Failed to send after reconnect");

    for expected in ["4", "5", "6"] {
        assert_eq!(next_message(&mut received).await, expected);
    }
    assert_eq!(chat.queued(), 0);
    assert!(chat.is_open());

    // Same handles on both sides, nothing duplicated
    let local = pair.a.local_channels();
    assert_eq!(local.len(), 1);
    assert!(local[0].same_channel(&chat));

    let remote = pair.b.remote_channels();
    assert_eq!(remote.len(), 1);
    assert!(remote[0].same_channel(&remote_chat));
    assert!(remote_chat.is_open());
}

#[tokio::test(start_paused = true)]
async fn test_channel_created_before_offer_opens_with_session() {
    init_tracing();

    let network = MockNetwork::new();
    let a = mock_connection(&network, "a", ConnectionConfig::default());
    let b = mock_connection(&network, "b", ConnectionConfig::default());
    let mut b_events = b.subscribe();
    spawn_relay(&a, &b);
    spawn_relay(&b, &a);

    a.init().await.expect("Failed to init a");
    b.init().await.expect("Failed to init b");

    let chat = a
        .create_channel(Some("chat"))
        .await
        .expect("Failed to create channel");
    let mut chat_events = chat.subscribe();
    chat.send("early").expect("Failed to queue");
    assert!(!chat.is_open());
    assert_eq!(chat.queued(), 1);

    a.offer(false).await.expect("Failed to offer");

    let opened = tokio::time::timeout(Duration::from_millis(EVENT_TIMEOUT_MS), chat_events.recv())
        .await
        .expect("Timed out waiting for the channel to open");
    assert_eq!(opened, Some(ChannelEvent::StateChanged(ChannelState::Open)));
    assert_eq!(chat.queued(), 0);

    let remote_chat = wait_for_channel(&mut b_events, "chat", true)
        .await
        .expect("b never saw the channel");
    assert!(remote_chat.is_remote());
    assert!(!chat.is_remote());
}
