use std::time::Duration;

use parley_core::Error;
use parley_core::utils::CONTROL_CHANNEL_PREFIX;
use parley_peer::{ChannelEvent, ChannelState, ConnectionConfig};

use crate::integration::init_tracing;
use crate::utils::{EVENT_TIMEOUT_MS, establish_pair, wait_for_channel};

#[tokio::test(start_paused = true)]
async fn test_labels_are_unique_and_control_prefix_reserved() {
    init_tracing();

    let pair = establish_pair(ConnectionConfig::default(), ConnectionConfig::default())
        .await
        .expect("Failed to establish pair");

    let first = pair
        .a
        .create_channel(Some("chat"))
        .await
        .expect("Failed to create channel");
    let again = pair
        .a
        .create_channel(Some("chat"))
        .await
        .expect("Failed to look up channel");
    assert!(first.same_channel(&again));
    assert_eq!(pair.a.local_channels().len(), 1);

    let reserved = format!("{CONTROL_CHANNEL_PREFIX}mine");
    assert!(matches!(
        pair.a.create_channel(Some(&reserved)).await,
        Err(Error::ReservedLabel(label)) if label == reserved
    ));

    // Unnamed channels get a generated label
    let unnamed = pair
        .a
        .create_channel(None)
        .await
        .expect("Failed to create unnamed channel");
    assert!(!unnamed.label().is_empty());
    assert_ne!(unnamed.label(), "chat");
    assert_eq!(pair.a.local_channels().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_closed_channel_is_replaced_not_reopened() {
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
    let mut remote_events = remote_chat.subscribe();

    let mut local_events = chat.subscribe();
    if !chat.is_open() {
        let opened = tokio::time::timeout(Duration::from_millis(EVENT_TIMEOUT_MS), local_events.recv())
            .await
            .expect("Timed out waiting for the channel to open");
        assert_eq!(opened, Some(ChannelEvent::StateChanged(ChannelState::Open)));
    }

    chat.close().expect("Failed to close channel");
    assert!(chat.is_permanently_closed());
    assert!(matches!(chat.send("late"), Err(Error::ChannelNotOpen(_))));
    assert!(matches!(chat.close(), Err(Error::ChannelNotOpen(_))));

    // The peer's handle loses its raw channel but stays usable
    let closed = tokio::time::timeout(Duration::from_millis(EVENT_TIMEOUT_MS), remote_events.recv())
        .await
        .expect("Timed out waiting for the remote close");
    assert_eq!(closed, Some(ChannelEvent::StateChanged(ChannelState::Closed)));
    assert!(!remote_chat.is_permanently_closed());

    // A new channel with the same label is a new handle
    let reopened = pair
        .a
        .create_channel(Some("chat"))
        .await
        .expect("Failed to recreate channel");
    assert!(!reopened.same_channel(&chat));
    assert_eq!(pair.a.local_channels().len(), 1);

    // and rebinds the peer's existing handle
    let mut received = remote_chat.subscribe();
    reopened.send("hello").expect("Failed to send");
    let message = tokio::time::timeout(Duration::from_millis(EVENT_TIMEOUT_MS), async {
        loop {
            match received.recv().await {
                Some(ChannelEvent::Message(payload)) => return payload,
                Some(_) => {}
                None => panic!("channel event stream ended"),
            }
        }
    })
    .await
    .expect("Timed out waiting for the message");
    assert_eq!(message.as_text(), Some("hello"));
    assert_eq!(pair.b.remote_channels().len(), 1);
}
