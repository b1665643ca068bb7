use std::time::Duration;
use tokio::sync::mpsc;

use parley_core::utils::CONTROL_CHANNEL_PREFIX;
use parley_core::{Payload, SignalingState};
use parley_peer::{ConnectionConfig, ConnectionEvent};

use crate::integration::init_tracing;
use crate::utils::establish_pair;

/// Drains pending events, keeping state changes and channel announcements.
fn disruptions(events: &mut mpsc::UnboundedReceiver<ConnectionEvent>) -> Vec<ConnectionEvent> {
    std::iter::from_fn(|| events.try_recv().ok())
        .filter(|e| {
            matches!(
                e,
                ConnectionEvent::SignalingStateChanged { .. } | ConnectionEvent::ChannelOpened { .. }
            )
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_malformed_control_frames_are_discarded() {
    init_tracing();

    let mut pair = establish_pair(ConnectionConfig::default(), ConnectionConfig::default())
        .await
        .expect("Failed to establish pair");

    let frames = [
        Payload::from("not json"),
        Payload::from(r#"{"data":"untyped"}"#),
        Payload::from(r#"{"type":"bogus"}"#),
        Payload::from(r#"{"type":"signal","data":42}"#),
        Payload::from(vec![0u8, 1, 2]),
    ];
    for frame in frames {
        pair.network
            .inject_control_frame("a", frame)
            .expect("Failed to inject frame");
    }

    // Keepalive keeps running over the same control channels
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert_eq!(pair.a.state(), SignalingState::Complete);
    assert_eq!(pair.b.state(), SignalingState::Complete);
    assert!(pair.a.ping().is_some());
    assert!(disruptions(&mut pair.a_events).is_empty());
    assert_eq!(pair.network.stats("a").transports_created, 1);
}

#[tokio::test(start_paused = true)]
async fn test_second_remote_control_channel_is_ignored() {
    init_tracing();

    let mut pair = establish_pair(ConnectionConfig::default(), ConnectionConfig::default())
        .await
        .expect("Failed to establish pair");

    let label = format!("{CONTROL_CHANNEL_PREFIX}extra");
    let extra = pair
        .network
        .open_raw_channel("b", &label)
        .await
        .expect("Failed to open extra control channel");

    tokio::time::sleep(Duration::from_secs(2)).await;

    // Closing it would drop a's session had it replaced the first one
    extra.close();
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert_eq!(pair.a.state(), SignalingState::Complete);
    assert_eq!(pair.b.state(), SignalingState::Complete);
    assert!(pair.a.ping().is_some());
    assert!(pair.b.ping().is_some());
    assert!(disruptions(&mut pair.a_events).is_empty());
    assert!(disruptions(&mut pair.b_events).is_empty());
    assert!(pair.a.remote_channels().is_empty());
}
