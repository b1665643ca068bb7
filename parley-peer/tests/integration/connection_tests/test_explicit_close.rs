use std::time::Duration;

use parley_core::{CloseReason, Error, SignalingState};
use parley_peer::{ConnectionConfig, ConnectionEvent};

use crate::integration::{config_without_reconnect, init_tracing};
use crate::utils::{establish_pair, wait_for_state};

#[tokio::test(start_paused = true)]
async fn test_explicit_close_is_final() {
    init_tracing();

    let mut pair = establish_pair(ConnectionConfig::default(), ConnectionConfig::default())
        .await
        .expect("Failed to establish pair");

    pair.a.close().await.expect("Failed to close");

    let closed = wait_for_state(&mut pair.a_events, SignalingState::Closed)
        .await
        .expect("a never closed");
    assert_eq!(closed.reason, Some(CloseReason::Explicit));
    assert!(!closed.fatal);
    assert!(pair.a.is_permanently_closed());

    // No reconnect is ever scheduled
    tokio::time::sleep(Duration::from_secs(10)).await;
    while let Ok(event) = pair.a_events.try_recv() {
        if let ConnectionEvent::SignalingStateChanged { state, .. } = event {
            panic!("closed connection moved to {state}");
        }
    }
    assert_eq!(pair.a.state(), SignalingState::Closed);
    assert_eq!(pair.network.stats("a").transports_created, 1);

    // Closing again is a no-op, everything else is refused
    pair.a.close().await.expect("Second close should succeed");
    assert!(matches!(pair.a.offer(false).await, Err(Error::AlreadyClosed)));
    assert!(matches!(
        pair.a.create_channel(Some("late")).await,
        Err(Error::AlreadyClosed)
    ));

    // The peer loses its session and tries to get it back
    let dropped = wait_for_state(&mut pair.b_events, SignalingState::Reconnecting)
        .await
        .expect("b never noticed");
    assert!(dropped.fatal);
}

#[tokio::test(start_paused = true)]
async fn test_drop_without_reconnect_delay_is_terminal() {
    init_tracing();

    let mut pair = establish_pair(config_without_reconnect(), ConnectionConfig::default())
        .await
        .expect("Failed to establish pair");

    pair.network.fail_ice("a");

    let closed = wait_for_state(&mut pair.a_events, SignalingState::Closed)
        .await
        .expect("a never closed");
    assert_eq!(closed.reason, Some(CloseReason::IceFailed));
    assert!(closed.fatal);
    assert!(!pair.a.is_permanently_closed());

    // Not permanently closed, so the application may start over
    pair.a.init().await.expect("Failed to re-init");
    assert_eq!(pair.a.state(), SignalingState::AwaitingOffer);
    assert_eq!(pair.network.stats("a").transports_created, 2);
}
