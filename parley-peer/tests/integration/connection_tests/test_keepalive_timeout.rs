use parley_core::{CloseReason, SignalingState};

use crate::integration::{config_with_timeout, init_tracing};
use crate::utils::{establish_pair, wait_for_state};

#[tokio::test(start_paused = true)]
async fn test_unanswered_ping_drops_and_reconnects() {
    init_tracing();

    // b waits longer, so a is the side that notices first
    let mut pair = establish_pair(config_with_timeout(1500), config_with_timeout(5000))
        .await
        .expect("Failed to establish pair");

    pair.network.set_blackhole_control(true);

    let dropped = wait_for_state(&mut pair.a_events, SignalingState::Reconnecting)
        .await
        .expect("a never dropped");
    assert_eq!(dropped.reason, Some(CloseReason::KeepaliveTimeout));
    assert!(dropped.fatal);
    assert_eq!(pair.a.ping(), None);
    assert!(!pair.a.is_permanently_closed());

    // a's teardown closes its control channel under b
    let peer_dropped = wait_for_state(&mut pair.b_events, SignalingState::Reconnecting)
        .await
        .expect("b never dropped");
    assert_eq!(peer_dropped.reason, Some(CloseReason::ControlChannelClosed));

    pair.network.set_blackhole_control(false);

    // Both re-initialize on their own and a offers again
    wait_for_state(&mut pair.a_events, SignalingState::AwaitingOffer)
        .await
        .expect("a never re-initialized");
    wait_for_state(&mut pair.a_events, SignalingState::Complete)
        .await
        .expect("a never reconnected");
    wait_for_state(&mut pair.b_events, SignalingState::Complete)
        .await
        .expect("b never reconnected");

    assert_eq!(pair.network.stats("a").transports_created, 2);
    assert_eq!(pair.network.stats("a").offers_created, 2);
    assert_eq!(pair.a.polite(), Some(false));
    assert_eq!(pair.b.polite(), Some(true));
}
