use std::time::Duration;

use parley_core::{CloseReason, SignalingState};
use parley_peer::ConnectionConfig;

use crate::integration::init_tracing;
use crate::utils::{MockNetwork, Transition, mock_connection, wait_for_answer, wait_for_offer, wait_for_state};

#[tokio::test(start_paused = true)]
async fn test_unanswered_exchange_hits_connect_timeout() {
    init_tracing();

    let network = MockNetwork::new();
    let a = mock_connection(&network, "a", ConnectionConfig::default());
    let b = mock_connection(
        &network,
        "b",
        ConnectionConfig {
            connect_timeout: Duration::from_secs(3),
            ..ConnectionConfig::default()
        },
    );
    let mut a_events = a.subscribe();
    let mut b_events = b.subscribe();

    a.init().await.expect("Failed to init a");
    b.init().await.expect("Failed to init b");
    a.offer(false).await.expect("Failed to offer");

    let offer = wait_for_offer(&mut a_events).await.expect("No offer");
    b.receive_offer(offer).await.expect("Failed to answer");

    // The answer never reaches a, so the link never comes up
    wait_for_answer(&mut b_events).await.expect("No answer");
    assert_eq!(b.state(), SignalingState::Negotiating);

    let dropped = wait_for_state(&mut b_events, SignalingState::Reconnecting)
        .await
        .expect("b never gave up");
    assert_eq!(
        dropped,
        Transition {
            reason: Some(CloseReason::ConnectTimeout),
            fatal: true,
        }
    );

    // The drop is not terminal: b re-initializes and waits for a new offer
    wait_for_state(&mut b_events, SignalingState::AwaitingOffer)
        .await
        .expect("b never re-initialized");
    assert_eq!(network.stats("b").transports_created, 2);
    assert!(!b.is_permanently_closed());
}
