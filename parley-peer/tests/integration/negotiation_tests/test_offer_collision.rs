use parley_core::SignalingState;
use parley_peer::ConnectionConfig;

use crate::integration::init_tracing;
use crate::utils::{MockNetwork, mock_connection, spawn_relay, wait_for_offer, wait_for_state};

#[tokio::test(start_paused = true)]
async fn test_simultaneous_first_offers_settle_on_one() {
    init_tracing();

    let network = MockNetwork::new();
    let a = mock_connection(&network, "a", ConnectionConfig::default());
    let b = mock_connection(&network, "b", ConnectionConfig::default());
    let mut a_events = a.subscribe();
    let mut b_events = b.subscribe();

    a.init().await.expect("Failed to init a");
    b.init().await.expect("Failed to init b");

    // Both offer before either offer is delivered
    a.offer(false).await.expect("Failed to offer from a");
    b.offer(false).await.expect("Failed to offer from b");
    let offer_a = wait_for_offer(&mut a_events).await.expect("No offer from a");
    let offer_b = wait_for_offer(&mut b_events).await.expect("No offer from b");

    spawn_relay(&a, &b);
    spawn_relay(&b, &a);

    // The smaller offer yields: a's transport made "mock-offer:1"
    b.receive_offer(offer_a).await.expect("b should ignore the offer");
    assert_eq!(b.state(), SignalingState::AwaitingAnswer);
    assert_eq!(b.polite(), Some(false));

    a.receive_offer(offer_b).await.expect("a should answer");
    assert_eq!(a.polite(), Some(true));

    wait_for_state(&mut a_events, SignalingState::Complete)
        .await
        .expect("a never completed");
    wait_for_state(&mut b_events, SignalingState::Complete)
        .await
        .expect("b never completed");

    // a dropped its own attempt and answered on a fresh transport
    assert_eq!(network.stats("a").transports_created, 2);
    assert_eq!(network.stats("a").answers_created, 1);
    assert_eq!(network.stats("b").answers_created, 0);
}
