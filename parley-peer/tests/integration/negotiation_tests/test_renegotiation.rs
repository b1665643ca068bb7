use std::time::Duration;

use parley_core::{Error, SessionDescription, SignalingState};
use parley_peer::ConnectionConfig;

use crate::integration::init_tracing;
use crate::utils::{establish_pair, wait_for_negotiation_needed, wait_for_state};

#[tokio::test(start_paused = true)]
async fn test_simultaneous_renegotiation_makes_one_offer() {
    init_tracing();

    let mut pair = establish_pair(ConnectionConfig::default(), ConnectionConfig::default())
        .await
        .expect("Failed to establish pair");
    let offers_before = pair.network.total_offers();

    // Both transports want to renegotiate at once
    pair.network.trigger_negotiation_needed();

    wait_for_state(&mut pair.a_events, SignalingState::AwaitingAnswer)
        .await
        .expect("a never offered");
    wait_for_state(&mut pair.a_events, SignalingState::Complete)
        .await
        .expect("a never completed");
    wait_for_state(&mut pair.b_events, SignalingState::Complete)
        .await
        .expect("b never completed");

    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(pair.network.total_offers(), offers_before + 1);
    assert_eq!(pair.network.stats("a").ice_restarts, 1);
    assert_eq!(pair.network.stats("b").offers_created, 0);
    assert_eq!(pair.a.state(), SignalingState::Complete);
    assert_eq!(pair.b.state(), SignalingState::Complete);
}

#[tokio::test(start_paused = true)]
async fn test_polite_side_asks_for_offer() {
    init_tracing();

    let mut pair = establish_pair(ConnectionConfig::default(), ConnectionConfig::default())
        .await
        .expect("Failed to establish pair");
    assert_eq!(pair.b.polite(), Some(true));

    // The polite side never offers itself once a control channel exists
    pair.b.offer(true).await.expect("Failed to request renegotiation");

    wait_for_state(&mut pair.a_events, SignalingState::AwaitingAnswer)
        .await
        .expect("a never offered");
    wait_for_state(&mut pair.a_events, SignalingState::Complete)
        .await
        .expect("a never completed");

    assert_eq!(pair.network.stats("a").offers_created, 2);
    assert_eq!(pair.network.stats("b").offers_created, 0);
    assert_eq!(pair.network.stats("b").answers_created, 2);
}

#[tokio::test(start_paused = true)]
async fn test_second_offer_refused_while_one_is_outstanding() {
    init_tracing();

    let pair = establish_pair(ConnectionConfig::default(), ConnectionConfig::default())
        .await
        .expect("Failed to establish pair");

    // Without renegotiate an established session refuses outright
    assert!(matches!(
        pair.b.offer(false).await,
        Err(Error::InvalidState { .. })
    ));

    // The offer leaves but its answer never comes back
    pair.network.set_blackhole_control(true);
    pair.a.offer(true).await.expect("Failed to renegotiate");
    assert_eq!(pair.a.state(), SignalingState::AwaitingAnswer);
    assert!(!pair.a.can_renegotiate());

    assert!(matches!(
        pair.a.offer(true).await,
        Err(Error::InvalidState {
            state: SignalingState::AwaitingAnswer,
            ..
        })
    ));
    assert_eq!(pair.network.stats("a").offers_created, 2);
}

#[tokio::test(start_paused = true)]
async fn test_manual_renegotiation_leaves_offer_to_application() {
    init_tracing();

    let manual = ConnectionConfig {
        auto_renegotiate: false,
        ..ConnectionConfig::default()
    };
    let mut pair = establish_pair(manual, ConnectionConfig::default())
        .await
        .expect("Failed to establish pair");
    let offers_before = pair.network.total_offers();

    pair.network.trigger_negotiation_needed_on("a");
    wait_for_negotiation_needed(&mut pair.a_events)
        .await
        .expect("a never reported negotiation-needed");

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(pair.network.total_offers(), offers_before);
    assert_eq!(pair.a.state(), SignalingState::Complete);

    // The application decides to go ahead
    pair.a.offer(true).await.expect("Failed to renegotiate");
    wait_for_state(&mut pair.a_events, SignalingState::Complete)
        .await
        .expect("a never completed");
    assert_eq!(pair.network.total_offers(), offers_before + 1);
    assert_eq!(pair.network.stats("a").ice_restarts, 1);
}

#[tokio::test(start_paused = true)]
async fn test_settled_role_survives_renegotiation_collision() {
    init_tracing();

    let pair = establish_pair(ConnectionConfig::default(), ConnectionConfig::default())
        .await
        .expect("Failed to establish pair");
    assert_eq!(pair.a.polite(), Some(false));

    pair.network.set_blackhole_control(true);
    pair.a.offer(true).await.expect("Failed to renegotiate");
    assert_eq!(pair.a.state(), SignalingState::AwaitingAnswer);

    // Sorts after a's own offer, which would make a yield on first contact
    pair.a
        .receive_offer(SessionDescription::offer("mock-offer:99"))
        .await
        .expect("Colliding offer should be ignored");

    assert_eq!(pair.a.polite(), Some(false));
    assert_eq!(pair.a.state(), SignalingState::AwaitingAnswer);
    assert_eq!(pair.network.stats("a").transports_created, 1);
    assert_eq!(pair.network.stats("a").answers_created, 0);
}
