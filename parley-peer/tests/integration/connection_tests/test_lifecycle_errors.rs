use parley_core::{Error, IceCandidate, SessionDescription, SignalingState};
use parley_peer::{ConnectionConfig, Politeness};

use crate::integration::init_tracing;
use crate::utils::{MockNetwork, mock_connection};

#[tokio::test(start_paused = true)]
async fn test_operations_before_init() {
    init_tracing();

    let network = MockNetwork::new();
    let conn = mock_connection(&network, "solo", ConnectionConfig::default());

    assert_eq!(conn.state(), SignalingState::Closed);
    assert_eq!(conn.polite(), None);
    assert!(matches!(conn.offer(false).await, Err(Error::NotInitialized)));
    assert!(matches!(
        conn.receive_offer(SessionDescription::offer("mock-offer:9")).await,
        Err(Error::NotInitialized)
    ));
    assert!(matches!(
        conn.create_channel(Some("chat")).await,
        Err(Error::NotInitialized)
    ));
    assert!(matches!(conn.remove_stream("cam").await, Err(Error::NotInitialized)));

    // Candidates are kept until there is something to apply them to
    let early = IceCandidate::new("candidate:1 1 udp 1 10.0.0.9 5000 typ host");
    conn.receive_ice_candidate(early)
        .await
        .expect("Early candidate should be queued");
    assert_eq!(network.stats("solo").transports_created, 0);

    // Closing a connection that never opened only marks it closed
    conn.close().await.expect("Close should succeed");
    assert!(conn.is_permanently_closed());
    assert!(matches!(
        conn.receive_ice_candidate(IceCandidate::new("candidate:2")).await,
        Err(Error::AlreadyClosed)
    ));

    // init clears the permanent close
    conn.init().await.expect("Failed to init");
    assert!(!conn.is_permanently_closed());
}

#[tokio::test(start_paused = true)]
async fn test_state_guards() {
    init_tracing();

    let network = MockNetwork::new();
    let conn = mock_connection(&network, "solo", ConnectionConfig::default());

    conn.init().await.expect("Failed to init");
    assert_eq!(conn.state(), SignalingState::AwaitingOffer);
    assert!(matches!(conn.init().await, Err(Error::AlreadyOpen)));

    // Wrong description types are malformed, not state errors
    assert!(matches!(
        conn.receive_offer(SessionDescription::answer("mock-answer:9")).await,
        Err(Error::MalformedSignal(_))
    ));
    assert!(matches!(
        conn.receive_answer(SessionDescription::answer("mock-answer:9")).await,
        Err(Error::InvalidState { .. })
    ));

    conn.offer(false).await.expect("Failed to offer");
    assert_eq!(conn.state(), SignalingState::AwaitingAnswer);
    assert!(!conn.can_renegotiate());

    // One offer at a time, even when renegotiation is requested
    assert!(matches!(conn.offer(false).await, Err(Error::InvalidState { .. })));
    assert!(matches!(conn.offer(true).await, Err(Error::InvalidState { .. })));
    assert_eq!(network.stats("solo").offers_created, 1);
}

#[tokio::test(start_paused = true)]
async fn test_fixed_politeness_is_reported_up_front() {
    init_tracing();

    let network = MockNetwork::new();
    let config = ConnectionConfig {
        politeness: Politeness::Polite,
        ..ConnectionConfig::default()
    };
    let conn = mock_connection(&network, "solo", config);

    assert_eq!(conn.polite(), Some(true));

    // Offering first does not override a configured role
    conn.init().await.expect("Failed to init");
    conn.offer(false).await.expect("Failed to offer");
    assert_eq!(conn.polite(), Some(true));
}
