use crate::channel::ManagedChannel;
use crate::connection::connection_actor::ConnectionActor;
use crate::connection::connection_command::{ConnectionCommand, Reply};
use crate::connection::connection_config::{ConnectionConfig, ConnectionOptions};
use crate::events::{ConnectionEvent, EventBus};
use crate::transport::LocalTrack;
use parking_lot::RwLock;
use parley_core::{Error, IceCandidate, Result, SessionDescription, SignalingState};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// What the synchronous getters of `Connection` read.
#[derive(Debug, Clone)]
pub(crate) struct Snapshot {
    pub state: SignalingState,
    pub ping: Option<Duration>,
    pub polite: Option<bool>,
    pub can_renegotiate: bool,
    pub permanently_closed: bool,
    pub candidates: Vec<IceCandidate>,
    pub local_channels: Vec<ManagedChannel>,
    pub remote_channels: Vec<ManagedChannel>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            state: SignalingState::Closed,
            ping: None,
            polite: None,
            can_renegotiate: false,
            permanently_closed: false,
            candidates: Vec::new(),
            local_channels: Vec::new(),
            remote_channels: Vec::new(),
        }
    }
}

pub(crate) struct Shared {
    pub snapshot: RwLock<Snapshot>,
    pub events: EventBus<ConnectionEvent>,
}

/// Handle to a long-lived peer session.
///
/// All negotiation state lives in a background task; the handle forwards
/// requests to it and can be cloned freely. The task shuts the transport down
/// once every handle is dropped.
#[derive(Clone)]
pub struct Connection {
    cmd_tx: mpsc::UnboundedSender<ConnectionCommand>,
    shared: Arc<Shared>,
}

impl Connection {
    /// Connection over the `webrtc` transport with random channel ids.
    pub fn new(config: ConnectionConfig) -> Self {
        Self::with_options(ConnectionOptions::new(config))
    }

    pub fn with_options(options: ConnectionOptions) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            snapshot: RwLock::new(Snapshot {
                polite: options.config.politeness.fixed(),
                ..Snapshot::default()
            }),
            events: EventBus::new(),
        });

        let actor = ConnectionActor::new(options, cmd_rx, shared.clone());
        tokio::spawn(actor.run());

        Self { cmd_tx, shared }
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ConnectionEvent> {
        self.shared.events.subscribe()
    }

    pub fn state(&self) -> SignalingState {
        self.shared.snapshot.read().state
    }

    /// Last measured keepalive round trip.
    pub fn ping(&self) -> Option<Duration> {
        self.shared.snapshot.read().ping
    }

    /// `None` until the first offer/answer decided the role.
    pub fn polite(&self) -> Option<bool> {
        self.shared.snapshot.read().polite
    }

    pub fn can_renegotiate(&self) -> bool {
        self.shared.snapshot.read().can_renegotiate
    }

    pub fn is_permanently_closed(&self) -> bool {
        self.shared.snapshot.read().permanently_closed
    }

    /// Local candidates gathered in the current negotiation.
    pub fn candidates(&self) -> Vec<IceCandidate> {
        self.shared.snapshot.read().candidates.clone()
    }

    pub fn local_channels(&self) -> Vec<ManagedChannel> {
        self.shared.snapshot.read().local_channels.clone()
    }

    pub fn remote_channels(&self) -> Vec<ManagedChannel> {
        self.shared.snapshot.read().remote_channels.clone()
    }

    pub async fn init(&self) -> Result<()> {
        self.request(|reply| ConnectionCommand::Init { reply }).await
    }

    /// Starts a negotiation. `renegotiate` also permits it on an established session.
    ///
    /// On the polite side a renegotiation is requested from the peer over the
    /// control channel instead, and fails with `InvalidState` when none is open.
    pub async fn offer(&self, renegotiate: bool) -> Result<()> {
        self.request(|reply| ConnectionCommand::Offer { renegotiate, reply })
            .await
    }

    pub async fn receive_offer(&self, offer: SessionDescription) -> Result<()> {
        self.request(|reply| ConnectionCommand::ReceiveOffer { offer, reply })
            .await
    }

    pub async fn receive_answer(&self, answer: SessionDescription) -> Result<()> {
        self.request(|reply| ConnectionCommand::ReceiveAnswer { answer, reply })
            .await
    }

    pub async fn receive_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        self.request(|reply| ConnectionCommand::ReceiveIceCandidate { candidate, reply })
            .await
    }

    /// Creates a local channel, or returns the live one already using `label`.
    pub async fn create_channel(&self, label: Option<&str>) -> Result<ManagedChannel> {
        let label = label.map(str::to_owned);
        self.request(|reply| ConnectionCommand::CreateChannel { label, reply })
            .await
    }

    pub async fn add_track(&self, track: LocalTrack) -> Result<()> {
        self.request(|reply| ConnectionCommand::AddTrack { track, reply })
            .await
    }

    pub async fn remove_track(&self, track_id: &str) -> Result<()> {
        let track_id = track_id.to_owned();
        self.request(|reply| ConnectionCommand::RemoveTrack { track_id, reply })
            .await
    }

    pub async fn add_stream(&self, tracks: Vec<LocalTrack>) -> Result<()> {
        self.request(|reply| ConnectionCommand::AddStream { tracks, reply })
            .await
    }

    /// Removes every local track tagged with `stream_id`.
    pub async fn remove_stream(&self, stream_id: &str) -> Result<()> {
        let stream_id = stream_id.to_owned();
        self.request(|reply| ConnectionCommand::RemoveStream { stream_id, reply })
            .await
    }

    /// Closes the session for good. Calling it again is a no-op.
    pub async fn close(&self) -> Result<()> {
        self.request(|reply| ConnectionCommand::Close { reply }).await
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> ConnectionCommand) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(build(reply))
            .map_err(|_| Error::ConnectionGone)?;
        rx.await.map_err(|_| Error::ConnectionGone)?
    }
}
