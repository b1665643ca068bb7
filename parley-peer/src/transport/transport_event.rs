use crate::transport::RawChannel;
use crate::transport::raw_channel::RawChannelId;
use parley_core::{CandidateError, IceCandidate, Payload};
use std::sync::Arc;
use tokio::sync::mpsc;
use webrtc::track::track_remote::TrackRemote;

/// ICE connectivity as reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    New,
    Checking,
    Connected,
    Completed,
    Disconnected,
    Failed,
    Closed,
}

/// The transport's own offer/answer state, before it is folded into a `SignalingState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeSignalingState {
    Stable,
    HaveLocalOffer,
    HaveRemoteOffer,
    HaveLocalPranswer,
    HaveRemotePranswer,
    Closed,
}

/// Events a transport pushes to the connection that owns it.
pub enum TransportEvent {
    CandidateDiscovered(IceCandidate),
    /// Local gathering finished; no more `CandidateDiscovered` for this round.
    CandidateGatheringComplete,
    CandidateError(CandidateError),
    /// The remote side created a channel.
    ChannelArrived(Arc<dyn RawChannel>),
    ChannelOpened(RawChannelId),
    ChannelMessage(RawChannelId, Payload),
    ChannelClosed(RawChannelId),
    ChannelError(RawChannelId, String),
    ConnectivityChanged(Connectivity),
    SignalingChanged(NativeSignalingState),
    NegotiationNeeded,
    TrackAdded(Arc<TrackRemote>),
}

impl std::fmt::Debug for TransportEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportEvent::CandidateDiscovered(c) => {
                f.debug_tuple("CandidateDiscovered").field(c).finish()
            }
            TransportEvent::CandidateGatheringComplete => f.write_str("CandidateGatheringComplete"),
            TransportEvent::CandidateError(e) => f.debug_tuple("CandidateError").field(e).finish(),
            TransportEvent::ChannelArrived(c) => {
                f.debug_tuple("ChannelArrived").field(&c.label()).finish()
            }
            TransportEvent::ChannelOpened(id) => f.debug_tuple("ChannelOpened").field(id).finish(),
            TransportEvent::ChannelMessage(id, p) => f
                .debug_tuple("ChannelMessage")
                .field(id)
                .field(&p.len())
                .finish(),
            TransportEvent::ChannelClosed(id) => f.debug_tuple("ChannelClosed").field(id).finish(),
            TransportEvent::ChannelError(id, e) => {
                f.debug_tuple("ChannelError").field(id).field(e).finish()
            }
            TransportEvent::ConnectivityChanged(s) => {
                f.debug_tuple("ConnectivityChanged").field(s).finish()
            }
            TransportEvent::SignalingChanged(s) => {
                f.debug_tuple("SignalingChanged").field(s).finish()
            }
            TransportEvent::NegotiationNeeded => f.write_str("NegotiationNeeded"),
            TransportEvent::TrackAdded(t) => f.debug_tuple("TrackAdded").field(&t.id()).finish(),
        }
    }
}

/// Where a transport delivers its events.
///
/// Every transport a connection creates gets a sink stamped with a fresh generation,
/// so events from a torn-down transport can be told apart and dropped.
#[derive(Clone)]
pub struct TransportEventSink {
    generation: u64,
    tx: mpsc::UnboundedSender<(u64, TransportEvent)>,
}

impl TransportEventSink {
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<(u64, TransportEvent)>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn emit(&self, event: TransportEvent) {
        let _ = self.tx.send((self.generation, event));
    }
}
