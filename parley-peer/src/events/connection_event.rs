use crate::channel::ManagedChannel;
use parley_core::{CandidateError, CloseReason, IceCandidate, SessionDescription, SignalingState};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use webrtc::track::track_remote::TrackRemote;

/// A media track received from the remote peer.
#[derive(Clone)]
pub struct RemoteTrack(pub Arc<TrackRemote>);

impl RemoteTrack {
    pub fn id(&self) -> String {
        self.0.id()
    }

    pub fn inner(&self) -> &Arc<TrackRemote> {
        &self.0
    }
}

impl fmt::Debug for RemoteTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RemoteTrack").field(&self.0.id()).finish()
    }
}

/// Everything a `Connection` tells the application.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// `fatal` is set when the session was lost rather than closed on request.
    SignalingStateChanged {
        state: SignalingState,
        reason: Option<CloseReason>,
        fatal: bool,
    },
    /// Latest keepalive round trip; `None` once the control channel is gone.
    PingChanged(Option<Duration>),
    /// A local candidate that has to reach the peer out of band.
    CandidateDiscovered(IceCandidate),
    AllCandidatesDiscovered(Vec<IceCandidate>),
    ChannelOpened {
        channel: ManagedChannel,
        remote: bool,
    },
    /// A local offer that has to reach the peer out of band.
    OfferReady(SessionDescription),
    /// A local answer that has to reach the peer out of band.
    AnswerReady(SessionDescription),
    StreamAdded {
        stream_id: String,
        track: RemoteTrack,
    },
    CandidateError(CandidateError),
    /// The transport wants a new offer. Unless `auto_renegotiate` is off the
    /// connection handles it right after this event.
    NegotiationNeeded,
}

/// Tracks without a stream id are reported under their own id.
pub(crate) fn stream_key(stream_id: &str, track_id: &str) -> String {
    if stream_id.is_empty() {
        track_id.to_owned()
    } else {
        stream_id.to_owned()
    }
}
