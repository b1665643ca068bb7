use crate::channel::ManagedChannel;
use crate::transport::LocalTrack;
use parley_core::{IceCandidate, Result, SessionDescription};
use tokio::sync::oneshot;

pub(crate) type Reply<T> = oneshot::Sender<Result<T>>;

/// Requests from `Connection` handles to the connection task.
pub(crate) enum ConnectionCommand {
    Init {
        reply: Reply<()>,
    },
    Offer {
        renegotiate: bool,
        reply: Reply<()>,
    },
    ReceiveOffer {
        offer: SessionDescription,
        reply: Reply<()>,
    },
    ReceiveAnswer {
        answer: SessionDescription,
        reply: Reply<()>,
    },
    ReceiveIceCandidate {
        candidate: IceCandidate,
        reply: Reply<()>,
    },
    CreateChannel {
        label: Option<String>,
        reply: Reply<ManagedChannel>,
    },
    AddTrack {
        track: LocalTrack,
        reply: Reply<()>,
    },
    RemoveTrack {
        track_id: String,
        reply: Reply<()>,
    },
    AddStream {
        tracks: Vec<LocalTrack>,
        reply: Reply<()>,
    },
    RemoveStream {
        stream_id: String,
        reply: Reply<()>,
    },
    Close {
        reply: Reply<()>,
    },
}
