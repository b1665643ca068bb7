use dashmap::DashMap;
use parking_lot::Mutex;
use parley_core::{IdGenerator, RandomIds, RelayMessage, SessionId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Frames held per unpaired session. Later frames are dropped until a pairing.
pub const MAX_PENDING_FRAMES: usize = 256;

#[derive(Default)]
struct Session {
    peer: Option<SessionId>,
    /// `sdp`/`iceCandidate` frames sent before pairing, in arrival order.
    pending: Vec<RelayMessage>,
}

struct RelayInner {
    sockets: DashMap<SessionId, mpsc::UnboundedSender<RelayMessage>>,
    sessions: Mutex<HashMap<SessionId, Session>>,
    ids: Arc<dyn IdGenerator>,
}

/// First-contact relay: pairs two sockets and forwards signaling blobs between them.
///
/// Every socket gets a session id on connect. A `join` naming another unpaired
/// session pairs the two; `sdp` and `iceCandidate` frames go to the paired
/// session, or are held until a pairing happens. Nothing is inspected beyond the
/// frame type.
#[derive(Clone)]
pub struct RelayService {
    inner: Arc<RelayInner>,
}

impl RelayService {
    pub fn new() -> Self {
        Self::with_ids(Arc::new(RandomIds))
    }

    pub fn with_ids(ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            inner: Arc::new(RelayInner {
                sockets: DashMap::new(),
                sessions: Mutex::new(HashMap::new()),
                ids,
            }),
        }
    }

    /// Registers a socket. Its first outgoing frame is the assigned `id`.
    pub fn connect(&self) -> (SessionId, mpsc::UnboundedReceiver<RelayMessage>) {
        let id = SessionId::from(self.inner.ids.next_id());
        let (tx, rx) = mpsc::unbounded_channel();

        let _ = tx.send(RelayMessage::Id(id.clone()));
        self.inner.sockets.insert(id.clone(), tx);
        self.inner
            .sessions
            .lock()
            .insert(id.clone(), Session::default());

        info!("Session {} connected", id);
        (id, rx)
    }

    pub fn handle(&self, from: &SessionId, msg: RelayMessage) {
        match msg {
            RelayMessage::Join(target) => self.join(from, target),
            RelayMessage::Sdp(_) | RelayMessage::IceCandidate(_) => self.forward(from, msg),
            RelayMessage::Id(_) => warn!("Session {} sent an id frame, ignoring", from),
        }
    }

    /// Drops the session. Its peer becomes joinable again with an empty buffer.
    pub fn disconnect(&self, id: &SessionId) {
        self.inner.sockets.remove(id);

        let mut sessions = self.inner.sessions.lock();
        let Some(session) = sessions.remove(id) else {
            return;
        };
        if let Some(peer) = session.peer
            && let Some(peer_session) = sessions.get_mut(&peer)
        {
            peer_session.peer = None;
            peer_session.pending.clear();
            debug!("Session {} unpaired from {}", peer, id);
        }
        info!("Session {} disconnected", id);
    }

    pub fn peer_of(&self, id: &SessionId) -> Option<SessionId> {
        self.inner.sessions.lock().get(id)?.peer.clone()
    }

    pub fn session_count(&self) -> usize {
        self.inner.sessions.lock().len()
    }

    fn join(&self, from: &SessionId, target: SessionId) {
        let mut sessions = self.inner.sessions.lock();

        let joinable = from != &target
            && sessions.get(from).is_some_and(|s| s.peer.is_none())
            && sessions.get(&target).is_some_and(|s| s.peer.is_none());
        if !joinable {
            warn!("Session {} cannot join {}", from, target);
            return;
        }

        // Flushed under the lock so a frame forwarded after the pairing
        // cannot overtake the held ones
        if let Some(own) = sessions.get_mut(from) {
            own.peer = Some(target.clone());
            for msg in own.pending.drain(..) {
                self.send(&target, msg);
            }
        }
        if let Some(other) = sessions.get_mut(&target) {
            other.peer = Some(from.clone());
            for msg in other.pending.drain(..) {
                self.send(from, msg);
            }
        }

        info!("Paired sessions {} and {}", from, target);
    }

    fn forward(&self, from: &SessionId, msg: RelayMessage) {
        let mut sessions = self.inner.sessions.lock();
        let Some(session) = sessions.get_mut(from) else {
            return;
        };
        match &session.peer {
            Some(peer) => self.send(peer, msg),
            None if session.pending.len() >= MAX_PENDING_FRAMES => {
                warn!(
                    "Session {} has {} frames held, dropping frame",
                    from, MAX_PENDING_FRAMES
                );
            }
            None => {
                session.pending.push(msg);
                debug!("Holding frame from unpaired session {}", from);
            }
        }
    }

    fn send(&self, to: &SessionId, msg: RelayMessage) {
        match self.inner.sockets.get(to) {
            Some(tx) => {
                if tx.send(msg).is_err() {
                    warn!("Socket of session {} is gone", to);
                }
            }
            None => warn!("Attempted to relay to disconnected session {}", to),
        }
    }
}

impl Default for RelayService {
    fn default() -> Self {
        Self::new()
    }
}
