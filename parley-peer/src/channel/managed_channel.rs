use crate::events::{ChannelEvent, EventBus};
use crate::transport::{RawChannel, RawChannelId};
use parking_lot::Mutex;
use parley_core::{Error, Payload, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelState {
    Closed,
    Open,
}

enum Flush {
    Opened,
    Failed { queued: usize, error: String },
    Unbound,
}

struct ChannelInner {
    state: ChannelState,
    send_queue: VecDeque<Payload>,
    raw: Option<Arc<dyn RawChannel>>,
    permanently_closed: bool,
}

/// Application-facing data channel.
///
/// The handle outlives the raw channel it currently rides on: the connection
/// rebinds it by label after every renegotiation or reconnect, and anything
/// sent in between is queued and flushed in call order once the new raw
/// channel opens.
#[derive(Clone)]
pub struct ManagedChannel {
    label: Arc<str>,
    remote: bool,
    inner: Arc<Mutex<ChannelInner>>,
    events: Arc<EventBus<ChannelEvent>>,
}

impl ManagedChannel {
    pub(crate) fn new(label: impl Into<Arc<str>>, remote: bool) -> Self {
        Self {
            label: label.into(),
            remote,
            inner: Arc::new(Mutex::new(ChannelInner {
                state: ChannelState::Closed,
                send_queue: VecDeque::new(),
                raw: None,
                permanently_closed: false,
            })),
            events: Arc::new(EventBus::new()),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether the remote peer created this channel.
    pub fn is_remote(&self) -> bool {
        self.remote
    }

    pub fn state(&self) -> ChannelState {
        self.inner.lock().state
    }

    pub fn is_open(&self) -> bool {
        self.state() == ChannelState::Open
    }

    pub fn is_permanently_closed(&self) -> bool {
        self.inner.lock().permanently_closed
    }

    /// Messages waiting for the channel to (re)open.
    pub fn queued(&self) -> usize {
        self.inner.lock().send_queue.len()
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ChannelEvent> {
        self.events.subscribe()
    }

    /// Same underlying handle, not just the same label.
    pub fn same_channel(&self, other: &ManagedChannel) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Sends now if open, otherwise queues.
    ///
    /// A queue left behind by a failed flush is retried here once the raw
    /// channel reports open again.
    pub fn send(&self, payload: impl Into<Payload>) -> Result<()> {
        let payload = payload.into();
        let flushed = {
            let mut inner = self.inner.lock();

            if inner.permanently_closed {
                return Err(Error::ChannelNotOpen(self.label.to_string()));
            }

            if inner.state == ChannelState::Open
                && let Some(raw) = &inner.raw
            {
                return raw.send(payload).map_err(Error::Transport);
            }
            inner.send_queue.push_back(payload);

            if !inner.raw.as_ref().is_some_and(|raw| raw.is_open()) {
                return Ok(());
            }
            self.flush(&mut inner)
        };

        self.report_flush(flushed);
        Ok(())
    }

    /// Closes the channel for good; it will not be rebound on later renegotiations.
    pub fn close(&self) -> Result<()> {
        let raw = {
            let mut inner = self.inner.lock();
            if inner.state != ChannelState::Open {
                return Err(Error::ChannelNotOpen(self.label.to_string()));
            }
            inner.permanently_closed = true;
            inner.state = ChannelState::Closed;
            inner.send_queue.clear();
            inner.raw.take()
        };

        if let Some(raw) = raw {
            raw.close();
        }
        self.events
            .emit(ChannelEvent::StateChanged(ChannelState::Closed));
        Ok(())
    }

    pub(crate) fn is_bound(&self) -> bool {
        self.inner.lock().raw.is_some()
    }

    pub(crate) fn raw_id(&self) -> Option<RawChannelId> {
        self.inner.lock().raw.as_ref().map(|raw| raw.id())
    }

    /// Attaches a fresh raw channel. Returns `false` for a permanently closed handle.
    pub(crate) fn bind(&self, raw: Arc<dyn RawChannel>) -> bool {
        let already_open = raw.is_open();
        {
            let mut inner = self.inner.lock();
            if inner.permanently_closed {
                return false;
            }
            debug!("Channel '{}' bound to raw channel {}", self.label, raw.id());
            inner.raw = Some(raw);
            inner.state = ChannelState::Closed;
        }

        if already_open {
            self.handle_open();
        }
        true
    }

    /// Flushes the send queue into the raw channel, then marks the handle open.
    pub(crate) fn handle_open(&self) {
        let flushed = {
            let mut inner = self.inner.lock();
            if inner.state == ChannelState::Open {
                return;
            }
            self.flush(&mut inner)
        };
        self.report_flush(flushed);
    }

    /// Drains the queue in order. On a failed send the rest stays queued and
    /// the handle stays closed.
    fn flush(&self, inner: &mut ChannelInner) -> Flush {
        let Some(raw) = inner.raw.clone() else {
            return Flush::Unbound;
        };

        while let Some(payload) = inner.send_queue.pop_front() {
            if let Err(e) = raw.send(payload.clone()) {
                inner.send_queue.push_front(payload);
                return Flush::Failed {
                    queued: inner.send_queue.len(),
                    error: format!("{e:#}"),
                };
            }
        }
        inner.state = ChannelState::Open;
        Flush::Opened
    }

    fn report_flush(&self, flushed: Flush) {
        match flushed {
            Flush::Opened => self
                .events
                .emit(ChannelEvent::StateChanged(ChannelState::Open)),
            Flush::Failed { queued, error } => {
                warn!("Channel '{}' could not flush its queue: {}", self.label, error);
                self.events
                    .emit(ChannelEvent::FlushFailed { queued, error });
            }
            Flush::Unbound => {}
        }
    }

    pub(crate) fn handle_message(&self, payload: Payload) {
        self.events.emit(ChannelEvent::Message(payload));
    }

    /// Detaches the raw channel after it closed underneath us; queued data is kept.
    pub(crate) fn unbind(&self) {
        let was_open = {
            let mut inner = self.inner.lock();
            inner.raw = None;
            std::mem::replace(&mut inner.state, ChannelState::Closed) == ChannelState::Open
        };

        if was_open {
            self.events
                .emit(ChannelEvent::StateChanged(ChannelState::Closed));
        }
    }
}

impl fmt::Debug for ManagedChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ManagedChannel")
            .field("label", &self.label)
            .field("remote", &self.remote)
            .field("state", &inner.state)
            .field("queued", &inner.send_queue.len())
            .field("permanently_closed", &inner.permanently_closed)
            .finish()
    }
}
