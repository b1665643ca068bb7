use crate::transport::{RawChannel, RawChannelId};
use parley_core::{ControlMessage, Payload};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Which of the two control channels a frame travelled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ControlSide {
    /// Created by this connection; carries our pings.
    Local,
    /// Created by the peer; we answer its pings.
    Remote,
}

/// The reserved channels carrying keepalive and post-bootstrap signaling.
#[derive(Default)]
pub(crate) struct ControlChannels {
    local: Option<Arc<dyn RawChannel>>,
    remote: Option<Arc<dyn RawChannel>>,
    ping_sent_at: Option<Instant>,
}

impl ControlChannels {
    pub fn set_local(&mut self, channel: Arc<dyn RawChannel>) {
        self.local = Some(channel);
    }

    /// Refuses a second remote control channel; the first one stays.
    pub fn attach_remote(&mut self, channel: Arc<dyn RawChannel>) -> bool {
        if self.remote.is_some() {
            return false;
        }
        self.remote = Some(channel);
        true
    }

    pub fn side_of(&self, id: RawChannelId) -> Option<ControlSide> {
        if self.local.as_ref().is_some_and(|c| c.id() == id) {
            Some(ControlSide::Local)
        } else if self.remote.as_ref().is_some_and(|c| c.id() == id) {
            Some(ControlSide::Remote)
        } else {
            None
        }
    }

    pub fn detach(&mut self, side: ControlSide) {
        match side {
            ControlSide::Local => {
                self.local = None;
                self.ping_sent_at = None;
            }
            ControlSide::Remote => self.remote = None,
        }
    }

    pub fn local_is_open(&self) -> bool {
        self.local.as_ref().is_some_and(|c| c.is_open())
    }

    pub fn is_open(&self) -> bool {
        self.signal_path().is_some()
    }

    /// Signals prefer our own channel and fall back to the peer's.
    fn signal_path(&self) -> Option<&Arc<dyn RawChannel>> {
        self.local
            .as_ref()
            .filter(|c| c.is_open())
            .or_else(|| self.remote.as_ref().filter(|c| c.is_open()))
    }

    /// Relays `message` to the peer. Returns `false` when no control channel is open.
    pub fn relay(&self, message: &ControlMessage) -> bool {
        let Some(channel) = self.signal_path() else {
            return false;
        };
        send_frame(channel, message)
    }

    pub fn reply(&self, side: ControlSide, message: &ControlMessage) {
        let channel = match side {
            ControlSide::Local => self.local.as_ref(),
            ControlSide::Remote => self.remote.as_ref(),
        };
        if let Some(channel) = channel.filter(|c| c.is_open()) {
            send_frame(channel, message);
        }
    }

    pub fn send_ping(&mut self) -> bool {
        let Some(channel) = self.local.as_ref().filter(|c| c.is_open()) else {
            return false;
        };
        if !send_frame(channel, &ControlMessage::Ping) {
            return false;
        }
        self.ping_sent_at = Some(Instant::now());
        true
    }

    /// Round trip of the outstanding ping, if there is one.
    pub fn take_round_trip(&mut self) -> Option<std::time::Duration> {
        self.ping_sent_at.take().map(|sent| sent.elapsed())
    }

    pub fn close_all(&mut self) {
        for channel in [self.local.take(), self.remote.take()].into_iter().flatten() {
            channel.close();
        }
        self.ping_sent_at = None;
    }
}

fn send_frame(channel: &Arc<dyn RawChannel>, message: &ControlMessage) -> bool {
    let text = match message.encode() {
        Ok(text) => text,
        Err(e) => {
            warn!("Could not encode {} frame: {}", message.kind(), e);
            return false;
        }
    };
    match channel.send(Payload::Text(text)) {
        Ok(()) => true,
        Err(e) => {
            debug!("Control frame {} not sent on '{}': {:#}", message.kind(), channel.label(), e);
            false
        }
    }
}
