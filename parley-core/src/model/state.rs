use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a connection as seen by the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalingState {
    Closed,
    AwaitingOffer,
    Negotiating,
    AwaitingAnswer,
    Complete,
    Reconnecting,
}

impl SignalingState {
    /// Remote candidates may be handed to the transport only in these states.
    pub fn accepts_candidates(self) -> bool {
        matches!(self, SignalingState::Negotiating | SignalingState::Complete)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SignalingState::Closed => "closed",
            SignalingState::AwaitingOffer => "awaiting-offer",
            SignalingState::Negotiating => "negotiating",
            SignalingState::AwaitingAnswer => "awaiting-answer",
            SignalingState::Complete => "complete",
            SignalingState::Reconnecting => "reconnecting",
        }
    }
}

impl fmt::Display for SignalingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a session ended or is being re-established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CloseReason {
    /// The application called `close()`.
    Explicit,
    IceFailed,
    ConnectTimeout,
    /// No pong arrived within the disconnect timeout.
    KeepaliveTimeout,
    /// The transport reported a closed or disconnected path.
    TransportClosed,
    ControlChannelClosed,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CloseReason::Explicit => "explicit",
            CloseReason::IceFailed => "ice-failed",
            CloseReason::ConnectTimeout => "connect-timeout",
            CloseReason::KeepaliveTimeout => "keepalive-timeout",
            CloseReason::TransportClosed => "transport-closed",
            CloseReason::ControlChannelClosed => "control-channel-closed",
        };
        f.write_str(s)
    }
}
