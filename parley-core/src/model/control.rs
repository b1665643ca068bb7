use crate::error::{Error, Result};
use crate::model::candidate::IceCandidate;
use crate::model::description::SessionDescription;
use serde::{Deserialize, Serialize};

/// Frames exchanged over the control channel once a direct path exists.
///
/// Wire format: `{"type": "ping" | "pong" | "negotiate" | "signal" | "candidate", "data"?: ...}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum ControlMessage {
    Ping,
    Pong,
    /// Asks the impolite side to start a renegotiation on our behalf.
    Negotiate,
    Signal(SessionDescription),
    Candidate(IceCandidate),
}

impl ControlMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ControlMessage::Ping => "ping",
            ControlMessage::Pong => "pong",
            ControlMessage::Negotiate => "negotiate",
            ControlMessage::Signal(_) => "signal",
            ControlMessage::Candidate(_) => "candidate",
        }
    }

    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::MalformedSignal(e.to_string()))
    }

    pub fn decode(text: &str) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| Error::MalformedSignal(e.to_string()))?;
        let Some(kind) = value.get("type").and_then(|t| t.as_str()) else {
            return Err(Error::MalformedSignal("control frame without a type".into()));
        };
        if !matches!(kind, "ping" | "pong" | "negotiate" | "signal" | "candidate") {
            return Err(Error::UnsupportedSignalType(kind.to_owned()));
        }
        serde_json::from_value(value).map_err(|e| Error::MalformedSignal(e.to_string()))
    }
}
