use crate::model::candidate::IceCandidate;
use crate::model::description::SessionDescription;
use crate::model::session::SessionId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub credential: Option<String>,
}

/// Frames exchanged with the first-contact relay before a control channel exists.
///
/// The relay only looks at `join`; `sdp` and `iceCandidate` are forwarded verbatim
/// to the paired session (or held until one joins).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum RelayMessage {
    /// Sent by the relay right after the socket opens.
    Id(SessionId),
    /// Pair this socket with another session.
    Join(SessionId),
    Sdp(SessionDescription),
    IceCandidate(IceCandidate),
}

impl RelayMessage {
    pub fn to_json(&self) -> crate::Result<String> {
        serde_json::to_string(self).map_err(|e| crate::Error::MalformedSignal(e.to_string()))
    }

    pub fn from_json(text: &str) -> crate::Result<Self> {
        serde_json::from_str(text).map_err(|e| crate::Error::MalformedSignal(e.to_string()))
    }
}
