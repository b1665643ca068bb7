use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Pranswer,
    Answer,
    Rollback,
}

impl fmt::Display for SdpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SdpType::Offer => "offer",
            SdpType::Pranswer => "pranswer",
            SdpType::Answer => "answer",
            SdpType::Rollback => "rollback",
        };
        f.write_str(s)
    }
}

/// An SDP payload tagged with its role in the offer/answer exchange.
///
/// Serializes as `{"type": "offer", "sdp": "v=0..."}`, the same shape browsers use.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }

    /// Parses a description blob received from the relay or the application.
    pub fn from_json(text: &str) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| Error::MalformedSignal(e.to_string()))?;
        match value.get("type").and_then(|t| t.as_str()) {
            Some("offer" | "answer" | "pranswer" | "rollback") => {}
            Some(other) => return Err(Error::UnsupportedSignalType(other.to_owned())),
            None => {
                return Err(Error::MalformedSignal(
                    "session description without a type".into(),
                ));
            }
        }
        serde_json::from_value(value).map_err(|e| Error::MalformedSignal(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::MalformedSignal(e.to_string()))
    }

    /// Fails with `MalformedSignal` unless the description has the expected type.
    pub fn expect_type(&self, expected: SdpType) -> Result<()> {
        if self.sdp_type == expected {
            Ok(())
        } else {
            Err(Error::MalformedSignal(format!(
                "expected {expected}, received {}",
                self.sdp_type
            )))
        }
    }
}
