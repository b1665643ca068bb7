mod candidate;
mod control;
mod description;
mod payload;
mod session;
mod signaling;
mod state;

pub use candidate::{CandidateError, IceCandidate};
pub use control::ControlMessage;
pub use description::{SdpType, SessionDescription};
pub use payload::Payload;
pub use session::SessionId;
pub use signaling::{IceServerConfig, RelayMessage};
pub use state::{CloseReason, SignalingState};
