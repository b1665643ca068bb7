use crate::model::SignalingState;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("`{operation}` is not allowed while the connection is {state}")]
    InvalidState {
        operation: &'static str,
        state: SignalingState,
    },

    #[error("connection already open")]
    AlreadyOpen,

    #[error("connection already closed")]
    AlreadyClosed,

    #[error("connection not initialized")]
    NotInitialized,

    #[error("data channel `{0}` is not open")]
    ChannelNotOpen(String),

    #[error("channel label `{0}` uses the reserved control-channel prefix")]
    ReservedLabel(String),

    #[error("malformed signal: {0}")]
    MalformedSignal(String),

    #[error("unsupported signal type `{0}`")]
    UnsupportedSignalType(String),

    #[error("connection task is no longer running")]
    ConnectionGone,

    #[error("transport error: {0:#}")]
    Transport(#[from] anyhow::Error),
}
