use parley_core::Payload;
use std::fmt;

/// Transport-assigned identity of a raw channel, unique within one transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RawChannelId(pub u64);

impl fmt::Display for RawChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A data channel owned by the transport.
///
/// `send` must not block and must preserve call order; implementations queue
/// behind a writer task when the underlying API is asynchronous.
pub trait RawChannel: Send + Sync + 'static {
    fn id(&self) -> RawChannelId;

    fn label(&self) -> &str;

    fn is_open(&self) -> bool;

    fn send(&self, payload: Payload) -> anyhow::Result<()>;

    fn close(&self);
}
