use crate::channel::ChannelState;
use parley_core::Payload;

/// Notifications published by a single `ManagedChannel`.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    StateChanged(ChannelState),
    Message(Payload),
    /// Queued data could not be handed to the raw channel. `queued` messages
    /// stay queued and are retried on the next open or `send`.
    FlushFailed { queued: usize, error: String },
}
