mod channel_event;
mod connection_event;
mod event_bus;

pub use channel_event::ChannelEvent;
pub(crate) use connection_event::stream_key;
pub use connection_event::{ConnectionEvent, RemoteTrack};
pub use event_bus::EventBus;
