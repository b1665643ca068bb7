pub mod channel;
pub mod connection;
pub mod events;
pub mod transport;

pub use channel::{ChannelState, ManagedChannel};
pub use connection::{Connection, ConnectionConfig, ConnectionOptions, Politeness};
pub use events::{ChannelEvent, ConnectionEvent, EventBus, RemoteTrack};
pub use transport::{
    LocalTrack, RawChannel, RawChannelId, Transport, TransportConfig, TransportEvent,
    TransportEventSink, TransportFactory, WebrtcTransport, WebrtcTransportFactory,
};
