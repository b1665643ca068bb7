mod raw_channel;
mod transport_config;
mod transport_event;
mod transport_primitive;
mod webrtc_transport;

pub use raw_channel::{RawChannel, RawChannelId};
pub use transport_config::TransportConfig;
pub use transport_event::{Connectivity, NativeSignalingState, TransportEvent, TransportEventSink};
pub use transport_primitive::{LocalTrack, Transport, TransportFactory};
pub use webrtc_transport::{WebrtcTransport, WebrtcTransportFactory};
