pub use parley_core::{Error, Result, SessionId, SignalingState};
pub use parley_peer::{
    ChannelEvent, ChannelState, Connection, ConnectionConfig, ConnectionEvent, ConnectionOptions,
    ManagedChannel, Politeness,
};

pub mod model {
    pub use parley_core::*;
}

pub mod peer {
    pub use parley_peer::*;
}

#[cfg(feature = "relay")]
pub mod relay {
    pub use parley_relay::*;
}
