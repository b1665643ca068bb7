mod managed_channel;

pub use managed_channel::{ChannelState, ManagedChannel};
