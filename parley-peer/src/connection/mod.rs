mod candidate_queue;
#[allow(clippy::module_inception)]
mod connection;
mod connection_actor;
mod connection_command;
mod connection_config;
mod control_channel;
mod timers;

pub use connection::Connection;
pub use connection_config::{ConnectionConfig, ConnectionOptions, Politeness};
