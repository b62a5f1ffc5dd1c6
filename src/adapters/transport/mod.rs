//! Client transports for the relay.

mod in_process;

pub use in_process::LocalRelayTransport;
