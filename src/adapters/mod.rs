//! Adapters - Implementations of port interfaces.
//!
//! - `registry` - in-memory connection registry with admission control
//! - `websocket` - socket endpoint and sharded room fan-out
//! - `http` - REST surface and router assembly
//! - `transport` - in-process client transport
//! - `resilience` - circuit breaker, retry, resilient video client
//! - `video` - video provider clients and webhook verification
//! - `system` - process load sampling

pub mod http;
pub mod registry;
pub mod resilience;
pub mod system;
pub mod transport;
pub mod video;
pub mod websocket;

pub use registry::InMemoryConnectionRegistry;
pub use resilience::{InMemoryCircuitBreaker, ResilientVideoProvider};
pub use system::ProcessMemorySampler;
pub use transport::LocalRelayTransport;
pub use websocket::RoomBroadcaster;
