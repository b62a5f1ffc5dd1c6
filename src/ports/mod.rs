//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Relay Ports
//!
//! - `ConnectionRegistry` - Live connection tracking and admission control
//! - `LoadSampler` - Process load proxies for the capacity monitor
//! - `RelayTransport` - Client side of a relay connection
//!
//! ## External Dependency Ports
//!
//! - `VideoProvider` - Video-hosting control API
//! - `CircuitBreaker` - External service resilience pattern

mod circuit_breaker;
mod connection_registry;
mod load_sampler;
mod relay_transport;
mod video_provider;

pub use circuit_breaker::{
    execute, Admission, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics,
    CircuitCallError, CircuitState,
};
pub use connection_registry::{ConnectionRegistry, Outbox};
pub use load_sampler::{FixedLoadSampler, LoadSampler};
pub use relay_transport::{
    RelayTransport, TransportError, TransportEvent, TransportLink, TransportSession,
};
pub use video_provider::{
    CreateLiveStreamRequest, LatencyMode, LiveStream, PlaybackPolicy, ProviderHealth,
    StreamMetrics, VideoProvider, VideoProviderError,
};
