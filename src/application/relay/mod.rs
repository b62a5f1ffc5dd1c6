//! Relay core: pure routing of client events plus the service that
//! executes them against the registry and rooms.

mod relay_service;
mod route_message;

pub use relay_service::{Admitted, RelayService, RelayServiceConfig, RelayStats};
pub use route_message::{route_client_message, RelayCommand, RouteLimits};
