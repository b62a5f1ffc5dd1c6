//! HTTP adapter for relay status and administration.

mod dto;
mod handlers;
mod routes;

pub use dto::{ConnectionResponse, DisconnectRequest, HealthResponse, StatsResponse};
pub use handlers::health;
pub use routes::relay_routes;
