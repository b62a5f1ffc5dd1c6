//! Domain layer - pure relay, scaling, resilience, and session state.

pub mod foundation;
pub mod relay;
pub mod resilience;
pub mod scaling;
pub mod session;
