//! Application layer - relay orchestration and background jobs.
//!
//! - [`relay`] - connection lifecycle, message routing, room fan-out
//! - [`capacity_monitor`] - periodic sweep and admission scaling
//! - [`session_controller`] - client-side reconnecting session
//! - [`scheduler`] - cancellable periodic task runner

pub mod capacity_monitor;
pub mod relay;
pub mod scheduler;
pub mod session_controller;

pub use capacity_monitor::{CapacityMonitor, TickReport};
pub use relay::{Admitted, RelayService, RelayServiceConfig, RelayStats};
pub use scheduler::{PeriodicJob, ScheduledTask};
pub use session_controller::{ClientSessionController, SessionError};
