//! Application configuration module
//!
//! Configuration is read from environment variables with the `STREAM_RELAY`
//! prefix; nested values are separated by a double underscore. Every
//! section has defaults, so an empty environment yields a runnable
//! development relay.
//!
//! # Example
//!
//! ```no_run
//! use stream_relay::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod error;
mod relay;
mod resilience;
mod scaling;
mod server;
mod video;

pub use error::{ConfigError, ValidationError};
pub use relay::RelayConfig;
pub use resilience::ResilienceConfig;
pub use scaling::ScalingConfig;
pub use server::{Environment, ServerConfig};
pub use video::VideoConfig;

use serde::Deserialize;

/// Root application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment, logging)
    #[serde(default)]
    pub server: ServerConfig,

    /// Admission bounds, liveness and message limits
    #[serde(default)]
    pub relay: RelayConfig,

    /// Capacity monitor thresholds
    #[serde(default)]
    pub scaling: ScalingConfig,

    /// Breaker and retry settings for the video provider
    #[serde(default)]
    pub resilience: ResilienceConfig,

    /// Video provider credentials
    #[serde(default)]
    pub video: VideoConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// Loads `.env` if present, then reads `STREAM_RELAY__SECTION__KEY`
    /// variables, e.g. `STREAM_RELAY__SERVER__PORT=8080` or
    /// `STREAM_RELAY__SCALING__TICK_SECS=10`.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("STREAM_RELAY")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.relay.validate()?;
        self.scaling.validate()?;
        self.resilience.validate()?;
        self.video.validate(self.is_production())?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}
