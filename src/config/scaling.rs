//! Capacity monitor configuration

use std::time::Duration;

use serde::Deserialize;

use crate::domain::scaling::{ScalingPolicy, ScalingState};

use super::error::ValidationError;
use super::relay::RelayConfig;

/// Scaling configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ScalingConfig {
    /// Whether the monitor may change the admission ceiling
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seconds between monitor ticks
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,

    #[serde(default = "default_connection_ratio")]
    pub scale_up_connection_ratio: f64,

    #[serde(default = "default_memory_ratio")]
    pub scale_up_memory_ratio: f64,

    #[serde(default = "default_cpu_ratio")]
    pub scale_up_cpu_ratio: f64,

    #[serde(default = "default_scale_down_ratio")]
    pub scale_down_connection_ratio: f64,

    #[serde(default = "default_growth")]
    pub growth_factor: f64,

    #[serde(default = "default_shrink")]
    pub shrink_factor: f64,

    #[serde(default = "default_min_compression")]
    pub min_compression: u8,

    #[serde(default = "default_max_compression")]
    pub max_compression: u8,

    #[serde(default = "default_initial_compression")]
    pub initial_compression: u8,

    /// Memory budget in MiB used to compute memory pressure
    #[serde(default = "default_memory_budget")]
    pub memory_budget_mb: u64,
}

impl ScalingConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_secs(self.tick_secs)
    }

    /// Builds the policy using the connection bounds from the relay section.
    pub fn policy(&self, relay: &RelayConfig) -> ScalingPolicy {
        ScalingPolicy {
            floor: relay.floor_max_connections,
            ceiling: relay.ceiling_max_connections,
            scale_up_connection_ratio: self.scale_up_connection_ratio,
            scale_up_memory_ratio: self.scale_up_memory_ratio,
            scale_up_cpu_ratio: self.scale_up_cpu_ratio,
            scale_down_connection_ratio: self.scale_down_connection_ratio,
            growth_factor: self.growth_factor,
            shrink_factor: self.shrink_factor,
            min_compression: self.min_compression,
            max_compression: self.max_compression,
        }
    }

    /// State published before the first tick.
    pub fn initial_state(&self, relay: &RelayConfig) -> ScalingState {
        ScalingState {
            active_connections: 0,
            max_connections: relay.initial_max_connections,
            compression_level: self.initial_compression,
            auto_scaling_enabled: self.enabled,
        }
    }

    /// Validate scaling configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.tick_secs == 0 {
            return Err(ValidationError::MustBePositive("tick_secs"));
        }
        for (name, value) in [
            ("scale_up_connection_ratio", self.scale_up_connection_ratio),
            ("scale_up_memory_ratio", self.scale_up_memory_ratio),
            ("scale_up_cpu_ratio", self.scale_up_cpu_ratio),
            ("scale_down_connection_ratio", self.scale_down_connection_ratio),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ValidationError::OutOfRange {
                    name,
                    min: 0.0,
                    max: 1.0,
                });
            }
        }
        if self.scale_down_connection_ratio >= self.scale_up_connection_ratio
            || self.scale_down_connection_ratio >= self.scale_up_cpu_ratio
        {
            return Err(ValidationError::OverlappingThresholds);
        }
        if self.growth_factor <= 1.0 {
            return Err(ValidationError::OutOfRange {
                name: "growth_factor",
                min: 1.0,
                max: f64::INFINITY,
            });
        }
        if self.shrink_factor <= 0.0 || self.shrink_factor >= 1.0 {
            return Err(ValidationError::OutOfRange {
                name: "shrink_factor",
                min: 0.0,
                max: 1.0,
            });
        }
        if self.min_compression > self.initial_compression
            || self.initial_compression > self.max_compression
            || self.max_compression > 9
        {
            return Err(ValidationError::InvalidCompressionBounds {
                min: self.min_compression,
                initial: self.initial_compression,
                max: self.max_compression,
            });
        }
        if self.memory_budget_mb == 0 {
            return Err(ValidationError::MustBePositive("memory_budget_mb"));
        }
        Ok(())
    }
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            tick_secs: default_tick_secs(),
            scale_up_connection_ratio: default_connection_ratio(),
            scale_up_memory_ratio: default_memory_ratio(),
            scale_up_cpu_ratio: default_cpu_ratio(),
            scale_down_connection_ratio: default_scale_down_ratio(),
            growth_factor: default_growth(),
            shrink_factor: default_shrink(),
            min_compression: default_min_compression(),
            max_compression: default_max_compression(),
            initial_compression: default_initial_compression(),
            memory_budget_mb: default_memory_budget(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_tick_secs() -> u64 {
    5
}

fn default_connection_ratio() -> f64 {
    0.80
}

fn default_memory_ratio() -> f64 {
    0.85
}

fn default_cpu_ratio() -> f64 {
    0.80
}

fn default_scale_down_ratio() -> f64 {
    0.30
}

fn default_growth() -> f64 {
    1.2
}

fn default_shrink() -> f64 {
    0.9
}

fn default_min_compression() -> u8 {
    3
}

fn default_max_compression() -> u8 {
    9
}

fn default_initial_compression() -> u8 {
    6
}

fn default_memory_budget() -> u64 {
    1024
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_policy_defaults() {
        let config = ScalingConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.policy(&RelayConfig::default()), ScalingPolicy::default());
    }

    #[test]
    fn initial_state_uses_relay_initial_ceiling() {
        let state = ScalingConfig::default().initial_state(&RelayConfig::default());
        assert_eq!(state.max_connections, 1000);
        assert_eq!(state.compression_level, 6);
        assert!(state.auto_scaling_enabled);
    }

    #[test]
    fn scale_down_above_scale_up_is_rejected() {
        let config = ScalingConfig {
            scale_down_connection_ratio: 0.9,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::OverlappingThresholds));
    }

    #[test]
    fn compression_outside_bounds_is_rejected() {
        let config = ScalingConfig {
            initial_compression: 1,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidCompressionBounds { .. })
        ));
    }

    #[test]
    fn shrink_factor_must_shrink() {
        let config = ScalingConfig {
            shrink_factor: 1.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::OutOfRange { name: "shrink_factor", .. })
        ));
    }

    #[test]
    fn growth_factor_must_grow() {
        let config = ScalingConfig {
            growth_factor: 1.0,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::OutOfRange {
                name: "growth_factor",
                min: 1.0,
                max: f64::INFINITY,
            })
        );
    }
}
