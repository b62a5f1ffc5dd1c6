//! Circuit breaker and retry configuration for the video provider

use std::time::Duration;

use serde::Deserialize;

use crate::adapters::resilience::RetryConfig;
use crate::domain::resilience::CircuitBreakerConfig;

use super::error::ValidationError;

/// Resilience configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ResilienceConfig {
    /// Consecutive failures before the breaker opens
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Seconds after the last failure before a probe is allowed
    #[serde(default = "default_reset_timeout")]
    pub reset_timeout_secs: u64,

    /// Successful probes needed to close again
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,

    /// Total attempts per provider call
    #[serde(default = "default_retry_attempts")]
    pub retry_max_attempts: u32,

    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,

    #[serde(default = "default_retry_max_delay")]
    pub retry_max_delay_ms: u64,
}

impl ResilienceConfig {
    pub fn breaker(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            reset_timeout: Duration::from_secs(self.reset_timeout_secs),
            success_threshold: self.success_threshold,
        }
    }

    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.retry_max_attempts,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
        }
    }

    /// Validate resilience configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.failure_threshold == 0 {
            return Err(ValidationError::MustBePositive("failure_threshold"));
        }
        if self.success_threshold == 0 {
            return Err(ValidationError::MustBePositive("success_threshold"));
        }
        if self.reset_timeout_secs == 0 {
            return Err(ValidationError::MustBePositive("reset_timeout_secs"));
        }
        if self.retry_max_attempts == 0 {
            return Err(ValidationError::MustBePositive("retry_max_attempts"));
        }
        Ok(())
    }
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            reset_timeout_secs: default_reset_timeout(),
            success_threshold: default_success_threshold(),
            retry_max_attempts: default_retry_attempts(),
            retry_base_delay_ms: default_retry_base_delay(),
            retry_max_delay_ms: default_retry_max_delay(),
        }
    }
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_reset_timeout() -> u64 {
    60
}

fn default_success_threshold() -> u32 {
    3
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_base_delay() -> u64 {
    1000
}

fn default_retry_max_delay() -> u64 {
    5000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_build_default_breaker_and_retry() {
        let config = ResilienceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.breaker(), CircuitBreakerConfig::default());
        assert_eq!(config.retry().max_attempts, RetryConfig::default().max_attempts);
        assert_eq!(config.retry().max_delay, Duration::from_secs(5));
    }

    #[test]
    fn zero_failure_threshold_is_rejected() {
        let config = ResilienceConfig {
            failure_threshold: 0,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::MustBePositive("failure_threshold"))
        );
    }
}
