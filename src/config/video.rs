//! Video provider configuration

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::adapters::video::HttpVideoConfig;

use super::error::ValidationError;

/// Video provider configuration
#[derive(Debug, Clone, Deserialize)]
pub struct VideoConfig {
    /// Control API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API token id
    #[serde(default)]
    pub token_id: String,

    /// API token secret
    pub token_secret: Option<SecretString>,

    /// Webhook signing secret; webhooks are refused while unset
    pub webhook_secret: Option<SecretString>,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl VideoConfig {
    /// True when both halves of the API token are present.
    pub fn has_credentials(&self) -> bool {
        !self.token_id.is_empty()
            && self
                .token_secret
                .as_ref()
                .is_some_and(|s| !s.expose_secret().is_empty())
    }

    /// HTTP client settings, or `None` when credentials are missing.
    pub fn http_config(&self) -> Option<HttpVideoConfig> {
        if !self.has_credentials() {
            return None;
        }
        let secret = self.token_secret.clone()?;
        Some(
            HttpVideoConfig::new(self.token_id.clone(), secret)
                .with_base_url(self.base_url.clone())
                .with_timeout(Duration::from_secs(self.request_timeout_secs)),
        )
    }

    /// Validate video configuration
    ///
    /// Credentials are only mandatory in production; development falls
    /// back to the in-memory provider.
    pub fn validate(&self, production: bool) -> Result<(), ValidationError> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ValidationError::InvalidVideoBaseUrl);
        }
        if self.request_timeout_secs == 0 {
            return Err(ValidationError::MustBePositive("request_timeout_secs"));
        }
        if production {
            if !self.has_credentials() {
                return Err(ValidationError::MissingRequired("VIDEO__TOKEN_SECRET"));
            }
            if self.webhook_secret.is_none() {
                return Err(ValidationError::MissingRequired("VIDEO__WEBHOOK_SECRET"));
            }
        }
        Ok(())
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token_id: String::new(),
            token_secret: None,
            webhook_secret: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.mux.com".to_string()
}

fn default_request_timeout() -> u64 {
    10
}
