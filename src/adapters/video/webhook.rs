//! Video provider webhook verification and parsing.
//!
//! The provider signs each delivery with a `t=<unix>,v1=<hex>` header where
//! `v1 = HMAC-SHA256(secret, "<t>.<raw body>")`.
//!
//! # Security
//!
//! - Constant-time signature comparison
//! - Deliveries older than 5 minutes (or more than 60s in the future) are
//!   rejected to prevent replays

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::domain::relay::StreamStatus;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the signature.
pub const SIGNATURE_HEADER: &str = "mux-signature";

/// Maximum age for webhook deliveries (5 minutes).
const MAX_TIMESTAMP_AGE_SECS: i64 = 300;

/// Clock skew tolerance for future timestamps (60 seconds).
const MAX_FUTURE_TOLERANCE_SECS: i64 = 60;

/// Webhook rejection reasons.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WebhookError {
    #[error("Missing signature header")]
    MissingHeader,

    #[error("Malformed signature header: {0}")]
    MalformedHeader(&'static str),

    #[error("Webhook too old ({0} seconds)")]
    Expired(i64),

    #[error("Webhook timestamp in future")]
    FromFuture,

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),
}

/// Parsed signature header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub v1_signature: Vec<u8>,
}

impl SignatureHeader {
    /// Parse a `t=<timestamp>,v1=<signature>` header. Unknown keys are ignored.
    pub fn parse(header: &str) -> Result<Self, WebhookError> {
        if header.trim().is_empty() {
            return Err(WebhookError::MissingHeader);
        }

        let mut timestamp = None;
        let mut v1_signature = None;

        for part in header.split(',') {
            let (key, value) = part
                .split_once('=')
                .ok_or(WebhookError::MalformedHeader("expected key=value"))?;

            match key.trim() {
                "t" => {
                    timestamp = Some(
                        value
                            .trim()
                            .parse()
                            .map_err(|_| WebhookError::MalformedHeader("invalid timestamp"))?,
                    );
                }
                "v1" => {
                    v1_signature = Some(
                        hex_decode(value.trim())
                            .ok_or(WebhookError::MalformedHeader("invalid signature hex"))?,
                    );
                }
                _ => {}
            }
        }

        Ok(Self {
            timestamp: timestamp.ok_or(WebhookError::MalformedHeader("missing timestamp"))?,
            v1_signature: v1_signature.ok_or(WebhookError::MalformedHeader("missing v1"))?,
        })
    }
}

/// Verifies webhook deliveries against the shared secret.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: SecretString,
}

impl WebhookVerifier {
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Verify a delivery against the current wall clock.
    pub fn verify(&self, header: &str, payload: &[u8]) -> Result<(), WebhookError> {
        self.verify_at(header, payload, chrono::Utc::now().timestamp())
    }

    /// Verify a delivery as of `now` (unix seconds).
    pub fn verify_at(&self, header: &str, payload: &[u8], now: i64) -> Result<(), WebhookError> {
        let header = SignatureHeader::parse(header)?;

        let age = now
            .checked_sub(header.timestamp)
            .ok_or(WebhookError::MalformedHeader("timestamp out of range"))?;
        if age > MAX_TIMESTAMP_AGE_SECS {
            tracing::warn!(
                event_timestamp = header.timestamp,
                current_time = now,
                age_secs = age,
                "Webhook too old - possible replay"
            );
            return Err(WebhookError::Expired(age));
        }
        if age < -MAX_FUTURE_TOLERANCE_SECS {
            tracing::warn!(
                event_timestamp = header.timestamp,
                current_time = now,
                "Webhook from future - clock skew or manipulation"
            );
            return Err(WebhookError::FromFuture);
        }

        let expected = self.mac(header.timestamp, payload)?;
        if expected.as_slice().ct_eq(&header.v1_signature).unwrap_u8() != 1 {
            tracing::warn!("Invalid webhook signature");
            return Err(WebhookError::InvalidSignature);
        }
        Ok(())
    }

    /// Produce a signature header for `payload` at `timestamp`.
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> Result<String, WebhookError> {
        let mac = self.mac(timestamp, payload)?;
        Ok(format!("t={},v1={}", timestamp, hex_encode(&mac)))
    }

    fn mac(&self, timestamp: i64, payload: &[u8]) -> Result<Vec<u8>, WebhookError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| WebhookError::InvalidSignature)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

/// A webhook delivery as sent by the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct VideoWebhookEvent {
    #[serde(default)]
    pub id: Option<String>,

    /// Event type, e.g. `video.live_stream.active`.
    #[serde(rename = "type")]
    pub event_type: String,

    pub data: WebhookObject,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookObject {
    pub id: String,

    /// The relay stream id, stored with the live stream on creation.
    #[serde(default)]
    pub passthrough: Option<String>,
}

impl VideoWebhookEvent {
    pub fn parse(payload: &[u8]) -> Result<Self, WebhookError> {
        serde_json::from_slice(payload).map_err(|e| WebhookError::InvalidPayload(e.to_string()))
    }

    /// Status carried by a live-stream lifecycle event, if this is one.
    pub fn stream_status(&self) -> Option<StreamStatus> {
        match self.event_type.strip_prefix("video.live_stream.")? {
            "idle" => Some(StreamStatus::Idle),
            "connected" => Some(StreamStatus::Connected),
            "active" => Some(StreamStatus::Active),
            "disconnected" => Some(StreamStatus::Disconnected),
            "disabled" => Some(StreamStatus::Disabled),
            _ => None,
        }
    }

    /// Room the event belongs to: the passthrough if set, else the
    /// provider's live stream id.
    pub fn room_key(&self) -> &str {
        self.data
            .passthrough
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(&self.data.id)
    }
}

fn hex_decode(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 || !hex.is_ascii() {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
