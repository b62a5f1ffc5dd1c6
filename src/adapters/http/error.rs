//! JSON error bodies and the mapping from relay errors to HTTP statuses.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::adapters::resilience::ExternalError;
use crate::adapters::video::WebhookError;
use crate::domain::foundation::{ErrorCode, ValidationError};
use crate::domain::relay::RelayError;

/// Body of every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn from_code(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(code.as_str(), message)
    }
}

/// API error type that converts relay and provider errors to responses.
#[derive(Debug)]
pub enum ApiError {
    Relay(RelayError),
    External(ExternalError),
    Webhook(WebhookError),
    Validation(ValidationError),
    NotFound { resource: &'static str, id: String },
    WebhooksDisabled,
}

impl ApiError {
    pub fn not_found(resource: &'static str, id: impl Into<String>) -> Self {
        ApiError::NotFound {
            resource,
            id: id.into(),
        }
    }
}

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        ApiError::Relay(err)
    }
}

impl From<ExternalError> for ApiError {
    fn from(err: ExternalError) -> Self {
        ApiError::External(err)
    }
}

impl From<WebhookError> for ApiError {
    fn from(err: WebhookError) -> Self {
        ApiError::Webhook(err)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Validation(err)
    }
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::AdmissionRejected | ErrorCode::CircuitOpen => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::ExternalCallFailed => StatusCode::BAD_GATEWAY,
        ErrorCode::ValidationFailed => StatusCode::BAD_REQUEST,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::TransportError | ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Relay(e) => {
                let code = e.code();
                (status_for(code), Json(ErrorResponse::from_code(code, e.to_string()))).into_response()
            }
            ApiError::External(e) => {
                let code = e.code();
                match code {
                    ErrorCode::CircuitOpen => warn!(error = %e, "Video provider circuit open"),
                    ErrorCode::ExternalCallFailed => error!(error = %e, "Video provider call failed"),
                    _ => {}
                }
                let body = Json(ErrorResponse::from_code(code, e.to_string()));
                let mut response = (status_for(code), body).into_response();
                if let Some(retry_after) = e.retry_after() {
                    let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
                    if let Ok(value) = HeaderValue::from_str(&secs.max(1).to_string()) {
                        response.headers_mut().insert(header::RETRY_AFTER, value);
                    }
                }
                response
            }
            ApiError::Webhook(e) => {
                warn!(error = %e, "Rejected video webhook");
                let (status, code) = match e {
                    WebhookError::InvalidPayload(_) => (StatusCode::BAD_REQUEST, ErrorCode::ValidationFailed.as_str()),
                    _ => (StatusCode::UNAUTHORIZED, "INVALID_WEBHOOK_SIGNATURE"),
                };
                (status, Json(ErrorResponse::new(code, e.to_string()))).into_response()
            }
            ApiError::Validation(e) => (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::from_code(ErrorCode::ValidationFailed, e.to_string())),
            )
                .into_response(),
            ApiError::NotFound { resource, id } => (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::from_code(
                    ErrorCode::NotFound,
                    format!("{} not found: {}", resource, id),
                )),
            )
                .into_response(),
            ApiError::WebhooksDisabled => (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::from_code(
                    ErrorCode::NotFound,
                    "Video webhooks are not configured",
                )),
            )
                .into_response(),
        }
    }
}
