//! Errors raised by relay operations.

use thiserror::Error;

use crate::domain::foundation::{ConnectionId, ErrorCode, StreamId, ValidationError};

/// Failures of admission, routing, and room operations.
///
/// None of these mutate connection or room state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    /// Capacity exceeded. Recoverable: the client should back off.
    #[error("Connection capacity exceeded ({active}/{max})")]
    AdmissionRejected { active: usize, max: usize },

    /// Malformed payload.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The connection tried to act on a room it has not joined.
    #[error("Connection {connection_id} has not joined stream {stream_id}")]
    NotInRoom {
        connection_id: ConnectionId,
        stream_id: StreamId,
    },

    /// The connection is not (or no longer) registered.
    #[error("Unknown connection {0}")]
    UnknownConnection(ConnectionId),
}

impl RelayError {
    pub fn code(&self) -> ErrorCode {
        match self {
            RelayError::AdmissionRejected { .. } => ErrorCode::AdmissionRejected,
            RelayError::Validation(_) | RelayError::NotInRoom { .. } => {
                ErrorCode::ValidationFailed
            }
            RelayError::UnknownConnection(_) => ErrorCode::NotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admission_rejected_maps_to_recoverable_code() {
        let err = RelayError::AdmissionRejected { active: 10, max: 10 };
        assert_eq!(err.code(), ErrorCode::AdmissionRejected);
        assert!(err.code().is_recoverable());
        assert_eq!(err.to_string(), "Connection capacity exceeded (10/10)");
    }

    #[test]
    fn validation_converts_from_validation_error() {
        let err: RelayError = ValidationError::empty_field("message").into();
        assert_eq!(err.code(), ErrorCode::ValidationFailed);
    }
}
