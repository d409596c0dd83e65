//! API error types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use relay_runtime::RelayError;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Result type for API operations.
pub type Result<T> = std::result::Result<T, ApiError>;

/// API error type for consistent `{error, kind}` responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid input that never reached the runtime.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Error from the session runtime.
    #[error(transparent)]
    Relay(#[from] RelayError),
}

impl ApiError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Relay(err) => match err {
                RelayError::InvalidIdentity(_) => StatusCode::BAD_REQUEST,
                RelayError::SessionNotFound(_) | RelayError::CredentialsNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                RelayError::PairingInProgress(_)
                | RelayError::PairingCancelled(_)
                | RelayError::SessionStarting(_) => StatusCode::CONFLICT,
                RelayError::PairingRequestFailed { .. } | RelayError::Transport(_) => {
                    StatusCode::BAD_GATEWAY
                }
                RelayError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Relay(err) => err.kind(),
        }
    }

    /// Message safe to show to clients.
    ///
    /// Transport and storage failures are reduced to their kind; the full
    /// error only goes to the log.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::Relay(RelayError::PairingRequestFailed { identity, .. }) => {
                format!("pairing request failed for {}", identity)
            }
            ApiError::Relay(RelayError::Transport(_)) => "transport error".to_string(),
            ApiError::Relay(RelayError::Persistence(_)) => "credential storage error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(kind = self.kind(), error = %self, "Request failed");
        } else {
            warn!(kind = self.kind(), error = %self, "Request rejected");
        }

        let body = Json(json!({
            "error": self.public_message(),
            "kind": self.kind(),
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_models::Identity;
    use relay_runtime::TransportError;

    fn identity() -> Identity {
        Identity::parse("15550109999").unwrap()
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (
                ApiError::from(RelayError::from(Identity::parse("12").unwrap_err())),
                StatusCode::BAD_REQUEST,
            ),
            (
                RelayError::SessionNotFound(identity()).into(),
                StatusCode::NOT_FOUND,
            ),
            (
                RelayError::CredentialsNotFound(identity()).into(),
                StatusCode::NOT_FOUND,
            ),
            (
                RelayError::PairingInProgress(identity()).into(),
                StatusCode::CONFLICT,
            ),
            (
                RelayError::SessionStarting(identity()).into(),
                StatusCode::CONFLICT,
            ),
            (
                RelayError::Transport(TransportError::Closed).into(),
                StatusCode::BAD_GATEWAY,
            ),
            (
                ApiError::BadRequest("phone".into()),
                StatusCode::BAD_REQUEST,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(err.status_code(), status, "{}", err.kind());
        }
    }

    #[test]
    fn test_public_message_hides_transport_detail() {
        let err: ApiError = RelayError::PairingRequestFailed {
            identity: identity(),
            source: TransportError::PairingRejected("upstream said 500 at /secret".into()),
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.kind(), "pairing_request_failed");
        assert!(!err.public_message().contains("secret"));
    }
}
