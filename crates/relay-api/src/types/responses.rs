//! Response DTOs for the API.

use chrono::{DateTime, Utc};
use serde::Serialize;

use relay_models::Identity;
use relay_runtime::{LinkingCode, PairingStatus, SessionStatus};

/// Health check response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service version.
    pub version: String,
    /// Uptime in seconds.
    pub uptime_seconds: u64,
    /// Registered sessions.
    pub active_sessions: usize,
}

/// One route in the index.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointInfo {
    /// HTTP method.
    pub method: &'static str,
    /// Path template.
    pub path: &'static str,
    /// What it does.
    pub description: &'static str,
}

/// `GET /` response.
#[derive(Debug, Clone, Serialize)]
pub struct IndexResponse {
    /// Service name.
    pub name: String,
    /// Service version.
    pub version: String,
    /// Available routes.
    pub endpoints: Vec<EndpointInfo>,
}

/// Outcome of a session action (start, stop, unpair).
#[derive(Debug, Clone, Serialize)]
pub struct ActionResponse {
    /// Whether the action took effect.
    pub success: bool,
    /// Human-readable outcome.
    pub message: String,
    /// Identity acted on.
    pub identity: Identity,
}

impl ActionResponse {
    /// A successful action.
    pub fn ok(identity: Identity, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            identity,
        }
    }
}

/// Outcome of a send.
#[derive(Debug, Clone, Serialize)]
pub struct SendResponse {
    /// Always true; failures are errors.
    pub success: bool,
    /// Human-readable outcome.
    pub message: String,
    /// Resolved recipient address.
    pub to: String,
}

/// `GET /sessions/:id/status` response.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatusResponse {
    /// Identity.
    pub identity: Identity,
    /// Whether a registry entry exists.
    pub running: bool,
    /// Detailed status.
    pub status: SessionStatus,
}

impl SessionStatusResponse {
    /// Builds the response from a status lookup.
    pub fn new(identity: Identity, status: SessionStatus) -> Self {
        Self {
            identity,
            running: status.is_running(),
            status,
        }
    }
}

/// Entry in the session list.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    /// Identity.
    pub identity: Identity,
    /// Detailed status.
    pub status: SessionStatus,
}

/// `GET /sessions` response.
#[derive(Debug, Clone, Serialize)]
pub struct SessionListResponse {
    /// Registered sessions, sorted by identity.
    pub sessions: Vec<SessionSummary>,
    /// Total count.
    pub total: usize,
}

/// One connection in the pairing view.
#[derive(Debug, Clone, Serialize)]
pub struct PairConnection {
    /// Identity.
    pub identity: Identity,
    /// `active`, `connecting`, or `pairing` while a code is outstanding.
    pub status: &'static str,
}

/// `GET /pair/connections` response.
#[derive(Debug, Clone, Serialize)]
pub struct PairConnectionsResponse {
    /// Live sessions first, then pairing attempts.
    pub connections: Vec<PairConnection>,
    /// Total count.
    pub total: usize,
}

/// `GET /pair/code` response.
///
/// Carries either a linking code or a note that the device is already
/// registered.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairCodeResponse {
    /// Always true; failures are errors.
    pub success: bool,
    /// Identity being paired.
    pub identity: Identity,
    /// Linking code to enter on the device.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Advertised code validity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in_seconds: Option<u64>,
    /// Advertised expiry time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Set when no code was needed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl PairCodeResponse {
    /// A freshly issued (or still outstanding) code.
    pub fn code(linking: LinkingCode) -> Self {
        Self {
            success: true,
            expires_in_seconds: Some(linking.valid_for_secs()),
            expires_at: Some(linking.expires_at()),
            code: Some(linking.code),
            identity: linking.identity,
            message: None,
        }
    }

    /// The device was paired before; its session is being started instead.
    pub fn already_registered(identity: Identity) -> Self {
        Self {
            success: true,
            identity,
            code: None,
            expires_in_seconds: None,
            expires_at: None,
            message: Some("Device already registered".to_string()),
        }
    }
}

/// `GET /pair/status/:id` response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairStatusResponse {
    /// Identity.
    pub identity: Identity,
    /// Registered and open.
    pub active: bool,
    /// Credentials are stored for this identity.
    pub credentials_exist: bool,
    /// A pairing attempt is outstanding.
    pub pairing: bool,
    /// `connected`, `disconnected` or `not_initialized`.
    pub status: &'static str,
}

impl From<PairingStatus> for PairStatusResponse {
    fn from(status: PairingStatus) -> Self {
        Self {
            status: status.status(),
            identity: status.identity,
            active: status.active,
            credentials_exist: status.credentials_exist,
            pairing: status.pairing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn identity() -> Identity {
        Identity::parse("15550109999").unwrap()
    }

    #[test]
    fn test_pair_code_uses_camel_case() {
        let response = PairCodeResponse::code(LinkingCode {
            identity: identity(),
            code: "ABCD-EFGH".to_string(),
            issued_at: Utc::now(),
            valid_for: Duration::from_secs(60),
        });
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["code"], "ABCD-EFGH");
        assert_eq!(value["expiresInSeconds"], 60);
        assert_eq!(value["identity"], "15550109999");
        assert!(value.get("message").is_none());
    }

    #[test]
    fn test_already_registered_has_no_code() {
        let value = serde_json::to_value(PairCodeResponse::already_registered(identity())).unwrap();
        assert_eq!(value["message"], "Device already registered");
        assert!(value.get("code").is_none());
    }

    #[test]
    fn test_session_status_running() {
        let value =
            serde_json::to_value(SessionStatusResponse::new(identity(), SessionStatus::Connecting))
                .unwrap();
        assert_eq!(value["running"], true);
        assert_eq!(value["status"], "connecting");

        let stopped = SessionStatusResponse::new(identity(), SessionStatus::Reconnecting);
        assert!(!stopped.running);
    }
}
