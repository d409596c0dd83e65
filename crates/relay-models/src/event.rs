//! Session events and connection states.
//!
//! Transports translate whatever their wire client reports into
//! [`SessionEvent`] before anything in the relay sees it, so the lifecycle
//! code never branches on untyped payloads.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::credentials::CredentialBlob;
use crate::message::InboundMessage;

/// Connection state of a live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Transport is negotiating.
    #[default]
    Connecting,
    /// Authenticated and able to send.
    Open,
    /// Connection went away.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Why a connection closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectCause {
    /// The account revoked this device. Terminal.
    LoggedOut,
    /// Network dropped or timed out.
    ConnectionLost,
    /// Another client took over the session.
    ConnectionReplaced,
    /// Server asked the client to reconnect (typical right after pairing).
    RestartRequired,
    /// Any other server-side status.
    ServerError { code: u16 },
    /// No status reported.
    Unknown,
}

impl DisconnectCause {
    /// Classifies a transport status code.
    pub fn from_status_code(code: Option<u16>) -> Self {
        match code {
            Some(401) => Self::LoggedOut,
            Some(408) | Some(428) => Self::ConnectionLost,
            Some(440) => Self::ConnectionReplaced,
            Some(515) => Self::RestartRequired,
            Some(code) => Self::ServerError { code },
            None => Self::Unknown,
        }
    }

    /// True for explicit revocation by the remote side.
    pub fn is_logged_out(&self) -> bool {
        matches!(self, Self::LoggedOut)
    }
}

impl fmt::Display for DisconnectCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoggedOut => f.write_str("logged out"),
            Self::ConnectionLost => f.write_str("connection lost"),
            Self::ConnectionReplaced => f.write_str("connection replaced"),
            Self::RestartRequired => f.write_str("restart required"),
            Self::ServerError { code } => write!(f, "server error ({})", code),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

/// Everything a protocol session can report.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The connection is authenticated and open.
    ConnectionOpened,
    /// The connection closed.
    ConnectionClosed { cause: DisconnectCause },
    /// The client produced new credential material that must be persisted.
    CredentialsUpdated { blob: CredentialBlob },
    /// A message arrived.
    MessageReceived { message: InboundMessage },
}

impl SessionEvent {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConnectionOpened => "connection_opened",
            Self::ConnectionClosed { .. } => "connection_closed",
            Self::CredentialsUpdated { .. } => "credentials_updated",
            Self::MessageReceived { .. } => "message_received",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status_codes() {
        assert_eq!(DisconnectCause::from_status_code(Some(401)), DisconnectCause::LoggedOut);
        assert_eq!(DisconnectCause::from_status_code(Some(408)), DisconnectCause::ConnectionLost);
        assert_eq!(
            DisconnectCause::from_status_code(Some(515)),
            DisconnectCause::RestartRequired
        );
        assert_eq!(
            DisconnectCause::from_status_code(Some(503)),
            DisconnectCause::ServerError { code: 503 }
        );
        assert_eq!(DisconnectCause::from_status_code(None), DisconnectCause::Unknown);
    }

    #[test]
    fn test_only_logout_is_terminal() {
        assert!(DisconnectCause::LoggedOut.is_logged_out());
        assert!(!DisconnectCause::ConnectionLost.is_logged_out());
        assert!(!DisconnectCause::Unknown.is_logged_out());
        assert!(!DisconnectCause::ServerError { code: 500 }.is_logged_out());
    }

    #[test]
    fn test_connection_state_display() {
        assert_eq!(ConnectionState::Open.to_string(), "open");
        assert_eq!(ConnectionState::default(), ConnectionState::Connecting);
        let json = serde_json::to_string(&ConnectionState::Closed).unwrap();
        assert_eq!(json, "\"closed\"");
    }
}
