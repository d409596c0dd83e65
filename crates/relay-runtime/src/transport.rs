//! Protocol transport seam.
//!
//! The wire client (transport, encryption, framing) lives outside the relay.
//! It is consumed through [`ProtocolClient`] to open connections and
//! [`ProtocolSession`] to act on one. Each connection comes with its own
//! ordered stream of [`SessionEvent`]s.

use std::sync::Arc;

use async_trait::async_trait;
use relay_models::{CredentialBlob, Identity, OutboundContent, SessionEvent};
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors reported by a protocol transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Could not open a connection.
    #[error("connect failed: {0}")]
    Connect(String),

    /// Outbound send rejected.
    #[error("send failed: {0}")]
    Send(String),

    /// The remote service refused to issue a linking code.
    #[error("pairing code request rejected: {0}")]
    PairingRejected(String),

    /// The session is already closed.
    #[error("session closed")]
    Closed,

    /// HTTP-level failure talking to a gateway.
    #[error("http error: {0}")]
    Http(String),

    /// The transport answered with something unexpected.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        TransportError::Http(e.to_string())
    }
}

/// A freshly opened connection: the handle plus its event stream.
pub struct Connection {
    /// Handle used for outbound operations.
    pub session: Arc<dyn ProtocolSession>,
    /// Events in transport order. Ends when the transport drops the connection.
    pub events: mpsc::Receiver<SessionEvent>,
}

/// Opens protocol connections.
#[async_trait]
pub trait ProtocolClient: Send + Sync {
    /// Connects `identity` using stored credentials, or fresh ones when `None`.
    async fn connect(
        &self,
        identity: &Identity,
        credentials: Option<CredentialBlob>,
    ) -> Result<Connection, TransportError>;
}

/// One live connection for one identity.
#[async_trait]
pub trait ProtocolSession: Send + Sync {
    /// The account's own address once authenticated.
    fn own_address(&self) -> Option<String>;

    /// Sends `content` to `recipient` (user or group address).
    async fn send(&self, recipient: &str, content: OutboundContent) -> Result<(), TransportError>;

    /// Asks the remote service for a linking code for `phone`.
    async fn request_pairing_code(&self, phone: &Identity) -> Result<String, TransportError>;

    /// Revokes this device remotely and closes the connection.
    async fn logout(&self) -> Result<(), TransportError>;

    /// Closes the connection. Idempotent.
    async fn close(&self) -> Result<(), TransportError>;
}
