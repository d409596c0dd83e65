//! Error types for the runtime crate.

use relay_models::{Identity, IdentityError};
use relay_persistence::PersistenceError;
use thiserror::Error;

use crate::transport::TransportError;

/// Errors surfaced by session lifecycle operations.
///
/// Disconnects are deliberately absent: they happen after the triggering
/// request completed and are handled by the reconnect supervisor.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Malformed or too-short phone number.
    #[error("invalid identity: {0}")]
    InvalidIdentity(#[from] IdentityError),

    /// No live session for this identity.
    #[error("session not found: {0}")]
    SessionNotFound(Identity),

    /// The identity has never been paired.
    #[error("no stored credentials for {0}, pair the device first")]
    CredentialsNotFound(Identity),

    /// The transport refused to issue a linking code.
    #[error("pairing request failed for {identity}: {source}")]
    PairingRequestFailed {
        identity: Identity,
        #[source]
        source: TransportError,
    },

    /// A pairing attempt is outstanding and has not issued a code yet.
    #[error("pairing already in progress for {0}")]
    PairingInProgress(Identity),

    /// The pairing attempt was torn down before a code could be issued.
    #[error("pairing cancelled for {0}")]
    PairingCancelled(Identity),

    /// A session start is in flight for this identity.
    #[error("session is starting for {0}")]
    SessionStarting(Identity),

    /// Transport failure outside pairing.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Credential store failure.
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

impl RelayError {
    /// Machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::InvalidIdentity(_) => "invalid_identity",
            RelayError::SessionNotFound(_) => "session_not_found",
            RelayError::CredentialsNotFound(_) => "credentials_not_found",
            RelayError::PairingRequestFailed { .. } => "pairing_request_failed",
            RelayError::PairingInProgress(_) => "pairing_in_progress",
            RelayError::PairingCancelled(_) => "pairing_cancelled",
            RelayError::SessionStarting(_) => "session_starting",
            RelayError::Transport(_) => "transport",
            RelayError::Persistence(_) => "persistence",
        }
    }
}

/// Result type for runtime operations.
pub type Result<T> = std::result::Result<T, RelayError>;
