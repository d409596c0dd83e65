//! Error types for the command bot.

use relay_runtime::TransportError;
use thiserror::Error;

/// Errors raised while answering a command.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The reply could not be sent.
    #[error("Failed to send reply to {recipient}: {source}")]
    ReplyFailed {
        recipient: String,
        #[source]
        source: TransportError,
    },
}

/// Result type for dispatch operations.
pub type Result<T> = std::result::Result<T, DispatchError>;
