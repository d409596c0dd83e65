//! Inbound message handling seam.

use std::sync::Arc;

use async_trait::async_trait;
use relay_models::{Identity, InboundMessage};

use crate::transport::ProtocolSession;

/// Error type handlers may return; it is logged, never propagated.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Receives inbound messages from every session.
///
/// Called from the owning session's event consumer, one message at a time and
/// in transport order. A slow handler delays only that identity's events.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handles one inbound message for the session owned by `identity`.
    async fn on_inbound_message(
        &self,
        identity: &Identity,
        session: Arc<dyn ProtocolSession>,
        message: InboundMessage,
    ) -> Result<(), HandlerError>;
}
