//! Request DTOs for the API.

use serde::Deserialize;

/// Send a text through a session.
#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageRequest {
    /// Phone number or full address of the recipient.
    pub to: String,
    /// Message text.
    pub message: String,
}

/// `GET /pair/code` query.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PairCodeQuery {
    /// Number to pair, any formatting.
    pub phone: Option<String>,
}
