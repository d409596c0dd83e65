//! Inbound and outbound message shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::is_group_address;

/// Content of an inbound message, reduced to the shapes the relay handles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    /// Plain conversation text.
    Text { text: String },
    /// Text with a link preview or a quoted reply attached.
    ExtendedText {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        quoted: Option<String>,
    },
    /// Anything else (media, reactions, stickers...).
    Unsupported { kind: String },
}

impl MessageContent {
    /// Creates plain text content.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Extracts the text body, if this content carries any.
    pub fn body(&self) -> Option<&str> {
        let text = match self {
            Self::Text { text } | Self::ExtendedText { text, .. } => text.as_str(),
            Self::Unsupported { .. } => return None,
        };
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// A message received by one protocol session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Transport-assigned message id.
    pub id: String,
    /// Conversation the message arrived in; replies go back here.
    pub origin: String,
    /// Author address inside a group, when different from `origin`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    /// Set by the transport when the session's own account authored it.
    #[serde(default)]
    pub from_self: bool,
    /// Decoded content, absent for protocol stubs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<MessageContent>,
    /// When the message was sent.
    pub timestamp: DateTime<Utc>,
}

impl InboundMessage {
    /// Creates a direct text message from `origin`.
    pub fn text(id: impl Into<String>, origin: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            origin: origin.into(),
            sender: None,
            from_self: false,
            content: Some(MessageContent::text(text)),
            timestamp: Utc::now(),
        }
    }

    /// The address that authored the message.
    pub fn author(&self) -> &str {
        self.sender.as_deref().unwrap_or(&self.origin)
    }

    /// Whether the message arrived in a group conversation.
    pub fn is_group(&self) -> bool {
        is_group_address(&self.origin)
    }

    /// The text body, if any.
    pub fn body(&self) -> Option<&str> {
        self.content.as_ref().and_then(MessageContent::body)
    }
}

/// Content sent through a protocol session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundContent {
    /// Plain text.
    Text { text: String },
    /// A shared contact card.
    Contact { display_name: String, vcard: String },
}

impl OutboundContent {
    /// Creates text content.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Human-readable rendering, used for logging and tests.
    pub fn preview(&self) -> &str {
        match self {
            Self::Text { text } => text,
            Self::Contact { vcard, .. } => vcard,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_body() {
        assert_eq!(MessageContent::text("hi").body(), Some("hi"));
        let extended = MessageContent::ExtendedText {
            text: ".ping".to_string(),
            quoted: Some("earlier".to_string()),
        };
        assert_eq!(extended.body(), Some(".ping"));
        assert_eq!(
            MessageContent::Unsupported { kind: "imageMessage".to_string() }.body(),
            None
        );
        assert_eq!(MessageContent::text("").body(), None);
    }

    #[test]
    fn test_inbound_author_and_group() {
        let mut msg = InboundMessage::text("m1", "120363@g.us", "hello");
        assert!(msg.is_group());
        assert_eq!(msg.author(), "120363@g.us");

        msg.sender = Some("15550109999@s.whatsapp.net".to_string());
        assert_eq!(msg.author(), "15550109999@s.whatsapp.net");
    }

    #[test]
    fn test_inbound_without_content() {
        let mut msg = InboundMessage::text("m1", "15550109999@s.whatsapp.net", "x");
        msg.content = None;
        assert_eq!(msg.body(), None);
    }

    #[test]
    fn test_outbound_serialization() {
        let json = serde_json::to_value(OutboundContent::text("pong")).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["text"], "pong");
    }
}
