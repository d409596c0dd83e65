//! Inbound message dispatch.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use relay_models::{Identity, InboundMessage};
use relay_runtime::{HandlerError, MessageHandler, ProtocolSession};
use tracing::{debug, info, warn};

use crate::commands::{self, CommandContext};
use crate::config::BotConfig;
use crate::error::{DispatchError, Result};

/// Why a message produced no reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Authored by the session's own account.
    OwnMessage,
    /// No text body (media, stubs, empty text).
    NoText,
    /// Text without the command prefix.
    NotACommand,
    /// Just the prefix.
    EmptyCommand,
}

/// What the dispatcher did with a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Nothing was sent.
    Ignored(IgnoreReason),
    /// Exactly one reply went back to the message's origin.
    Replied {
        /// Case-folded command name as typed.
        command: String,
        /// Whether the name matched the command table.
        known: bool,
    },
}

/// Answers prefix commands on every session.
#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    config: BotConfig,
    started: Instant,
}

impl CommandDispatcher {
    /// Creates a dispatcher; uptime counts from now.
    pub fn new(config: BotConfig) -> Self {
        Self {
            config,
            started: Instant::now(),
        }
    }

    /// The bot settings.
    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    /// Time since the dispatcher was created.
    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    /// Splits `text` into a case-folded command name and its arguments.
    ///
    /// Returns `None` when `text` does not start with the prefix.
    pub fn parse<'a>(&self, text: &'a str) -> Option<(String, Vec<&'a str>)> {
        let rest = text.strip_prefix(self.config.prefix.as_str())?;
        let mut tokens = rest.split_whitespace();
        let name = tokens.next().unwrap_or_default().to_lowercase();
        Some((name, tokens.collect()))
    }

    /// Handles one inbound message for `identity`, sending at most one reply.
    pub async fn dispatch(
        &self,
        identity: &Identity,
        session: &dyn ProtocolSession,
        message: &InboundMessage,
    ) -> Result<DispatchOutcome> {
        if message.from_self || identity.owns_address(message.author()) {
            return Ok(DispatchOutcome::Ignored(IgnoreReason::OwnMessage));
        }
        let Some(text) = message.body() else {
            return Ok(DispatchOutcome::Ignored(IgnoreReason::NoText));
        };
        let Some((name, args)) = self.parse(text) else {
            return Ok(DispatchOutcome::Ignored(IgnoreReason::NotACommand));
        };
        if name.is_empty() {
            return Ok(DispatchOutcome::Ignored(IgnoreReason::EmptyCommand));
        }

        debug!(identity = %identity, from = %message.origin, command = %name, "Command received");

        let entry = commands::find(&name);
        let reply = match entry {
            Some(entry) => {
                let ctx = CommandContext {
                    config: &self.config,
                    identity,
                    uptime: self.uptime(),
                    args: &args,
                };
                (entry.handler)(&ctx)
            }
            None => commands::unknown_command(&name, &self.config.prefix),
        };

        session
            .send(&message.origin, reply)
            .await
            .map_err(|source| DispatchError::ReplyFailed {
                recipient: message.origin.clone(),
                source,
            })?;

        info!(identity = %identity, command = %name, known = entry.is_some(), "Replied to command");
        Ok(DispatchOutcome::Replied {
            command: name,
            known: entry.is_some(),
        })
    }
}

#[async_trait]
impl MessageHandler for CommandDispatcher {
    async fn on_inbound_message(
        &self,
        identity: &Identity,
        session: Arc<dyn ProtocolSession>,
        message: InboundMessage,
    ) -> std::result::Result<(), HandlerError> {
        // Reply failures stop here; the session's event consumer keeps going
        if let Err(e) = self.dispatch(identity, session.as_ref(), &message).await {
            warn!(identity = %identity, message_id = %message.id, error = %e, "Command dispatch failed");
        }
        Ok(())
    }
}
