//! Prefix command bot for relay sessions.
//!
//! The [`CommandDispatcher`] receives every inbound message from every
//! session, filters out echoes and non-commands, and answers each command with
//! exactly one message back to the conversation it came from.
//!
//! # Environment Variables
//!
//! All optional:
//! - `PREFIX`: command prefix (default: `.`)
//! - `BOT_NAME`: name shown by `info` (default: `PASIYA-MD`)
//! - `OWNER_NUMBER`: number shared by `owner`
//! - `OWNER_NAME`: display name on the owner's contact card (default: `Bot Owner`)

pub mod commands;
pub mod config;
pub mod dispatcher;
pub mod error;

pub use commands::{CommandContext, CommandSpec, COMMANDS};
pub use config::BotConfig;
pub use dispatcher::{CommandDispatcher, DispatchOutcome, IgnoreReason};
pub use error::{DispatchError, Result};
