//! Command table.
//!
//! Each command is a pure function from its context to the single reply it
//! sends. Help and menu text are generated from the table itself.

use std::fmt;
use std::time::Duration;

use relay_models::{Identity, OutboundContent};

use crate::config::BotConfig;

/// Everything a command may look at.
#[derive(Debug, Clone, Copy)]
pub struct CommandContext<'a> {
    /// Bot settings.
    pub config: &'a BotConfig,
    /// The session the command arrived on.
    pub identity: &'a Identity,
    /// Process uptime.
    pub uptime: Duration,
    /// Tokens after the command name. Unused by the built-in commands.
    pub args: &'a [&'a str],
}

/// Produces a command's reply.
pub type CommandFn = fn(&CommandContext<'_>) -> OutboundContent;

/// One entry of the command table.
#[derive(Clone, Copy)]
pub struct CommandSpec {
    /// Primary name.
    pub name: &'static str,
    /// Alternative names.
    pub aliases: &'static [&'static str],
    /// One-line description shown in help.
    pub description: &'static str,
    /// Reply builder.
    pub handler: CommandFn,
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .finish()
    }
}

impl CommandSpec {
    /// Whether `name` (already case-folded) selects this command.
    pub fn matches(&self, name: &str) -> bool {
        self.name == name || self.aliases.iter().any(|alias| *alias == name)
    }
}

/// Built-in commands.
pub static COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "ping",
        aliases: &[],
        description: "Check if the bot is active",
        handler: ping,
    },
    CommandSpec {
        name: "help",
        aliases: &[],
        description: "Show this help",
        handler: help,
    },
    CommandSpec {
        name: "info",
        aliases: &["alive"],
        description: "Bot information",
        handler: info,
    },
    CommandSpec {
        name: "menu",
        aliases: &[],
        description: "Show all commands",
        handler: menu,
    },
    CommandSpec {
        name: "runtime",
        aliases: &["uptime"],
        description: "Check uptime",
        handler: runtime,
    },
    CommandSpec {
        name: "owner",
        aliases: &[],
        description: "Get the owner's contact",
        handler: owner,
    },
];

/// Looks up a command by name or alias.
pub fn find(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|c| c.matches(name))
}

/// Reply for a name that matches nothing.
pub fn unknown_command(name: &str, prefix: &str) -> OutboundContent {
    OutboundContent::text(format!(
        "❌ Unknown command: *{}*\n\nType {}help for available commands.",
        name, prefix
    ))
}

fn ping(_ctx: &CommandContext<'_>) -> OutboundContent {
    OutboundContent::text("🏓 Pong! Bot is active and running.")
}

fn help(ctx: &CommandContext<'_>) -> OutboundContent {
    let prefix = &ctx.config.prefix;
    let mut text = String::from("*📚 Available Commands*\n");
    for command in COMMANDS {
        text.push_str(&format!("\n• {}{}", prefix, command.name));
        for alias in command.aliases {
            text.push_str(&format!(" / {}{}", prefix, alias));
        }
        text.push_str(&format!(" - {}", command.description));
    }
    OutboundContent::text(text)
}

fn info(ctx: &CommandContext<'_>) -> OutboundContent {
    OutboundContent::text(format!(
        "*🤖 Bot Information*\n\n\
         • *Name:* {}\n\
         • *Version:* {}\n\
         • *Prefix:* {}\n\
         • *Phone:* {}\n\
         • *Status:* Active ✅\n\
         • *Uptime:* {}",
        ctx.config.bot_name,
        ctx.config.version,
        ctx.config.prefix,
        ctx.identity,
        format_clock(ctx.uptime)
    ))
}

fn menu(ctx: &CommandContext<'_>) -> OutboundContent {
    let prefix = &ctx.config.prefix;
    let mut text = String::from("╭━━━『 *MENU* 』━━━┈⊷\n│\n│ *Bot Commands:*\n");
    for command in COMMANDS {
        text.push_str(&format!("│ • {}{}\n", prefix, command.name));
        for alias in command.aliases {
            text.push_str(&format!("│ • {}{}\n", prefix, alias));
        }
    }
    text.push_str("│\n╰━━━━━━━━━━━━━━━┈⊷\n\n");
    text.push_str(&format!("_Type {}help for more info_", prefix));
    OutboundContent::text(text)
}

fn runtime(ctx: &CommandContext<'_>) -> OutboundContent {
    OutboundContent::text(format!("⏰ *Bot Runtime*\n\n{}", format_runtime(ctx.uptime)))
}

fn owner(ctx: &CommandContext<'_>) -> OutboundContent {
    let Some(number) = ctx.config.owner_number.as_deref() else {
        return OutboundContent::text("Owner contact is not configured.");
    };
    let vcard = format!(
        "BEGIN:VCARD\n\
         VERSION:3.0\n\
         FN:{name}\n\
         ORG:{org};\n\
         TEL;type=CELL;type=VOICE;waid={number}:+{number}\n\
         END:VCARD",
        name = ctx.config.owner_name,
        org = ctx.config.bot_name,
        number = number,
    );
    OutboundContent::Contact {
        display_name: ctx.config.owner_name.clone(),
        vcard,
    }
}

/// `1h 2m 3s`.
fn format_clock(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// `2 days, 3 hours, 4 minutes, 5 seconds`, omitting leading zero units.
fn format_runtime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    let units = [
        (secs / 86_400, "days"),
        ((secs % 86_400) / 3600, "hours"),
        ((secs % 3600) / 60, "minutes"),
    ];

    let mut text = String::new();
    for (value, unit) in units {
        if value > 0 {
            text.push_str(&format!("{} {}, ", value, unit));
        }
    }
    text.push_str(&format!("{} seconds", secs % 60));
    text
}
