//! Bot presentation settings.

use std::env;

/// Environment variable for the command prefix.
pub const PREFIX_ENV: &str = "PREFIX";
/// Environment variable for the bot's display name.
pub const BOT_NAME_ENV: &str = "BOT_NAME";
/// Environment variable for the owner's phone number.
pub const OWNER_NUMBER_ENV: &str = "OWNER_NUMBER";
/// Environment variable for the owner's display name.
pub const OWNER_NAME_ENV: &str = "OWNER_NAME";

/// Settings that shape command replies. Only the prefix changes behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotConfig {
    /// Prefix marking a message as a command.
    pub prefix: String,
    /// Name reported by `info`.
    pub bot_name: String,
    /// Number shared by `owner`, digits only.
    pub owner_number: Option<String>,
    /// Display name on the owner's contact card.
    pub owner_name: String,
    /// Version reported by `info`.
    pub version: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            prefix: ".".to_string(),
            bot_name: "PASIYA-MD".to_string(),
            owner_number: None,
            owner_name: "Bot Owner".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl BotConfig {
    /// Creates a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `PREFIX`, `BOT_NAME`, `OWNER_NUMBER` and `OWNER_NAME`, keeping
    /// defaults for anything unset or blank.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let defaults = Self::default();
        Self {
            prefix: get(PREFIX_ENV).unwrap_or(defaults.prefix),
            bot_name: get(BOT_NAME_ENV).unwrap_or(defaults.bot_name),
            owner_number: get(OWNER_NUMBER_ENV)
                .map(|n| relay_models::normalize(&n))
                .filter(|n| !n.is_empty()),
            owner_name: get(OWNER_NAME_ENV).unwrap_or(defaults.owner_name),
            version: defaults.version,
        }
    }

    /// Sets the command prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Sets the bot name.
    pub fn with_bot_name(mut self, name: impl Into<String>) -> Self {
        self.bot_name = name.into();
        self
    }

    /// Sets the owner contact.
    pub fn with_owner(mut self, number: impl AsRef<str>, name: impl Into<String>) -> Self {
        self.owner_number = Some(relay_models::normalize(number.as_ref()));
        self.owner_name = name.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = BotConfig::default();
        assert_eq!(config.prefix, ".");
        assert_eq!(config.bot_name, "PASIYA-MD");
        assert!(config.owner_number.is_none());
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("PREFIX", "!"),
            ("BOT_NAME", "Relay"),
            ("OWNER_NUMBER", "+94 741 856 766"),
            ("OWNER_NAME", "   "),
        ]
        .into_iter()
        .collect();

        let config = BotConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.prefix, "!");
        assert_eq!(config.bot_name, "Relay");
        assert_eq!(config.owner_number.as_deref(), Some("94741856766"));
        assert_eq!(config.owner_name, "Bot Owner");
    }

    #[test]
    fn test_builder() {
        let config = BotConfig::new()
            .with_prefix("#")
            .with_bot_name("Helper")
            .with_owner("1-555-010-0000", "Ops");
        assert_eq!(config.prefix, "#");
        assert_eq!(config.bot_name, "Helper");
        assert_eq!(config.owner_number.as_deref(), Some("15550100000"));
        assert_eq!(config.owner_name, "Ops");
    }
}
