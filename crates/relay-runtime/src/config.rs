//! Runtime configuration.

use std::time::Duration;

use crate::retry::RetryPolicy;

/// Configuration for the session lifecycle runtime.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// How long a fresh connection settles before a linking code is requested.
    pub settle_delay: Duration,
    /// Validity advertised alongside a linking code. Not enforced locally.
    pub code_validity: Duration,
    /// Reconnect policy for non-logout closures.
    pub retry_policy: RetryPolicy,
    /// Send a confirmation message to the account after pairing completes.
    pub confirm_pairing: bool,
    /// Name shown in the pairing confirmation message.
    pub display_name: String,
    /// Capacity of the lifecycle event broadcast channel.
    pub event_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(3),
            code_validity: Duration::from_secs(60),
            retry_policy: RetryPolicy::default(),
            confirm_pairing: true,
            display_name: "relay".to_string(),
            event_capacity: 256,
        }
    }
}

impl RuntimeConfig {
    /// Creates a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the pairing settle delay.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Sets the advertised linking code validity.
    pub fn with_code_validity(mut self, validity: Duration) -> Self {
        self.code_validity = validity;
        self
    }

    /// Sets the reconnect policy.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Enables or disables the post-pairing confirmation message.
    pub fn with_confirm_pairing(mut self, confirm: bool) -> Self {
        self.confirm_pairing = confirm;
        self
    }

    /// Sets the name shown in the pairing confirmation message.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RuntimeConfig::default();

        assert_eq!(config.settle_delay, Duration::from_secs(3));
        assert_eq!(config.code_validity, Duration::from_secs(60));
        assert_eq!(config.retry_policy, RetryPolicy::default());
        assert!(config.confirm_pairing);
    }

    #[test]
    fn test_config_builder() {
        let config = RuntimeConfig::new()
            .with_settle_delay(Duration::from_millis(100))
            .with_code_validity(Duration::from_secs(30))
            .with_retry_policy(RetryPolicy::fixed(Duration::from_secs(1)))
            .with_confirm_pairing(false)
            .with_display_name("PASIYA-MD");

        assert_eq!(config.settle_delay, Duration::from_millis(100));
        assert_eq!(config.code_validity, Duration::from_secs(30));
        assert_eq!(config.retry_policy.delay_for(1), Some(Duration::from_secs(1)));
        assert!(!config.confirm_pairing);
        assert_eq!(config.display_name, "PASIYA-MD");
    }
}
