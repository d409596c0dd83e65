//! Phone-number identities and network addresses.
//!
//! An [`Identity`] is the sole key used across the relay. It is always the
//! digits-only form of a phone number, country code included, so every
//! boundary (HTTP paths, query strings, stored directories) must go through
//! [`normalize`] before looking anything up.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Minimum number of digits an identity must have.
pub const MIN_IDENTITY_DIGITS: usize = 10;

/// Suffix of an individual user's network address.
pub const USER_ADDRESS_SUFFIX: &str = "@s.whatsapp.net";

/// Suffix of a group conversation address.
pub const GROUP_ADDRESS_SUFFIX: &str = "@g.us";

/// Errors produced when validating an identity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// No digits at all.
    #[error("phone number is required")]
    Empty,

    /// Too few digits to be a country-code prefixed number.
    #[error("phone number must be at least {min} digits, got {digits}")]
    TooShort { digits: usize, min: usize },
}

/// Strips every non-digit character.
///
/// Idempotent: `normalize(&normalize(s)) == normalize(s)`.
pub fn normalize(input: &str) -> String {
    input.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// A normalized, validated phone-number identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    /// Normalizes `input` and checks it has at least [`MIN_IDENTITY_DIGITS`] digits.
    pub fn parse(input: &str) -> Result<Self, IdentityError> {
        let digits = normalize(input);
        if digits.is_empty() {
            return Err(IdentityError::Empty);
        }
        if digits.len() < MIN_IDENTITY_DIGITS {
            return Err(IdentityError::TooShort {
                digits: digits.len(),
                min: MIN_IDENTITY_DIGITS,
            });
        }
        Ok(Self(digits))
    }

    /// Returns the digits.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The identity's own user address on the network.
    pub fn address(&self) -> String {
        format!("{}{}", self.0, USER_ADDRESS_SUFFIX)
    }

    /// Whether `address` belongs to this identity (any device).
    pub fn owns_address(&self, address: &str) -> bool {
        !is_group_address(address) && address_number(address) == self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Identity {
    type Error = IdentityError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Identity> for String {
    fn from(id: Identity) -> Self {
        id.0
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Builds a user address from a free-form phone number.
pub fn user_address(number: &str) -> String {
    format!("{}{}", normalize(number), USER_ADDRESS_SUFFIX)
}

/// True when `address` names a group conversation.
pub fn is_group_address(address: &str) -> bool {
    address.ends_with(GROUP_ADDRESS_SUFFIX)
}

/// Extracts the phone-number digits from an address.
///
/// Device-qualified addresses (`123:4@s.whatsapp.net`) map to the same number.
pub fn address_number(address: &str) -> String {
    let user = address.split('@').next().unwrap_or(address);
    let user = user.split(':').next().unwrap_or(user);
    normalize(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_non_digits() {
        assert_eq!(normalize("+94 (741) 856-766"), "94741856766");
        assert_eq!(normalize("abc"), "");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_normalize_idempotent() {
        for input in ["+1 555 010 9999", "94741856766", "x1y2z3", "٣٤٥", "  "] {
            let once = normalize(input);
            assert_eq!(normalize(&once), once);
            assert!(once.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_parse_valid() {
        let id = Identity::parse("+94 741-856-766").unwrap();
        assert_eq!(id.as_str(), "94741856766");
        assert_eq!(id.to_string(), "94741856766");
    }

    #[test]
    fn test_parse_too_short() {
        let err = Identity::parse("12345").unwrap_err();
        assert_eq!(err, IdentityError::TooShort { digits: 5, min: 10 });
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(Identity::parse("phone").unwrap_err(), IdentityError::Empty);
    }

    #[test]
    fn test_identity_address() {
        let id = Identity::parse("94741856766").unwrap();
        assert_eq!(id.address(), "94741856766@s.whatsapp.net");
        assert!(id.owns_address("94741856766@s.whatsapp.net"));
        assert!(id.owns_address("94741856766:12@s.whatsapp.net"));
        assert!(!id.owns_address("94700000000@s.whatsapp.net"));
        assert!(!id.owns_address("94741856766@g.us"));
    }

    #[test]
    fn test_user_address() {
        assert_eq!(user_address("+1 555-010-9999"), "15550109999@s.whatsapp.net");
    }

    #[test]
    fn test_group_address() {
        assert!(is_group_address("120363025246125244@g.us"));
        assert!(!is_group_address("15550109999@s.whatsapp.net"));
    }

    #[test]
    fn test_identity_serde() {
        let id = Identity::parse("15550109999").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"15550109999\"");

        let parsed: Identity = serde_json::from_str("\"+1 (555) 010-9999\"").unwrap();
        assert_eq!(parsed, id);

        assert!(serde_json::from_str::<Identity>("\"123\"").is_err());
    }
}
