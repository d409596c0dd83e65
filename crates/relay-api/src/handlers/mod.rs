//! API request handlers.

pub mod health;
pub mod pairing;
pub mod sessions;

pub use health::*;
pub use pairing::*;
pub use sessions::*;

use relay_models::Identity;
use relay_runtime::RelayError;

use crate::error::Result;

/// Normalizes a path segment into an identity.
pub(crate) fn parse_identity(raw: &str) -> Result<Identity> {
    Ok(Identity::parse(raw).map_err(RelayError::from)?)
}
