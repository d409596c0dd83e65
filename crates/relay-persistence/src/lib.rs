//! Credential persistence for the messaging relay.
//!
//! Each identity owns one directory under a sessions root. Credential
//! material is written with atomic file operations (write to temp file, then
//! rename) so a crash mid-handshake never leaves a torn file behind.
//!
//! # Example
//!
//! ```no_run
//! use relay_models::{CredentialBlob, Identity};
//! use relay_persistence::{CredentialStore, FileCredentialStore};
//! use serde_json::json;
//!
//! let store = FileCredentialStore::new("/var/lib/relay/sessions");
//! let identity = Identity::parse("94741856766").unwrap();
//!
//! store.persist(&identity, &CredentialBlob::new(json!({"registered": false}))).unwrap();
//! let loaded = store.load(&identity).unwrap();
//! ```

pub mod atomic;
pub mod credential_store;
pub mod error;

pub use credential_store::{CredentialStore, FileCredentialStore, CREDENTIALS_FILE};
pub use error::{PersistenceError, Result};
