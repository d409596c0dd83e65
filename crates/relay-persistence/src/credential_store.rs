//! Per-identity credential storage.

use std::fs;
use std::path::{Path, PathBuf};

use relay_models::{CredentialBlob, Identity};
use tracing::{debug, warn};

use crate::atomic::{read_json_optional, write_json_atomic};
use crate::error::{PersistenceError, Result};

/// File holding the credential blob inside an identity's directory.
pub const CREDENTIALS_FILE: &str = "creds.json";

/// Loads and saves authentication state keyed by identity.
pub trait CredentialStore: Send + Sync {
    /// Creates the storage location for `identity` if missing. Idempotent.
    fn ensure_location(&self, identity: &Identity) -> Result<()>;

    /// Loads stored credentials, `None` when the identity never persisted any.
    fn load(&self, identity: &Identity) -> Result<Option<CredentialBlob>>;

    /// Replaces the stored credentials.
    fn persist(&self, identity: &Identity, blob: &CredentialBlob) -> Result<()>;

    /// Whether a storage location exists for `identity`, with or without credentials.
    fn exists(&self, identity: &Identity) -> bool;

    /// Deletes the storage location and everything in it.
    fn remove(&self, identity: &Identity) -> Result<()>;

    /// Lists every identity with a storage location.
    fn list(&self) -> Result<Vec<Identity>>;
}

/// Stores credentials as `<root>/<identity>/creds.json`.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    root: PathBuf,
}

impl FileCredentialStore {
    /// Creates a store rooted at `root`. Nothing is touched on disk yet.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// The sessions root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory owned by `identity`.
    pub fn location(&self, identity: &Identity) -> PathBuf {
        self.root.join(identity.as_str())
    }

    fn credentials_path(&self, identity: &Identity) -> PathBuf {
        self.location(identity).join(CREDENTIALS_FILE)
    }
}

impl CredentialStore for FileCredentialStore {
    fn ensure_location(&self, identity: &Identity) -> Result<()> {
        let path = self.location(identity);
        fs::create_dir_all(&path).map_err(|source| PersistenceError::DirectoryError { path, source })
    }

    fn load(&self, identity: &Identity) -> Result<Option<CredentialBlob>> {
        read_json_optional(&self.credentials_path(identity))
    }

    fn persist(&self, identity: &Identity, blob: &CredentialBlob) -> Result<()> {
        let path = self.credentials_path(identity);
        write_json_atomic(&path, blob)?;
        debug!(identity = %identity, registered = blob.is_registered(), "Persisted credentials");
        Ok(())
    }

    fn exists(&self, identity: &Identity) -> bool {
        self.location(identity).is_dir()
    }

    fn remove(&self, identity: &Identity) -> Result<()> {
        let path = self.location(identity);
        match fs::remove_dir_all(&path) {
            Ok(()) => {
                debug!(identity = %identity, "Removed credential location");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(PersistenceError::RemoveError { path, source }),
        }
    }

    fn list(&self) -> Result<Vec<Identity>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(PersistenceError::ReadError {
                    path: self.root.clone(),
                    source,
                })
            }
        };

        let mut identities = Vec::new();
        for entry in entries.flatten() {
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name();
            let name = name.to_string_lossy();
            match Identity::parse(&name) {
                // Only directories already in normalized form belong to us
                Ok(identity) if identity.as_str() == name => identities.push(identity),
                _ => warn!(dir = %name, "Skipping unrecognized entry in sessions root"),
            }
        }
        identities.sort();
        Ok(identities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn identity(s: &str) -> Identity {
        Identity::parse(s).unwrap()
    }

    #[test]
    fn test_load_absent() {
        let dir = tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());

        assert!(store.load(&identity("15550109999")).unwrap().is_none());
        assert!(!store.exists(&identity("15550109999")));
    }

    #[test]
    fn test_ensure_location_idempotent() {
        let dir = tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());
        let id = identity("15550109999");

        store.ensure_location(&id).unwrap();
        store.ensure_location(&id).unwrap();

        assert!(store.exists(&id));
        // A location without credentials still loads as absent
        assert!(store.load(&id).unwrap().is_none());
    }

    #[test]
    fn test_persist_and_load() {
        let dir = tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());
        let id = identity("15550109999");
        let blob = CredentialBlob::new(json!({"registered": true, "me": {"id": "x"}}));

        store.persist(&id, &blob).unwrap();

        let loaded = store.load(&id).unwrap().unwrap();
        assert_eq!(loaded, blob);
        assert!(loaded.is_registered());
        assert!(dir.path().join("15550109999").join(CREDENTIALS_FILE).exists());
    }

    #[test]
    fn test_remove() {
        let dir = tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());
        let id = identity("15550109999");

        store.persist(&id, &CredentialBlob::new(json!({}))).unwrap();
        store.remove(&id).unwrap();

        assert!(!store.exists(&id));
        // Removing again is not an error
        store.remove(&id).unwrap();
    }

    #[test]
    fn test_list() {
        let dir = tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());

        store.ensure_location(&identity("94741856766")).unwrap();
        store.ensure_location(&identity("15550109999")).unwrap();
        fs::create_dir_all(dir.path().join("temp")).unwrap();
        fs::write(dir.path().join("README"), "x").unwrap();

        let listed = store.list().unwrap();
        assert_eq!(listed, vec![identity("15550109999"), identity("94741856766")]);
    }

    #[test]
    fn test_list_missing_root() {
        let dir = tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("does-not-exist"));
        assert!(store.list().unwrap().is_empty());
    }
}
