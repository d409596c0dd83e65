//! Registry of live sessions keyed by identity.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use relay_models::{ConnectionState, Identity};
use tokio::sync::RwLock;

use crate::transport::ProtocolSession;

/// A live session owned by the registry.
#[derive(Clone)]
pub struct SessionRecord {
    /// Owning identity.
    pub identity: Identity,
    /// Handle for outbound operations.
    pub handle: Arc<dyn ProtocolSession>,
    /// Last known connection state.
    pub state: ConnectionState,
    /// Connection generation that produced this record.
    pub connection_id: u64,
    /// When the record was inserted.
    pub connected_at: DateTime<Utc>,
}

impl fmt::Debug for SessionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRecord")
            .field("identity", &self.identity)
            .field("state", &self.state)
            .field("connection_id", &self.connection_id)
            .field("connected_at", &self.connected_at)
            .finish()
    }
}

impl SessionRecord {
    /// Creates a record in the given state.
    pub fn new(
        identity: Identity,
        handle: Arc<dyn ProtocolSession>,
        state: ConnectionState,
        connection_id: u64,
    ) -> Self {
        Self {
            identity,
            handle,
            state,
            connection_id,
            connected_at: Utc::now(),
        }
    }
}

/// At most one live session per identity.
///
/// Cheap to clone; clones share the same map. Records may be `Connecting`
/// while the transport negotiates; they are removed as soon as their
/// connection closes.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<Identity, SessionRecord>>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a session is registered for `identity`.
    pub async fn has(&self, identity: &Identity) -> bool {
        self.sessions.read().await.contains_key(identity)
    }

    /// The session handle for `identity`.
    pub async fn get(&self, identity: &Identity) -> Option<Arc<dyn ProtocolSession>> {
        self.sessions
            .read()
            .await
            .get(identity)
            .map(|r| Arc::clone(&r.handle))
    }

    /// A copy of the full record for `identity`.
    pub async fn record(&self, identity: &Identity) -> Option<SessionRecord> {
        self.sessions.read().await.get(identity).cloned()
    }

    /// Inserts or replaces the record for its identity, returning the previous one.
    pub async fn put(&self, record: SessionRecord) -> Option<SessionRecord> {
        self.sessions
            .write()
            .await
            .insert(record.identity.clone(), record)
    }

    /// Removes the record for `identity`. No-op when absent.
    pub async fn remove(&self, identity: &Identity) -> Option<SessionRecord> {
        self.sessions.write().await.remove(identity)
    }

    /// Removes the record only if it came from `connection_id`.
    pub async fn remove_if(&self, identity: &Identity, connection_id: u64) -> Option<SessionRecord> {
        let mut sessions = self.sessions.write().await;
        match sessions.get(identity) {
            Some(r) if r.connection_id == connection_id => sessions.remove(identity),
            _ => None,
        }
    }

    /// Updates the state of the record from `connection_id`. Returns false if stale.
    pub async fn set_state(
        &self,
        identity: &Identity,
        connection_id: u64,
        state: ConnectionState,
    ) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(identity) {
            Some(r) if r.connection_id == connection_id => {
                r.state = state;
                true
            }
            _ => false,
        }
    }

    /// Every registered identity, sorted.
    pub async fn list(&self) -> Vec<Identity> {
        let mut ids: Vec<Identity> = self.sessions.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Copies of every record, sorted by identity.
    pub async fn snapshot(&self) -> Vec<SessionRecord> {
        let mut records: Vec<SessionRecord> =
            self.sessions.read().await.values().cloned().collect();
        records.sort_by(|a, b| a.identity.cmp(&b.identity));
        records
    }

    /// Number of registered sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether the registry is empty.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Removes and returns every record.
    pub async fn drain(&self) -> Vec<SessionRecord> {
        self.sessions
            .write()
            .await
            .drain()
            .map(|(_, r)| r)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSession;

    fn record(id: &str, connection_id: u64) -> SessionRecord {
        let identity = Identity::parse(id).unwrap();
        let handle = Arc::new(MockSession::new(identity.clone()));
        SessionRecord::new(identity, handle, ConnectionState::Connecting, connection_id)
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let registry = SessionRegistry::new();
        let id = Identity::parse("15550109999").unwrap();

        assert!(!registry.has(&id).await);
        assert!(registry.put(record("15550109999", 1)).await.is_none());
        assert!(registry.has(&id).await);
        assert!(registry.get(&id).await.is_some());
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_remove_absent_is_noop() {
        let registry = SessionRegistry::new();
        let id = Identity::parse("15550109999").unwrap();

        assert!(registry.remove(&id).await.is_none());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_remove_if_ignores_stale_connection() {
        let registry = SessionRegistry::new();
        let id = Identity::parse("15550109999").unwrap();
        registry.put(record("15550109999", 2)).await;

        assert!(registry.remove_if(&id, 1).await.is_none());
        assert!(registry.has(&id).await);
        assert!(registry.remove_if(&id, 2).await.is_some());
        assert!(!registry.has(&id).await);
    }

    #[tokio::test]
    async fn test_set_state() {
        let registry = SessionRegistry::new();
        let id = Identity::parse("15550109999").unwrap();
        registry.put(record("15550109999", 7)).await;

        assert!(!registry.set_state(&id, 6, ConnectionState::Open).await);
        assert!(registry.set_state(&id, 7, ConnectionState::Open).await);
        assert_eq!(
            registry.record(&id).await.map(|r| r.state),
            Some(ConnectionState::Open)
        );
    }

    #[tokio::test]
    async fn test_list_sorted() {
        let registry = SessionRegistry::new();
        registry.put(record("15550109999", 1)).await;
        registry.put(record("15550100000", 2)).await;

        let ids = registry.list().await;
        assert_eq!(ids[0].as_str(), "15550100000");
        assert_eq!(ids[1].as_str(), "15550109999");

        assert_eq!(registry.drain().await.len(), 2);
        assert!(registry.is_empty().await);
    }
}
