//! Application state shared across handlers.

use std::sync::Arc;

use relay_runtime::SessionManager;

use crate::config::ApiConfig;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// API configuration.
    pub config: Arc<ApiConfig>,
    /// Owner of every session, pairing attempt and pending restart.
    pub manager: SessionManager,
}

impl AppState {
    /// Creates the state.
    pub fn new(config: ApiConfig, manager: SessionManager) -> Self {
        Self {
            config: Arc::new(config),
            manager,
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;
    use std::time::Duration;

    use relay_models::{CredentialBlob, Identity};
    use relay_persistence::{CredentialStore, FileCredentialStore};
    use relay_runtime::mock::{MockClient, RecordingHandler};
    use relay_runtime::{RuntimeConfig, SessionManager};
    use serde_json::json;
    use tempfile::tempdir;

    use super::AppState;
    use crate::config::ApiConfig;

    pub struct TestContext {
        pub state: AppState,
        pub client: Arc<MockClient>,
        pub store: Arc<FileCredentialStore>,
    }

    impl TestContext {
        /// Stores registered credentials for `phone`.
        pub fn seed(&self, phone: &str) -> Identity {
            let identity = Identity::parse(phone).unwrap();
            self.store.ensure_location(&identity).unwrap();
            self.store
                .persist(
                    &identity,
                    &CredentialBlob::new(json!({ "registered": true, "me": phone })),
                )
                .unwrap();
            identity
        }
    }

    pub fn make_test_state() -> TestContext {
        let dir = tempdir().unwrap();
        let path = dir.path().to_path_buf();
        std::mem::forget(dir);

        let client = Arc::new(MockClient::new());
        let store = Arc::new(FileCredentialStore::new(&path));
        let config = RuntimeConfig::default().with_settle_delay(Duration::ZERO);
        let manager = SessionManager::new(
            config,
            client.clone(),
            store.clone(),
            Arc::new(RecordingHandler::new()),
        );

        TestContext {
            state: AppState::new(ApiConfig::default(), manager),
            client,
            store,
        }
    }

    /// Polls `check` until it holds or a second has passed.
    pub async fn wait_until<F, Fut>(mut check: F) -> bool
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        for _ in 0..100 {
            if check().await {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }
}
