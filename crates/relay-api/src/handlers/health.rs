//! Health check and index handlers.

use axum::{extract::State, Json};

use crate::state::AppState;
use crate::types::{EndpointInfo, HealthResponse, IndexResponse};

const ENDPOINTS: &[(&str, &str, &str)] = &[
    ("GET", "/pair/code?phone=", "Request a linking code"),
    ("GET", "/pair/status/:id", "Pairing status"),
    ("GET", "/pair/connections", "Live sessions and pairing attempts"),
    ("DELETE", "/pair/:id", "Log out and delete credentials"),
    ("GET", "/sessions", "List running sessions"),
    ("POST", "/sessions/:id/start", "Start a paired session"),
    ("POST", "/sessions/:id/stop", "Stop a session"),
    ("POST", "/sessions/:id/send", "Send a text message"),
    ("GET", "/sessions/:id/status", "Session status"),
    ("GET", "/health", "Health check"),
];

/// GET /health - Health check endpoint.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.config.uptime_seconds(),
        active_sessions: state.manager.registry().len().await,
    })
}

/// GET / - Endpoint index.
pub async fn index() -> Json<IndexResponse> {
    Json(IndexResponse {
        name: "relay".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoints: ENDPOINTS
            .iter()
            .map(|&(method, path, description)| EndpointInfo {
                method,
                path,
                description,
            })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::make_test_state;

    #[tokio::test]
    async fn test_health_handler() {
        let ctx = make_test_state();
        let response = health(State(ctx.state)).await;

        assert_eq!(response.status, "ok");
        assert!(!response.version.is_empty());
        assert_eq!(response.active_sessions, 0);
    }

    #[tokio::test]
    async fn test_index_lists_pairing() {
        let response = index().await;
        assert!(response.endpoints.iter().any(|e| e.path == "/pair/code?phone="));
    }
}
