//! Router configuration and server setup.

use std::future::Future;

use axum::{
    http::HeaderValue,
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ApiConfig;
use crate::handlers;
use crate::state::AppState;

fn cors_layer(config: &ApiConfig) -> CorsLayer {
    let origin = if config.allows_any_origin() {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Creates the API router with all routes configured.
pub fn create_router(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config));

    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        // Sessions
        .route("/sessions", get(handlers::list_sessions))
        .route("/sessions/:id/start", post(handlers::start_session))
        .route("/sessions/:id/stop", post(handlers::stop_session))
        .route("/sessions/:id/send", post(handlers::send_message))
        .route("/sessions/:id/status", get(handlers::session_status))
        // Pairing
        .route("/pair/code", get(handlers::pair_code))
        .route("/pair/connections", get(handlers::pair_connections))
        .route("/pair/status/:id", get(handlers::pair_status))
        .route("/pair/:id", delete(handlers::unpair))
        .layer(middleware)
        .with_state(state)
}

/// Serves the API until `shutdown` resolves.
pub async fn serve<F>(state: AppState, shutdown: F) -> Result<(), std::io::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = state.config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "API server listening");
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::{make_test_state, wait_until};
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use relay_models::{Identity, SessionEvent};
    use relay_runtime::mock::MOCK_PAIRING_CODE;
    use serde_json::{json, Value};

    const PHONE: &str = "15550109999";

    #[tokio::test]
    async fn test_health_endpoint() {
        let ctx = make_test_state();
        let server = TestServer::new(create_router(ctx.state)).unwrap();

        let response = server.get("/health").await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["activeSessions"], 0);
        assert!(!body["version"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_index_endpoint() {
        let ctx = make_test_state();
        let server = TestServer::new(create_router(ctx.state)).unwrap();

        let body: Value = server.get("/").await.json();
        assert_eq!(body["name"], "relay");
        assert!(!body["endpoints"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_start_without_credentials_is_not_found() {
        let ctx = make_test_state();
        let server = TestServer::new(create_router(ctx.state.clone())).unwrap();

        let response = server.post(&format!("/sessions/{}/start", PHONE)).await;
        response.assert_status(StatusCode::NOT_FOUND);

        let body: Value = response.json();
        assert_eq!(body["kind"], "credentials_not_found");

        let list: Value = server.get("/sessions").await.json();
        assert_eq!(list["total"], 0);
    }

    #[tokio::test]
    async fn test_invalid_identity_is_bad_request() {
        let ctx = make_test_state();
        let server = TestServer::new(create_router(ctx.state)).unwrap();

        let response = server.post("/sessions/12345/start").await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let body: Value = response.json();
        assert_eq!(body["kind"], "invalid_identity");
        assert_eq!(ctx.client.connect_count(), 0);
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let ctx = make_test_state();
        let identity = ctx.seed(PHONE);
        let server = TestServer::new(create_router(ctx.state.clone())).unwrap();

        let response = server.post(&format!("/sessions/{}/start", PHONE)).await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["success"], true);
        assert_eq!(body["identity"], PHONE);

        ctx.client
            .emit(&identity, SessionEvent::ConnectionOpened)
            .await;
        let manager = ctx.state.manager.clone();
        let id = identity.clone();
        assert!(
            wait_until(|| {
                let manager = manager.clone();
                let id = id.clone();
                async move { manager.session_status(&id).await.as_str() == "active" }
            })
            .await
        );

        let status: Value = server
            .get(&format!("/sessions/{}/status", PHONE))
            .await
            .json();
        assert_eq!(status["running"], true);
        assert_eq!(status["status"], "active");

        let list: Value = server.get("/sessions").await.json();
        assert_eq!(list["total"], 1);
        assert_eq!(list["sessions"][0]["identity"], PHONE);

        let response = server.post(&format!("/sessions/{}/stop", PHONE)).await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["message"], "session stopped");

        let status: Value = server
            .get(&format!("/sessions/{}/status", PHONE))
            .await
            .json();
        assert_eq!(status["running"], false);

        server
            .post(&format!("/sessions/{}/stop", PHONE))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_send_message() {
        let ctx = make_test_state();
        let identity = ctx.seed(PHONE);
        let server = TestServer::new(create_router(ctx.state.clone())).unwrap();

        server
            .post(&format!("/sessions/{}/send", PHONE))
            .json(&json!({ "to": "15550100000", "message": "hi" }))
            .await
            .assert_status(StatusCode::NOT_FOUND);

        server
            .post(&format!("/sessions/{}/start", PHONE))
            .await
            .assert_status_ok();

        let response = server
            .post(&format!("/sessions/{}/send", PHONE))
            .json(&json!({ "to": "+1 555 010 0000", "message": "hi" }))
            .await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert_eq!(body["to"], "15550100000@s.whatsapp.net");

        let sent = ctx.client.latest(&identity).unwrap().session.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "15550100000@s.whatsapp.net");
    }

    #[tokio::test]
    async fn test_pair_code_flow() {
        let ctx = make_test_state();
        let server = TestServer::new(create_router(ctx.state.clone())).unwrap();

        server.get("/pair/code").await.assert_status(StatusCode::BAD_REQUEST);

        let response = server
            .get("/pair/code")
            .add_query_param("phone", "+1 (555) 010-9999")
            .await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert_eq!(body["success"], true);
        assert_eq!(body["identity"], PHONE);
        assert_eq!(body["code"], MOCK_PAIRING_CODE);
        assert_eq!(body["expiresInSeconds"], 60);

        // Repeated request returns the outstanding code on the same connection
        let again: Value = server
            .get("/pair/code")
            .add_query_param("phone", PHONE)
            .await
            .json();
        assert_eq!(again["code"], MOCK_PAIRING_CODE);
        assert_eq!(ctx.client.connect_count(), 1);

        let status: Value = server.get(&format!("/pair/status/{}", PHONE)).await.json();
        assert_eq!(status["active"], false);
        assert_eq!(status["pairing"], true);
        assert_eq!(status["credentialsExist"], true);
        assert_eq!(status["status"], "disconnected");
    }

    #[tokio::test]
    async fn test_pair_code_already_registered() {
        let ctx = make_test_state();
        ctx.seed(PHONE);
        let server = TestServer::new(create_router(ctx.state.clone())).unwrap();

        let body: Value = server
            .get("/pair/code")
            .add_query_param("phone", PHONE)
            .await
            .json();
        assert_eq!(body["message"], "Device already registered");
        assert!(body.get("code").is_none());

        let identity = Identity::parse(PHONE).unwrap();
        assert!(ctx.state.manager.registry().has(&identity).await);
    }

    #[tokio::test]
    async fn test_pair_status_not_initialized() {
        let ctx = make_test_state();
        let server = TestServer::new(create_router(ctx.state)).unwrap();

        let body: Value = server.get(&format!("/pair/status/{}", PHONE)).await.json();
        assert_eq!(body["status"], "not_initialized");
        assert_eq!(body["credentialsExist"], false);
    }

    #[tokio::test]
    async fn test_unpair_removes_credentials() {
        let ctx = make_test_state();
        let identity = ctx.seed(PHONE);
        let server = TestServer::new(create_router(ctx.state.clone())).unwrap();

        server
            .post(&format!("/sessions/{}/start", PHONE))
            .await
            .assert_status_ok();

        let response = server.delete(&format!("/pair/{}", PHONE)).await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["success"], true);

        let session = ctx.client.latest(&identity).unwrap().session;
        assert!(session.is_logged_out());
        assert!(!ctx.state.manager.registry().has(&identity).await);

        let status: Value = server.get(&format!("/pair/status/{}", PHONE)).await.json();
        assert_eq!(status["status"], "not_initialized");
    }

    #[tokio::test]
    async fn test_cors_headers() {
        let ctx = make_test_state();
        let server = TestServer::new(create_router(ctx.state)).unwrap();

        let response = server.get("/health").await;
        assert!(response.headers().contains_key("access-control-allow-origin"));
    }
}
