//! Session handlers.

use axum::{
    extract::{Path, State},
    Json,
};
use relay_runtime::{StartOutcome, StopOutcome};

use crate::error::{ApiError, Result};
use crate::handlers::parse_identity;
use crate::state::AppState;
use crate::types::{
    ActionResponse, SendMessageRequest, SendResponse, SessionListResponse, SessionStatusResponse,
    SessionSummary,
};

/// GET /sessions - List registered sessions.
pub async fn list_sessions(State(state): State<AppState>) -> Json<SessionListResponse> {
    let sessions: Vec<SessionSummary> = state
        .manager
        .list_sessions()
        .await
        .into_iter()
        .map(|(identity, status)| SessionSummary { identity, status })
        .collect();
    let total = sessions.len();

    Json(SessionListResponse { sessions, total })
}

/// POST /sessions/:id/start - Start a session from stored credentials.
pub async fn start_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ActionResponse>> {
    let identity = parse_identity(&id)?;
    let outcome = state.manager.start_session(&identity).await?;

    let response = match outcome {
        StartOutcome::Started => ActionResponse::ok(identity, "session started"),
        StartOutcome::AlreadyRunning => ActionResponse::ok(identity, "session already running"),
        StartOutcome::Cancelled => ActionResponse {
            success: false,
            message: "session was stopped while connecting".to_string(),
            identity,
        },
    };
    Ok(Json(response))
}

/// POST /sessions/:id/stop - Stop a session and cancel pending restarts.
pub async fn stop_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ActionResponse>> {
    let identity = parse_identity(&id)?;
    let message = match state.manager.stop_session(&identity).await? {
        StopOutcome::Stopped => "session stopped",
        StopOutcome::RestartCancelled => "pending restart cancelled",
    };
    Ok(Json(ActionResponse::ok(identity, message)))
}

/// POST /sessions/:id/send - Send a text through a running session.
pub async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<SendResponse>> {
    let identity = parse_identity(&id)?;
    if req.to.trim().is_empty() {
        return Err(ApiError::BadRequest("recipient is required".to_string()));
    }
    if req.message.is_empty() {
        return Err(ApiError::BadRequest("message is required".to_string()));
    }

    let to = state
        .manager
        .send_message(&identity, &req.to, &req.message)
        .await?;

    Ok(Json(SendResponse {
        success: true,
        message: "message sent".to_string(),
        to,
    }))
}

/// GET /sessions/:id/status - Status of one session.
pub async fn session_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionStatusResponse>> {
    let identity = parse_identity(&id)?;
    let status = state.manager.session_status(&identity).await;
    Ok(Json(SessionStatusResponse::new(identity, status)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::make_test_state;
    use relay_runtime::SessionStatus;

    #[tokio::test]
    async fn test_start_then_status() {
        let ctx = make_test_state();
        let identity = ctx.seed("15550109999");

        let response = start_session(State(ctx.state.clone()), Path("+1 555 010 9999".into()))
            .await
            .unwrap();
        assert!(response.success);
        assert_eq!(response.identity, identity);

        let again = start_session(State(ctx.state.clone()), Path("15550109999".into()))
            .await
            .unwrap();
        assert_eq!(again.message, "session already running");

        let status = session_status(State(ctx.state), Path("15550109999".into()))
            .await
            .unwrap();
        assert!(status.running);
        assert_eq!(status.status, SessionStatus::Connecting);
    }

    #[tokio::test]
    async fn test_send_requires_recipient() {
        let ctx = make_test_state();
        let err = send_message(
            State(ctx.state),
            Path("15550109999".into()),
            Json(SendMessageRequest {
                to: " ".into(),
                message: "hi".into(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
