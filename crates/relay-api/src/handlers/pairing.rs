//! Pairing handlers.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use relay_runtime::PairingOutcome;

use crate::error::{ApiError, Result};
use crate::handlers::parse_identity;
use crate::state::AppState;
use crate::types::{
    ActionResponse, PairCodeQuery, PairCodeResponse, PairConnection, PairConnectionsResponse,
    PairStatusResponse,
};

/// GET /pair/code?phone= - Request a linking code.
pub async fn pair_code(
    State(state): State<AppState>,
    Query(query): Query<PairCodeQuery>,
) -> Result<Json<PairCodeResponse>> {
    let phone = query
        .phone
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("phone number is required".to_string()))?;

    let response = match state.manager.begin_pairing(&phone).await? {
        PairingOutcome::Code(linking) => PairCodeResponse::code(linking),
        PairingOutcome::AlreadyRegistered { identity } => {
            PairCodeResponse::already_registered(identity)
        }
    };
    Ok(Json(response))
}

/// GET /pair/status/:id - Pairing view of one identity.
pub async fn pair_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PairStatusResponse>> {
    let identity = parse_identity(&id)?;
    let status = state.manager.pairing_status(&identity).await;
    Ok(Json(status.into()))
}

/// GET /pair/connections - Live sessions and outstanding pairing attempts.
pub async fn pair_connections(State(state): State<AppState>) -> Json<PairConnectionsResponse> {
    let mut connections: Vec<PairConnection> = state
        .manager
        .list_sessions()
        .await
        .into_iter()
        .map(|(identity, status)| PairConnection {
            identity,
            status: status.as_str(),
        })
        .collect();
    connections.extend(
        state
            .manager
            .pairing_attempts()
            .await
            .into_iter()
            .map(|identity| PairConnection {
                identity,
                status: "pairing",
            }),
    );

    let total = connections.len();
    Json(PairConnectionsResponse { connections, total })
}

/// DELETE /pair/:id - Log out and delete stored credentials.
pub async fn unpair(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ActionResponse>> {
    let identity = parse_identity(&id)?;
    state.manager.unpair(&identity).await?;
    Ok(Json(ActionResponse::ok(identity, "device unpaired")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::make_test_state;
    use relay_runtime::mock::MOCK_PAIRING_CODE;

    #[tokio::test]
    async fn test_pair_code_issues_code() {
        let ctx = make_test_state();
        let response = pair_code(
            State(ctx.state.clone()),
            Query(PairCodeQuery {
                phone: Some("15550109999".into()),
            }),
        )
        .await
        .unwrap();

        assert_eq!(response.code.as_deref(), Some(MOCK_PAIRING_CODE));
        assert_eq!(response.expires_in_seconds, Some(60));
        assert!(ctx.state.manager.is_pairing(&response.identity).await);
    }

    #[tokio::test]
    async fn test_pair_code_requires_phone() {
        let ctx = make_test_state();
        let err = pair_code(State(ctx.state), Query(PairCodeQuery::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_pair_connections_lists_sessions_and_attempts() {
        let ctx = make_test_state();
        let running = ctx.seed("15550100000");
        ctx.state.manager.start_session(&running).await.unwrap();
        pair_code(
            State(ctx.state.clone()),
            Query(PairCodeQuery {
                phone: Some("15550109999".into()),
            }),
        )
        .await
        .unwrap();

        let response = pair_connections(State(ctx.state)).await;
        assert_eq!(response.total, 2);
        assert_eq!(response.connections[0].identity, running);
        assert_eq!(response.connections[0].status, "connecting");
        assert_eq!(response.connections[1].identity.as_str(), "15550109999");
        assert_eq!(response.connections[1].status, "pairing");
    }
}
