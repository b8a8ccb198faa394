//! HTTP boundary — thin translation between requests and orchestrator
//! operations, plus the error-to-status mapping.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::app::AppState;
use crate::error::OrchestratorError;
use crate::hub;
use crate::orchestrator::IssuedInvitation;
use crate::session::{AudioArtifact, SessionSnapshot, Winner};

/// Build the full service router, realtime endpoint included.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/{session_id}", get(fetch_session))
        .route("/sessions/{session_id}/invitations", post(issue_invitation))
        .route(
            "/sessions/{session_id}/invitations/redeem",
            post(redeem_invitation),
        )
        .route("/sessions/{session_id}/judgment", post(manual_judge))
        .route("/sessions/{session_id}/judging/retry", post(retry_judging))
        .route(
            "/sessions/{session_id}/turns/{order_index}/audio",
            post(attach_audio),
        )
        .route("/ws", get(hub::ws_handler))
        .with_state(state)
}

/// Orchestrator error wrapped for the HTTP boundary.
pub struct ApiError(pub OrchestratorError);

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            OrchestratorError::Validation(_)
            | OrchestratorError::StateConflict { .. }
            | OrchestratorError::WrongSpeaker { .. }
            | OrchestratorError::NotParticipant { .. }
            | OrchestratorError::Token(_) => StatusCode::BAD_REQUEST,
            OrchestratorError::NotFound(_) => StatusCode::NOT_FOUND,
            OrchestratorError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            OrchestratorError::Upstream(_) => StatusCode::SERVICE_UNAVAILABLE,
            OrchestratorError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let mut body = json!({
            "code": self.0.code(),
            "message": self.0.to_string(),
        });
        match &self.0 {
            OrchestratorError::StateConflict { actual, .. } => {
                body["actualStatus"] = json!(actual);
            }
            OrchestratorError::RateLimited { retry_after_secs } => {
                body["retryAfterSecs"] = json!(retry_after_secs);
            }
            _ => {}
        }
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub topic: String,
    pub rounds: u32,
    pub debater_a_id: Option<String>,
    pub debater_b_id: Option<String>,
    #[serde(default)]
    pub auto_judge: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemInvitationRequest {
    pub token: String,
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualJudgeRequest {
    pub winner: Winner,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachAudioRequest {
    pub url: String,
    pub duration_ms: Option<u64>,
}

async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionSnapshot>), ApiError> {
    let snapshot = state
        .orchestrator
        .create_session(
            req.topic,
            req.rounds,
            req.debater_a_id,
            req.debater_b_id,
            req.auto_judge,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

async fn fetch_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    Ok(Json(state.orchestrator.load_session_state(&session_id).await?))
}

async fn issue_invitation(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<IssuedInvitation>, ApiError> {
    Ok(Json(state.orchestrator.issue_invitation(&session_id).await?))
}

async fn redeem_invitation(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<RedeemInvitationRequest>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let snapshot = state
        .orchestrator
        .redeem_invitation(&session_id, &req.token, &req.user_id)
        .await?;
    Ok(Json(snapshot))
}

async fn manual_judge(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<ManualJudgeRequest>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    Ok(Json(state.orchestrator.user_judge(&session_id, req.winner).await?))
}

async fn retry_judging(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    Ok(Json(state.orchestrator.retry_judging(&session_id).await?))
}

async fn attach_audio(
    State(state): State<AppState>,
    Path((session_id, order_index)): Path<(String, u32)>,
    Json(req): Json<AttachAudioRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .orchestrator
        .attach_turn_audio(
            &session_id,
            order_index,
            AudioArtifact {
                url: req.url,
                duration_ms: req.duration_ms,
            },
        )
        .await?;
    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionStatus;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (OrchestratorError::Validation("bad".to_string()), StatusCode::BAD_REQUEST),
            (OrchestratorError::NotFound("x".to_string()), StatusCode::NOT_FOUND),
            (
                OrchestratorError::RateLimited { retry_after_secs: 9 },
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                OrchestratorError::Upstream("down".to_string()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                OrchestratorError::Persistence("disk".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            let response = ApiError(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }

    #[test]
    fn test_state_conflict_maps_to_400() {
        let response = ApiError(OrchestratorError::StateConflict {
            attempted: "judge",
            actual: SessionStatus::Running,
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
