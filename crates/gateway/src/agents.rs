//! Agent session routes: `/api/agents/*`.

use axum::{
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use codecouncil_core::error::InputError;
use codecouncil_core::provider::Credential;
use codecouncil_core::session::{AgentStatus, ContextFile, Session, SessionId};
use codecouncil_core::tool::ToolDefinition;

use crate::{API_KEY_HEADER, ErrorResponse, SharedState, error_response};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartAgentRequest {
    #[serde(default)]
    pub goal: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub files: Vec<ContextFile>,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartAgentResponse {
    pub session_id: SessionId,
    pub status: AgentStatus,
    pub message: &'static str,
}

/// `POST /api/agents/start`
///
/// The model credential comes from the body's `apiKey`, else the
/// `X-Api-Key` header, else the deployment key.
pub async fn start_agent_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    payload: Result<Json<StartAgentRequest>, JsonRejection>,
) -> Result<Json<StartAgentResponse>, (StatusCode, Json<ErrorResponse>)> {
    let Json(payload) = payload.map_err(|rejection| {
        warn!(error = %rejection, "Rejected agent start body");
        error_response(rejection.status(), rejection.body_text())
    })?;

    let goal = payload.goal.unwrap_or_default();

    let credential = payload.api_key.and_then(Credential::new).or_else(|| {
        headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(Credential::new)
    });

    let session = state
        .store
        .start_agent(&goal, payload.role.as_deref(), payload.files, credential)
        .map_err(|e| {
            warn!(error = %e, "Rejected agent start");
            match e {
                InputError::MissingGoal | InputError::MissingCredential => {
                    error_response(StatusCode::BAD_REQUEST, e.to_string())
                }
            }
        })?;

    Ok(Json(StartAgentResponse {
        session_id: session.id,
        status: session.status,
        message: "Agent started successfully",
    }))
}

/// `GET /api/agents/{id}`
pub async fn get_session_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Session>, (StatusCode, Json<ErrorResponse>)> {
    id.parse::<SessionId>()
        .ok()
        .and_then(|id| state.store.get_session(&id))
        .map(Json)
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "Session not found"))
}

/// `GET /api/agents/tools`
pub async fn list_tools_handler(State(state): State<SharedState>) -> Json<Vec<ToolDefinition>> {
    Json(state.store.tool_definitions())
}
