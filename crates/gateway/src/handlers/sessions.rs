//! Session management handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{extract::ValidatedJson, state::AppState};
use convorag_common::{
    errors::{AppError, Result},
    models::{SessionInfo, Turn},
};

/// Create session request, the body itself is optional
#[derive(Debug, Default, Deserialize, Validate)]
pub struct CreateSessionRequest {
    #[validate(length(min = 1, max = 200))]
    pub session_name: Option<String>,

    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub session_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionInfo>,
    pub total_sessions: usize,
}

#[derive(Debug, Serialize)]
pub struct SessionStatusResponse {
    pub session_id: String,
    pub exists: bool,
    pub message_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub session_id: String,
    pub messages: Vec<Turn>,
    pub total_messages: usize,
}

/// Create a new session
pub async fn create_session(
    State(state): State<AppState>,
    request: Option<ValidatedJson<CreateSessionRequest>>,
) -> Result<(StatusCode, Json<CreateSessionResponse>)> {
    let request = request.map(|ValidatedJson(r)| r).unwrap_or_default();
    let info = state.sessions.create(request.session_name, request.metadata).await;

    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id: info.session_id,
            session_name: info.session_name,
            created_at: info.created_at,
        }),
    ))
}

/// Live sessions, after sweeping expired ones
pub async fn list_sessions(State(state): State<AppState>) -> Json<SessionListResponse> {
    let sessions = state.sessions.list().await;
    Json(SessionListResponse {
        total_sessions: sessions.len(),
        sessions,
    })
}

/// Session status; unknown or expired sessions report `exists: false`
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Json<SessionStatusResponse> {
    let response = match state.sessions.info(&session_id).await {
        Some(info) => SessionStatusResponse {
            session_id: info.session_id,
            exists: true,
            message_count: info.message_count,
            created_at: Some(info.created_at),
            last_activity: Some(info.last_activity),
        },
        None => SessionStatusResponse {
            session_id,
            exists: false,
            message_count: 0,
            created_at: None,
            last_activity: None,
        },
    };
    Json(response)
}

/// Turns of a session, oldest first
pub async fn get_history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<HistoryResponse>> {
    let session = state
        .sessions
        .lock(&session_id)
        .await
        .ok_or_else(|| AppError::SessionNotFound { id: session_id.clone() })?;
    let messages = session.history();

    Ok(Json(HistoryResponse {
        session_id,
        total_messages: messages.len(),
        messages,
    }))
}

pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionStatusResponse>> {
    if !state.sessions.delete(&session_id).await {
        return Err(AppError::SessionNotFound { id: session_id });
    }

    Ok(Json(SessionStatusResponse {
        session_id,
        exists: false,
        message_count: 0,
        created_at: None,
        last_activity: None,
    }))
}
