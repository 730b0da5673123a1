//! Grounded chat handler

use axum::{extract::State, Json};
use convorag_common::{
    errors::{AppError, Result},
    models::Citation,
};
use convorag_context::AnswerSource;
use convorag_search::MetadataFilter;
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use crate::{extract::ValidatedJson, state::AppState};

#[derive(Debug, Deserialize, Validate)]
pub struct ChatRequest {
    #[validate(length(min = 1, max = 200))]
    pub session_id: String,

    #[validate(length(min = 1, max = 4000))]
    pub message: String,

    /// Defaults to the configured `default_top_k`
    pub top_k: Option<usize>,

    /// Exact-match or any-of constraints on chunk metadata
    #[serde(default)]
    pub filter_metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub answer: String,
    pub citations: Vec<Citation>,
    pub used_history_turns: usize,
    pub retrieval_query: String,
    pub answer_source: AnswerSource,
}

/// Answer a question within a session.
///
/// The session stays locked from reading its history until the new
/// exchange is appended, so concurrent questions on one session queue up.
pub async fn chat(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<ChatRequest>,
) -> Result<Json<ChatResponse>> {
    if request.message.trim().is_empty() {
        return Err(AppError::Validation {
            message: "message must not be blank".to_string(),
            field: Some("message".to_string()),
        });
    }

    let retrieval = &state.config.retrieval;
    let top_k = request.top_k.unwrap_or(retrieval.default_top_k);
    if top_k == 0 || top_k > retrieval.max_top_k {
        return Err(AppError::Validation {
            message: format!("top_k must be between 1 and {}", retrieval.max_top_k),
            field: Some("top_k".to_string()),
        });
    }

    let filter = request
        .filter_metadata
        .map(MetadataFilter::try_from)
        .transpose()?
        .filter(|f| !f.is_empty());

    let mut session = state
        .sessions
        .lock(&request.session_id)
        .await
        .ok_or_else(|| AppError::SessionNotFound { id: request.session_id.clone() })?;

    let history = session.history();
    let answer = state
        .responder
        .answer(&request.message, &history, top_k, filter.as_ref())
        .await?;

    session.append_exchange(request.message, answer.answer.clone());
    drop(session);

    let used_history_turns = (history.len() / 2).min(state.sessions.max_history_turns());
    info!(
        session_id = %request.session_id,
        citations = answer.citations.len(),
        used_history_turns,
        "Chat answered"
    );

    Ok(Json(ChatResponse {
        session_id: request.session_id,
        answer: answer.answer,
        citations: answer.citations,
        used_history_turns,
        retrieval_query: answer.retrieval_query,
        answer_source: answer.source,
    }))
}
