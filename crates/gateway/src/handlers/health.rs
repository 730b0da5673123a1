//! Health check handler

use axum::{extract::State, Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub vectorstore_initialized: bool,
    pub total_chunks: usize,
    pub sessions: usize,
    pub llm_enabled: bool,
}

/// Liveness plus a summary of what is loaded
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: convorag_common::VERSION,
        vectorstore_initialized: state.index.is_initialized().await,
        total_chunks: state.index.total_chunks().await,
        sessions: state.sessions.count().await,
        llm_enabled: state.responder.generation_enabled(),
    })
}
