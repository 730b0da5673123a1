//! Route table and middleware stack

use std::any::Any as PanicPayload;

use axum::{
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Router,
};
use convorag_common::errors::{AppError, Result};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::{
    handlers::{chat, documents, health, metrics, sessions},
    middleware::{
        rate_limit::{rate_limit_middleware, GlobalRateLimit},
        request_metrics::track_requests,
    },
    state::AppState,
};

/// Multipart framing allowance on top of the configured file size
const UPLOAD_OVERHEAD_BYTES: usize = 64 * 1024;

/// Create the main application router
pub fn create_router(state: AppState) -> Result<Router> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let upload_limit = state
        .config
        .upload
        .max_file_size_bytes()
        .saturating_add(UPLOAD_OVERHEAD_BYTES);
    let upload = post(documents::upload_document).layer(DefaultBodyLimit::max(upload_limit));

    let mut app = Router::new()
        .route("/health", get(health::health))
        .route("/metrics", get(metrics::metrics))
        // Documents
        .route(
            "/documents",
            get(documents::list_documents).delete(documents::clear_documents),
        )
        .route("/documents/index", post(documents::index_documents))
        .route("/documents/upload", upload.clone())
        .route("/upload", upload)
        .route("/documents/{document_id}", delete(documents::delete_document))
        // Sessions
        .route(
            "/sessions",
            post(sessions::create_session).get(sessions::list_sessions),
        )
        .route(
            "/sessions/{session_id}",
            get(sessions::get_session).delete(sessions::delete_session),
        )
        .route("/sessions/{session_id}/history", get(sessions::get_history))
        // Chat
        .route("/chat", post(chat::chat))
        .route("/chat/ask", post(chat::chat))
        .route_layer(from_fn(track_requests));

    let limits = &state.config.rate_limit;
    if limits.enabled {
        let limit = GlobalRateLimit::new(limits.requests_per_second, limits.burst)?;
        app = app.layer(from_fn_with_state(limit, rate_limit_middleware));
    }

    Ok(app
        .layer(catch_panics())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state))
}

type PanicHandler = fn(Box<dyn PanicPayload + Send + 'static>) -> Response;

/// Turn handler panics into a logged 500 with the standard error body
pub(crate) fn catch_panics() -> CatchPanicLayer<PanicHandler> {
    CatchPanicLayer::custom(handle_panic as PanicHandler)
}

fn handle_panic(payload: Box<dyn PanicPayload + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");
    tracing::error!(panic = %detail, "Request handler panicked");

    AppError::Internal {
        message: "Unexpected server error".to_string(),
    }
    .into_response()
}
