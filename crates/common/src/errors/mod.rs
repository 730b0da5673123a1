//! Error types for convorag services
//!
//! Provides a comprehensive error handling system with:
//! - Distinct error types for different failure modes
//! - HTTP status code mapping
//! - Structured `{error, detail, code}` error responses
//! - Upstream (embedding / LLM) failure classification

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,

    // Precondition errors (2xxx)
    NoDocumentsIndexed,
    PreconditionFailed,
    InvalidUpload,

    // Resource errors (4xxx)
    SessionNotFound,
    DocumentNotFound,

    // Rate limiting (6xxx)
    RateLimited,

    // External service errors (8xxx)
    UpstreamRateLimited,
    UpstreamUnavailable,
    UpstreamTimeout,
    EmbeddingError,
    LlmError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
    PersistenceError,
    DimensionMismatch,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,

            ErrorCode::NoDocumentsIndexed => 2001,
            ErrorCode::PreconditionFailed => 2002,
            ErrorCode::InvalidUpload => 2003,

            ErrorCode::SessionNotFound => 4001,
            ErrorCode::DocumentNotFound => 4002,

            ErrorCode::RateLimited => 6001,

            ErrorCode::UpstreamRateLimited => 8001,
            ErrorCode::UpstreamUnavailable => 8002,
            ErrorCode::UpstreamTimeout => 8003,
            ErrorCode::EmbeddingError => 8004,
            ErrorCode::LlmError => 8005,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
            ErrorCode::PersistenceError => 9004,
            ErrorCode::DimensionMismatch => 9005,
        }
    }
}

/// External services the application calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upstream {
    Embedding,
    Llm,
}

impl std::fmt::Display for Upstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Upstream::Embedding => f.write_str("embedding"),
            Upstream::Llm => f.write_str("llm"),
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    // Precondition errors
    #[error("No documents indexed. Please call /documents/index first.")]
    NoDocumentsIndexed,

    #[error("{message}")]
    Precondition { message: String },

    #[error("{message}")]
    InvalidUpload { message: String },

    // Resource errors
    #[error("Session '{id}' not found or expired")]
    SessionNotFound { id: String },

    #[error("Document '{id}' not found")]
    DocumentNotFound { id: String },

    // Rate limiting
    #[error("Rate limit exceeded: {limit} requests per second")]
    RateLimited { limit: u32 },

    // External service errors
    #[error("{service} service rate limited the request")]
    UpstreamRateLimited { service: Upstream },

    #[error("{service} service unavailable: {message}")]
    UpstreamUnavailable { service: Upstream, message: String },

    #[error("{service} service timed out after {timeout_secs}s")]
    UpstreamTimeout { service: Upstream, timeout_secs: u64 },

    #[error("Embedding service error: {message}")]
    EmbeddingError { message: String },

    #[error("LLM service error: {message}")]
    LlmError { message: String },

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Persistence error: {message}")]
    Persistence { message: String },

    #[error("Embedding dimension mismatch: index holds {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::NoDocumentsIndexed => ErrorCode::NoDocumentsIndexed,
            AppError::Precondition { .. } => ErrorCode::PreconditionFailed,
            AppError::InvalidUpload { .. } => ErrorCode::InvalidUpload,
            AppError::SessionNotFound { .. } => ErrorCode::SessionNotFound,
            AppError::DocumentNotFound { .. } => ErrorCode::DocumentNotFound,
            AppError::RateLimited { .. } => ErrorCode::RateLimited,
            AppError::UpstreamRateLimited { .. } => ErrorCode::UpstreamRateLimited,
            AppError::UpstreamUnavailable { .. } => ErrorCode::UpstreamUnavailable,
            AppError::UpstreamTimeout { .. } => ErrorCode::UpstreamTimeout,
            AppError::EmbeddingError { .. } => ErrorCode::EmbeddingError,
            AppError::LlmError { .. } => ErrorCode::LlmError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Persistence { .. } => ErrorCode::PersistenceError,
            AppError::DimensionMismatch { .. } => ErrorCode::DimensionMismatch,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::NoDocumentsIndexed |
            AppError::Precondition { .. } |
            AppError::InvalidUpload { .. } => StatusCode::BAD_REQUEST,

            // 404 Not Found
            AppError::SessionNotFound { .. } |
            AppError::DocumentNotFound { .. } => StatusCode::NOT_FOUND,

            // 422 Unprocessable Entity
            AppError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,

            // 429 Too Many Requests
            AppError::RateLimited { .. } |
            AppError::UpstreamRateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,

            // 500 Internal Server Error
            AppError::Internal { .. } |
            AppError::Configuration { .. } |
            AppError::Serialization(_) |
            AppError::Persistence { .. } |
            AppError::DimensionMismatch { .. } |
            AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 502 Bad Gateway
            AppError::EmbeddingError { .. } |
            AppError::LlmError { .. } => StatusCode::BAD_GATEWAY,

            // 503 Service Unavailable
            AppError::UpstreamUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,

            // 504 Gateway Timeout
            AppError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Whether a caller may retry the same request later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::RateLimited { .. }
                | AppError::UpstreamRateLimited { .. }
                | AppError::UpstreamUnavailable { .. }
                | AppError::UpstreamTimeout { .. }
        )
    }

    /// Classify a non-success HTTP status returned by an upstream API
    pub fn from_upstream_status(service: Upstream, status: reqwest::StatusCode, body: &str) -> Self {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return AppError::UpstreamRateLimited { service };
        }
        if status == reqwest::StatusCode::SERVICE_UNAVAILABLE || status == reqwest::StatusCode::BAD_GATEWAY {
            return AppError::UpstreamUnavailable {
                service,
                message: format!("API returned {}", status),
            };
        }
        let message = format!("API error {}: {}", status, body);
        match service {
            Upstream::Embedding => AppError::EmbeddingError { message },
            Upstream::Llm => AppError::LlmError { message },
        }
    }

    /// Classify a transport-level failure talking to an upstream API
    pub fn from_transport(service: Upstream, err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            return AppError::UpstreamTimeout { service, timeout_secs };
        }
        if err.is_connect() || err.is_request() {
            return AppError::UpstreamUnavailable {
                service,
                message: err.to_string(),
            };
        }
        let message = format!("Request failed: {}", err);
        match service {
            Upstream::Embedding => AppError::EmbeddingError { message },
            Upstream::Llm => AppError::LlmError { message },
        }
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short category, the canonical reason of the status code
    pub error: String,
    /// Human readable message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Machine readable code
    pub code: ErrorCode,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        // Log based on severity
        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                source = ?self,
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let body = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            detail: Some(message),
            code,
        };

        let mut response = (status, Json(body)).into_response();
        if self.is_retryable() {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
        }
        response
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Persistence {
            message: err.to_string()
        }
    }
}
