//! Configuration management for convorag services
//!
//! Configuration comes exclusively from the process environment:
//! - Environment variables (prefixed with APP__, e.g. `APP__SERVER__PORT=8081`)
//! - A `.env` file, loaded by the binary before [`AppConfig::load`]
//! - `OPENAI_API_KEY` as a fallback for the embedding and LLM keys
//! - Default values

use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::{AppError, Result};

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Embedding service configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Chat completion configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Document chunking configuration
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Session memory configuration
    #[serde(default)]
    pub session: SessionConfig,

    /// Retrieval and answer composition
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Vector index persistence
    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// File upload ingestion
    #[serde(default)]
    pub upload: UploadConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Embedding provider: openai, hash
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// API key for embedding service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension of the hashing embedder
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Request timeout in seconds
    #[serde(default = "default_upstream_timeout")]
    pub timeout_secs: u64,

    /// Batch size for embedding requests
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// Generate answers with the chat model instead of the extractive template
    #[serde(default)]
    pub enabled: bool,

    /// API key for the chat completion endpoint
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default)]
    pub temperature: f32,

    /// Maximum output tokens
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Request timeout in seconds
    #[serde(default = "default_upstream_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ChunkingConfig {
    /// Target chunk size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap between chunks in characters
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Default strategy: recursive, semantic
    #[serde(default = "default_chunking_strategy")]
    pub strategy: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// User/assistant pairs kept per session
    #[serde(default = "default_max_history_turns")]
    pub max_history_turns: usize,

    /// Idle time after which a session expires
    #[serde(default = "default_session_timeout")]
    pub timeout_minutes: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    /// top_k used when the request does not specify one
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    /// Upper bound accepted for top_k
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,

    /// Prior user turns prepended to the retrieval query
    #[serde(default = "default_history_query_turns")]
    pub history_query_turns: usize,

    /// Prior messages forwarded to the chat model
    #[serde(default = "default_prompt_history_messages")]
    pub prompt_history_messages: usize,

    /// Citation snippet length in characters
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VectorStoreConfig {
    /// Persist the index after every mutation
    #[serde(default = "default_enabled")]
    pub persist: bool,

    /// Directory holding the index snapshot and document registry
    #[serde(default = "default_vector_store_path")]
    pub path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error) or a full EnvFilter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logging: bool,

    /// Install the Prometheus recorder and expose /metrics
    #[serde(default = "default_enabled")]
    pub metrics_enabled: bool,

    /// Service name for logs
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second (global)
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default)]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8000 }
fn default_embedding_provider() -> String { "hash".to_string() }
fn default_embedding_model() -> String { crate::DEFAULT_EMBEDDING_MODEL.to_string() }
fn default_embedding_dimension() -> usize { crate::DEFAULT_EMBEDDING_DIMENSION }
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadConfig {
    /// Largest accepted file
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,

    /// Accepted file extensions, without the leading dot
    #[serde(default = "default_supported_extensions")]
    pub supported_extensions: Vec<String>,
}

impl UploadConfig {
    pub fn max_file_size_bytes(&self) -> usize {
        usize::try_from(self.max_file_size_mb.saturating_mul(1024 * 1024)).unwrap_or(usize::MAX)
    }

    /// Whether `extension` (with or without a leading dot) may be uploaded
    pub fn accepts(&self, extension: &str) -> bool {
        let extension = extension.trim_start_matches('.');
        self.supported_extensions
            .iter()
            .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(extension))
    }
}

fn default_upstream_timeout() -> u64 { 30 }
fn default_batch_size() -> usize { 100 }
fn default_llm_model() -> String { "gpt-4o-mini".to_string() }
fn default_max_tokens() -> usize { 800 }
fn default_chunk_size() -> usize { 800 }
fn default_chunk_overlap() -> usize { 150 }
fn default_chunking_strategy() -> String { "recursive".to_string() }
fn default_max_history_turns() -> usize { 5 }
fn default_session_timeout() -> u64 { 60 }
fn default_top_k() -> usize { 3 }
fn default_max_top_k() -> usize { 10 }
fn default_history_query_turns() -> usize { 2 }
fn default_prompt_history_messages() -> usize { 6 }
fn default_snippet_chars() -> usize { 160 }
fn default_vector_store_path() -> String { "./vectorstore".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_service_name() -> String { "convorag".to_string() }
fn default_rate_limit() -> u32 { 50 }
fn default_burst() -> u32 { 100 }
fn default_enabled() -> bool { true }
fn default_max_file_size_mb() -> u64 { 10 }
fn default_supported_extensions() -> Vec<String> {
    ["txt", "md", "markdown", "pdf"].iter().map(|e| e.to_string()).collect()
}

impl AppConfig {
    /// Load configuration from the environment
    pub fn load() -> std::result::Result<Self, ConfigError> {
        let config = Config::builder()
            // Load from environment variables with APP__ prefix
            // e.g., APP__SESSION__MAX_HISTORY_TURNS=10
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("upload.supported_extensions")
            )
            .build()?;

        let mut config: Self = config.try_deserialize()?;
        config.apply_openai_key(std::env::var("OPENAI_API_KEY").ok());
        Ok(config)
    }

    /// Fill missing embedding/LLM keys from a shared OpenAI key
    pub fn apply_openai_key(&mut self, key: Option<String>) {
        let Some(key) = key.filter(|k| !k.trim().is_empty()) else {
            return;
        };
        if self.embedding.api_key.is_none() {
            self.embedding.api_key = Some(key.clone());
        }
        if self.llm.api_key.is_none() {
            self.llm.api_key = Some(key);
        }
    }

    /// Reject settings the services cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(config_error("chunking.chunk_size must be greater than zero"));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(config_error("chunking.chunk_overlap must be smaller than chunking.chunk_size"));
        }
        if self.retrieval.max_top_k == 0 {
            return Err(config_error("retrieval.max_top_k must be greater than zero"));
        }
        if self.retrieval.default_top_k == 0 || self.retrieval.default_top_k > self.retrieval.max_top_k {
            return Err(config_error("retrieval.default_top_k must be within 1..=retrieval.max_top_k"));
        }
        if self.session.max_history_turns == 0 {
            return Err(config_error("session.max_history_turns must be greater than zero"));
        }
        if self.upload.max_file_size_mb == 0 {
            return Err(config_error("upload.max_file_size_mb must be greater than zero"));
        }
        if self.upload.supported_extensions.is_empty() {
            return Err(config_error("upload.supported_extensions must not be empty"));
        }
        if self.embedding.provider == "openai" && self.embedding.api_key.is_none() {
            return Err(config_error("embedding.api_key is required for the openai provider"));
        }
        Ok(())
    }

    /// Session idle timeout
    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session.timeout_minutes * 60)
    }

    /// Directory used for index persistence, if enabled
    pub fn vector_store_dir(&self) -> Option<PathBuf> {
        self.vector_store.persist.then(|| PathBuf::from(&self.vector_store.path))
    }

    /// Whether answers should come from the chat model
    pub fn llm_generation_enabled(&self) -> bool {
        self.llm.enabled && self.llm.api_key.is_some()
    }
}

fn config_error(message: &str) -> AppError {
    AppError::Configuration { message: message.to_string() }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            api_base: None,
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_upstream_timeout(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            api_base: None,
            model: default_llm_model(),
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            timeout_secs: default_upstream_timeout(),
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            strategy: default_chunking_strategy(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_history_turns: default_max_history_turns(),
            timeout_minutes: default_session_timeout(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            max_top_k: default_max_top_k(),
            history_query_turns: default_history_query_turns(),
            prompt_history_messages: default_prompt_history_messages(),
            snippet_chars: default_snippet_chars(),
        }
    }
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            persist: default_enabled(),
            path: default_vector_store_path(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: false,
            metrics_enabled: default_enabled(),
            service_name: default_service_name(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: default_max_file_size_mb(),
            supported_extensions: default_supported_extensions(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: false,
        }
    }
}
